//! Conversation engine and completion backends
//!
//! The engine owns the append-only turn history and sends the persona
//! prompt plus the full history to a stateless remote completion backend on
//! every request. Transient failures get exactly one retry before the
//! session loop sees them.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::EngineError;
use crate::session::{Role, Turn};
use crate::PersonaConfig;

/// Remote chat completion seam
///
/// The backend is stateless per call: all context is passed explicitly.
#[async_trait(?Send)]
pub trait ChatBackend {
    /// Produce assistant text for the given system prompt and history
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Turn],
    ) -> Result<String, EngineError>;
}

/// Maintains persona state and turn history; routes commands to the backend
pub struct ConversationEngine {
    persona_prompt: String,
    history: Vec<Turn>,
    backend: Box<dyn ChatBackend>,
}

impl ConversationEngine {
    /// Create an engine for the given persona and backend
    #[must_use]
    pub fn new(persona: &PersonaConfig, backend: Box<dyn ChatBackend>) -> Self {
        Self {
            persona_prompt: persona.persona_prompt.clone(),
            history: Vec::new(),
            backend,
        }
    }

    /// Append a user turn to the history
    pub fn push_user(&mut self, text: &str) {
        self.history.push(Turn::user(text));
    }

    /// The ordered turn history
    #[must_use]
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Send the full history to the backend and append the reply turn
    ///
    /// A transient failure is retried once; any second failure, or a
    /// non-transient one, surfaces to the caller with no assistant turn
    /// appended. The pending user turn stays in history either way, so the
    /// next exchange keeps its context.
    ///
    /// # Errors
    ///
    /// Returns the backend's [`EngineError`] after retries are exhausted.
    pub async fn respond(&mut self) -> Result<Turn, EngineError> {
        let reply = match self
            .backend
            .complete(&self.persona_prompt, &self.history)
            .await
        {
            Ok(text) => text,
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "transient engine error, retrying once");
                self.backend
                    .complete(&self.persona_prompt, &self.history)
                    .await?
            }
            Err(e) => return Err(e),
        };

        let turn = Turn::assistant(reply);
        self.history.push(turn.clone());
        Ok(turn)
    }
}

/// OpenAI-compatible `/chat/completions` client
///
/// Works against Groq and OpenAI; the base URL comes from config.
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ChatClient {
    /// Default reply token budget
    const MAX_TOKENS: u32 = 1024;

    /// Create a chat client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty.
    pub fn new(base_url: &str, api_key: &str, model: &str) -> crate::Result<Self> {
        if api_key.is_empty() {
            return Err(crate::Error::Config(
                "chat API key required (set GROQ_API_KEY or OPENAI_API_KEY)".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens: Self::MAX_TOKENS,
        })
    }

    fn build_body(&self, system_prompt: &str, history: &[Turn]) -> Value {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(serde_json::json!({
            "role": "system",
            "content": system_prompt,
        }));
        for turn in history {
            messages.push(serde_json::json!({
                "role": turn.role.as_str(),
                "content": turn.text,
            }));
        }

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
        })
    }

    fn parse_reply(json: &Value) -> Result<String, EngineError> {
        let content = json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                EngineError::MalformedResponse("response missing choices[0].message.content".into())
            })?;

        if content.trim().is_empty() {
            return Err(EngineError::MalformedResponse("empty reply".into()));
        }
        Ok(content.to_string())
    }

    /// Map an HTTP status to the engine error taxonomy
    fn classify_status(status: reqwest::StatusCode, body: &str) -> EngineError {
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            EngineError::Authentication(format!("{status}: {body}"))
        } else if status.is_server_error()
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
        {
            EngineError::Transient(format!("{status}: {body}"))
        } else {
            EngineError::MalformedResponse(format!("unexpected status {status}: {body}"))
        }
    }
}

#[async_trait(?Send)]
impl ChatBackend for ChatClient {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Turn],
    ) -> Result<String, EngineError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(system_prompt, history);

        tracing::debug!(
            model = %self.model,
            turns = history.len(),
            "sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| EngineError::MalformedResponse(e.to_string()))?;

        let reply = Self::parse_reply(&json)?;
        tracing::debug!(chars = reply.len(), "completion received");
        Ok(reply)
    }
}

/// Local fallback used when no chat API key is configured
///
/// Echoes the last user turn back, so the rest of the pipeline can be
/// exercised without credentials.
pub struct EchoBackend;

#[async_trait(?Send)]
impl ChatBackend for EchoBackend {
    async fn complete(
        &self,
        _system_prompt: &str,
        history: &[Turn],
    ) -> Result<String, EngineError> {
        let last_user = history
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .ok_or_else(|| EngineError::MalformedResponse("no user turn in history".into()))?;
        Ok(format!("Echo: {}", last_user.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_persona() -> PersonaConfig {
        PersonaConfig::default()
    }

    /// Backend that plays back a scripted sequence of results
    struct ScriptedBackend {
        script: std::cell::RefCell<Vec<Result<String, EngineError>>>,
    }

    impl ScriptedBackend {
        fn new(mut script: Vec<Result<String, EngineError>>) -> Self {
            script.reverse();
            Self {
                script: std::cell::RefCell::new(script),
            }
        }
    }

    #[async_trait(?Send)]
    impl ChatBackend for ScriptedBackend {
        async fn complete(
            &self,
            _system_prompt: &str,
            _history: &[Turn],
        ) -> Result<String, EngineError> {
            self.script
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Err(EngineError::Transient("script exhausted".into())))
        }
    }

    #[tokio::test]
    async fn transient_failure_retried_once() {
        let backend = ScriptedBackend::new(vec![
            Err(EngineError::Transient("flaky".into())),
            Ok("recovered".to_string()),
        ]);
        let mut engine = ConversationEngine::new(&test_persona(), Box::new(backend));
        engine.push_user("hi");
        let reply = engine.respond().await.unwrap();
        assert_eq!(reply.text, "recovered");
        assert_eq!(engine.history().len(), 2);
    }

    #[tokio::test]
    async fn second_transient_failure_surfaces() {
        let backend = ScriptedBackend::new(vec![
            Err(EngineError::Transient("flaky".into())),
            Err(EngineError::Transient("still flaky".into())),
        ]);
        let mut engine = ConversationEngine::new(&test_persona(), Box::new(backend));
        engine.push_user("hi");
        assert!(engine.respond().await.is_err());
        // User turn retained, no assistant turn appended.
        assert_eq!(engine.history().len(), 1);
        assert_eq!(engine.history()[0].role, Role::User);
    }

    #[tokio::test]
    async fn auth_failure_not_retried() {
        let backend = ScriptedBackend::new(vec![
            Err(EngineError::Authentication("bad key".into())),
            Ok("should never be reached".to_string()),
        ]);
        let mut engine = ConversationEngine::new(&test_persona(), Box::new(backend));
        engine.push_user("hi");
        assert!(matches!(
            engine.respond().await,
            Err(EngineError::Authentication(_))
        ));
        assert_eq!(engine.history().len(), 1);
    }

    #[tokio::test]
    async fn echo_backend_repeats_last_user_turn() {
        let mut engine = ConversationEngine::new(&test_persona(), Box::new(EchoBackend));
        engine.push_user("hello there");
        let reply = engine.respond().await.unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.text, "Echo: hello there");
        assert_eq!(engine.history().len(), 2);
    }

    #[tokio::test]
    async fn history_accumulates_in_order() {
        let mut engine = ConversationEngine::new(&test_persona(), Box::new(EchoBackend));
        engine.push_user("first");
        engine.respond().await.unwrap();
        engine.push_user("second");
        engine.respond().await.unwrap();

        let roles: Vec<Role> = engine.history().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(engine.history()[2].text, "second");
    }

    #[test]
    fn request_body_shape() {
        let client = ChatClient::new("https://api.groq.com/openai/v1", "key", "test-model")
            .unwrap();
        let history = vec![Turn::user("hi"), Turn::assistant("hello"), Turn::user("again")];
        let body = client.build_body("be nice", &history);

        assert_eq!(body["model"], "test-model");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "be nice");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[3]["content"], "again");
    }

    #[test]
    fn reply_parsing() {
        let json: Value = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "hi there"}}]}"#,
        )
        .unwrap();
        assert_eq!(ChatClient::parse_reply(&json).unwrap(), "hi there");

        let missing: Value = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            ChatClient::parse_reply(&missing),
            Err(EngineError::MalformedResponse(_))
        ));
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            ChatClient::classify_status(reqwest::StatusCode::UNAUTHORIZED, ""),
            EngineError::Authentication(_)
        ));
        assert!(matches!(
            ChatClient::classify_status(reqwest::StatusCode::TOO_MANY_REQUESTS, ""),
            EngineError::Transient(_)
        ));
        assert!(matches!(
            ChatClient::classify_status(reqwest::StatusCode::BAD_GATEWAY, ""),
            EngineError::Transient(_)
        ));
        assert!(matches!(
            ChatClient::classify_status(reqwest::StatusCode::BAD_REQUEST, ""),
            EngineError::MalformedResponse(_)
        ));
    }

    #[test]
    fn empty_api_key_rejected() {
        assert!(ChatClient::new("https://api.groq.com/openai/v1", "", "m").is_err());
    }
}
