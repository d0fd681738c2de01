//! LLM backends - one request, one completion
//!
//! Only an OpenAI-compatible chat-completions endpoint is supported
//! (feature `openai-compat`); Gemini, OpenAI, LM Studio and Ollama all
//! speak it.

use std::sync::Arc;

use crate::config::LlmConfig;

/// Chat message sent to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Request(String),
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("completion was empty")]
    EmptyCompletion,
    #[error("{0}")]
    Unavailable(&'static str),
    #[error("generation task failed: {0}")]
    Task(String),
}

/// Trait for LLM backends. Calls block; run them off the async runtime.
pub trait LlmBackend: Send + Sync {
    fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;
}

/// Run a blocking completion on tokio's blocking pool
pub async fn complete_off_runtime(
    backend: Arc<dyn LlmBackend>,
    messages: Vec<Message>,
) -> Result<String, LlmError> {
    tokio::task::spawn_blocking(move || backend.complete(&messages))
        .await
        .map_err(|e| LlmError::Task(e.to_string()))?
}

/// Local servers do not need a key
fn is_local(base_url: &str) -> bool {
    ["http://localhost", "http://127.0.0.1", "http://[::1]"]
        .iter()
        .any(|prefix| base_url.starts_with(prefix))
}

/// Build the configured backend. Fails fast on a missing credential.
pub fn create_backend(config: &LlmConfig) -> Result<Arc<dyn LlmBackend>, LlmError> {
    if config.api_key().is_none() && !is_local(&config.base_url) {
        return Err(LlmError::MissingApiKey);
    }

    #[cfg(feature = "openai-compat")]
    {
        Ok(Arc::new(openai_compat::OpenAiCompatBackend::new(config)))
    }
    #[cfg(not(feature = "openai-compat"))]
    {
        Err(LlmError::Unavailable(
            "OpenAI-compatible backend not enabled. Build with --features openai-compat",
        ))
    }
}

// ============================================================================
// OpenAI-compatible backend
// ============================================================================

#[cfg(feature = "openai-compat")]
pub mod openai_compat {
    use super::*;
    use serde::Deserialize;
    use std::time::Duration;

    const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

    pub struct OpenAiCompatBackend {
        base_url: String,
        model: String,
        api_key: Option<String>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    }

    #[derive(Deserialize)]
    struct ChatResponse {
        choices: Vec<Choice>,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: ChoiceMessage,
    }

    #[derive(Deserialize)]
    struct ChoiceMessage {
        #[serde(default)]
        content: Option<String>,
    }

    impl OpenAiCompatBackend {
        pub fn new(config: &LlmConfig) -> Self {
            Self {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                model: config.model.clone(),
                api_key: config.api_key().map(str::to_string),
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            }
        }

        pub(crate) fn request_body(&self, messages: &[Message]) -> serde_json::Value {
            let messages: Vec<_> = messages
                .iter()
                .map(|m| serde_json::json!({ "role": m.role.as_str(), "content": m.content }))
                .collect();

            let mut body = serde_json::json!({
                "model": self.model,
                "messages": messages,
            });
            if let Some(temperature) = self.temperature {
                body["temperature"] = serde_json::json!(temperature);
            }
            if let Some(max_tokens) = self.max_tokens {
                body["max_tokens"] = serde_json::json!(max_tokens);
            }
            body
        }
    }

    pub(crate) fn parse_completion(body: &str) -> Result<String, LlmError> {
        let response: ChatResponse =
            serde_json::from_str(body).map_err(|e| LlmError::Decode(e.to_string()))?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(LlmError::EmptyCompletion);
        }
        Ok(content)
    }

    impl LlmBackend for OpenAiCompatBackend {
        fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
            // Blocking client must be created and dropped outside the runtime
            let client = reqwest::blocking::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|e| LlmError::Request(e.to_string()))?;

            let url = format!("{}/chat/completions", self.base_url);
            let mut request = client.post(&url).json(&self.request_body(messages));
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            tracing::debug!(url = %url, model = %self.model, "Sending completion request");
            let response = request
                .send()
                .map_err(|e| LlmError::Request(e.to_string()))?;

            let status = response.status();
            let body = response
                .text()
                .map_err(|e| LlmError::Request(e.to_string()))?;
            if !status.is_success() {
                return Err(LlmError::Status {
                    status: status.as_u16(),
                    body: body.chars().take(200).collect(),
                });
            }

            parse_completion(&body)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn backend() -> OpenAiCompatBackend {
            OpenAiCompatBackend::new(&LlmConfig {
                base_url: "http://localhost:1234/v1/".into(),
                temperature: Some(0.5),
                ..LlmConfig::default()
            })
        }

        #[test]
        fn test_request_body() {
            let body = backend().request_body(&[Message::system("sys"), Message::user("Task: x")]);
            assert_eq!(body["model"], "gemini-2.0-flash");
            assert_eq!(body["messages"][0]["role"], "system");
            assert_eq!(body["messages"][1]["content"], "Task: x");
            assert_eq!(body["temperature"], 0.5);
            assert!(body.get("max_tokens").is_none());
        }

        #[test]
        fn test_base_url_trimmed() {
            assert_eq!(backend().base_url, "http://localhost:1234/v1");
        }

        #[test]
        fn test_parse_completion() {
            let body = r#"{"choices":[{"message":{"role":"assistant","content":"print(1)"}}]}"#;
            assert_eq!(parse_completion(body).unwrap(), "print(1)");
        }

        #[test]
        fn test_parse_empty_completion() {
            let body = r#"{"choices":[{"message":{"role":"assistant","content":"  "}}]}"#;
            assert!(matches!(parse_completion(body), Err(LlmError::EmptyCompletion)));
            assert!(matches!(
                parse_completion(r#"{"choices":[]}"#),
                Err(LlmError::EmptyCompletion)
            ));
        }

        #[test]
        fn test_parse_garbage() {
            assert!(matches!(parse_completion("<html>"), Err(LlmError::Decode(_))));
        }
    }
}
