//! Remote chat-completion client
//!
//! Single-message prompts against an OpenRouter-compatible endpoint. No
//! conversation context is forwarded; every request stands alone.

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::controller::Completer;
use crate::{Error, Result};

/// Chat-completion request body
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Chat-completion response body (the parts we read)
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for a remote chat-completion endpoint
pub struct InferenceClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    referer: String,
    title: String,
}

impl InferenceClient {
    /// Create a new inference client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be
    /// built
    pub fn new(llm: &LlmConfig, api_key: Option<SecretString>) -> Result<Self> {
        let api_key = api_key.ok_or_else(|| {
            Error::Config("OpenRouter API key required for chat completions".to_string())
        })?;

        let client = reqwest::Client::builder().timeout(llm.timeout).build()?;

        tracing::debug!(
            base_url = %llm.base_url,
            model = %llm.model,
            timeout_secs = llm.timeout.as_secs(),
            "inference client initialized"
        );

        Ok(Self {
            client,
            api_key,
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            model: llm.model.clone(),
            referer: llm.referer.clone(),
            title: llm.title.clone(),
        })
    }

    /// Send a single-message prompt and return the reply text
    ///
    /// # Errors
    ///
    /// `Unauthorized` on HTTP 401, `InferenceTimeout` past the request
    /// deadline, `Inference` on any other failure including a malformed
    /// response body
    pub async fn complete_prompt(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(url = %url, model = %self.model, "sending completion request");

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "completion endpoint error");
            return Err(Error::Inference(format!(
                "completion endpoint error {status}: {body}"
            )));
        }

        let body = response.text().await.map_err(classify_transport_error)?;
        extract_reply(&body)
    }
}

#[async_trait::async_trait]
impl Completer for InferenceClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.complete_prompt(prompt).await
    }
}

/// Map transport failures onto the error taxonomy
fn classify_transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::InferenceTimeout
    } else {
        Error::Inference(e.to_string())
    }
}

/// Pull the first choice's message content out of a completion response
///
/// A body without that shape is a malformed response, never an empty reply.
fn extract_reply(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::Inference(format!("malformed completion response: {e}")))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| {
            Error::Inference("malformed completion response: missing message content".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice_content() {
        let body = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "I don't have real-time access"}},
                {"message": {"role": "assistant", "content": "second choice"}}
            ]
        }"#;

        assert_eq!(
            extract_reply(body).unwrap(),
            "I don't have real-time access"
        );
    }

    #[test]
    fn missing_choices_is_malformed() {
        let err = extract_reply(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, Error::Inference(_)));

        let err = extract_reply(r"{}").unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn missing_content_is_malformed_not_empty() {
        let body = r#"{"choices": [{"message": {"role": "assistant"}}]}"#;
        let err = extract_reply(body).unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn non_json_body_is_malformed() {
        let err = extract_reply("<html>gateway error</html>").unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }
}
