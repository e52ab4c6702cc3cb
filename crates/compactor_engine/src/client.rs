use std::time::Duration;

use compactor_logging::compactor_debug;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use crate::{CompressionError, Credential, FailureKind};

const SYSTEM_PROMPT: &str = "You compress excerpts of a conversation between a user and an AI \
assistant. Keep the meaning, the speaker of each turn, exact quotes that matter, code, URLs, \
names, numbers, dates, questions and action items. Drop repetition and filler. Do not add \
interpretation. Return only the compressed excerpt, keeping the `User:` / `Assistant:` labels.";

const VERIFY_PROMPT: &str = "Reply with the single word: ok";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub endpoint: String,
    pub model: String,
    pub api_version: String,
    pub max_output_tokens: u32,
    pub connect_timeout: Duration,
    /// Per-call timeout. A stalled call would otherwise hold the job open.
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            api_version: "2023-06-01".to_string(),
            max_output_tokens: 1000,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// The remote text-compression capability. Implementations must be safe to
/// call from many chunk tasks at once.
#[async_trait::async_trait]
pub trait CompressionClient: Send + Sync {
    async fn compress(&self, credential: &Credential, text: &str)
        -> Result<String, CompressionError>;

    /// Cheap round trip proving the credential is accepted.
    async fn verify(&self, credential: &Credential) -> Result<(), CompressionError>;
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [RequestMessage<'a>; 1],
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Messages API client built on `reqwest`.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    settings: ClientSettings,
    http: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(settings: ClientSettings) -> Result<Self, CompressionError> {
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| CompressionError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, http })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    async fn send(
        &self,
        credential: &Credential,
        system: Option<&str>,
        user_content: &str,
        max_tokens: u32,
    ) -> Result<String, CompressionError> {
        let request = MessagesRequest {
            model: &self.settings.model,
            max_tokens,
            system,
            messages: [RequestMessage {
                role: "user",
                content: user_content,
            }],
        };
        let body = serde_json::to_vec(&request)
            .map_err(|err| CompressionError::new(FailureKind::InvalidRequest, err.to_string()))?;

        let response = self
            .http
            .post(self.settings.endpoint.as_str())
            .header("x-api-key", credential.expose())
            .header("anthropic-version", self.settings.api_version.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let text = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(CompressionError::new(
                FailureKind::ApiStatus(status.as_u16()),
                text,
            ));
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|err| CompressionError::new(FailureKind::MalformedResponse, err.to_string()))?;
        let output = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if output.trim().is_empty() {
            return Err(CompressionError::new(
                FailureKind::MalformedResponse,
                "response contained no text content",
            ));
        }
        compactor_debug!(
            "compressed {} chars into {} chars",
            user_content.len(),
            output.len()
        );
        Ok(output)
    }
}

#[async_trait::async_trait]
impl CompressionClient for AnthropicClient {
    async fn compress(
        &self,
        credential: &Credential,
        text: &str,
    ) -> Result<String, CompressionError> {
        self.send(
            credential,
            Some(SYSTEM_PROMPT),
            text,
            self.settings.max_output_tokens,
        )
        .await
    }

    async fn verify(&self, credential: &Credential) -> Result<(), CompressionError> {
        self.send(credential, None, VERIFY_PROMPT, 16).await.map(|_| ())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> CompressionError {
    if err.is_timeout() {
        return CompressionError::new(FailureKind::Timeout, err.to_string());
    }
    CompressionError::new(FailureKind::Network, err.to_string())
}
