//! Azure OpenAI chat-completions client for structured vision output.
//!
//! Images travel inline as base64 `data:` URIs; the output contract is
//! sent as a strict `json_schema` response format.
//! See: <https://learn.microsoft.com/azure/ai-services/openai/reference>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{VisionProvider, VisionRequest};
use crate::prompt::ImageDetail;
use crate::{HeimdallError, Result};

/// Default data-plane API version.
pub const DEFAULT_API_VERSION: &str = "2024-08-01-preview";

/// Transport-level ceiling; per-call limits are enforced by the caller.
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Client for one Azure OpenAI deployment.
#[derive(Clone)]
pub struct AzureVisionClient {
    api_key: String,
    http: Client,
    endpoint: String,
    deployment: String,
    api_version: String,
}

impl AzureVisionClient {
    /// Create a client for `deployment` on the resource at `endpoint`
    /// (e.g. `https://my-resource.openai.azure.com`).
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| HeimdallError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            deployment: deployment.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
        })
    }

    /// Override the API version.
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }

    /// Run one structured-output completion and return the message content.
    pub async fn chat(&self, request: &VisionRequest<'_>) -> Result<String> {
        let detail = request.prompt.image_detail;
        let mut user_parts = vec![ContentPart::Text {
            text: &request.prompt.user,
        }];
        user_parts.extend(request.images.iter().map(|image| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: image.data_uri(),
                detail,
            },
        }));

        let body = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(&request.prompt.system),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(user_parts),
                },
            ],
            max_tokens: request.params.max_tokens,
            temperature: request.params.temperature,
            seed: request.params.seed,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: request.prompt.schema_name,
                    strict: true,
                    schema: &request.prompt.schema,
                },
            },
        };

        debug!(
            deployment = %self.deployment,
            images = request.images.len(),
            ?detail,
            "sending vision completion"
        );

        let response = self
            .http
            .post(self.completions_url())
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let response = self.handle_response_errors(response).await?;
        let completion: ChatResponse = response.json().await?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(HeimdallError::EmptyResponse)?;
        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(HeimdallError::ContentFiltered {
                reason: "model output withheld by the endpoint's content filter".into(),
            });
        }
        choice
            .message
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(HeimdallError::EmptyResponse)
    }

    /// Cheap reachability check against the models listing.
    pub async fn ping(&self) -> Result<()> {
        let url = format!(
            "{}/openai/models?api-version={}",
            self.endpoint, self.api_version
        );
        let response = self
            .http
            .get(url)
            .header("api-key", &self.api_key)
            .send()
            .await?;
        self.handle_response_errors(response).await?;
        Ok(())
    }

    /// Check response status and map to appropriate error.
    async fn handle_response_errors(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status.as_u16() {
            401 | 403 => Err(HeimdallError::AuthenticationFailed),
            404 => Err(HeimdallError::DeploymentNotFound(self.deployment.clone())),
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(HeimdallError::RateLimited { retry_after })
            }
            code => {
                let body = response.text().await.unwrap_or_default();
                let error = serde_json::from_str::<ErrorEnvelope>(&body)
                    .ok()
                    .map(|e| e.error);
                // Prompt-side filtering comes back as a 400 with this code.
                if error.as_ref().and_then(|e| e.code.as_deref()) == Some("content_filter") {
                    return Err(HeimdallError::ContentFiltered {
                        reason: "request rejected by the endpoint's content filter".into(),
                    });
                }
                let message = error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| format!("Azure OpenAI error: {status}"));
                Err(HeimdallError::Api {
                    status: code,
                    message,
                })
            }
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    response_format: ResponseFormat<'a>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
    detail: ImageDetail,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    code: Option<String>,
    message: Option<String>,
}

// ============================================================================
// Provider Trait Implementation
// ============================================================================

#[async_trait]
impl VisionProvider for AzureVisionClient {
    fn name(&self) -> &str {
        "azure-openai"
    }

    fn model(&self) -> &str {
        &self.deployment
    }

    fn api_version(&self) -> &str {
        &self.api_version
    }

    async fn complete(&self, request: &VisionRequest<'_>) -> Result<String> {
        self.chat(request).await
    }

    async fn probe(&self) -> Result<()> {
        self.ping().await
    }
}
