//! Azure AI Content Safety client for image moderation.
//!
//! Each image is analysed with its own request; requests for one batch run
//! concurrently and the verdicts fold into the worst case.
//! See: <https://learn.microsoft.com/azure/ai-services/content-safety/>

use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use super::traits::ModerationProvider;
use crate::types::{ImageData, ModerationResult, RecommendedAction, SafetyFlags, Severity};
use crate::{HeimdallError, Result};

/// Default Content Safety API version.
pub const DEFAULT_API_VERSION: &str = "2023-10-01";

/// Raw severity (0-7 scale) at which a category counts as flagged.
const FLAG_THRESHOLD: u8 = 2;

/// Client for the Content Safety `image:analyze` operation.
#[derive(Clone)]
pub struct ContentSafetyClient {
    api_key: String,
    http: Client,
    endpoint: String,
    api_version: String,
}

impl ContentSafetyClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| HeimdallError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        })
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Analyse one image.
    pub async fn analyze(&self, image: &ImageData) -> Result<ModerationResult> {
        let url = format!(
            "{}/contentsafety/image:analyze?api-version={}",
            self.endpoint, self.api_version
        );
        let response = self
            .http
            .post(url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .json(&AnalyzeRequest {
                image: ImageContent {
                    content: image.to_base64(),
                },
                output_type: "EightSeverityLevels",
            })
            .send()
            .await?;

        let response = handle_response_errors(response).await?;
        let analysis: AnalyzeResponse = response.json().await?;
        Ok(analysis.into_result())
    }
}

async fn handle_response_errors(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status.as_u16() {
        401 | 403 => Err(HeimdallError::AuthenticationFailed),
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(HeimdallError::RateLimited { retry_after })
        }
        code => Err(HeimdallError::Api {
            status: code,
            message: format!("Content Safety error: {status}"),
        }),
    }
}

/// Map the 0-7 severity scale onto [`Severity`].
fn severity_from_level(level: u8) -> Severity {
    match level {
        0 => Severity::None,
        1..=2 => Severity::Low,
        3..=4 => Severity::Medium,
        5..=6 => Severity::High,
        _ => Severity::Critical,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest {
    image: ImageContent,
    output_type: &'static str,
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    #[serde(default)]
    categories_analysis: Vec<CategoryAnalysis>,
}

#[derive(Deserialize)]
struct CategoryAnalysis {
    category: String,
    #[serde(default)]
    severity: u8,
}

impl AnalyzeResponse {
    fn into_result(self) -> ModerationResult {
        let mut flags = SafetyFlags::default();
        let mut worst = 0u8;
        let mut hits = Vec::new();
        for entry in &self.categories_analysis {
            worst = worst.max(entry.severity);
            if entry.severity < FLAG_THRESHOLD {
                continue;
            }
            match entry.category.as_str() {
                "Hate" => flags.hate = true,
                "SelfHarm" => flags.self_harm = true,
                "Sexual" => flags.sexual = true,
                "Violence" => flags.violence = true,
                _ => continue,
            }
            hits.push(format!("{} ({})", entry.category, entry.severity));
        }

        let severity = severity_from_level(worst);
        let recommended_action = match severity {
            Severity::High | Severity::Critical => RecommendedAction::Block,
            Severity::Medium => RecommendedAction::Warn,
            _ => RecommendedAction::Allow,
        };
        ModerationResult {
            safe: severity <= Severity::Low,
            severity,
            flags,
            recommended_action,
            description: if hits.is_empty() {
                "no safety concerns detected".to_string()
            } else {
                format!("flagged: {}", hits.join(", "))
            },
        }
    }
}

#[async_trait]
impl ModerationProvider for ContentSafetyClient {
    fn name(&self) -> &str {
        "azure-content-safety"
    }

    async fn moderate(&self, images: &[ImageData]) -> Result<ModerationResult> {
        let verdicts = try_join_all(images.iter().map(|image| self.analyze(image))).await?;
        Ok(ModerationResult::combine(verdicts))
    }
}
