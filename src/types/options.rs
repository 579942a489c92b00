//! Analysis options and request types

use serde::{Deserialize, Serialize};

use crate::{HeimdallError, Result};

/// Maximum number of images in a single analysis request.
pub const MAX_IMAGES: usize = 10;

/// Maximum number of free-text questions attached to a request.
pub const MAX_QUESTIONS: usize = 10;

/// Why the caller wants the description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    #[default]
    General,
    Accessibility,
    Marketing,
    Education,
    /// Cheap sparse pass over video frames.
    Overview,
    /// Targeted drill-down over selected video segments.
    SegmentDetail,
}

/// Who will read the description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    #[default]
    General,
    Children,
    Professional,
    Technical,
}

/// How much the model should write.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    Brief,
    #[default]
    Standard,
    Detailed,
    Comprehensive,
}

/// Writing register of the description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Neutral,
    Formal,
    Casual,
    Playful,
}

/// Single-pass vs two-pass selection for video analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassMode {
    /// Two-pass when the frame count exceeds the configured threshold.
    #[default]
    Auto,
    SinglePass,
    TwoPass,
}

/// Options for an analysis request (provider-agnostic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    #[serde(default)]
    pub purpose: Purpose,
    #[serde(default)]
    pub audience: Audience,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub detail: DetailLevel,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub focus: Vec<String>,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default = "default_true")]
    pub moderation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_age: Option<u8>,
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default)]
    pub pass_mode: PassMode,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            purpose: Purpose::default(),
            audience: Audience::default(),
            language: default_language(),
            detail: DetailLevel::default(),
            tone: Tone::default(),
            focus: Vec::new(),
            questions: Vec::new(),
            moderation: true,
            target_age: None,
            force_refresh: false,
            pass_mode: PassMode::default(),
        }
    }
}

impl AnalysisOptions {
    pub fn purpose(mut self, purpose: Purpose) -> Self {
        self.purpose = purpose;
        self
    }

    pub fn audience(mut self, audience: Audience) -> Self {
        self.audience = audience;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn detail(mut self, detail: DetailLevel) -> Self {
        self.detail = detail;
        self
    }

    pub fn tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    pub fn focus(mut self, tag: impl Into<String>) -> Self {
        self.focus.push(tag.into());
        self
    }

    pub fn question(mut self, question: impl Into<String>) -> Self {
        self.questions.push(question.into());
        self
    }

    pub fn moderation(mut self, enabled: bool) -> Self {
        self.moderation = enabled;
        self
    }

    pub fn target_age(mut self, age: u8) -> Self {
        self.target_age = Some(age);
        self
    }

    pub fn force_refresh(mut self, refresh: bool) -> Self {
        self.force_refresh = refresh;
        self
    }

    pub fn pass_mode(mut self, mode: PassMode) -> Self {
        self.pass_mode = mode;
        self
    }

    /// Whether the request is aimed at someone under 18.
    pub fn targets_minor(&self) -> bool {
        self.target_age.is_some_and(|age| age < 18)
    }
}

/// A validated image analysis request.
///
/// Construction enforces the 1–10 image bound; fields are read-only
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    image_ids: Vec<String>,
    options: AnalysisOptions,
}

impl AnalysisRequest {
    pub fn new(image_ids: Vec<String>, options: AnalysisOptions) -> Result<Self> {
        if image_ids.is_empty() {
            return Err(HeimdallError::InvalidInput(
                "at least one image id is required".to_string(),
            ));
        }
        if image_ids.len() > MAX_IMAGES {
            return Err(HeimdallError::InvalidInput(format!(
                "at most {MAX_IMAGES} images per request, got {}",
                image_ids.len()
            )));
        }
        if let Some(blank) = image_ids.iter().position(|id| id.trim().is_empty()) {
            return Err(HeimdallError::InvalidInput(format!(
                "image id at position {blank} is empty"
            )));
        }
        validate_options(&options)?;
        Ok(Self { image_ids, options })
    }

    pub fn image_ids(&self) -> &[String] {
        &self.image_ids
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }
}

/// Shared option checks for image and video requests.
pub(crate) fn validate_options(options: &AnalysisOptions) -> Result<()> {
    if options.language.trim().is_empty() {
        return Err(HeimdallError::InvalidInput(
            "language must not be empty".to_string(),
        ));
    }
    if options.questions.len() > MAX_QUESTIONS {
        return Err(HeimdallError::InvalidInput(format!(
            "at most {MAX_QUESTIONS} questions per request"
        )));
    }
    if options.target_age.is_some_and(|age| age > 120) {
        return Err(HeimdallError::InvalidInput(
            "target_age must be a plausible age".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("img-{i}")).collect()
    }

    #[test]
    fn accepts_one_to_ten_images() {
        assert!(AnalysisRequest::new(ids(1), AnalysisOptions::default()).is_ok());
        assert!(AnalysisRequest::new(ids(10), AnalysisOptions::default()).is_ok());
    }

    #[test]
    fn rejects_empty_and_oversized_requests() {
        let empty = AnalysisRequest::new(vec![], AnalysisOptions::default());
        assert!(matches!(empty, Err(HeimdallError::InvalidInput(_))));

        let too_many = AnalysisRequest::new(ids(11), AnalysisOptions::default());
        assert!(matches!(too_many, Err(HeimdallError::InvalidInput(_))));
    }

    #[test]
    fn rejects_blank_ids() {
        let result = AnalysisRequest::new(
            vec!["ok".into(), "  ".into()],
            AnalysisOptions::default(),
        );
        assert!(matches!(result, Err(HeimdallError::InvalidInput(_))));
    }

    #[test]
    fn minor_detection() {
        assert!(AnalysisOptions::default().target_age(10).targets_minor());
        assert!(AnalysisOptions::default().target_age(17).targets_minor());
        assert!(!AnalysisOptions::default().target_age(18).targets_minor());
        assert!(!AnalysisOptions::default().targets_minor());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: AnalysisOptions = serde_json::from_str(r#"{"detail":"brief"}"#).unwrap();
        assert_eq!(options.detail, DetailLevel::Brief);
        assert_eq!(options.language, "en");
        assert!(options.moderation);
        assert_eq!(options.pass_mode, PassMode::Auto);
    }
}
