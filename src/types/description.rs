//! Canonical structured description returned by image analysis
//!
//! Every field is required when parsing model output strictly; the
//! salvage path in [`crate::validate`] fills gaps with the defaults
//! documented on each field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::moderation::{ModerationResult, SafetyFlags};

/// Placeholder used for text fields the model did not provide.
pub const UNAVAILABLE: &str = "unavailable";

/// Model's self-reported confidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Default.
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionMetadata {
    /// Default: the request language.
    pub language: String,
    /// Default: `low`.
    pub confidence: Confidence,
    /// Default: `"unavailable"`.
    pub content_type: String,
    /// Default: `false` (forced `true` when any safety flag is set).
    pub sensitive_content: bool,
    /// Default: empty.
    pub processing_notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accessibility {
    /// Default: `"unavailable"`.
    pub alt_text: String,
    /// Default: `"unavailable"`.
    pub long_description: String,
    /// Default: `"unavailable"`.
    pub reading_level: String,
    /// Default: empty.
    pub color_accessibility_notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDetails {
    /// Default: empty.
    pub primary_subjects: Vec<String>,
    /// Default: `"unavailable"`.
    pub scene_description: String,
    /// Default: empty.
    pub visual_elements: Vec<String>,
    /// Default: empty.
    pub extracted_text: Vec<String>,
    /// Default: `"unavailable"`.
    pub spatial_layout: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationGuidance {
    /// Default: `"unavailable"`.
    pub suggested_prompt: String,
    /// Default: empty.
    pub style_keywords: Vec<String>,
    /// Default: empty.
    pub technical_parameters: BTreeMap<String, String>,
}

/// Structured, schema-complete description of one or more images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredDescription {
    pub metadata: DescriptionMetadata,
    pub accessibility: Accessibility,
    pub content: ContentDetails,
    pub generation: GenerationGuidance,
    /// Default: all `false`.
    pub safety_flags: SafetyFlags,
    /// Default: empty.
    pub uncertainty_notes: Vec<String>,
}

impl StructuredDescription {
    /// A description with every field at its documented default.
    pub fn empty(language: &str) -> Self {
        Self {
            metadata: DescriptionMetadata {
                language: language.to_string(),
                confidence: Confidence::Low,
                content_type: UNAVAILABLE.to_string(),
                sensitive_content: false,
                processing_notes: Vec::new(),
            },
            accessibility: Accessibility {
                alt_text: UNAVAILABLE.to_string(),
                long_description: UNAVAILABLE.to_string(),
                reading_level: UNAVAILABLE.to_string(),
                color_accessibility_notes: Vec::new(),
            },
            content: ContentDetails {
                primary_subjects: Vec::new(),
                scene_description: UNAVAILABLE.to_string(),
                visual_elements: Vec::new(),
                extracted_text: Vec::new(),
                spatial_layout: UNAVAILABLE.to_string(),
            },
            generation: GenerationGuidance {
                suggested_prompt: UNAVAILABLE.to_string(),
                style_keywords: Vec::new(),
                technical_parameters: BTreeMap::new(),
            },
            safety_flags: SafetyFlags::default(),
            uncertainty_notes: Vec::new(),
        }
    }

    /// Safe placeholder returned when moderation blocks the content.
    pub fn blocked(language: &str, moderation: &ModerationResult) -> Self {
        let mut description = Self::empty(language);
        description.metadata.content_type = "blocked".to_string();
        description.metadata.sensitive_content = true;
        description
            .metadata
            .processing_notes
            .push(format!("content blocked by moderation: {}", moderation.description));
        description.accessibility.alt_text = "Content not available".to_string();
        description.accessibility.long_description =
            "This content was withheld because it did not pass content-safety review."
                .to_string();
        description.content.scene_description = "Content withheld".to_string();
        description.safety_flags = moderation.flags;
        description
    }

    /// Generic description returned when the remote model stayed unavailable.
    pub fn degraded(language: &str, reason: &str) -> Self {
        let mut description = Self::empty(language);
        description
            .metadata
            .processing_notes
            .push(format!("analysis unavailable, returned generic description: {reason}"));
        description.accessibility.alt_text = "Image".to_string();
        description
            .uncertainty_notes
            .push("the vision model could not be reached".to_string());
        description
    }

    /// Append a processing note.
    pub fn note(&mut self, note: impl Into<String>) {
        self.metadata.processing_notes.push(note.into());
    }

    /// OR extra flags into the safety block and keep `sensitive_content` in step.
    pub fn merge_safety_flags(&mut self, flags: &SafetyFlags) {
        self.safety_flags = self.safety_flags.merge(flags);
        if self.safety_flags.any() {
            self.metadata.sensitive_content = true;
        }
    }
}
