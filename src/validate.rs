//! Model output validation and partial-response salvage.
//!
//! Raw model text is parsed as JSON (a surrounding markdown code fence is
//! tolerated). If it deserialises strictly into the canonical type it is
//! returned unchanged. Otherwise it is read into partial mirrors of the
//! canonical types, where every field is optional and wrong-typed fields
//! are dropped, and coalesced field by field onto the documented defaults.
//!
//! Output that is not JSON at all is a non-retryable
//! [`HeimdallError::InvalidResponse`].

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::telemetry;
use crate::types::{
    Confidence, Keyframe, SafetyFlags, SceneSegment, StructuredDescription, TemporalAnalysis,
    VideoAnalysis,
};
use crate::{HeimdallError, Result};

/// Processing note appended to every salvaged result.
pub const SALVAGE_NOTE: &str = "response partially recovered";

/// Parse an image description, salvaging partial output.
pub fn parse_description(raw: &str, language: &str) -> Result<StructuredDescription> {
    let value = parse_json(raw)?;
    match StructuredDescription::deserialize(&value) {
        Ok(description) => Ok(description),
        Err(e) => {
            let partial: PartialDescription = serde_json::from_value(value)
                .map_err(|_| HeimdallError::InvalidResponse("expected a JSON object".into()))?;
            warn!(error = %e, "salvaging partial image description");
            metrics::counter!(telemetry::SALVAGED_TOTAL, "kind" => "image").increment(1);
            let mut description = partial.coalesce(language);
            description.note(SALVAGE_NOTE);
            Ok(description)
        }
    }
}

/// Parse a video analysis, salvaging partial output.
pub fn parse_video(raw: &str, language: &str) -> Result<VideoAnalysis> {
    let value = parse_json(raw)?;
    match VideoAnalysis::deserialize(&value) {
        Ok(analysis) => Ok(analysis),
        Err(e) => {
            let partial: PartialVideo = serde_json::from_value(value)
                .map_err(|_| HeimdallError::InvalidResponse("expected a JSON object".into()))?;
            warn!(error = %e, "salvaging partial video analysis");
            metrics::counter!(telemetry::SALVAGED_TOTAL, "kind" => "video").increment(1);
            let mut analysis = partial.coalesce(language);
            analysis.description.note(SALVAGE_NOTE);
            Ok(analysis)
        }
    }
}

fn parse_json(raw: &str) -> Result<Value> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(HeimdallError::InvalidResponse("empty model output".into()));
    }
    serde_json::from_str(body).map_err(|e| HeimdallError::InvalidResponse(e.to_string()))
}

/// Strip a leading ```` ``` ```` / ```` ```json ```` fence and its closing fence.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") up to the first newline.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

// ============================================================================
// Lenient field readers
// ============================================================================

/// Read any JSON value; keep it only if it has the expected type.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Read a JSON array, keeping the elements that have the expected type.
fn lenient_items<'de, D, T>(deserializer: D) -> std::result::Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        )),
        _ => Ok(None),
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

// ============================================================================
// Partial mirrors
// ============================================================================

#[derive(Deserialize, Default)]
struct PartialMetadata {
    #[serde(default, deserialize_with = "lenient")]
    language: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    confidence: Option<Confidence>,
    #[serde(default, deserialize_with = "lenient")]
    content_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    sensitive_content: Option<bool>,
    #[serde(default, deserialize_with = "lenient_items")]
    processing_notes: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
struct PartialAccessibility {
    #[serde(default, deserialize_with = "lenient")]
    alt_text: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    long_description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    reading_level: Option<String>,
    #[serde(default, deserialize_with = "lenient_items")]
    color_accessibility_notes: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
struct PartialContent {
    #[serde(default, deserialize_with = "lenient_items")]
    primary_subjects: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    scene_description: Option<String>,
    #[serde(default, deserialize_with = "lenient_items")]
    visual_elements: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_items")]
    extracted_text: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    spatial_layout: Option<String>,
}

#[derive(Deserialize, Default)]
struct PartialGeneration {
    #[serde(default, deserialize_with = "lenient")]
    suggested_prompt: Option<String>,
    #[serde(default, deserialize_with = "lenient_items")]
    style_keywords: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    technical_parameters: Option<BTreeMap<String, String>>,
}

#[derive(Deserialize, Default)]
struct PartialSafetyFlags {
    #[serde(default, deserialize_with = "lenient")]
    violence: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    sexual: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    hate: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    self_harm: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    drugs: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    weapons: Option<bool>,
}

#[derive(Deserialize, Default)]
struct PartialDescription {
    #[serde(default, deserialize_with = "lenient")]
    metadata: Option<PartialMetadata>,
    #[serde(default, deserialize_with = "lenient")]
    accessibility: Option<PartialAccessibility>,
    #[serde(default, deserialize_with = "lenient")]
    content: Option<PartialContent>,
    #[serde(default, deserialize_with = "lenient")]
    generation: Option<PartialGeneration>,
    #[serde(default, deserialize_with = "lenient")]
    safety_flags: Option<PartialSafetyFlags>,
    #[serde(default, deserialize_with = "lenient_items")]
    uncertainty_notes: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
struct PartialTemporal {
    #[serde(default, deserialize_with = "lenient")]
    continuity: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pace: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    camera_movement: Option<String>,
}

#[derive(Deserialize, Default)]
struct PartialVideo {
    #[serde(flatten)]
    description: PartialDescription,
    #[serde(default, deserialize_with = "lenient")]
    duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient_items")]
    keyframes: Option<Vec<Keyframe>>,
    #[serde(default, deserialize_with = "lenient_items")]
    scene_segments: Option<Vec<SceneSegment>>,
    #[serde(default, deserialize_with = "lenient_items")]
    actions: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    temporal_analysis: Option<PartialTemporal>,
}

// ============================================================================
// Coalescing
// ============================================================================

impl PartialDescription {
    fn coalesce(self, language: &str) -> StructuredDescription {
        let mut out = StructuredDescription::empty(language);

        let metadata = self.metadata.unwrap_or_default();
        if let Some(lang) = non_empty(metadata.language) {
            out.metadata.language = lang;
        }
        out.metadata.confidence = metadata.confidence.unwrap_or_default();
        if let Some(content_type) = non_empty(metadata.content_type) {
            out.metadata.content_type = content_type;
        }
        out.metadata.sensitive_content = metadata.sensitive_content.unwrap_or(false);
        out.metadata.processing_notes = metadata.processing_notes.unwrap_or_default();

        let accessibility = self.accessibility.unwrap_or_default();
        if let Some(alt) = non_empty(accessibility.alt_text) {
            out.accessibility.alt_text = alt;
        }
        if let Some(long) = non_empty(accessibility.long_description) {
            out.accessibility.long_description = long;
        }
        if let Some(level) = non_empty(accessibility.reading_level) {
            out.accessibility.reading_level = level;
        }
        out.accessibility.color_accessibility_notes =
            accessibility.color_accessibility_notes.unwrap_or_default();

        let content = self.content.unwrap_or_default();
        out.content.primary_subjects = content.primary_subjects.unwrap_or_default();
        if let Some(scene) = non_empty(content.scene_description) {
            out.content.scene_description = scene;
        }
        out.content.visual_elements = content.visual_elements.unwrap_or_default();
        out.content.extracted_text = content.extracted_text.unwrap_or_default();
        if let Some(layout) = non_empty(content.spatial_layout) {
            out.content.spatial_layout = layout;
        }

        let generation = self.generation.unwrap_or_default();
        if let Some(prompt) = non_empty(generation.suggested_prompt) {
            out.generation.suggested_prompt = prompt;
        }
        out.generation.style_keywords = generation.style_keywords.unwrap_or_default();
        out.generation.technical_parameters = generation.technical_parameters.unwrap_or_default();

        let flags = self.safety_flags.unwrap_or_default();
        out.merge_safety_flags(&SafetyFlags {
            violence: flags.violence.unwrap_or(false),
            sexual: flags.sexual.unwrap_or(false),
            hate: flags.hate.unwrap_or(false),
            self_harm: flags.self_harm.unwrap_or(false),
            drugs: flags.drugs.unwrap_or(false),
            weapons: flags.weapons.unwrap_or(false),
        });

        out.uncertainty_notes = self.uncertainty_notes.unwrap_or_default();
        out
    }
}

impl PartialVideo {
    fn coalesce(self, language: &str) -> VideoAnalysis {
        let temporal = self.temporal_analysis.unwrap_or_default();
        let defaults = TemporalAnalysis::default();
        VideoAnalysis {
            description: self.description.coalesce(language),
            duration: self.duration.filter(|d| d.is_finite() && *d >= 0.0).unwrap_or(0.0),
            keyframes: self.keyframes.unwrap_or_default(),
            scene_segments: self.scene_segments.unwrap_or_default(),
            actions: self.actions.unwrap_or_default(),
            temporal_analysis: TemporalAnalysis {
                continuity: non_empty(temporal.continuity).unwrap_or(defaults.continuity),
                pace: non_empty(temporal.pace).unwrap_or(defaults.pace),
                camera_movement: non_empty(temporal.camera_movement)
                    .unwrap_or(defaults.camera_movement),
            },
        }
    }
}
