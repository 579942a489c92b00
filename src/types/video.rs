//! Video analysis result types

use serde::{Deserialize, Serialize};

use super::description::StructuredDescription;
use super::moderation::ModerationResult;

/// Placeholder for temporal fields the model did not provide.
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub timestamp: f64,
    pub description: String,
}

/// A contiguous stretch of the video, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSegment {
    pub start: f64,
    pub end: f64,
    pub description: String,
}

impl SceneSegment {
    /// Whether `timestamp` falls inside `[start, end]`.
    pub fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalAnalysis {
    /// Default: `"unknown"`.
    pub continuity: String,
    /// Default: `"unknown"`.
    pub pace: String,
    /// Default: `"unknown"`.
    pub camera_movement: String,
}

impl Default for TemporalAnalysis {
    fn default() -> Self {
        Self {
            continuity: UNKNOWN.to_string(),
            pace: UNKNOWN.to_string(),
            camera_movement: UNKNOWN.to_string(),
        }
    }
}

/// Structured description of a video plus its temporal structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoAnalysis {
    #[serde(flatten)]
    pub description: StructuredDescription,
    /// Seconds; `0.0` when unknown.
    pub duration: f64,
    pub keyframes: Vec<Keyframe>,
    pub scene_segments: Vec<SceneSegment>,
    pub actions: Vec<String>,
    pub temporal_analysis: TemporalAnalysis,
}

impl VideoAnalysis {
    /// Wrap a description with empty temporal fields.
    pub fn from_description(description: StructuredDescription) -> Self {
        Self {
            description,
            duration: 0.0,
            keyframes: Vec::new(),
            scene_segments: Vec::new(),
            actions: Vec::new(),
            temporal_analysis: TemporalAnalysis::default(),
        }
    }

    pub fn blocked(language: &str, moderation: &ModerationResult) -> Self {
        Self::from_description(StructuredDescription::blocked(language, moderation))
    }

    pub fn degraded(language: &str, reason: &str) -> Self {
        Self::from_description(StructuredDescription::degraded(language, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_bounds_are_inclusive() {
        let segment = SceneSegment {
            start: 2.0,
            end: 4.0,
            description: "pan".into(),
        };
        assert!(segment.contains(2.0));
        assert!(segment.contains(4.0));
        assert!(!segment.contains(4.5));
    }

    #[test]
    fn flattened_description_serializes_at_top_level() {
        let analysis = VideoAnalysis::from_description(StructuredDescription::empty("en"));
        let json = serde_json::to_value(&analysis).unwrap();
        assert!(json.get("metadata").is_some());
        assert!(json.get("scene_segments").is_some());
        assert!(json.get("description").is_none());
    }
}
