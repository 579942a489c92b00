//! Output schemas sent with every structured-output call.
//!
//! [`SCHEMA_VERSION`] participates in cache keys; bump it whenever either
//! schema (or the Rust types they mirror) changes shape.

use serde_json::{Value, json};

/// Version of the structured output contract.
pub const SCHEMA_VERSION: &str = "2";

fn string_array() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

fn safety_flags() -> Value {
    let flag = json!({ "type": "boolean" });
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["violence", "sexual", "hate", "self_harm", "drugs", "weapons"],
        "properties": {
            "violence": flag, "sexual": flag, "hate": flag,
            "self_harm": flag, "drugs": flag, "weapons": flag,
        }
    })
}

fn description_properties() -> serde_json::Map<String, Value> {
    let text = json!({ "type": "string" });
    let props = json!({
        "metadata": {
            "type": "object",
            "additionalProperties": false,
            "required": ["language", "confidence", "content_type", "sensitive_content", "processing_notes"],
            "properties": {
                "language": text,
                "confidence": { "type": "string", "enum": ["low", "medium", "high"] },
                "content_type": text,
                "sensitive_content": { "type": "boolean" },
                "processing_notes": string_array(),
            }
        },
        "accessibility": {
            "type": "object",
            "additionalProperties": false,
            "required": ["alt_text", "long_description", "reading_level", "color_accessibility_notes"],
            "properties": {
                "alt_text": text,
                "long_description": text,
                "reading_level": text,
                "color_accessibility_notes": string_array(),
            }
        },
        "content": {
            "type": "object",
            "additionalProperties": false,
            "required": ["primary_subjects", "scene_description", "visual_elements", "extracted_text", "spatial_layout"],
            "properties": {
                "primary_subjects": string_array(),
                "scene_description": text,
                "visual_elements": string_array(),
                "extracted_text": string_array(),
                "spatial_layout": text,
            }
        },
        "generation": {
            "type": "object",
            "additionalProperties": false,
            "required": ["suggested_prompt", "style_keywords", "technical_parameters"],
            "properties": {
                "suggested_prompt": text,
                "style_keywords": string_array(),
                "technical_parameters": {
                    "type": "object",
                    "additionalProperties": { "type": "string" }
                },
            }
        },
        "safety_flags": safety_flags(),
        "uncertainty_notes": string_array(),
    });
    match props {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

fn object_schema(properties: serde_json::Map<String, Value>) -> Value {
    let required: Vec<&String> = properties.keys().collect();
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": required,
        "properties": properties,
    })
}

/// JSON schema for a [`StructuredDescription`](crate::StructuredDescription).
pub fn description_schema() -> Value {
    object_schema(description_properties())
}

/// JSON schema for a [`VideoAnalysis`](crate::VideoAnalysis).
///
/// The description fields sit at the top level next to the video fields.
pub fn video_schema() -> Value {
    let text = json!({ "type": "string" });
    let number = json!({ "type": "number" });
    let mut props = description_properties();
    props.insert("duration".into(), number.clone());
    props.insert(
        "keyframes".into(),
        json!({
            "type": "array",
            "items": {
                "type": "object",
                "additionalProperties": false,
                "required": ["timestamp", "description"],
                "properties": { "timestamp": number, "description": text }
            }
        }),
    );
    props.insert(
        "scene_segments".into(),
        json!({
            "type": "array",
            "items": {
                "type": "object",
                "additionalProperties": false,
                "required": ["start", "end", "description"],
                "properties": { "start": number, "end": number, "description": text }
            }
        }),
    );
    props.insert("actions".into(), string_array());
    props.insert(
        "temporal_analysis".into(),
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["continuity", "pace", "camera_movement"],
            "properties": { "continuity": text, "pace": text, "camera_movement": text }
        }),
    );
    object_schema(props)
}
