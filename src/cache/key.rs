//! Deterministic cache-key fingerprints.
//!
//! A key is `"<kind>:<sha256 hex>"` over a canonical JSON rendering of the
//! request subject, every option that shapes the output, and the
//! model/API/schema versions. `force_refresh` is excluded: a refresh must
//! land on the entry it replaces.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::Result;
use crate::types::{AnalysisOptions, Audience, DetailLevel, PassMode, Purpose, Tone, VideoFrame};

/// Versions that change the shape or content of cached values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyContext {
    /// Model or deployment identifier.
    pub model: String,
    pub api_version: String,
    pub schema_version: String,
}

#[derive(Serialize)]
struct OptionsKey<'a> {
    purpose: Purpose,
    audience: Audience,
    language: &'a str,
    detail: DetailLevel,
    tone: Tone,
    focus: &'a [String],
    questions: &'a [String],
    moderation: bool,
    target_age: Option<u8>,
    pass_mode: PassMode,
}

impl<'a> From<&'a AnalysisOptions> for OptionsKey<'a> {
    fn from(options: &'a AnalysisOptions) -> Self {
        Self {
            purpose: options.purpose,
            audience: options.audience,
            language: &options.language,
            detail: options.detail,
            tone: options.tone,
            focus: &options.focus,
            questions: &options.questions,
            moderation: options.moderation,
            target_age: options.target_age,
            pass_mode: options.pass_mode,
        }
    }
}

#[derive(Serialize)]
struct KeyMaterial<'a, S: Serialize> {
    kind: &'static str,
    subject: S,
    options: OptionsKey<'a>,
    model: &'a str,
    api_version: &'a str,
    schema_version: &'a str,
}

/// Frame identity inside a video key: position and payload digest.
#[derive(Serialize)]
struct FrameKey {
    timestamp: f64,
    sha256: String,
}

#[derive(Serialize)]
struct VideoSubject<'a> {
    video_id: &'a str,
    frames: Vec<FrameKey>,
}

fn fingerprint<S: Serialize>(material: &KeyMaterial<'_, S>) -> Result<String> {
    let mut hasher = Sha256::new();
    serde_json::to_writer(&mut hasher, material)?;
    Ok(format!("{}:{}", material.kind, hex::encode(hasher.finalize())))
}

/// Key for an image analysis request.
pub fn image_key(
    image_ids: &[String],
    options: &AnalysisOptions,
    context: &KeyContext,
) -> Result<String> {
    fingerprint(&KeyMaterial {
        kind: "image",
        subject: image_ids,
        options: options.into(),
        model: &context.model,
        api_version: &context.api_version,
        schema_version: &context.schema_version,
    })
}

/// Key for a video analysis request.
pub fn video_key(
    video_id: &str,
    frames: &[VideoFrame],
    options: &AnalysisOptions,
    context: &KeyContext,
) -> Result<String> {
    let subject = VideoSubject {
        video_id,
        frames: frames
            .iter()
            .map(|f| FrameKey {
                timestamp: f.timestamp,
                sha256: hex::encode(Sha256::digest(&f.image.bytes)),
            })
            .collect(),
    };
    fingerprint(&KeyMaterial {
        kind: "video",
        subject,
        options: options.into(),
        model: &context.model,
        api_version: &context.api_version,
        schema_version: &context.schema_version,
    })
}
