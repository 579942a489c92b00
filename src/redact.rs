//! PII redaction over the free-text fields of a finished description.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{StructuredDescription, VideoAnalysis};

/// Processing note recorded when anything was redacted.
pub const REDACTION_NOTE: &str = "personal information redacted";

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b").expect("email regex should compile")
});

// 13-19 digits, optionally grouped by spaces or dashes.
static CARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\d[ -]?){12,18}\d\b").expect("card regex should compile")
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+\d{1,3}[ .-]?)?(?:\(\d{2,4}\)[ .-]?)?\b\d{3,4}[ .-]\d{3,4}(?:[ .-]\d{2,4})?\b")
        .expect("phone regex should compile")
});

/// Replace PII in one string. Returns whether anything changed.
fn redact_text(text: &mut String) -> bool {
    let mut changed = false;
    for (pattern, placeholder) in [
        (&*EMAIL, "[email]"),
        (&*CARD, "[card number]"),
        (&*PHONE, "[phone]"),
    ] {
        if pattern.is_match(text) {
            *text = pattern.replace_all(text, placeholder).into_owned();
            changed = true;
        }
    }
    changed
}

fn redact_all(texts: &mut [String]) -> bool {
    texts.iter_mut().fold(false, |acc, t| redact_text(t) | acc)
}

/// Redact emails, phone numbers and card-like digit runs from every
/// free-text field, noting the redaction once.
pub fn redact_description(description: &mut StructuredDescription) -> bool {
    let changed = scrub_description(description);
    if changed {
        description.note(REDACTION_NOTE);
    }
    changed
}

/// [`redact_description`] plus the segment, keyframe and action text.
pub fn redact_video(analysis: &mut VideoAnalysis) -> bool {
    let mut changed = scrub_description(&mut analysis.description);
    for segment in &mut analysis.scene_segments {
        changed |= redact_text(&mut segment.description);
    }
    for keyframe in &mut analysis.keyframes {
        changed |= redact_text(&mut keyframe.description);
    }
    changed |= redact_all(&mut analysis.actions);
    if changed {
        analysis.description.note(REDACTION_NOTE);
    }
    changed
}

fn scrub_description(description: &mut StructuredDescription) -> bool {
    let mut changed = false;
    changed |= redact_text(&mut description.accessibility.alt_text);
    changed |= redact_text(&mut description.accessibility.long_description);
    changed |= redact_text(&mut description.content.scene_description);
    changed |= redact_text(&mut description.content.spatial_layout);
    changed |= redact_all(&mut description.content.extracted_text);
    changed |= redact_all(&mut description.content.primary_subjects);
    changed |= redact_all(&mut description.content.visual_elements);
    changed |= redact_text(&mut description.generation.suggested_prompt);
    changed |= redact_all(&mut description.uncertainty_notes);
    changed
}
