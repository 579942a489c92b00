//! Prompt construction.
//!
//! Pure functions from [`AnalysisOptions`] to the instructions, output
//! schema and image detail of one remote call. No I/O, no state.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema;
use crate::types::{AnalysisOptions, Audience, DetailLevel, Purpose, Tone};

/// Resolution hint passed alongside each image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Low,
    High,
    #[default]
    Auto,
}

/// Formatted instructions plus output contract for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionPrompt {
    pub system: String,
    pub user: String,
    /// Name reported with the structured-output schema.
    pub schema_name: &'static str,
    pub schema: Value,
    pub image_detail: ImageDetail,
}

const SYSTEM_PREAMBLE: &str = "You are an expert visual analyst. Describe exactly what is visible, \
never guess identities of real people, and record anything you are unsure about in \
uncertainty_notes. Answer only with JSON matching the provided schema.";

fn purpose_line(purpose: Purpose) -> &'static str {
    match purpose {
        Purpose::General => "Produce a general-purpose description suitable for a media library.",
        Purpose::Accessibility => {
            "Prioritise accessibility: alt text must stand alone for screen-reader users, \
             and the long description must convey layout, text and colour."
        }
        Purpose::Marketing => {
            "Describe the content for marketing use: highlight products, branding and mood."
        }
        Purpose::Education => {
            "Describe the content for educational use: explain what is shown and why it matters."
        }
        Purpose::Overview => {
            "These frames are a sparse sample of a video. Give a quick overview, split the \
             video into scene segments with start and end times, and flag anything unclear."
        }
        Purpose::SegmentDetail => {
            "These frames come from selected segments of a video. Describe them closely, \
             resolving what an earlier overview found uncertain."
        }
    }
}

fn audience_line(audience: Audience) -> &'static str {
    match audience {
        Audience::General => "Write for a general adult audience.",
        Audience::Children => "Write for children: simple words, short sentences, nothing frightening.",
        Audience::Professional => "Write for media professionals.",
        Audience::Technical => "Write for a technical audience; precise terminology is welcome.",
    }
}

fn detail_line(detail: DetailLevel) -> &'static str {
    match detail {
        DetailLevel::Brief => "Keep every field short: one sentence at most.",
        DetailLevel::Standard => "Use a moderate level of detail.",
        DetailLevel::Detailed => "Be thorough: cover secondary subjects and background elements.",
        DetailLevel::Comprehensive => {
            "Be exhaustive: cover every subject, all visible text, composition, lighting and colour."
        }
    }
}

fn tone_line(tone: Tone) -> &'static str {
    match tone {
        Tone::Neutral => "Use a neutral, factual tone.",
        Tone::Formal => "Use a formal tone.",
        Tone::Casual => "Use a relaxed, conversational tone.",
        Tone::Playful => "Use a light, playful tone.",
    }
}

/// Token budget for a response at the given detail level.
pub fn max_tokens(detail: DetailLevel) -> u32 {
    match detail {
        DetailLevel::Brief => 800,
        DetailLevel::Standard => 1_500,
        DetailLevel::Detailed => 2_500,
        DetailLevel::Comprehensive => 4_000,
    }
}

/// Default image detail for a still-image request.
pub fn image_detail_for(detail: DetailLevel) -> ImageDetail {
    match detail {
        DetailLevel::Brief => ImageDetail::Low,
        DetailLevel::Standard => ImageDetail::Auto,
        DetailLevel::Detailed | DetailLevel::Comprehensive => ImageDetail::High,
    }
}

fn system_prompt(options: &AnalysisOptions) -> String {
    let mut system = String::from(SYSTEM_PREAMBLE);
    for line in [
        purpose_line(options.purpose),
        audience_line(options.audience),
        detail_line(options.detail),
        tone_line(options.tone),
    ] {
        system.push('\n');
        system.push_str(line);
    }
    if options.targets_minor() {
        system.push_str("\nThe reader is a minor. Keep all wording age-appropriate.");
    }
    let _ = write!(
        system,
        "\nWrite all free text in the language with code \"{}\" and set metadata.language to it.",
        options.language
    );
    system
}

fn push_focus_and_questions(user: &mut String, options: &AnalysisOptions) {
    if !options.focus.is_empty() {
        let _ = write!(user, "\nPay particular attention to: {}.", options.focus.join(", "));
    }
    if !options.questions.is_empty() {
        user.push_str("\nAlso answer these questions inside the description:");
        for (i, question) in options.questions.iter().enumerate() {
            let _ = write!(user, "\n{}. {}", i + 1, question.trim());
        }
    }
}

/// Prompt for analysing `image_count` still images together.
pub fn image_prompt(options: &AnalysisOptions, image_count: usize) -> VisionPrompt {
    let mut user = if image_count == 1 {
        "Analyse the attached image.".to_string()
    } else {
        format!("Analyse the {image_count} attached images as one set, in order.")
    };
    push_focus_and_questions(&mut user, options);
    VisionPrompt {
        system: system_prompt(options),
        user,
        schema_name: "structured_description",
        schema: schema::description_schema(),
        image_detail: image_detail_for(options.detail),
    }
}

/// Prompt for a set of video frames at the given timestamps (seconds).
pub fn video_prompt(
    options: &AnalysisOptions,
    timestamps: &[f64],
    image_detail: ImageDetail,
) -> VisionPrompt {
    let stamps: Vec<String> = timestamps.iter().map(|t| format!("{t:.2}s")).collect();
    let mut user = format!(
        "The attached {} frames were sampled from one video at: {}. \
         Report keyframes, scene segments, actions and temporal analysis using these timestamps.",
        timestamps.len(),
        stamps.join(", ")
    );
    push_focus_and_questions(&mut user, options);
    VisionPrompt {
        system: system_prompt(options),
        user,
        schema_name: "video_analysis",
        schema: schema::video_schema(),
        image_detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_reflects_options() {
        let options = AnalysisOptions::default()
            .purpose(Purpose::Accessibility)
            .language("de")
            .focus("signage")
            .question("Is there a wheelchair ramp?");
        let prompt = image_prompt(&options, 2);
        assert!(prompt.system.contains("accessibility"));
        assert!(prompt.system.contains("\"de\""));
        assert!(prompt.user.contains("2 attached images"));
        assert!(prompt.user.contains("signage"));
        assert!(prompt.user.contains("1. Is there a wheelchair ramp?"));
        assert_eq!(prompt.schema_name, "structured_description");
    }

    #[test]
    fn minors_get_age_appropriate_instruction() {
        let prompt = image_prompt(&AnalysisOptions::default().target_age(9), 1);
        assert!(prompt.system.contains("minor"));
        let adult = image_prompt(&AnalysisOptions::default().target_age(30), 1);
        assert!(!adult.system.contains("minor"));
    }

    #[test]
    fn video_prompt_lists_timestamps() {
        let prompt = video_prompt(&AnalysisOptions::default(), &[0.0, 1.5], ImageDetail::Low);
        assert!(prompt.user.contains("0.00s, 1.50s"));
        assert_eq!(prompt.image_detail, ImageDetail::Low);
        assert_eq!(prompt.schema_name, "video_analysis");
    }

    #[test]
    fn prompt_is_deterministic() {
        let options = AnalysisOptions::default().detail(DetailLevel::Comprehensive);
        assert_eq!(image_prompt(&options, 3), image_prompt(&options, 3));
        assert_eq!(image_prompt(&options, 3).image_detail, ImageDetail::High);
    }
}
