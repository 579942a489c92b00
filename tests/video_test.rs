//! Tests for single- and two-pass video analysis.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use heimdall::pipeline::video::TWO_PASS_NOTE;
use heimdall::prompt::ImageDetail;
use heimdall::redact::REDACTION_NOTE;
use heimdall::types::Keyframe;
use heimdall::{
    AnalysisOptions, BreakerConfig, CacheConfig, DetailLevel, ErrorKind, HeimdallError, PassMode,
    RecommendedAction, SafetyFlags, Severity, VideoConfig, VideoFrame,
};

const SEGMENTS: &[(f64, f64)] = &[(0.0, 2.0), (10.0, 11.0), (15.0, 19.0)];

fn pipeline_with(
    vision: ScriptedVision,
    moderation: MockModeration,
) -> (heimdall::VisionPipeline, Arc<ScriptedVision>, Arc<MockModeration>) {
    let vision = Arc::new(vision);
    let moderation = Arc::new(moderation);
    let pipeline = builder(
        Arc::new(MemoryImageSource::with_images(0)),
        vision.clone(),
        moderation.clone(),
    )
    .breaker(BreakerConfig::new().failure_threshold(20))
    .build()
    .unwrap();
    (pipeline, vision, moderation)
}

/// Pass 1 answers with `pass1`, every later call with `pass2`.
fn two_pass_script(pass1: String, pass2: String) -> ScriptedVision {
    ScriptedVision::new(move |call| {
        if call == 0 {
            Ok(pass1.clone())
        } else {
            Ok(pass2.clone())
        }
    })
}

// ============================================================================
// Two-pass
// ============================================================================

#[tokio::test]
async fn uncertain_overview_triggers_targeted_second_pass() {
    let (pipeline, vision, moderation) = pipeline_with(
        two_pass_script(video_json(SEGMENTS, 4), video_json(&[(0.0, 1.0)], 1)),
        MockModeration::allowing(),
    );

    let analysis = pipeline
        .analyze_video_frames("clip-1", frames(20), AnalysisOptions::default())
        .await
        .unwrap();

    let calls = vision.recorded();
    assert_eq!(calls.len(), 2);
    // ceil(20 / 8) = 3 → frames 0, 3, 6, ..., 18
    assert_eq!(calls[0].image_count, 7);
    assert_eq!(calls[0].image_detail, ImageDetail::Low);
    assert_eq!(calls[0].max_tokens, 800);
    assert_eq!(calls[0].schema_name, "video_analysis");
    // Frames inside [0, 2] and [10, 11]: 0, 1, 2, 10, 11
    assert_eq!(calls[1].image_count, 5);
    assert!(calls[1].user_prompt.contains("10.00s"));
    assert!(!calls[1].user_prompt.contains("15.00s"));

    assert_eq!(analysis.scene_segments.len(), 4);
    assert_eq!(analysis.description.uncertainty_notes, vec!["unclear 0"]);
    assert_eq!(analysis.duration, 20.0);
    assert!(
        analysis
            .description
            .metadata
            .processing_notes
            .contains(&TWO_PASS_NOTE.to_string())
    );

    // Moderation covers every frame, not just the sampled ones.
    assert_eq!(moderation.call_count(), 1);
    assert_eq!(moderation.images_seen(), 20);
}

#[tokio::test]
async fn confident_overview_skips_second_pass() {
    let (pipeline, vision, _) = pipeline_with(
        two_pass_script(video_json(SEGMENTS, 3), video_json(&[], 0)),
        MockModeration::allowing(),
    );

    let analysis = pipeline
        .analyze_video_frames("clip-1", frames(20), AnalysisOptions::default())
        .await
        .unwrap();

    assert_eq!(vision.call_count(), 1);
    assert_eq!(analysis.scene_segments.len(), 3);
    assert_eq!(analysis.description.uncertainty_notes.len(), 3);
}

#[tokio::test]
async fn comprehensive_detail_always_takes_second_pass() {
    let (pipeline, vision, _) = pipeline_with(
        two_pass_script(video_json(SEGMENTS, 0), video_json(&[(10.0, 10.5)], 0)),
        MockModeration::allowing(),
    );

    let analysis = pipeline
        .analyze_video_frames(
            "clip-1",
            frames(20),
            AnalysisOptions::default().detail(DetailLevel::Comprehensive),
        )
        .await
        .unwrap();

    let calls = vision.recorded();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].image_detail, ImageDetail::High);
    assert_eq!(calls[1].max_tokens, 2_500);
    assert_eq!(analysis.scene_segments.len(), 4);
}

#[tokio::test]
async fn failed_second_pass_keeps_overview() {
    let (pipeline, vision, _) = pipeline_with(
        two_pass_script(video_json(SEGMENTS, 5), "not json at all".to_string()),
        MockModeration::allowing(),
    );

    let analysis = pipeline
        .analyze_video_frames("clip-1", frames(20), AnalysisOptions::default())
        .await
        .unwrap();

    assert_eq!(vision.call_count(), 2);
    assert_eq!(analysis.scene_segments.len(), 3);
    assert_eq!(analysis.description.uncertainty_notes.len(), 5);
    assert!(
        analysis
            .description
            .metadata
            .processing_notes
            .iter()
            .any(|n| n.starts_with("second pass failed"))
    );
}

#[tokio::test]
async fn unavailable_second_pass_keeps_overview() {
    let pass1 = video_json(SEGMENTS, 5);
    let vision = ScriptedVision::new(move |call| {
        if call == 0 {
            Ok(pass1.clone())
        } else {
            Err(HeimdallError::Http("connection reset".into()))
        }
    });
    let (pipeline, vision, _) = pipeline_with(vision, MockModeration::allowing());

    let analysis = pipeline
        .analyze_video_frames("clip-1", frames(20), AnalysisOptions::default())
        .await
        .unwrap();

    // One overview call plus three attempts at pass 2.
    assert_eq!(vision.call_count(), 4);
    assert_eq!(analysis.scene_segments.len(), 3);
    assert_eq!(pipeline.stats().snapshot().degraded, 0);
}

#[tokio::test]
async fn overview_only_result_expires_with_fallback_ttl() {
    let pass1 = video_json(SEGMENTS, 5);
    // Every request: overview succeeds, all three pass-2 attempts fail.
    let vision = Arc::new(ScriptedVision::new(move |call| {
        if call % 4 == 0 {
            Ok(pass1.clone())
        } else {
            Err(HeimdallError::Http("down".into()))
        }
    }));
    let pipeline = builder(
        Arc::new(MemoryImageSource::with_images(0)),
        vision.clone(),
        Arc::new(MockModeration::allowing()),
    )
    .breaker(BreakerConfig::new().failure_threshold(20))
    .cache(CacheConfig::new().fallback_ttl(Duration::from_millis(50)))
    .build()
    .unwrap();

    let first = pipeline
        .analyze_video_frames("clip-1", frames(20), AnalysisOptions::default())
        .await
        .unwrap();
    assert!(
        first
            .description
            .metadata
            .processing_notes
            .iter()
            .any(|n| n.starts_with("second pass failed"))
    );
    assert_eq!(vision.call_count(), 4);

    pipeline
        .analyze_video_frames("clip-1", frames(20), AnalysisOptions::default())
        .await
        .unwrap();
    assert_eq!(vision.call_count(), 4);

    tokio::time::sleep(Duration::from_millis(200)).await;
    pipeline
        .analyze_video_frames("clip-1", frames(20), AnalysisOptions::default())
        .await
        .unwrap();
    assert_eq!(vision.call_count(), 8);
}

#[tokio::test]
async fn filtered_second_pass_is_not_swallowed() {
    let pass1 = video_json(SEGMENTS, 5);
    let vision = ScriptedVision::new(move |call| {
        if call == 0 {
            Ok(pass1.clone())
        } else {
            Err(HeimdallError::ContentFiltered {
                reason: "endpoint filter".into(),
            })
        }
    });
    let (pipeline, _, _) = pipeline_with(vision, MockModeration::allowing());

    let err = pipeline
        .analyze_video_frames("clip-1", frames(20), AnalysisOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ContentFiltered);
}

#[tokio::test]
async fn unavailable_overview_degrades_whole_request() {
    let (pipeline, vision, _) = pipeline_with(
        ScriptedVision::failing(|| HeimdallError::Timeout(std::time::Duration::ZERO)),
        MockModeration::allowing(),
    );

    let analysis = pipeline
        .analyze_video_frames("clip-1", frames(20), AnalysisOptions::default())
        .await
        .unwrap();

    assert_eq!(vision.call_count(), 3);
    assert!(analysis.scene_segments.is_empty());
    assert_eq!(analysis.temporal_analysis.pace, "unknown");
    assert_eq!(pipeline.stats().snapshot().degraded, 1);
}

// ============================================================================
// Single pass and mode selection
// ============================================================================

#[tokio::test]
async fn short_videos_take_one_pass_over_all_frames() {
    let (pipeline, vision, _) = pipeline_with(
        ScriptedVision::always(video_json(&[(0.0, 4.0)], 9)),
        MockModeration::allowing(),
    );

    let analysis = pipeline
        .analyze_video_frames(
            "clip-2",
            frames(5),
            AnalysisOptions::default().detail(DetailLevel::Detailed),
        )
        .await
        .unwrap();

    let calls = vision.recorded();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].image_count, 5);
    assert_eq!(calls[0].image_detail, ImageDetail::High);
    // Uncertainty does not matter in single-pass mode.
    assert_eq!(analysis.description.uncertainty_notes.len(), 9);
}

#[tokio::test]
async fn explicit_pass_mode_overrides_threshold() {
    let (pipeline, vision, _) = pipeline_with(
        ScriptedVision::always(video_json(&[(0.0, 4.0)], 0)),
        MockModeration::allowing(),
    );

    pipeline
        .analyze_video_frames(
            "clip-3",
            frames(30),
            AnalysisOptions::default().pass_mode(PassMode::SinglePass),
        )
        .await
        .unwrap();

    assert_eq!(vision.recorded()[0].image_count, 30);
}

#[tokio::test]
async fn frames_are_ordered_before_keying() {
    let (pipeline, vision, _) = pipeline_with(
        ScriptedVision::always(video_json(&[(0.0, 4.0)], 0)),
        MockModeration::allowing(),
    );

    let mut reversed = frames(5);
    reversed.reverse();
    pipeline
        .analyze_video_frames("clip-4", reversed, AnalysisOptions::default())
        .await
        .unwrap();
    pipeline
        .analyze_video_frames("clip-4", frames(5), AnalysisOptions::default())
        .await
        .unwrap();

    assert_eq!(vision.call_count(), 1);
    assert!(vision.recorded()[0].user_prompt.contains("0.00s, 1.00s, 2.00s"));
}

#[tokio::test]
async fn blocked_video_never_reaches_the_model() {
    let flags = SafetyFlags {
        sexual: true,
        ..Default::default()
    };
    let (pipeline, vision, _) = pipeline_with(
        ScriptedVision::always(video_json(SEGMENTS, 0)),
        MockModeration::returning(verdict(
            false,
            Severity::Critical,
            flags,
            RecommendedAction::Block,
        )),
    );

    let analysis = pipeline
        .analyze_video_frames("clip-5", frames(12), AnalysisOptions::default())
        .await
        .unwrap();

    assert_eq!(vision.call_count(), 0);
    assert!(analysis.description.metadata.sensitive_content);
    assert!(analysis.description.safety_flags.sexual);
}

#[tokio::test]
async fn personal_information_is_redacted_from_video_text() {
    let mut clip = video(&[(0.0, 4.0)], 0);
    clip.scene_segments[0].description = "presenter shows jane.doe@example.com".into();
    clip.keyframes = vec![Keyframe {
        timestamp: 2.0,
        description: "slide lists 555-123-4567".into(),
    }];
    clip.actions = vec!["writes jane.doe@example.com on whiteboard".into()];
    let (pipeline, vision, _) = pipeline_with(
        ScriptedVision::always(serde_json::to_string(&clip).unwrap()),
        MockModeration::allowing(),
    );

    let analysis = pipeline
        .analyze_video_frames("clip-6", frames(5), AnalysisOptions::default())
        .await
        .unwrap();

    assert_eq!(analysis.scene_segments[0].description, "presenter shows [email]");
    assert_eq!(analysis.keyframes[0].description, "slide lists [phone]");
    assert_eq!(analysis.actions, vec!["writes [email] on whiteboard"]);
    assert!(
        analysis
            .description
            .metadata
            .processing_notes
            .contains(&REDACTION_NOTE.to_string())
    );

    // The cached copy is the redacted one.
    let cached = pipeline
        .analyze_video_frames("clip-6", frames(5), AnalysisOptions::default())
        .await
        .unwrap();
    assert_eq!(vision.call_count(), 1);
    assert!(!serde_json::to_string(&cached).unwrap().contains('@'));
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn rejects_invalid_frame_sets() {
    let (pipeline, vision, _) = pipeline_with(
        ScriptedVision::always(video_json(&[], 0)),
        MockModeration::allowing(),
    );

    let empty = pipeline
        .analyze_video_frames("clip", vec![], AnalysisOptions::default())
        .await
        .unwrap_err();
    let blank_id = pipeline
        .analyze_video_frames(" ", frames(2), AnalysisOptions::default())
        .await
        .unwrap_err();
    let negative = pipeline
        .analyze_video_frames(
            "clip",
            vec![VideoFrame::new(-1.0, jpeg(0))],
            AnalysisOptions::default(),
        )
        .await
        .unwrap_err();
    let too_many = pipeline
        .analyze_video_frames(
            "clip",
            frames(VideoConfig::default().max_frames + 1),
            AnalysisOptions::default(),
        )
        .await
        .unwrap_err();

    for err in [empty, blank_id, negative, too_many] {
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert_eq!(vision.call_count(), 0);
}
