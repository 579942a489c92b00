//! Frame selection and result merging for two-pass video analysis.
//!
//! Pass 1 looks at an evenly strided sample at low image detail. Pass 2
//! runs only when pass 1 was unsure (or the caller asked for a
//! comprehensive result) and looks at every frame inside the first two
//! scene segments pass 1 reported.

use serde::{Deserialize, Serialize};

use crate::types::{
    AnalysisOptions, DetailLevel, PassMode, Purpose, SceneSegment, VideoAnalysis, VideoFrame,
};

/// Processing note recorded on a merged two-pass result.
pub const TWO_PASS_NOTE: &str = "two-pass analysis: overview plus segment detail";

/// Tuning for video analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Frame count above which `auto` mode switches to two passes. Default: 10.
    pub two_pass_threshold: usize,
    /// Frames sampled for the overview pass. Default: 8.
    pub overview_frames: usize,
    /// Pass-1 uncertainty notes above which pass 2 runs. Default: 3.
    pub uncertainty_threshold: usize,
    /// Scene segments examined by pass 2. Default: 2.
    pub detail_segments: usize,
    /// Largest frame set accepted per request. Default: 120.
    pub max_frames: usize,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            two_pass_threshold: 10,
            overview_frames: 8,
            uncertainty_threshold: 3,
            detail_segments: 2,
            max_frames: 120,
        }
    }
}

impl VideoConfig {
    /// Whether a request with `frame_count` frames should take two passes.
    pub fn use_two_pass(&self, mode: PassMode, frame_count: usize) -> bool {
        match mode {
            PassMode::SinglePass => false,
            PassMode::TwoPass => true,
            PassMode::Auto => frame_count > self.two_pass_threshold,
        }
    }

    /// Whether pass 1's result calls for a targeted second pass.
    pub fn needs_second_pass(&self, pass1: &VideoAnalysis, options: &AnalysisOptions) -> bool {
        pass1.description.uncertainty_notes.len() > self.uncertainty_threshold
            || options.detail == DetailLevel::Comprehensive
    }

    /// Evenly strided overview sample: frames `0, s, 2s, ...` with
    /// `s = ceil(n / overview_frames)`.
    pub fn overview_sample<'a>(&self, frames: &'a [VideoFrame]) -> Vec<&'a VideoFrame> {
        let stride = frames.len().div_ceil(self.overview_frames.max(1)).max(1);
        frames.iter().step_by(stride).collect()
    }

    /// Frames whose timestamp falls inside any of the first
    /// `detail_segments` scene segments.
    pub fn segment_sample<'a>(
        &self,
        frames: &'a [VideoFrame],
        segments: &[SceneSegment],
    ) -> Vec<&'a VideoFrame> {
        let targets = &segments[..segments.len().min(self.detail_segments)];
        frames
            .iter()
            .filter(|f| targets.iter().any(|s| s.contains(f.timestamp)))
            .collect()
    }
}

/// Options for the overview pass.
pub fn overview_options(options: &AnalysisOptions) -> AnalysisOptions {
    options
        .clone()
        .purpose(Purpose::Overview)
        .detail(DetailLevel::Brief)
}

/// Options for the segment-detail pass.
pub fn segment_options(options: &AnalysisOptions) -> AnalysisOptions {
    let detail = if options.detail == DetailLevel::Comprehensive {
        DetailLevel::Detailed
    } else {
        DetailLevel::Standard
    };
    options
        .clone()
        .purpose(Purpose::SegmentDetail)
        .detail(detail)
}

/// Combine both passes: pass 1 as-is, segments appended, uncertainty
/// notes taken from pass 2.
pub fn merge_passes(mut pass1: VideoAnalysis, pass2: VideoAnalysis) -> VideoAnalysis {
    pass1.scene_segments.extend(pass2.scene_segments);
    pass1.description.uncertainty_notes = pass2.description.uncertainty_notes;
    pass1
        .description
        .merge_safety_flags(&pass2.description.safety_flags);
    pass1.description.note(TWO_PASS_NOTE);
    pass1
}
