//! Segment finalization: carrying unconsumed input into the next segment.

use super::stream::FeatureStream;
use crate::defaults;
use tracing::debug;

/// Invoked once per pass in explicit-segmentation mode.
pub trait SegmentFinalizer: Send {
    /// Cuts each stream at its `last_consumed_frame` and prepares the
    /// remaining input for the next segment.
    fn finalize_segment(&mut self, streams: &mut [FeatureStream]);
}

/// Keeps the frames after the cut point, plus a short margin before it.
///
/// The margin re-presents the trailing silence of the finished segment as
/// the leading context of the next one. At least one frame is always dropped
/// from a segment that consumed input, so consecutive passes make progress.
#[derive(Debug, Clone, Copy)]
pub struct CarryOverFinalizer {
    margin_frames: usize,
}

impl CarryOverFinalizer {
    pub fn new(margin_frames: usize) -> Self {
        Self { margin_frames }
    }

    pub fn margin_frames(&self) -> usize {
        self.margin_frames
    }

    /// First frame index the next segment starts from.
    fn keep_from(&self, stream: &FeatureStream) -> usize {
        let boundary = stream.last_consumed_frame().map_or(0, |last| last + 1);
        if boundary >= stream.total_frames() {
            return stream.total_frames();
        }
        if boundary == 0 {
            return 0;
        }
        boundary.saturating_sub(self.margin_frames).max(1)
    }
}

impl Default for CarryOverFinalizer {
    fn default() -> Self {
        Self::new(defaults::CARRY_OVER_MARGIN_FRAMES)
    }
}

impl SegmentFinalizer for CarryOverFinalizer {
    fn finalize_segment(&mut self, streams: &mut [FeatureStream]) {
        for stream in streams.iter_mut() {
            let from = self.keep_from(stream);
            debug!(
                stream = stream.name(),
                cut = from,
                remaining = stream.total_frames().saturating_sub(from),
                "carrying input over to next segment"
            );
            stream.carry_over(from);
        }
    }
}
