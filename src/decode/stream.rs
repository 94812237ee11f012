//! Feature streams: named channels of acoustic frames with a read position.

use serde::{Deserialize, Serialize};

/// Index of a stream inside an [`EngineContext`](super::context::EngineContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(pub usize);

/// One fixed-duration slice of extracted acoustic features.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    /// Feature vector handed to the search engine.
    pub features: Vec<f32>,
    /// RMS level of the samples behind this frame (0.0 to 1.0).
    pub level: f32,
    /// Sum of squared normalized samples newly covered by this frame.
    pub energy: f64,
    /// Number of samples newly covered by this frame.
    pub samples: u32,
}

impl FeatureFrame {
    /// Creates a frame carrying only a feature vector.
    pub fn new(features: Vec<f32>) -> Self {
        Self {
            features,
            ..Self::default()
        }
    }

    /// Sets the RMS level of the frame.
    pub fn with_level(mut self, level: f32) -> Self {
        self.level = level;
        self
    }

    /// Sets the power accumulators contributed by the frame.
    pub fn with_energy(mut self, energy: f64, samples: u32) -> Self {
        self.energy = energy;
        self.samples = samples;
        self
    }
}

/// A channel of frames consumed by one or more decode instances.
///
/// Streams live for the whole engine lifetime. They are reset at the start of
/// each pass and advanced by the scheduler, one frame per cycle.
#[derive(Debug, Clone)]
pub struct FeatureStream {
    name: String,
    frames: Vec<FeatureFrame>,
    position: usize,
    valid: bool,
    last_consumed_frame: Option<usize>,
    energy_sum: f64,
    sample_count: u64,
}

impl FeatureStream {
    /// Creates an empty stream.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            frames: Vec::new(),
            position: 0,
            valid: false,
            last_consumed_frame: None,
            energy_sum: 0.0,
            sample_count: 0,
        }
    }

    /// Creates a stream preloaded with frames (batch mode).
    pub fn with_frames(name: &str, frames: Vec<FeatureFrame>) -> Self {
        let mut stream = Self::new(name);
        for frame in frames {
            stream.push(frame);
        }
        stream
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the next frame to process.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Whether unconsumed frames remain in the current pass.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Frames available in batch mode, or received so far in streaming mode.
    pub fn total_frames(&self) -> usize {
        self.frames.len()
    }

    /// Frame index at which decoding of this stream stopped.
    ///
    /// `None` until the pass ends, and also when it ended at position 0.
    pub fn last_consumed_frame(&self) -> Option<usize> {
        self.last_consumed_frame
    }

    pub fn frame(&self, index: usize) -> Option<&FeatureFrame> {
        self.frames.get(index)
    }

    pub fn frames(&self) -> &[FeatureFrame] {
        &self.frames
    }

    /// Appends one frame and accumulates its power.
    pub fn push(&mut self, frame: FeatureFrame) {
        self.energy_sum += frame.energy;
        self.sample_count += frame.samples as u64;
        self.frames.push(frame);
    }

    /// Average power over the samples held, or `None` without samples.
    pub fn average_power(&self) -> Option<f64> {
        if self.sample_count == 0 {
            None
        } else {
            Some(self.energy_sum / self.sample_count as f64)
        }
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Drops all frames and power statistics, ready for unrelated input.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.energy_sum = 0.0;
        self.sample_count = 0;
        self.rewind();
    }

    /// Resets the read position for a new pass. Frames are kept.
    pub fn rewind(&mut self) {
        self.position = 0;
        self.valid = !self.frames.is_empty();
        self.last_consumed_frame = None;
    }

    /// Keeps frames from `from` onwards as the input of the next segment.
    ///
    /// Power statistics are recomputed over the kept frames.
    pub fn carry_over(&mut self, from: usize) {
        let from = from.min(self.frames.len());
        self.frames.drain(..from);
        self.recount_power();
        self.rewind();
    }

    /// Recomputes validity; a stream never becomes valid again mid-pass.
    pub(crate) fn refresh_valid(&mut self) {
        self.valid = self.valid && self.position < self.frames.len();
    }

    /// Streaming-mode validity: frames may arrive after the stream ran dry.
    pub(crate) fn refresh_valid_streaming(&mut self) {
        self.valid = self.position < self.frames.len();
    }

    pub(crate) fn advance(&mut self) {
        if self.valid {
            self.position += 1;
        }
    }

    pub(crate) fn mark_consumed_at_position(&mut self) {
        self.last_consumed_frame = self.position.checked_sub(1);
    }

    /// Drops the frames beyond `position` together with their power.
    pub(crate) fn truncate_to_position(&mut self) {
        self.frames.truncate(self.position);
        self.recount_power();
    }

    fn recount_power(&mut self) {
        self.energy_sum = self.frames.iter().map(|f| f.energy).sum();
        self.sample_count = self.frames.iter().map(|f| f.samples as u64).sum();
    }
}
