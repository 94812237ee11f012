//! Engine context: the streams, instances and optional VAD a scheduler runs over.

use super::instance::{DecodeInstance, InstanceId};
use super::stream::{FeatureFrame, FeatureStream, StreamId};
use crate::defaults;
use crate::error::{FramestepError, Result};

/// Per-frame speech/silence decision of a voice activity detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VadDecision {
    /// The frame contains speech.
    pub speech: bool,
    /// Speech seen earlier in the utterance has now ended.
    pub end_of_speech: bool,
}

/// Voice activity detector consulted once per frame on its bound stream.
pub trait VoiceActivityDetector: Send {
    /// Evaluates one frame.
    fn process_frame(&mut self, frame: &FeatureFrame) -> VadDecision;

    /// Resets detector state at the end of an utterance.
    fn end_of_utterance(&mut self);
}

pub(crate) struct AttachedVad {
    pub(crate) detector: Box<dyn VoiceActivityDetector>,
    pub(crate) stream: StreamId,
}

/// Global flags the scheduler consults at its decision points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerOptions {
    /// Utterance boundaries are detected actively and input is carried over.
    pub explicit_segmentation: bool,
    /// Reject input shorter than this many milliseconds.
    pub reject_short_ms: Option<u32>,
    /// Reject input whose average power on any stream is below this value.
    pub reject_power: Option<f64>,
    /// Samples per frame shift, for frame-to-millisecond conversion.
    pub frame_shift: u32,
    pub sample_rate: u32,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            explicit_segmentation: false,
            reject_short_ms: None,
            reject_power: None,
            frame_shift: defaults::FRAME_SHIFT,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

impl SchedulerOptions {
    pub fn frames_to_ms(&self, frames: usize) -> u64 {
        defaults::frames_to_ms(frames, self.frame_shift, self.sample_rate)
    }
}

/// Ordered streams and instances plus the optional VAD.
///
/// Insertion order is iteration order for every scheduling decision.
pub struct EngineContext {
    pub(crate) streams: Vec<FeatureStream>,
    pub(crate) instances: Vec<DecodeInstance>,
    pub(crate) vad: Option<AttachedVad>,
    options: SchedulerOptions,
}

impl EngineContext {
    pub fn new(options: SchedulerOptions) -> Self {
        Self {
            streams: Vec::new(),
            instances: Vec::new(),
            vad: None,
            options,
        }
    }

    pub fn add_stream(&mut self, stream: FeatureStream) -> StreamId {
        self.streams.push(stream);
        StreamId(self.streams.len() - 1)
    }

    /// Adds an instance; its bound stream must already be registered.
    pub fn add_instance(&mut self, instance: DecodeInstance) -> Result<InstanceId> {
        self.check_stream(instance.stream())?;
        self.instances.push(instance);
        Ok(InstanceId(self.instances.len() - 1))
    }

    /// Attaches a voice activity detector evaluated on `stream`.
    pub fn attach_vad(
        &mut self,
        detector: Box<dyn VoiceActivityDetector>,
        stream: StreamId,
    ) -> Result<()> {
        self.check_stream(stream)?;
        self.vad = Some(AttachedVad { detector, stream });
        Ok(())
    }

    pub fn detach_vad(&mut self) {
        self.vad = None;
    }

    pub fn has_vad(&self) -> bool {
        self.vad.is_some()
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut SchedulerOptions {
        &mut self.options
    }

    pub fn streams(&self) -> &[FeatureStream] {
        &self.streams
    }

    pub fn stream(&self, id: StreamId) -> Option<&FeatureStream> {
        self.streams.get(id.0)
    }

    pub fn stream_mut(&mut self, id: StreamId) -> Option<&mut FeatureStream> {
        self.streams.get_mut(id.0)
    }

    pub fn instances(&self) -> &[DecodeInstance] {
        &self.instances
    }

    pub fn instance(&self, id: InstanceId) -> Option<&DecodeInstance> {
        self.instances.get(id.0)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut DecodeInstance> {
        self.instances.get_mut(id.0)
    }

    fn check_stream(&self, stream: StreamId) -> Result<()> {
        if stream.0 < self.streams.len() {
            Ok(())
        } else {
            Err(FramestepError::UnknownStream { stream: stream.0 })
        }
    }
}
