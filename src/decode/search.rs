//! Search engine collaborator interface.
//!
//! The scheduler drives the beam search through this trait but never looks
//! inside it. Scoring, the word-end trellis and best-path extraction all live
//! behind these calls.

use super::instance::{DecodeInstance, InstanceId};
use super::stream::FeatureStream;
use crate::error::{FramestepError, Result};
use std::collections::{HashMap, HashSet};

/// What the search reported for one instance on one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepReport {
    /// Search-internal termination (beam collapsed, decoder end of speech).
    pub terminated: bool,
    /// The search observed speech activity on this frame.
    pub speech_detected: bool,
    /// An interim hypothesis is available after this frame.
    pub interim: bool,
}

impl StepReport {
    /// Keep going, nothing to report.
    pub fn proceed() -> Self {
        Self::default()
    }

    /// The search for this instance cannot continue.
    pub fn terminated() -> Self {
        Self {
            terminated: true,
            ..Self::default()
        }
    }
}

/// Per-frame trellis operations consumed by the scheduler.
pub trait SearchEngine {
    /// Sets up the trellis for a new pass on frame 0.
    ///
    /// An error here is a resource or configuration failure and aborts the pass.
    fn trellis_init(
        &mut self,
        id: InstanceId,
        instance: &DecodeInstance,
        stream: &FeatureStream,
    ) -> Result<()>;

    /// Advances the trellis of one instance by the frame at `frame`.
    fn trellis_step(
        &mut self,
        id: InstanceId,
        instance: &DecodeInstance,
        stream: &FeatureStream,
        frame: usize,
    ) -> StepReport;

    /// Content-based end-of-segment predicate for successive decoding.
    fn detect_end_of_segment(
        &mut self,
        _id: InstanceId,
        _instance: &DecodeInstance,
        _frame: usize,
    ) -> bool {
        false
    }

    /// Closes the trellis at natural end of input.
    fn trellis_finalize(
        &mut self,
        id: InstanceId,
        instance: &DecodeInstance,
        stream: &FeatureStream,
        frame_count: usize,
    );

    /// Extracts and stores the best path over `frame_count` frames.
    fn finalize_best_path(
        &mut self,
        id: InstanceId,
        instance: &DecodeInstance,
        frame_count: usize,
    ) -> Result<()>;
}

impl<E: SearchEngine + ?Sized> SearchEngine for Box<E> {
    fn trellis_init(
        &mut self,
        id: InstanceId,
        instance: &DecodeInstance,
        stream: &FeatureStream,
    ) -> Result<()> {
        (**self).trellis_init(id, instance, stream)
    }

    fn trellis_step(
        &mut self,
        id: InstanceId,
        instance: &DecodeInstance,
        stream: &FeatureStream,
        frame: usize,
    ) -> StepReport {
        (**self).trellis_step(id, instance, stream, frame)
    }

    fn detect_end_of_segment(
        &mut self,
        id: InstanceId,
        instance: &DecodeInstance,
        frame: usize,
    ) -> bool {
        (**self).detect_end_of_segment(id, instance, frame)
    }

    fn trellis_finalize(
        &mut self,
        id: InstanceId,
        instance: &DecodeInstance,
        stream: &FeatureStream,
        frame_count: usize,
    ) {
        (**self).trellis_finalize(id, instance, stream, frame_count)
    }

    fn finalize_best_path(
        &mut self,
        id: InstanceId,
        instance: &DecodeInstance,
        frame_count: usize,
    ) -> Result<()> {
        (**self).finalize_best_path(id, instance, frame_count)
    }
}

/// A call observed by [`MockSearchEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCall {
    Init { instance: String },
    Step { instance: String, frame: usize },
    EndOfSegment { instance: String, frame: usize },
    Finalize { instance: String, frame_count: usize },
    BestPath { instance: String, frame_count: usize },
}

/// Scripted search engine for tests. Behaviour is keyed by instance name.
#[derive(Debug, Clone, Default)]
pub struct MockSearchEngine {
    init_failures: HashSet<String>,
    exhaust_at: HashMap<String, usize>,
    end_of_segment_at: HashMap<String, usize>,
    speech_from: HashMap<String, usize>,
    best_path_failures: HashSet<String>,
    interim_every: Option<usize>,
    calls: Vec<SearchCall>,
}

impl MockSearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// `trellis_init` fails for this instance.
    pub fn with_init_failure(mut self, instance: &str) -> Self {
        self.init_failures.insert(instance.to_string());
        self
    }

    /// `trellis_step` reports termination from `frame` onwards.
    pub fn exhausting_at(mut self, instance: &str, frame: usize) -> Self {
        self.exhaust_at.insert(instance.to_string(), frame);
        self
    }

    /// `detect_end_of_segment` fires from `frame` onwards.
    pub fn with_end_of_segment_at(mut self, instance: &str, frame: usize) -> Self {
        self.end_of_segment_at.insert(instance.to_string(), frame);
        self
    }

    /// Speech is reported on every frame from `frame` onwards.
    pub fn with_speech_from(mut self, instance: &str, frame: usize) -> Self {
        self.speech_from.insert(instance.to_string(), frame);
        self
    }

    /// Report an interim hypothesis on every `every`-th frame.
    pub fn with_interim_every(mut self, every: usize) -> Self {
        self.interim_every = Some(every.max(1));
        self
    }

    /// `finalize_best_path` fails for this instance.
    pub fn with_best_path_failure(mut self, instance: &str) -> Self {
        self.best_path_failures.insert(instance.to_string());
        self
    }

    pub fn calls(&self) -> &[SearchCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Frames stepped for an instance, in call order.
    pub fn stepped_frames(&self, instance: &str) -> Vec<usize> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                SearchCall::Step { instance: name, frame } if name == instance => Some(*frame),
                _ => None,
            })
            .collect()
    }

    /// Frame counts passed to best-path finalization, per instance in call order.
    pub fn best_paths(&self) -> Vec<(String, usize)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                SearchCall::BestPath {
                    instance,
                    frame_count,
                } => Some((instance.clone(), *frame_count)),
                _ => None,
            })
            .collect()
    }

    /// Frame counts passed to trellis finalization, per instance in call order.
    pub fn finalized(&self) -> Vec<(String, usize)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                SearchCall::Finalize {
                    instance,
                    frame_count,
                } => Some((instance.clone(), *frame_count)),
                _ => None,
            })
            .collect()
    }
}

impl SearchEngine for MockSearchEngine {
    fn trellis_init(
        &mut self,
        _id: InstanceId,
        instance: &DecodeInstance,
        _stream: &FeatureStream,
    ) -> Result<()> {
        self.calls.push(SearchCall::Init {
            instance: instance.name().to_string(),
        });
        if self.init_failures.contains(instance.name()) {
            return Err(FramestepError::Other("mock trellis allocation failure".to_string()));
        }
        Ok(())
    }

    fn trellis_step(
        &mut self,
        _id: InstanceId,
        instance: &DecodeInstance,
        _stream: &FeatureStream,
        frame: usize,
    ) -> StepReport {
        let name = instance.name();
        self.calls.push(SearchCall::Step {
            instance: name.to_string(),
            frame,
        });
        StepReport {
            terminated: self.exhaust_at.get(name).is_some_and(|&at| frame >= at),
            speech_detected: self.speech_from.get(name).is_some_and(|&at| frame >= at),
            interim: self
                .interim_every
                .is_some_and(|every| frame > 0 && frame % every == 0),
        }
    }

    fn detect_end_of_segment(
        &mut self,
        _id: InstanceId,
        instance: &DecodeInstance,
        frame: usize,
    ) -> bool {
        let name = instance.name();
        self.calls.push(SearchCall::EndOfSegment {
            instance: name.to_string(),
            frame,
        });
        self.end_of_segment_at
            .get(name)
            .is_some_and(|&at| frame >= at)
    }

    fn trellis_finalize(
        &mut self,
        _id: InstanceId,
        instance: &DecodeInstance,
        _stream: &FeatureStream,
        frame_count: usize,
    ) {
        self.calls.push(SearchCall::Finalize {
            instance: instance.name().to_string(),
            frame_count,
        });
    }

    fn finalize_best_path(
        &mut self,
        _id: InstanceId,
        instance: &DecodeInstance,
        frame_count: usize,
    ) -> Result<()> {
        self.calls.push(SearchCall::BestPath {
            instance: instance.name().to_string(),
            frame_count,
        });
        if self.best_path_failures.contains(instance.name()) {
            return Err(FramestepError::SearchFailed {
                instance: instance.name().to_string(),
                message: "mock best path failure".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::stream::{FeatureFrame, StreamId};

    fn fixture() -> (DecodeInstance, FeatureStream) {
        (
            DecodeInstance::new("digits", StreamId(0)),
            FeatureStream::with_frames("mic", vec![FeatureFrame::default(); 4]),
        )
    }

    #[test]
    fn test_mock_records_calls_in_order() {
        let (instance, stream) = fixture();
        let mut engine = MockSearchEngine::new();
        let id = InstanceId(0);

        engine.trellis_init(id, &instance, &stream).unwrap();
        engine.trellis_step(id, &instance, &stream, 1);
        engine.trellis_finalize(id, &instance, &stream, 2);
        engine.finalize_best_path(id, &instance, 2).unwrap();

        assert_eq!(
            engine.calls(),
            &[
                SearchCall::Init {
                    instance: "digits".to_string()
                },
                SearchCall::Step {
                    instance: "digits".to_string(),
                    frame: 1
                },
                SearchCall::Finalize {
                    instance: "digits".to_string(),
                    frame_count: 2
                },
                SearchCall::BestPath {
                    instance: "digits".to_string(),
                    frame_count: 2
                },
            ]
        );
    }

    #[test]
    fn test_mock_scripted_termination_and_speech() {
        let (instance, stream) = fixture();
        let mut engine = MockSearchEngine::new()
            .exhausting_at("digits", 3)
            .with_speech_from("digits", 2);
        let id = InstanceId(0);

        let early = engine.trellis_step(id, &instance, &stream, 1);
        assert_eq!(early, StepReport::proceed());

        let speech = engine.trellis_step(id, &instance, &stream, 2);
        assert!(speech.speech_detected);
        assert!(!speech.terminated);

        let late = engine.trellis_step(id, &instance, &stream, 3);
        assert!(late.terminated);
    }

    #[test]
    fn test_mock_init_and_best_path_failures() {
        let (instance, stream) = fixture();
        let mut engine = MockSearchEngine::new()
            .with_init_failure("digits")
            .with_best_path_failure("digits");
        let id = InstanceId(0);

        assert!(engine.trellis_init(id, &instance, &stream).is_err());
        assert!(engine.finalize_best_path(id, &instance, 3).is_err());
    }

    #[test]
    fn test_mock_interim_skips_frame_zero() {
        let (instance, stream) = fixture();
        let mut engine = MockSearchEngine::new().with_interim_every(2);
        let id = InstanceId(0);

        assert!(!engine.trellis_step(id, &instance, &stream, 0).interim);
        assert!(!engine.trellis_step(id, &instance, &stream, 1).interim);
        assert!(engine.trellis_step(id, &instance, &stream, 2).interim);
    }

    #[test]
    fn test_boxed_engine_delegates() {
        let (instance, stream) = fixture();
        let mut engine: Box<MockSearchEngine> =
            Box::new(MockSearchEngine::new().with_end_of_segment_at("digits", 2));
        let id = InstanceId(0);

        assert!(!engine.detect_end_of_segment(id, &instance, 1));
        assert!(engine.detect_end_of_segment(id, &instance, 2));
        engine.trellis_step(id, &instance, &stream, 0);
        assert_eq!(engine.stepped_frames("digits"), vec![0]);
    }
}
