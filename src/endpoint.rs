//! Energy endpointing search engine.
//!
//! A minimal [`SearchEngine`] that treats frames above a level threshold as
//! speech and gives up after a hangover of silence. Each best path is stored as
//! an [`Utterance`] with the speech span it covered. It stands in for a real
//! beam search when running the scheduler from the command line.

use crate::decode::instance::{DecodeInstance, InstanceId};
use crate::decode::search::{SearchEngine, StepReport};
use crate::decode::stream::FeatureStream;
use crate::defaults;
use crate::error::{FramestepError, Result};
use serde::Serialize;
use std::collections::HashMap;

/// Per-instance endpointing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointProfile {
    /// Frame RMS level above which a frame counts as speech.
    pub speech_threshold: f32,
    /// Silent frames after speech before the search terminates.
    pub hangover_frames: usize,
    /// Speech frames between interim hypotheses (0 disables them).
    pub interim_every: usize,
}

impl Default for EndpointProfile {
    fn default() -> Self {
        Self {
            speech_threshold: defaults::SPEECH_THRESHOLD,
            hangover_frames: defaults::ms_to_frames(
                defaults::HANGOVER_MS,
                defaults::FRAME_SHIFT,
                defaults::SAMPLE_RATE,
            ),
            interim_every: defaults::INTERIM_EVERY as usize,
        }
    }
}

impl EndpointProfile {
    /// Pause length that closes a segment under successive decoding.
    fn pause_frames(&self) -> usize {
        (self.hangover_frames / 2).max(1)
    }
}

/// Best path of one instance for one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Utterance {
    pub instance: String,
    /// First speech frame, `None` when the pass held no speech.
    pub start_frame: Option<usize>,
    /// Last speech frame within the finalized range.
    pub end_frame: Option<usize>,
    /// Frames the best path was extracted over.
    pub frame_count: usize,
}

#[derive(Debug, Clone, Default)]
struct Track {
    speech_start: Option<usize>,
    last_speech: Option<usize>,
    speech_frames: usize,
    trailing_silence: usize,
    closed_at: Option<usize>,
}

#[derive(Debug, Default)]
pub struct EndpointSearch {
    profiles: HashMap<String, EndpointProfile>,
    default_profile: EndpointProfile,
    tracks: HashMap<InstanceId, Track>,
    utterances: Vec<Utterance>,
}

impl EndpointSearch {
    pub fn new(default_profile: EndpointProfile) -> Self {
        Self {
            default_profile,
            ..Self::default()
        }
    }

    /// Overrides the profile for instances named `instance`.
    pub fn with_profile(mut self, instance: &str, profile: EndpointProfile) -> Self {
        self.profiles.insert(instance.to_string(), profile);
        self
    }

    pub fn profile(&self, instance: &str) -> EndpointProfile {
        self.profiles
            .get(instance)
            .copied()
            .unwrap_or(self.default_profile)
    }

    /// Best paths stored so far, in finalization order.
    pub fn utterances(&self) -> &[Utterance] {
        &self.utterances
    }

    /// Hands out the stored best paths and forgets them.
    pub fn take_utterances(&mut self) -> Vec<Utterance> {
        std::mem::take(&mut self.utterances)
    }
}

impl SearchEngine for EndpointSearch {
    fn trellis_init(
        &mut self,
        id: InstanceId,
        instance: &DecodeInstance,
        stream: &FeatureStream,
    ) -> Result<()> {
        let has_features = stream
            .frame(0)
            .is_some_and(|frame| !frame.features.is_empty());
        if !has_features {
            return Err(FramestepError::Other(format!(
                "stream {} has no features on its first frame",
                stream.name()
            )));
        }
        tracing::trace!(instance = instance.name(), "endpoint trellis initialized");
        self.tracks.insert(id, Track::default());
        Ok(())
    }

    fn trellis_step(
        &mut self,
        id: InstanceId,
        instance: &DecodeInstance,
        stream: &FeatureStream,
        frame: usize,
    ) -> StepReport {
        let profile = self.profile(instance.name());
        let level = stream.frame(frame).map_or(0.0, |f| f.level);
        let track = self.tracks.entry(id).or_default();

        if level > profile.speech_threshold {
            track.speech_start.get_or_insert(frame);
            track.last_speech = Some(frame);
            track.speech_frames += 1;
            track.trailing_silence = 0;
            return StepReport {
                terminated: false,
                speech_detected: true,
                interim: profile.interim_every > 0
                    && track.speech_frames % profile.interim_every == 0,
            };
        }

        if track.speech_start.is_none() {
            return StepReport::proceed();
        }
        track.trailing_silence += 1;
        StepReport {
            terminated: track.trailing_silence >= profile.hangover_frames,
            ..StepReport::default()
        }
    }

    fn detect_end_of_segment(
        &mut self,
        id: InstanceId,
        instance: &DecodeInstance,
        frame: usize,
    ) -> bool {
        let pause = self.profile(instance.name()).pause_frames();
        self.tracks.get(&id).is_some_and(|track| {
            track
                .last_speech
                .is_some_and(|last| frame >= last + pause && track.trailing_silence >= pause)
        })
    }

    fn trellis_finalize(
        &mut self,
        id: InstanceId,
        _instance: &DecodeInstance,
        _stream: &FeatureStream,
        frame_count: usize,
    ) {
        if let Some(track) = self.tracks.get_mut(&id) {
            track.closed_at = Some(frame_count);
        }
    }

    fn finalize_best_path(
        &mut self,
        id: InstanceId,
        instance: &DecodeInstance,
        frame_count: usize,
    ) -> Result<()> {
        let track = self
            .tracks
            .remove(&id)
            .ok_or_else(|| FramestepError::SearchFailed {
                instance: instance.name().to_string(),
                message: "trellis was never initialized".to_string(),
            })?;

        let limit = track.closed_at.unwrap_or(frame_count).min(frame_count);
        let start_frame = track.speech_start.filter(|&start| start < limit);
        let end_frame = start_frame.and(
            track
                .last_speech
                .map(|last| last.min(limit.saturating_sub(1))),
        );

        self.utterances.push(Utterance {
            instance: instance.name().to_string(),
            start_frame,
            end_frame,
            frame_count,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::stream::{FeatureFrame, StreamId};

    fn stream(levels: &[f32]) -> FeatureStream {
        FeatureStream::with_frames(
            "mic",
            levels
                .iter()
                .map(|&level| FeatureFrame::new(vec![0.0]).with_level(level))
                .collect(),
        )
    }

    fn profile(hangover_frames: usize, interim_every: usize) -> EndpointProfile {
        EndpointProfile {
            speech_threshold: 0.1,
            hangover_frames,
            interim_every,
        }
    }

    #[test]
    fn test_default_hangover_in_frames() {
        // 500ms at 10ms per frame
        assert_eq!(EndpointProfile::default().hangover_frames, 50);
    }

    #[test]
    fn test_terminates_after_hangover() {
        let levels = [0.0, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0];
        let stream = stream(&levels);
        let instance = DecodeInstance::new("a", StreamId(0));
        let id = InstanceId(0);
        let mut search = EndpointSearch::new(profile(3, 0));
        search.trellis_init(id, &instance, &stream).unwrap();

        let reports: Vec<_> = (1..levels.len())
            .map(|frame| search.trellis_step(id, &instance, &stream, frame))
            .collect();
        assert!(reports[0].speech_detected);
        assert!(!reports[2].terminated);
        assert!(!reports[3].terminated);
        assert!(reports[4].terminated);
    }

    #[test]
    fn test_leading_silence_never_terminates() {
        let stream = stream(&[0.0; 20]);
        let instance = DecodeInstance::new("a", StreamId(0));
        let mut search = EndpointSearch::new(profile(2, 0));
        search.trellis_init(InstanceId(0), &instance, &stream).unwrap();
        for frame in 1..20 {
            assert_eq!(
                search.trellis_step(InstanceId(0), &instance, &stream, frame),
                StepReport::proceed()
            );
        }
    }

    #[test]
    fn test_interim_every_n_speech_frames() {
        let stream = stream(&[0.5; 8]);
        let instance = DecodeInstance::new("a", StreamId(0));
        let mut search = EndpointSearch::new(profile(3, 3));
        search.trellis_init(InstanceId(0), &instance, &stream).unwrap();
        let interim: Vec<_> = (1..8)
            .map(|frame| search.trellis_step(InstanceId(0), &instance, &stream, frame).interim)
            .collect();
        assert_eq!(interim, vec![false, false, true, false, false, true, false]);
    }

    #[test]
    fn test_profiles_are_per_instance_name() {
        let search = EndpointSearch::new(profile(3, 0)).with_profile("loose", profile(9, 0));
        assert_eq!(search.profile("loose").hangover_frames, 9);
        assert_eq!(search.profile("other").hangover_frames, 3);
    }

    #[test]
    fn test_end_of_segment_after_pause() {
        let levels = [0.0, 0.5, 0.5, 0.0, 0.0, 0.0];
        let stream = stream(&levels);
        let instance = DecodeInstance::new("a", StreamId(0));
        let id = InstanceId(0);
        let mut search = EndpointSearch::new(profile(4, 0));
        search.trellis_init(id, &instance, &stream).unwrap();

        for frame in 1..=3 {
            search.trellis_step(id, &instance, &stream, frame);
        }
        assert!(!search.detect_end_of_segment(id, &instance, 3));
        search.trellis_step(id, &instance, &stream, 4);
        assert!(search.detect_end_of_segment(id, &instance, 4));
    }

    #[test]
    fn test_best_path_records_speech_span() {
        let stream = stream(&[0.0, 0.0, 0.5, 0.5, 0.5, 0.0, 0.0]);
        let instance = DecodeInstance::new("a", StreamId(0));
        let id = InstanceId(0);
        let mut search = EndpointSearch::new(profile(10, 0));
        search.trellis_init(id, &instance, &stream).unwrap();
        for frame in 1..7 {
            search.trellis_step(id, &instance, &stream, frame);
        }
        search.trellis_finalize(id, &instance, &stream, 7);
        search.finalize_best_path(id, &instance, 7).unwrap();

        assert_eq!(
            search.take_utterances(),
            vec![Utterance {
                instance: "a".to_string(),
                start_frame: Some(2),
                end_frame: Some(4),
                frame_count: 7,
            }]
        );
        assert!(search.utterances().is_empty());
    }

    #[test]
    fn test_best_path_without_init_fails() {
        let instance = DecodeInstance::new("a", StreamId(0));
        let mut search = EndpointSearch::default();
        let err = search.finalize_best_path(InstanceId(0), &instance, 5).unwrap_err();
        assert!(matches!(err, FramestepError::SearchFailed { .. }));
    }

    #[test]
    fn test_init_requires_features() {
        let stream = FeatureStream::with_frames("mic", vec![FeatureFrame::default()]);
        let instance = DecodeInstance::new("a", StreamId(0));
        let mut search = EndpointSearch::default();
        assert!(search.trellis_init(InstanceId(0), &instance, &stream).is_err());
    }
}
