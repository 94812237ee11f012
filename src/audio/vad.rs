//! Voice Activity Detection (VAD) module.
//!
//! Detects speech activity frame by frame using RMS-based thresholding and a
//! state machine that waits out short silence intervals. Time is counted in
//! frames, so the detector runs in lockstep with the decode scheduler.

use crate::decode::context::{VadDecision, VoiceActivityDetector};
use crate::decode::stream::FeatureFrame;
use crate::defaults;

/// Configuration for Voice Activity Detection.
#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    /// RMS threshold for detecting speech (0.0 to 1.0).
    pub speech_threshold: f32,
    /// Silent frames before speech is considered ended.
    pub silence_frames: usize,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            speech_threshold: defaults::SPEECH_THRESHOLD,
            silence_frames: defaults::ms_to_frames(
                defaults::VAD_SILENCE_MS,
                defaults::FRAME_SHIFT,
                defaults::SAMPLE_RATE,
            ),
        }
    }
}

/// Current state of voice activity detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    /// No speech detected.
    Idle,
    /// Speech is being detected.
    Speaking,
    /// Silence detected, waiting to confirm speech end.
    MaybeSilence,
    /// Speech has ended.
    Stopped,
}

/// Events emitted by the VAD processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    /// Speech has started.
    SpeechStart,
    /// Ongoing speech detected.
    Speech,
    /// Silence detected.
    Silence,
    /// Speech has ended.
    SpeechEnd,
}

impl From<VadEvent> for VadDecision {
    fn from(event: VadEvent) -> Self {
        VadDecision {
            speech: matches!(event, VadEvent::SpeechStart | VadEvent::Speech),
            end_of_speech: event == VadEvent::SpeechEnd,
        }
    }
}

/// Frame-clocked energy VAD.
#[derive(Debug, Clone)]
pub struct EnergyVad {
    config: VadConfig,
    state: VadState,
    silent_frames: usize,
}

impl EnergyVad {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            state: VadState::Idle,
            silent_frames: 0,
        }
    }

    /// Advances the state machine by one frame with the given RMS level.
    pub fn process_level(&mut self, level: f32) -> VadEvent {
        let is_speech = level > self.config.speech_threshold;

        match self.state {
            VadState::Idle => {
                if is_speech {
                    self.state = VadState::Speaking;
                    self.silent_frames = 0;
                    VadEvent::SpeechStart
                } else {
                    VadEvent::Silence
                }
            }
            VadState::Speaking | VadState::MaybeSilence if is_speech => {
                self.state = VadState::Speaking;
                self.silent_frames = 0;
                VadEvent::Speech
            }
            VadState::Speaking | VadState::MaybeSilence => {
                self.state = VadState::MaybeSilence;
                self.silent_frames += 1;
                if self.silent_frames >= self.config.silence_frames {
                    self.state = VadState::Stopped;
                    self.silent_frames = 0;
                    VadEvent::SpeechEnd
                } else {
                    VadEvent::Silence
                }
            }
            VadState::Stopped => VadEvent::Silence,
        }
    }

    /// Returns the current VAD state.
    pub fn state(&self) -> VadState {
        self.state
    }

    /// Resets the VAD to idle state.
    pub fn reset(&mut self) {
        self.state = VadState::Idle;
        self.silent_frames = 0;
    }
}

impl VoiceActivityDetector for EnergyVad {
    fn process_frame(&mut self, frame: &FeatureFrame) -> VadDecision {
        self.process_level(frame.level).into()
    }

    fn end_of_utterance(&mut self) {
        self.reset();
    }
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// Returns a normalized value: 0.0 is silence, ~0.707 a full-scale sine wave,
/// 1.0 maximum amplitude.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEECH: f32 = 0.09;
    const SILENCE: f32 = 0.0;

    fn vad(silence_frames: usize) -> EnergyVad {
        EnergyVad::new(VadConfig {
            speech_threshold: 0.02,
            silence_frames,
        })
    }

    #[test]
    fn test_rms_silence_is_zero() {
        assert_eq!(calculate_rms(&[0i16; 1000]), 0.0);
    }

    #[test]
    fn test_rms_max_amplitude() {
        let rms = calculate_rms(&[i16::MAX; 1000]);
        assert!((rms - 1.0).abs() < 0.001, "RMS should be ~1.0, got {}", rms);
    }

    #[test]
    fn test_rms_mixed_positive_negative() {
        let mut mixed = vec![1000i16; 500];
        mixed.extend(vec![-1000i16; 500]);
        let rms = calculate_rms(&mixed);
        // RMS of ±1000 should be around 1000/32767 ≈ 0.0305
        assert!(rms > 0.025 && rms < 0.035, "RMS should be ~0.0305, got {}", rms);
    }

    #[test]
    fn test_calculate_rms_empty_samples() {
        assert_eq!(calculate_rms(&[]), 0.0);
    }

    #[test]
    fn test_default_silence_frames() {
        // 800ms at 10ms per frame
        assert_eq!(VadConfig::default().silence_frames, 80);
    }

    #[test]
    fn test_vad_detects_speech_start() {
        let mut vad = vad(5);
        assert_eq!(vad.process_level(SILENCE), VadEvent::Silence);
        assert_eq!(vad.state(), VadState::Idle);

        assert_eq!(vad.process_level(SPEECH), VadEvent::SpeechStart);
        assert_eq!(vad.state(), VadState::Speaking);
        assert_eq!(vad.process_level(SPEECH), VadEvent::Speech);
    }

    #[test]
    fn test_vad_returns_to_speaking_if_speech_resumes() {
        let mut vad = vad(5);
        vad.process_level(SPEECH);
        vad.process_level(SILENCE);
        assert_eq!(vad.state(), VadState::MaybeSilence);

        assert_eq!(vad.process_level(SPEECH), VadEvent::Speech);
        assert_eq!(vad.state(), VadState::Speaking);
    }

    #[test]
    fn test_vad_ends_speech_after_silence_frames() {
        let mut vad = vad(3);
        vad.process_level(SPEECH);
        assert_eq!(vad.process_level(SILENCE), VadEvent::Silence);
        assert_eq!(vad.process_level(SILENCE), VadEvent::Silence);
        assert_eq!(vad.process_level(SILENCE), VadEvent::SpeechEnd);
        assert_eq!(vad.state(), VadState::Stopped);

        // Stopped stays silent until reset, even on speech.
        assert_eq!(vad.process_level(SPEECH), VadEvent::Silence);
    }

    #[test]
    fn test_vad_reset_returns_to_idle() {
        let mut vad = vad(3);
        vad.process_level(SPEECH);
        vad.reset();
        assert_eq!(vad.state(), VadState::Idle);
        assert_eq!(vad.process_level(SPEECH), VadEvent::SpeechStart);
    }

    #[test]
    fn test_detector_maps_events_to_decisions() {
        let mut vad = vad(1);
        let speech = FeatureFrame::default().with_level(SPEECH);
        let silence = FeatureFrame::default().with_level(SILENCE);

        assert_eq!(vad.process_frame(&silence), VadDecision::default());
        assert_eq!(
            vad.process_frame(&speech),
            VadDecision {
                speech: true,
                end_of_speech: false
            }
        );
        assert_eq!(
            vad.process_frame(&silence),
            VadDecision {
                speech: false,
                end_of_speech: true
            }
        );

        vad.end_of_utterance();
        assert_eq!(vad.state(), VadState::Idle);
    }
}
