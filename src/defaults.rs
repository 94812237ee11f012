//! Default configuration constants for framestep.
//!
//! Shared by the config layer, the reference collaborators and the CLI so the
//! numbers only live in one place.

/// Default audio sample rate in Hz.
pub const SAMPLE_RATE: u32 = 16000;

/// Default analysis window length in samples (25ms at 16kHz).
pub const FRAME_SIZE: u32 = 400;

/// Default frame shift in samples (10ms at 16kHz).
///
/// One frame shift is one scheduling step, so this also fixes the
/// millisecond length of a frame for the short-input check.
pub const FRAME_SHIFT: u32 = 160;

/// Default RMS threshold for the energy VAD and endpoint search (0.0 to 1.0).
pub const SPEECH_THRESHOLD: f32 = 0.02;

/// Default silence duration before the VAD reports end of speech.
pub const VAD_SILENCE_MS: u32 = 800;

/// Default trailing-silence hangover before an endpoint search gives up.
pub const HANGOVER_MS: u32 = 500;

/// Default number of speech frames between interim hypotheses.
pub const INTERIM_EVERY: u32 = 20;

/// Frames kept before the cut point when carrying input into the next segment.
///
/// Matches roughly 100ms at the default frame shift, enough to keep a soft
/// onset that straddles the boundary.
pub const CARRY_OVER_MARGIN_FRAMES: usize = 10;

/// Default bounded channel capacity for the streaming feeder station.
pub const FEEDER_CHANNEL_CAPACITY: usize = 256;

/// Name given to the stream built by the CLI.
pub const DEFAULT_STREAM_NAME: &str = "input";

/// Name given to the instance built when the config lists none.
pub const DEFAULT_INSTANCE_NAME: &str = "default";

/// Convert a frame count into milliseconds for a given shift and sample rate.
pub fn frames_to_ms(frames: usize, frame_shift: u32, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    frames as u64 * frame_shift as u64 * 1000 / sample_rate as u64
}

/// Convert milliseconds into a whole number of frames (rounded up, at least one).
pub fn ms_to_frames(ms: u32, frame_shift: u32, sample_rate: u32) -> usize {
    if frame_shift == 0 {
        return 1;
    }
    let samples = ms as u64 * sample_rate as u64 / 1000;
    (samples.div_ceil(frame_shift as u64) as usize).max(1)
}
