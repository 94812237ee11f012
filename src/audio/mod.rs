//! Audio input: WAV loading, framing and voice activity detection.

pub mod framer;
pub mod vad;
pub mod wav;

pub use framer::Framer;
pub use vad::{EnergyVad, VadConfig, VadEvent, VadState, calculate_rms};
pub use wav::{load_wav, load_wav_file};
