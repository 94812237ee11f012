//! Cuts PCM into overlapping analysis frames.

use crate::audio::vad::calculate_rms;
use crate::decode::stream::FeatureFrame;
use crate::defaults;

/// Floor added before taking the log so silent frames stay finite.
const LOG_ENERGY_FLOOR: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framer {
    frame_size: usize,
    frame_shift: usize,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(defaults::FRAME_SIZE, defaults::FRAME_SHIFT)
    }
}

impl Framer {
    /// Zero sizes are raised to one sample.
    pub fn new(frame_size: u32, frame_shift: u32) -> Self {
        Self {
            frame_size: (frame_size as usize).max(1),
            frame_shift: (frame_shift as usize).max(1),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn frame_shift(&self) -> usize {
        self.frame_shift
    }

    /// Number of frames `frames` produces for `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        len.div_ceil(self.frame_shift)
    }

    /// One frame starts at every multiple of the shift. Windows near the end
    /// are shortened rather than padded.
    ///
    /// Each sample counts towards exactly one frame's power accumulators, so
    /// a stream built from these frames averages power over the whole input.
    pub fn frames(&self, samples: &[i16]) -> Vec<FeatureFrame> {
        (0..self.frame_count(samples.len()))
            .map(|index| {
                let start = index * self.frame_shift;
                let window_end = (start + self.frame_size).min(samples.len());
                let new_end = (start + self.frame_shift).min(samples.len());
                frame_from(&samples[start..window_end], &samples[start..new_end])
            })
            .collect()
    }
}

fn frame_from(window: &[i16], fresh: &[i16]) -> FeatureFrame {
    let level = calculate_rms(window);
    let mean_square = level as f64 * level as f64;
    let log_energy = (mean_square + LOG_ENERGY_FLOOR).ln() as f32;

    let energy: f64 = fresh
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    FeatureFrame::new(vec![log_energy])
        .with_level(level)
        .with_energy(energy, fresh.len() as u32)
}
