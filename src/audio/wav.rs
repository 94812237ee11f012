//! WAV input for batch decoding.

use crate::error::{FramestepError, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Reads a whole WAV stream as mono PCM at `target_rate`.
///
/// Stereo input is downmixed by averaging; other rates are linearly resampled.
pub fn load_wav<R: Read>(reader: R, target_rate: u32) -> Result<Vec<i16>> {
    let mut wav_reader = hound::WavReader::new(reader).map_err(|e| FramestepError::AudioInput {
        message: format!("Failed to parse WAV file: {}", e),
    })?;

    let spec = wav_reader.spec();
    let raw_samples: Vec<i16> = wav_reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| FramestepError::AudioInput {
            message: format!("Failed to read WAV samples: {}", e),
        })?;

    let mono = downmix(raw_samples, spec.channels);
    Ok(resample(&mono, spec.sample_rate, target_rate))
}

/// Opens and reads a WAV file from disk.
pub fn load_wav_file(path: &Path, target_rate: u32) -> Result<Vec<i16>> {
    let file = File::open(path).map_err(|e| FramestepError::AudioInput {
        message: format!("Failed to open {}: {}", path.display(), e),
    })?;
    load_wav(BufReader::new(file), target_rate)
}

fn downmix(samples: Vec<i16>, channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples;
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .filter_map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            match (samples.get(source_idx), samples.get(source_idx + 1)) {
                (Some(&left), Some(&right)) => {
                    let left = left as f64;
                    let right = right as f64;
                    Some((left + (right - left) * fraction) as i16)
                }
                (Some(&last), None) => Some(last),
                _ => None,
            }
        })
        .collect()
}
