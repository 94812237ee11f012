use crate::audio::framer::Framer;
use crate::audio::vad::VadConfig;
use crate::decode::context::SchedulerOptions;
use crate::decode::instance::DecodeInstance;
use crate::decode::stream::StreamId;
use crate::defaults;
use crate::endpoint::EndpointProfile;
use crate::error::{FramestepError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub audio: AudioConfig,
    pub vad: VadSection,
    pub instances: Vec<InstanceConfig>,
}

/// Pass-level scheduler behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub explicit_segmentation: bool,
    /// Minimum input length in milliseconds; 0 disables the check.
    pub reject_short_ms: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_power: Option<f64>,
    pub carry_over_margin_frames: usize,
}

/// Framing of the input signal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub frame_size: u32,
    pub frame_shift: u32,
}

/// Energy VAD used for explicit segmentation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VadSection {
    pub enabled: bool,
    pub speech_threshold: f32,
    pub silence_duration_ms: u32,
}

/// One decode instance on the input stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InstanceConfig {
    pub name: String,
    pub live: bool,
    pub speech_threshold: f32,
    pub hangover_ms: u32,
    pub interim_every: u32,
    pub successive_decoding: bool,
    pub multipath: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            explicit_segmentation: false,
            reject_short_ms: 0,
            reject_power: None,
            carry_over_margin_frames: defaults::CARRY_OVER_MARGIN_FRAMES,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            frame_size: defaults::FRAME_SIZE,
            frame_shift: defaults::FRAME_SHIFT,
        }
    }
}

impl Default for VadSection {
    fn default() -> Self {
        Self {
            enabled: true,
            speech_threshold: defaults::SPEECH_THRESHOLD,
            silence_duration_ms: defaults::VAD_SILENCE_MS,
        }
    }
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            name: defaults::DEFAULT_INSTANCE_NAME.to_string(),
            live: true,
            speech_threshold: defaults::SPEECH_THRESHOLD,
            hangover_ms: defaults::HANGOVER_MS,
            interim_every: defaults::INTERIM_EVERY,
            successive_decoding: false,
            multipath: false,
        }
    }
}

impl InstanceConfig {
    /// Builds the instance bound to `stream`.
    pub fn to_instance(&self, stream: StreamId) -> DecodeInstance {
        DecodeInstance::new(&self.name, stream)
            .with_live(self.live)
            .with_successive_decoding(self.successive_decoding)
            .with_multipath(self.multipath)
    }

    pub fn endpoint_profile(&self, audio: &AudioConfig) -> EndpointProfile {
        EndpointProfile {
            speech_threshold: self.speech_threshold,
            hangover_frames: defaults::ms_to_frames(
                self.hangover_ms,
                audio.frame_shift,
                audio.sample_rate,
            ),
            interim_every: self.interim_every as usize,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FramestepError::ConfigFileNotFound {
                path: path.display().to_string(),
            },
            _ => FramestepError::Io(e),
        })?;
        Ok(Self::from_toml_str(&contents)?)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only a missing file falls back to defaults; invalid TOML is an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if matches!(
                    e.downcast_ref::<FramestepError>(),
                    Some(FramestepError::ConfigFileNotFound { .. })
                ) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - FRAMESTEP_SEGMENT → scheduler.explicit_segmentation (1/0, true/false, yes/no)
    /// - FRAMESTEP_REJECT_SHORT_MS → scheduler.reject_short_ms
    ///
    /// Empty or unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var("FRAMESTEP_SEGMENT")
            && let Some(flag) = parse_flag(&value)
        {
            self.scheduler.explicit_segmentation = flag;
        }

        if let Ok(value) = std::env::var("FRAMESTEP_REJECT_SHORT_MS")
            && let Ok(ms) = value.trim().parse::<u32>()
        {
            self.scheduler.reject_short_ms = ms;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/framestep/config.toml on Linux, or a relative
    /// `framestep/config.toml` when no config directory is known.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_default()
            .join("framestep")
            .join("config.toml")
    }

    /// Checks values the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", "must be greater than 0"));
        }
        if self.audio.frame_shift == 0 {
            return Err(invalid("audio.frame_shift", "must be greater than 0"));
        }
        if self.audio.frame_size < self.audio.frame_shift {
            return Err(invalid(
                "audio.frame_size",
                "must not be smaller than audio.frame_shift",
            ));
        }
        if let Some(power) = self.scheduler.reject_power
            && !(power.is_finite() && power >= 0.0)
        {
            return Err(invalid(
                "scheduler.reject_power",
                "must be a non-negative number",
            ));
        }
        if !(0.0..=1.0).contains(&self.vad.speech_threshold) {
            return Err(invalid("vad.speech_threshold", "must be between 0.0 and 1.0"));
        }
        for (index, instance) in self.instances.iter().enumerate() {
            if instance.name.trim().is_empty() {
                return Err(invalid(&format!("instances[{index}].name"), "must not be empty"));
            }
            if !(0.0..=1.0).contains(&instance.speech_threshold) {
                return Err(invalid(
                    &format!("instances[{index}].speech_threshold"),
                    "must be between 0.0 and 1.0",
                ));
            }
        }
        Ok(())
    }

    /// Instances to build; a single default instance when none are listed.
    pub fn effective_instances(&self) -> Vec<InstanceConfig> {
        if self.instances.is_empty() {
            vec![InstanceConfig::default()]
        } else {
            self.instances.clone()
        }
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            explicit_segmentation: self.scheduler.explicit_segmentation,
            reject_short_ms: Some(self.scheduler.reject_short_ms).filter(|&ms| ms > 0),
            reject_power: self.scheduler.reject_power,
            frame_shift: self.audio.frame_shift,
            sample_rate: self.audio.sample_rate,
        }
    }

    pub fn vad_config(&self) -> VadConfig {
        VadConfig {
            speech_threshold: self.vad.speech_threshold,
            silence_frames: defaults::ms_to_frames(
                self.vad.silence_duration_ms,
                self.audio.frame_shift,
                self.audio.sample_rate,
            ),
        }
    }

    pub fn framer(&self) -> Framer {
        Framer::new(self.audio.frame_size, self.audio.frame_shift)
    }
}

fn invalid(key: &str, message: &str) -> FramestepError {
    FramestepError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
