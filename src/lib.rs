//! framestep - Frame-synchronous decode scheduler
//!
//! Drives several recognition instances over shared feature streams in
//! lockstep, one frame per cycle, and decides when a pass ends and which
//! results are published.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod app;
pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod decode;
pub mod defaults;
pub mod endpoint;
pub mod error;

// Scheduler core
pub use decode::{
    DecodeInstance, DecodeScheduler, EngineContext, FeatureFrame, FeatureStream, InstanceId,
    PassEnd, PassReport, ResultStatus, SchedulerOptions, SearchEngine, StepOutcome, StreamId,
};

// Streaming
pub use decode::{FeedEvent, FeedMessage, FeederStation, FrameFeeder};

// Collaborators
pub use audio::vad::EnergyVad;
pub use endpoint::{EndpointSearch, Utterance};

// Error handling
pub use error::{FramestepError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }
}
