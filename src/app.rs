//! Composition root: builds an engine context from configuration and decodes
//! a buffer of PCM samples in batch or streaming mode.

use crate::audio::vad::EnergyVad;
use crate::config::Config;
use crate::decode::context::EngineContext;
use crate::decode::feeder::{FeedEvent, FeedMessage, FeederStation, FrameFeeder};
use crate::decode::report::{PassEnd, PassReport};
use crate::decode::scheduler::DecodeScheduler;
use crate::decode::segment::CarryOverFinalizer;
use crate::decode::stream::{FeatureFrame, FeatureStream, StreamId};
use crate::defaults;
use crate::endpoint::{EndpointProfile, EndpointSearch, Utterance};
use crate::error::{FramestepError, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Everything one decode run produced.
#[derive(Debug, Clone, Serialize)]
pub struct DecodeSummary {
    /// Frames cut from the input.
    pub frames: usize,
    pub passes: Vec<PassReport>,
    /// Best paths in finalization order. Frame indices are relative to the
    /// pass that produced them.
    pub utterances: Vec<Utterance>,
}

impl DecodeSummary {
    pub fn published_passes(&self) -> usize {
        self.passes
            .iter()
            .filter(|report| report.published().next().is_some())
            .count()
    }
}

/// Builds the single-stream context and the endpoint search for `config`.
pub fn build_engine(
    config: &Config,
    frames: Vec<FeatureFrame>,
) -> Result<(EngineContext, EndpointSearch)> {
    config.validate()?;

    let mut ctx = EngineContext::new(config.scheduler_options());
    let stream = ctx.add_stream(FeatureStream::with_frames(
        defaults::DEFAULT_STREAM_NAME,
        frames,
    ));

    let mut search = EndpointSearch::new(EndpointProfile::default());
    for instance in config.effective_instances() {
        search = search.with_profile(&instance.name, instance.endpoint_profile(&config.audio));
        ctx.add_instance(instance.to_instance(stream))?;
    }

    if config.vad.enabled {
        ctx.attach_vad(Box::new(EnergyVad::new(config.vad_config())), stream)?;
    }

    Ok((ctx, search))
}

fn build_scheduler(config: &Config, search: EndpointSearch) -> DecodeScheduler<EndpointSearch> {
    DecodeScheduler::new(search).with_segment_finalizer(Box::new(CarryOverFinalizer::new(
        config.scheduler.carry_over_margin_frames,
    )))
}

/// Decodes a whole buffer, repeating passes while explicit segmentation
/// carries unconsumed input into the next segment.
pub fn decode_samples(config: &Config, samples: &[i16]) -> Result<DecodeSummary> {
    let frames = config.framer().frames(samples);
    let frame_count = frames.len();
    let (mut ctx, search) = build_engine(config, frames)?;
    let mut scheduler = build_scheduler(config, search);

    info!(frames = frame_count, "decoding buffered input");
    let mut passes = Vec::new();
    loop {
        let before = ctx.streams()[0].total_frames();
        let report = scheduler.run_to_completion(&mut ctx)?;
        let end = report.end;
        passes.push(report);

        if end == PassEnd::EndOfInput || !config.scheduler.explicit_segmentation {
            break;
        }
        let after = ctx.streams()[0].total_frames();
        if after == 0 {
            break;
        }
        if after >= before {
            warn!(frames = after, "segment made no progress, dropping remaining input");
            break;
        }
        debug!(carried = after, "starting next segment");
    }

    Ok(DecodeSummary {
        frames: frame_count,
        passes,
        utterances: scheduler.engine_mut().take_utterances(),
    })
}

/// Decodes a buffer by feeding frames one at a time through a feeder thread.
pub fn stream_samples(config: &Config, samples: &[i16]) -> Result<DecodeSummary> {
    let frames = config.framer().frames(samples);
    let frame_count = frames.len();
    let (ctx, search) = build_engine(config, Vec::new())?;
    let feeder = FrameFeeder::new(build_scheduler(config, search));
    let station = FeederStation::spawn(feeder, ctx, defaults::FEEDER_CHANNEL_CAPACITY);

    info!(frames = frame_count, "streaming input through feeder");
    let mut passes = Vec::new();
    let mut failure = None;
    let mut drain = |event: FeedEvent| match event {
        FeedEvent::Pass(report) => passes.push(report),
        FeedEvent::Interim(ids) => debug!(instances = ids.len(), "interim hypotheses"),
        FeedEvent::Failed(message) => {
            warn!(%message, "feeder reported a failure");
            if failure.is_none() {
                failure = Some(message);
            }
        }
    };

    for frame in frames {
        station.send(FeedMessage::Frame {
            stream: StreamId(0),
            frame,
        })?;
        while let Ok(event) = station.events().try_recv() {
            drain(event);
        }
    }
    station.send(FeedMessage::EndOfInput)?;
    while let Ok(event) = station.events().recv() {
        drain(event);
    }

    let (feeder, _ctx) = station.join()?;
    if let Some(message) = failure {
        return Err(FramestepError::Other(message));
    }

    Ok(DecodeSummary {
        frames: frame_count,
        passes,
        utterances: feeder.into_scheduler().into_engine().take_utterances(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::instance::ResultStatus;

    /// 10ms frames at 16kHz: `pattern` lists (amplitude, frames) runs.
    fn signal(pattern: &[(i16, usize)]) -> Vec<i16> {
        pattern
            .iter()
            .flat_map(|&(amplitude, frames)| {
                (0..frames * 160).map(move |i| if i % 2 == 0 { amplitude } else { -amplitude })
            })
            .collect()
    }

    #[test]
    fn test_batch_decode_without_segmentation_is_one_pass() {
        let samples = signal(&[(0, 20), (4000, 60), (0, 20)]);
        let mut config = Config::default();
        config.vad.enabled = false;

        let summary = decode_samples(&config, &samples).unwrap();
        assert_eq!(summary.frames, 100);
        assert_eq!(summary.passes.len(), 1);
        assert_eq!(summary.passes[0].end, PassEnd::EndOfInput);
        assert_eq!(summary.passes[0].status_of("default"), Some(ResultStatus::Ok));
        assert_eq!(summary.utterances.len(), 1);
        // Analysis windows reach 240 samples ahead, so onset shows up early.
        assert!(matches!(summary.utterances[0].start_frame, Some(18..=20)));
    }

    #[test]
    fn test_explicit_segmentation_splits_utterances() {
        let samples = signal(&[
            (0, 10),
            (4000, 40),
            (0, 100),
            (4000, 40),
            (0, 100),
        ]);
        let mut config = Config::default();
        config.scheduler.explicit_segmentation = true;

        let summary = decode_samples(&config, &samples).unwrap();
        assert!(summary.passes.len() >= 2, "got {:?}", summary.passes);
        assert!(summary.published_passes() >= 2);
    }

    #[test]
    fn test_silent_input_in_explicit_mode_is_only_silence() {
        let samples = signal(&[(0, 50)]);
        let mut config = Config::default();
        config.scheduler.explicit_segmentation = true;

        let summary = decode_samples(&config, &samples).unwrap();
        assert_eq!(summary.passes.len(), 1);
        assert_eq!(
            summary.passes[0].status_of("default"),
            Some(ResultStatus::RejectOnlySilence)
        );
    }

    #[test]
    fn test_streaming_matches_batch_for_single_pass() {
        let samples = signal(&[(0, 10), (4000, 30), (0, 10)]);
        let mut config = Config::default();
        config.vad.enabled = false;

        let batch = decode_samples(&config, &samples).unwrap();
        let streamed = stream_samples(&config, &samples).unwrap();
        assert_eq!(streamed.passes.len(), 1);
        assert_eq!(streamed.passes[0].end, batch.passes[0].end);
        assert_eq!(streamed.utterances, batch.utterances);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_decoding() {
        let mut config = Config::default();
        config.audio.sample_rate = 0;
        assert!(matches!(
            decode_samples(&config, &[0; 160]),
            Err(FramestepError::ConfigInvalidValue { .. })
        ));
    }
}
