//! Rejection pipeline shared by both finalization paths.
//!
//! Checks always run in the order of [`CHECK_ORDER`]; the first failing check
//! decides the status and nothing after it is evaluated.

use super::context::SchedulerOptions;
use super::instance::ResultStatus;
use super::stream::{FeatureStream, StreamId};
use crate::defaults;

/// One rejection criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCheck {
    NoInput,
    ShortInput,
    LowPower,
    OnlySilence,
}

impl RejectCheck {
    /// Status an instance ends with when this check fails.
    pub fn status(self) -> ResultStatus {
        match self {
            RejectCheck::NoInput => ResultStatus::FailNoInput,
            RejectCheck::ShortInput => ResultStatus::RejectShort,
            RejectCheck::LowPower => ResultStatus::RejectPower,
            RejectCheck::OnlySilence => ResultStatus::RejectOnlySilence,
        }
    }
}

pub const CHECK_ORDER: [RejectCheck; 4] = [
    RejectCheck::NoInput,
    RejectCheck::ShortInput,
    RejectCheck::LowPower,
    RejectCheck::OnlySilence,
];

/// Checks applied after a mid-pass segmentation.
pub const SEGMENTED_CHECKS: &[RejectCheck] = &[RejectCheck::ShortInput, RejectCheck::LowPower];

/// Where the no-input and short-input checks read their frame count from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCountSource {
    /// `last_consumed_frame` of the first stream in the context.
    FirstStream,
    /// Frames consumed so far by the given stream.
    Stream(StreamId),
}

impl FrameCountSource {
    pub fn frames(self, streams: &[FeatureStream]) -> usize {
        match self {
            FrameCountSource::FirstStream => streams
                .first()
                .and_then(FeatureStream::last_consumed_frame)
                .unwrap_or(0),
            FrameCountSource::Stream(id) => streams.get(id.0).map_or(0, FeatureStream::position),
        }
    }
}

/// Outcome of one run through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Verdict {
    /// Status of the first failing check, `None` when everything passed.
    pub rejected: Option<ResultStatus>,
    /// Checks that were actually evaluated, in order.
    pub evaluated: Vec<RejectCheck>,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.rejected.is_none()
    }
}

/// Thresholds the pipeline compares against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RejectionPolicy {
    short_ms: Option<u32>,
    power: Option<f64>,
    frame_shift: u32,
    sample_rate: u32,
}

impl RejectionPolicy {
    pub fn from_options(options: &SchedulerOptions) -> Self {
        Self {
            short_ms: options.reject_short_ms.filter(|&ms| ms > 0),
            power: options.reject_power,
            frame_shift: options.frame_shift,
            sample_rate: options.sample_rate,
        }
    }

    /// Runs the applicable `checks` in fixed order.
    ///
    /// Checks whose threshold is not configured are skipped without being
    /// recorded as evaluated.
    pub fn evaluate(
        &self,
        checks: &[RejectCheck],
        source: FrameCountSource,
        streams: &[FeatureStream],
        triggered: bool,
    ) -> Verdict {
        let mut verdict = Verdict::default();
        let frames = source.frames(streams);

        for check in CHECK_ORDER.iter().copied().filter(|c| checks.contains(c)) {
            let failed = match check {
                RejectCheck::NoInput => frames == 0,
                RejectCheck::ShortInput => match self.short_ms {
                    Some(threshold) => {
                        let ms =
                            defaults::frames_to_ms(frames, self.frame_shift, self.sample_rate);
                        ms < threshold as u64
                    }
                    None => continue,
                },
                RejectCheck::LowPower => match self.power {
                    Some(threshold) => any_stream_below(streams, threshold),
                    None => continue,
                },
                RejectCheck::OnlySilence => !triggered,
            };
            verdict.evaluated.push(check);
            if failed {
                verdict.rejected = Some(check.status());
                break;
            }
        }

        verdict
    }
}

/// One quiet channel is enough to reject. Streams without samples are not measured.
fn any_stream_below(streams: &[FeatureStream], threshold: f64) -> bool {
    streams
        .iter()
        .filter_map(FeatureStream::average_power)
        .any(|power| power < threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::stream::FeatureFrame;

    fn stream_with(frames: usize, consumed: usize, energy: f64) -> FeatureStream {
        let mut stream = FeatureStream::with_frames(
            "s",
            vec![FeatureFrame::default().with_energy(energy, 1); frames],
        );
        stream.rewind();
        for _ in 0..consumed {
            stream.advance();
        }
        stream
    }

    fn policy(short_ms: Option<u32>, power: Option<f64>) -> RejectionPolicy {
        RejectionPolicy::from_options(&SchedulerOptions {
            reject_short_ms: short_ms,
            reject_power: power,
            ..SchedulerOptions::default()
        })
    }

    #[test]
    fn test_no_input_wins_over_everything() {
        let streams = vec![stream_with(10, 0, 0.0)];
        let verdict = policy(Some(500), Some(1.0)).evaluate(
            &CHECK_ORDER,
            FrameCountSource::Stream(StreamId(0)),
            &streams,
            false,
        );
        assert_eq!(verdict.rejected, Some(ResultStatus::FailNoInput));
        assert_eq!(verdict.evaluated, vec![RejectCheck::NoInput]);
    }

    #[test]
    fn test_short_input_stops_before_power() {
        let streams = vec![stream_with(10, 10, 0.0)];
        let verdict = policy(Some(500), Some(1.0)).evaluate(
            &CHECK_ORDER,
            FrameCountSource::Stream(StreamId(0)),
            &streams,
            false,
        );
        assert_eq!(verdict.rejected, Some(ResultStatus::RejectShort));
        assert_eq!(
            verdict.evaluated,
            vec![RejectCheck::NoInput, RejectCheck::ShortInput]
        );
    }

    #[test]
    fn test_unconfigured_thresholds_are_skipped() {
        let streams = vec![stream_with(10, 10, 0.0)];
        let verdict = policy(None, None).evaluate(
            &CHECK_ORDER,
            FrameCountSource::Stream(StreamId(0)),
            &streams,
            false,
        );
        assert_eq!(verdict.rejected, Some(ResultStatus::RejectOnlySilence));
        assert_eq!(
            verdict.evaluated,
            vec![RejectCheck::NoInput, RejectCheck::OnlySilence]
        );
    }

    #[test]
    fn test_zero_short_threshold_means_disabled() {
        let streams = vec![stream_with(2, 2, 0.5)];
        let verdict = policy(Some(0), None).evaluate(
            SEGMENTED_CHECKS,
            FrameCountSource::FirstStream,
            &streams,
            true,
        );
        assert!(verdict.passed());
        assert!(verdict.evaluated.is_empty());
    }

    #[test]
    fn test_low_power_is_or_across_streams() {
        let streams = vec![stream_with(100, 100, 0.5), stream_with(100, 100, 0.001)];
        let verdict = policy(None, Some(0.01)).evaluate(
            &CHECK_ORDER,
            FrameCountSource::Stream(StreamId(0)),
            &streams,
            true,
        );
        assert_eq!(verdict.rejected, Some(ResultStatus::RejectPower));
    }

    #[test]
    fn test_loud_streams_pass_power_check() {
        let streams = vec![stream_with(100, 100, 0.5), stream_with(100, 100, 0.4)];
        let verdict = policy(None, Some(0.01)).evaluate(
            &CHECK_ORDER,
            FrameCountSource::Stream(StreamId(1)),
            &streams,
            true,
        );
        assert!(verdict.passed());
        assert_eq!(
            verdict.evaluated,
            vec![
                RejectCheck::NoInput,
                RejectCheck::LowPower,
                RejectCheck::OnlySilence
            ]
        );
    }

    #[test]
    fn test_first_stream_source_uses_last_consumed_frame() {
        let mut first = stream_with(100, 60, 0.5);
        first.mark_consumed_at_position();
        let second = stream_with(100, 5, 0.5);
        let streams = vec![first, second];

        assert_eq!(FrameCountSource::FirstStream.frames(&streams), 59);
        assert_eq!(FrameCountSource::Stream(StreamId(1)).frames(&streams), 5);
        assert_eq!(FrameCountSource::Stream(StreamId(9)).frames(&streams), 0);
    }

    #[test]
    fn test_first_stream_source_without_streams_is_zero() {
        assert_eq!(FrameCountSource::FirstStream.frames(&[]), 0);
    }

    #[test]
    fn test_check_status_mapping() {
        assert_eq!(RejectCheck::NoInput.status(), ResultStatus::FailNoInput);
        assert_eq!(RejectCheck::ShortInput.status(), ResultStatus::RejectShort);
        assert_eq!(RejectCheck::LowPower.status(), ResultStatus::RejectPower);
        assert_eq!(
            RejectCheck::OnlySilence.status(),
            ResultStatus::RejectOnlySilence
        );
    }
}
