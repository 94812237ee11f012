//! Structured outcome of a finished pass.

use super::context::EngineContext;
use super::instance::{InstanceId, ResultStatus};
use serde::{Deserialize, Serialize};

/// How a pass came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassEnd {
    /// A termination signal cut the pass mid-stream.
    Segmented,
    /// The application asked to stop.
    Stopped,
    /// Every stream ran out of frames.
    EndOfInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSummary {
    pub name: String,
    /// Read position when the pass ended.
    pub consumed_frames: usize,
    pub last_consumed_frame: Option<usize>,
    pub total_frames: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub id: InstanceId,
    pub name: String,
    pub live: bool,
    pub triggered: bool,
    pub status: Option<ResultStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub end: PassEnd,
    pub streams: Vec<StreamSummary>,
    pub instances: Vec<InstanceSummary>,
}

impl PassReport {
    /// Snapshots stream and instance state at the end of a pass.
    pub fn capture(end: PassEnd, ctx: &EngineContext) -> Self {
        Self {
            end,
            streams: ctx
                .streams()
                .iter()
                .map(|stream| StreamSummary {
                    name: stream.name().to_string(),
                    consumed_frames: stream.position(),
                    last_consumed_frame: stream.last_consumed_frame(),
                    total_frames: stream.total_frames(),
                })
                .collect(),
            instances: ctx
                .instances()
                .iter()
                .enumerate()
                .map(|(index, instance)| InstanceSummary {
                    id: InstanceId(index),
                    name: instance.name().to_string(),
                    live: instance.is_live(),
                    triggered: instance.is_triggered(),
                    status: instance.result_status(),
                })
                .collect(),
        }
    }

    /// Status of the first instance with this name.
    pub fn status_of(&self, name: &str) -> Option<ResultStatus> {
        self.instances
            .iter()
            .find(|instance| instance.name == name)
            .and_then(|instance| instance.status)
    }

    /// Instances whose result is published.
    pub fn published(&self) -> impl Iterator<Item = &InstanceSummary> {
        self.instances
            .iter()
            .filter(|instance| instance.status.is_some_and(ResultStatus::is_ok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::context::SchedulerOptions;
    use crate::decode::instance::DecodeInstance;
    use crate::decode::stream::{FeatureFrame, FeatureStream};

    fn context() -> EngineContext {
        let mut ctx = EngineContext::new(SchedulerOptions::default());
        let s = ctx.add_stream(FeatureStream::with_frames(
            "mic",
            vec![FeatureFrame::default(); 3],
        ));
        ctx.add_instance(DecodeInstance::new("a", s)).unwrap();
        ctx.add_instance(DecodeInstance::new("b", s)).unwrap();
        ctx
    }

    #[test]
    fn test_capture_reflects_context() {
        let mut ctx = context();
        if let Some(instance) = ctx.instance_mut(InstanceId(1)) {
            instance.set_result_status(ResultStatus::Ok);
        }
        let report = PassReport::capture(PassEnd::EndOfInput, &ctx);

        assert_eq!(report.streams.len(), 1);
        assert_eq!(report.streams[0].total_frames, 3);
        assert_eq!(report.status_of("a"), None);
        assert_eq!(report.status_of("b"), Some(ResultStatus::Ok));
        let published: Vec<_> = report.published().map(|i| i.name.as_str()).collect();
        assert_eq!(published, vec!["b"]);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = PassReport::capture(PassEnd::Segmented, &context());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["end"], "segmented");
        assert_eq!(json["instances"][0]["name"], "a");
    }
}
