//! Decode instances: one configured recognition process bound to one stream.

use super::stream::StreamId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of an instance inside an [`EngineContext`](super::context::EngineContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub usize);

/// Final outcome of an instance for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// Best path was extracted and stored by the search engine.
    Ok,
    /// The bound stream delivered no frames at all.
    FailNoInput,
    /// Input shorter than the configured threshold.
    RejectShort,
    /// Average input power below the configured threshold.
    RejectPower,
    /// No speech activity was ever observed.
    RejectOnlySilence,
    /// The search engine could not produce a best path.
    SearchFailed,
}

impl ResultStatus {
    /// Whether a result is published for this status.
    pub fn is_ok(self) -> bool {
        self == ResultStatus::Ok
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResultStatus::Ok => "ok",
            ResultStatus::FailNoInput => "no input",
            ResultStatus::RejectShort => "rejected: too short",
            ResultStatus::RejectPower => "rejected: low power",
            ResultStatus::RejectOnlySilence => "rejected: only silence",
            ResultStatus::SearchFailed => "search failed",
        };
        f.write_str(label)
    }
}

/// One recognition process (grammar/model combination).
#[derive(Debug, Clone)]
pub struct DecodeInstance {
    name: String,
    stream: StreamId,
    live: bool,
    successive_decoding: bool,
    multipath: bool,
    triggered: bool,
    result_status: Option<ResultStatus>,
}

impl DecodeInstance {
    /// Creates a live instance bound to `stream`.
    pub fn new(name: &str, stream: StreamId) -> Self {
        Self {
            name: name.to_string(),
            stream,
            live: true,
            successive_decoding: false,
            multipath: false,
            triggered: false,
            result_status: None,
        }
    }

    /// Also query the end-of-segment predicate every frame.
    pub fn with_successive_decoding(mut self, enabled: bool) -> Self {
        self.successive_decoding = enabled;
        self
    }

    /// The acoustic model needs a trellis step on frame 0 as well.
    pub fn with_multipath(mut self, enabled: bool) -> Self {
        self.multipath = enabled;
        self
    }

    pub fn with_live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stream(&self) -> StreamId {
        self.stream
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn set_live(&mut self, live: bool) {
        self.live = live;
    }

    pub fn successive_decoding(&self) -> bool {
        self.successive_decoding
    }

    pub fn multipath(&self) -> bool {
        self.multipath
    }

    /// Whether speech activity has been observed in the current pass.
    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    /// Outcome of the last finalized pass; `None` while decoding is active.
    pub fn result_status(&self) -> Option<ResultStatus> {
        self.result_status
    }

    pub(crate) fn trigger(&mut self) {
        self.triggered = true;
    }

    pub(crate) fn set_result_status(&mut self, status: ResultStatus) {
        self.result_status = Some(status);
    }

    pub(crate) fn reset_for_pass(&mut self) {
        self.triggered = false;
        self.result_status = None;
    }
}
