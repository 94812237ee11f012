//! Transient per-cycle flags.
//!
//! Cleared at the start of every stepping cycle and at the start of
//! end-of-pass finalization. Nothing here survives across cycles.

use super::instance::InstanceId;
use super::stream::StreamId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleState {
    segmented: Vec<bool>,
    interim: Vec<bool>,
}

impl CycleState {
    /// Clears every flag and sizes the state for the given context shape.
    pub(crate) fn reset(&mut self, streams: usize, instances: usize) {
        self.segmented.clear();
        self.segmented.resize(streams, false);
        self.interim.clear();
        self.interim.resize(instances, false);
    }

    pub(crate) fn mark_segmented(&mut self, stream: StreamId) {
        if let Some(flag) = self.segmented.get_mut(stream.0) {
            *flag = true;
        }
    }

    pub(crate) fn mark_interim(&mut self, instance: InstanceId) {
        if let Some(flag) = self.interim.get_mut(instance.0) {
            *flag = true;
        }
    }

    /// Whether this stream's search signalled termination this cycle.
    pub fn is_segmented(&self, stream: StreamId) -> bool {
        self.segmented.get(stream.0).copied().unwrap_or(false)
    }

    /// Whether the instance produced an interim hypothesis this cycle.
    pub fn has_interim(&self, instance: InstanceId) -> bool {
        self.interim.get(instance.0).copied().unwrap_or(false)
    }

    /// OR across every stream's flag: one stream ends the cycle for all.
    pub fn any_segmented(&self) -> bool {
        self.segmented.iter().any(|&flag| flag)
    }

    /// Instances with an interim hypothesis this cycle, in list order.
    pub fn interim_instances(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.interim
            .iter()
            .enumerate()
            .filter(|&(_, &flag)| flag)
            .map(|(index, _)| InstanceId(index))
    }
}
