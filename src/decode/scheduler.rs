//! Frame-synchronous decode scheduler.
//!
//! Advances every live instance by one frame per cycle, fuses the termination
//! signals of all streams into one pass-global decision, and drives one of the
//! two finalization paths:
//!
//! ```text
//!            begin_pass
//!                │
//!                ▼
//!   ┌──▶ step_one_frame ──Segmented──▶ finalize_segmented ──▶ PassReport
//!   │            │
//!   │        Continue
//!   │            │
//!   └── advance positions
//!                │
//!          input exhausted ─────────▶ finalize_end_of_pass ─▶ PassReport
//! ```
//!
//! The same `step_one_frame` primitive serves batch mode
//! ([`DecodeScheduler::run_to_completion`]) and streaming mode
//! ([`FrameFeeder`](super::feeder::FrameFeeder)).

use super::context::EngineContext;
use super::cycle::CycleState;
use super::instance::{DecodeInstance, InstanceId, ResultStatus};
use super::reject::{
    FrameCountSource, RejectCheck, RejectionPolicy, SEGMENTED_CHECKS,
};
use super::report::{PassEnd, PassReport};
use super::search::SearchEngine;
use super::segment::{CarryOverFinalizer, SegmentFinalizer};
use crate::error::{FramestepError, Result};
use tracing::{debug, info, warn};

/// Result of one stepping cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing terminated; the caller advances every valid stream by one frame.
    Continue,
    /// At least one stream signalled termination; the pass must be finalized.
    Segmented,
}

pub struct DecodeScheduler<E: SearchEngine> {
    engine: E,
    finalizer: Box<dyn SegmentFinalizer>,
    cycle: CycleState,
}

impl<E: SearchEngine> DecodeScheduler<E> {
    /// Creates a scheduler using the default carry-over segment finalizer.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            finalizer: Box::new(CarryOverFinalizer::default()),
            cycle: CycleState::default(),
        }
    }

    pub fn with_segment_finalizer(mut self, finalizer: Box<dyn SegmentFinalizer>) -> Self {
        self.finalizer = finalizer;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Flags of the most recent cycle.
    pub fn cycle(&self) -> &CycleState {
        &self.cycle
    }

    /// Rewinds every stream and clears per-pass instance state.
    pub fn begin_pass(&mut self, ctx: &mut EngineContext) {
        for stream in ctx.streams.iter_mut() {
            stream.rewind();
        }
        for instance in ctx.instances.iter_mut() {
            instance.reset_for_pass();
        }
        self.cycle.reset(ctx.streams.len(), ctx.instances.len());
    }

    /// Advances every live instance on a valid stream by the frame at its
    /// stream's current position.
    ///
    /// Never advances positions itself: after `Continue` the caller moves every
    /// valid stream forward by exactly one frame. An error means the search
    /// could not set up a trellis and the pass is abandoned.
    pub fn step_one_frame(&mut self, ctx: &mut EngineContext) -> Result<StepOutcome> {
        let options = *ctx.options();
        let streams = &mut ctx.streams;
        let instances = &mut ctx.instances;

        self.cycle.reset(streams.len(), instances.len());

        for (index, instance) in instances.iter_mut().enumerate() {
            if !instance.is_live() {
                continue;
            }
            let Some(stream) = streams.get(instance.stream().0) else {
                continue;
            };
            if !stream.is_valid() {
                continue;
            }

            let id = InstanceId(index);
            let position = stream.position();

            if position == 0 {
                if let Err(err) = self.engine.trellis_init(id, instance, stream) {
                    warn!(
                        instance = instance.name(),
                        error = %err,
                        "trellis initialization failed"
                    );
                    return Err(FramestepError::TrellisInit {
                        instance: instance.name().to_string(),
                        message: err.to_string(),
                    });
                }
                if !instance.multipath() {
                    continue;
                }
            }

            let report = self.engine.trellis_step(id, instance, stream, position);
            if report.speech_detected {
                instance.trigger();
            }
            if report.interim {
                self.cycle.mark_interim(id);
            }
            if report.terminated {
                debug!(
                    instance = instance.name(),
                    stream = stream.name(),
                    frame = position,
                    "search terminated"
                );
                self.cycle.mark_segmented(instance.stream());
            }
            if instance.successive_decoding()
                && position > 0
                && self.engine.detect_end_of_segment(id, instance, position - 1)
            {
                debug!(
                    instance = instance.name(),
                    frame = position - 1,
                    "end of segment detected"
                );
                self.cycle.mark_segmented(instance.stream());
            }
        }

        if let Some(attached) = ctx.vad.as_mut()
            && let Some(stream) = streams.get(attached.stream.0)
            && stream.is_valid()
            && let Some(frame) = stream.frame(stream.position())
        {
            let decision = attached.detector.process_frame(frame);
            if decision.speech {
                for instance in instances.iter_mut() {
                    if instance.is_live() && instance.stream() == attached.stream {
                        instance.trigger();
                    }
                }
            }
            if decision.end_of_speech && options.explicit_segmentation {
                debug!(
                    stream = stream.name(),
                    frame = stream.position(),
                    "voice activity ended"
                );
                self.cycle.mark_segmented(attached.stream);
            }
        }

        // Any single stream ends the cycle for the whole pass.
        if !self.cycle.any_segmented() {
            return Ok(StepOutcome::Continue);
        }

        for stream in streams.iter_mut() {
            stream.mark_consumed_at_position();
            if !options.explicit_segmentation {
                stream.truncate_to_position();
            }
        }
        Ok(StepOutcome::Segmented)
    }

    /// Batch driver: steps over every buffered frame until the input runs out
    /// or a termination signal segments the pass.
    pub fn run_to_completion(&mut self, ctx: &mut EngineContext) -> Result<PassReport> {
        self.begin_pass(ctx);
        loop {
            for stream in ctx.streams.iter_mut() {
                stream.refresh_valid();
            }
            if ctx.streams.iter().all(|stream| !stream.is_valid()) {
                return Ok(self.finalize_end_of_pass(ctx));
            }

            match self.step_one_frame(ctx)? {
                StepOutcome::Segmented => return Ok(self.finalize_segmented(ctx)),
                StepOutcome::Continue => {
                    for stream in ctx.streams.iter_mut() {
                        stream.advance();
                    }
                }
            }
        }
    }

    /// Mid-pass finalization after `step_one_frame` returned `Segmented`.
    pub fn finalize_segmented(&mut self, ctx: &mut EngineContext) -> PassReport {
        self.finalize_cut(ctx, PassEnd::Segmented)
    }

    /// Application-requested stop: the pass ends where it stands and goes
    /// through mid-pass finalization.
    pub fn request_stop(&mut self, ctx: &mut EngineContext) -> PassReport {
        for stream in ctx.streams.iter_mut() {
            stream.mark_consumed_at_position();
        }
        self.finalize_cut(ctx, PassEnd::Stopped)
    }

    fn finalize_cut(&mut self, ctx: &mut EngineContext, end: PassEnd) -> PassReport {
        let options = *ctx.options();
        let policy = RejectionPolicy::from_options(&options);
        let verdict = policy.evaluate(
            SEGMENTED_CHECKS,
            FrameCountSource::FirstStream,
            &ctx.streams,
            true,
        );

        match verdict.rejected {
            None => {
                for (index, instance) in ctx.instances.iter_mut().enumerate() {
                    if !instance.is_live() {
                        continue;
                    }
                    let frames = ctx
                        .streams
                        .get(instance.stream().0)
                        .and_then(|stream| stream.last_consumed_frame())
                        .unwrap_or(0);
                    self.publish(InstanceId(index), instance, frames);
                }
            }
            Some(status) => {
                info!(%status, "utterance rejected");
                for instance in ctx.instances.iter_mut().filter(|i| i.is_live()) {
                    instance.set_result_status(status);
                }
            }
        }

        let report = PassReport::capture(end, ctx);
        if options.explicit_segmentation {
            self.finalizer.finalize_segment(&mut ctx.streams);
        }
        if let Some(attached) = ctx.vad.as_mut() {
            attached.detector.end_of_utterance();
        }
        info!(end = ?end, "pass finalized");
        report
    }

    /// Finalization when every stream ran out of frames without a cut.
    pub fn finalize_end_of_pass(&mut self, ctx: &mut EngineContext) -> PassReport {
        let options = *ctx.options();
        self.cycle.reset(ctx.streams.len(), ctx.instances.len());
        if let Some(attached) = ctx.vad.as_mut() {
            attached.detector.end_of_utterance();
        }
        for stream in ctx.streams.iter_mut() {
            stream.mark_consumed_at_position();
        }

        let never_triggered = !ctx
            .instances
            .iter()
            .any(|instance| instance.is_live() && instance.is_triggered());
        if options.explicit_segmentation && ctx.has_vad() && never_triggered {
            info!("no speech observed in pass");
            for instance in ctx.instances.iter_mut().filter(|i| i.is_live()) {
                instance.set_result_status(ResultStatus::RejectOnlySilence);
            }
            let report = PassReport::capture(PassEnd::EndOfInput, ctx);
            self.finalizer.finalize_segment(&mut ctx.streams);
            return report;
        }

        for (index, instance) in ctx.instances.iter().enumerate() {
            if !instance.is_live() {
                continue;
            }
            if let Some(stream) = ctx.streams.get(instance.stream().0)
                && stream.position() > 0
            {
                self.engine
                    .trellis_finalize(InstanceId(index), instance, stream, stream.position());
            }
        }

        let mut checks = vec![
            RejectCheck::NoInput,
            RejectCheck::ShortInput,
            RejectCheck::LowPower,
        ];
        if options.explicit_segmentation {
            checks.push(RejectCheck::OnlySilence);
        }
        let policy = RejectionPolicy::from_options(&options);

        for (index, instance) in ctx.instances.iter_mut().enumerate() {
            if !instance.is_live() {
                continue;
            }
            let verdict = policy.evaluate(
                &checks,
                FrameCountSource::Stream(instance.stream()),
                &ctx.streams,
                instance.is_triggered(),
            );
            match verdict.rejected {
                Some(status) => {
                    info!(instance = instance.name(), %status, "result rejected");
                    instance.set_result_status(status);
                }
                None => {
                    let frames = ctx
                        .streams
                        .get(instance.stream().0)
                        .map_or(0, |stream| stream.position());
                    self.publish(InstanceId(index), instance, frames);
                }
            }
        }

        let report = PassReport::capture(PassEnd::EndOfInput, ctx);
        if options.explicit_segmentation {
            self.finalizer.finalize_segment(&mut ctx.streams);
        }
        info!("pass finalized at end of input");
        report
    }

    /// Best-path extraction; a search failure is a status, not an error.
    fn publish(&mut self, id: InstanceId, instance: &mut DecodeInstance, frames: usize) {
        match self.engine.finalize_best_path(id, instance, frames) {
            Ok(()) => instance.set_result_status(ResultStatus::Ok),
            Err(err) => {
                warn!(instance = instance.name(), error = %err, "best path extraction failed");
                instance.set_result_status(ResultStatus::SearchFailed);
            }
        }
    }
}
