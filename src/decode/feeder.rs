//! Streaming mode: frames arrive one at a time from an external source.
//!
//! [`FrameFeeder`] owns the loop that batch mode keeps inside
//! [`DecodeScheduler::run_to_completion`]: it steps once per pending frame and
//! reports "need more input" instead of ending the pass when streams run dry.
//! [`FeederStation`] runs a feeder on its own thread behind bounded channels.

use super::context::EngineContext;
use super::instance::InstanceId;
use super::report::PassReport;
use super::scheduler::{DecodeScheduler, StepOutcome};
use super::search::SearchEngine;
use super::stream::{FeatureFrame, StreamId};
use crate::error::{FramestepError, Result};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// What happened to the frames pushed since the last call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    /// All pending frames were stepped; the pass is still open.
    Continue {
        stepped: usize,
        /// Instances that produced an interim hypothesis, per cycle order.
        interim: Vec<InstanceId>,
    },
    /// A termination signal closed the pass.
    Segmented(PassReport),
}

pub struct FrameFeeder<E: SearchEngine> {
    scheduler: DecodeScheduler<E>,
    in_pass: bool,
}

impl<E: SearchEngine> FrameFeeder<E> {
    pub fn new(scheduler: DecodeScheduler<E>) -> Self {
        Self {
            scheduler,
            in_pass: false,
        }
    }

    pub fn scheduler(&self) -> &DecodeScheduler<E> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut DecodeScheduler<E> {
        &mut self.scheduler
    }

    pub fn into_scheduler(self) -> DecodeScheduler<E> {
        self.scheduler
    }

    /// Whether a pass is currently open.
    pub fn in_pass(&self) -> bool {
        self.in_pass
    }

    /// Appends one frame to a stream.
    pub fn push(
        &mut self,
        ctx: &mut EngineContext,
        stream: StreamId,
        frame: FeatureFrame,
    ) -> Result<()> {
        let target = ctx
            .stream_mut(stream)
            .ok_or(FramestepError::UnknownStream { stream: stream.0 })?;
        target.push(frame);
        Ok(())
    }

    /// Steps over every frame that has arrived but not been decoded yet.
    pub fn advance(&mut self, ctx: &mut EngineContext) -> Result<FeedOutcome> {
        if !self.in_pass {
            self.scheduler.begin_pass(ctx);
            self.in_pass = true;
        }

        let mut stepped = 0;
        let mut interim = Vec::new();
        loop {
            for stream in ctx.streams.iter_mut() {
                stream.refresh_valid_streaming();
            }
            if ctx.streams.iter().all(|stream| !stream.is_valid()) {
                return Ok(FeedOutcome::Continue { stepped, interim });
            }

            let outcome = match self.scheduler.step_one_frame(ctx) {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.in_pass = false;
                    return Err(err);
                }
            };
            stepped += 1;
            interim.extend(self.scheduler.cycle().interim_instances());

            match outcome {
                StepOutcome::Segmented => {
                    let report = self.scheduler.finalize_segmented(ctx);
                    self.close_pass(ctx);
                    return Ok(FeedOutcome::Segmented(report));
                }
                StepOutcome::Continue => {
                    for stream in ctx.streams.iter_mut() {
                        stream.advance();
                    }
                }
            }
        }
    }

    /// Application-requested stop: finalize the open pass where it stands.
    ///
    /// Returns `None` when no pass is open, so nothing is finalized twice.
    pub fn stop(&mut self, ctx: &mut EngineContext) -> Option<PassReport> {
        if !self.in_pass {
            debug!("stop requested outside a pass");
            return None;
        }
        let report = self.scheduler.request_stop(ctx);
        self.close_pass(ctx);
        Some(report)
    }

    /// Natural end of input: drain pending frames, then finalize.
    pub fn finish(&mut self, ctx: &mut EngineContext) -> Result<PassReport> {
        if let FeedOutcome::Segmented(report) = self.advance(ctx)? {
            return Ok(report);
        }
        let report = self.scheduler.finalize_end_of_pass(ctx);
        self.close_pass(ctx);
        Ok(report)
    }

    /// Without explicit segmentation nothing carries over, so the next pass
    /// starts from empty streams.
    fn close_pass(&mut self, ctx: &mut EngineContext) {
        self.in_pass = false;
        if !ctx.options().explicit_segmentation {
            for stream in ctx.streams.iter_mut() {
                stream.clear();
            }
        }
    }
}

/// Input to a feeder station.
#[derive(Debug, Clone)]
pub enum FeedMessage {
    Frame { stream: StreamId, frame: FeatureFrame },
    /// Application stop: close the open pass immediately.
    Stop,
    /// No more input will arrive: drain, close the pass and shut down.
    EndOfInput,
}

/// Output of a feeder station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Interim(Vec<InstanceId>),
    Pass(PassReport),
    Failed(String),
}

/// Runs a [`FrameFeeder`] in a dedicated thread.
pub struct FeederStation<E: SearchEngine + Send + 'static> {
    handle: Option<JoinHandle<(FrameFeeder<E>, EngineContext)>>,
    input_tx: Sender<FeedMessage>,
    event_rx: Receiver<FeedEvent>,
}

impl<E: SearchEngine + Send + 'static> FeederStation<E> {
    /// Spawns the feeder thread with bounded input and event channels.
    pub fn spawn(feeder: FrameFeeder<E>, ctx: EngineContext, capacity: usize) -> Self {
        let (input_tx, input_rx) = bounded(capacity);
        let (event_tx, event_rx) = bounded(capacity);

        let handle = thread::spawn(move || {
            let mut feeder = feeder;
            let mut ctx = ctx;
            Self::run(&mut feeder, &mut ctx, input_rx, event_tx);
            (feeder, ctx)
        });

        Self {
            handle: Some(handle),
            input_tx,
            event_rx,
        }
    }

    fn run(
        feeder: &mut FrameFeeder<E>,
        ctx: &mut EngineContext,
        input_rx: Receiver<FeedMessage>,
        event_tx: Sender<FeedEvent>,
    ) {
        while let Ok(message) = input_rx.recv() {
            let events = match message {
                FeedMessage::Frame { stream, frame } => Self::on_frame(feeder, ctx, stream, frame),
                FeedMessage::Stop => feeder
                    .stop(ctx)
                    .map(FeedEvent::Pass)
                    .into_iter()
                    .collect(),
                FeedMessage::EndOfInput => {
                    let event = match feeder.finish(ctx) {
                        Ok(report) => FeedEvent::Pass(report),
                        Err(err) => FeedEvent::Failed(err.to_string()),
                    };
                    // Receiver may already be gone; the thread ends either way.
                    if event_tx.send(event).is_err() {
                        debug!("feeder event receiver dropped");
                    }
                    break;
                }
            };
            for event in events {
                if event_tx.send(event).is_err() {
                    debug!("feeder event receiver dropped, stopping");
                    return;
                }
            }
        }
    }

    fn on_frame(
        feeder: &mut FrameFeeder<E>,
        ctx: &mut EngineContext,
        stream: StreamId,
        frame: FeatureFrame,
    ) -> Vec<FeedEvent> {
        if let Err(err) = feeder.push(ctx, stream, frame) {
            warn!(error = %err, "dropping frame");
            return vec![FeedEvent::Failed(err.to_string())];
        }
        match feeder.advance(ctx) {
            Ok(FeedOutcome::Continue { interim, .. }) if interim.is_empty() => Vec::new(),
            Ok(FeedOutcome::Continue { interim, .. }) => vec![FeedEvent::Interim(interim)],
            Ok(FeedOutcome::Segmented(report)) => vec![FeedEvent::Pass(report)],
            Err(err) => vec![FeedEvent::Failed(err.to_string())],
        }
    }

    /// Queues one message for the feeder thread.
    pub fn send(&self, message: FeedMessage) -> Result<()> {
        self.input_tx
            .send(message)
            .map_err(|_| FramestepError::FeederDisconnected)
    }

    /// Receiver for events produced by the feeder thread.
    pub fn events(&self) -> &Receiver<FeedEvent> {
        &self.event_rx
    }

    /// Closes the input channel and waits for the thread, handing back the
    /// feeder and context for inspection or reuse.
    pub fn join(mut self) -> Result<(FrameFeeder<E>, EngineContext)> {
        let handle = self.handle.take().ok_or(FramestepError::FeederDisconnected)?;
        drop(self.input_tx);
        handle
            .join()
            .map_err(|_| FramestepError::Other("feeder thread panicked".to_string()))
    }
}
