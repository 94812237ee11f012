//! Frame-synchronous decoding across streams and instances.
//!
//! [`DecodeScheduler`] steps every live instance one frame per cycle and
//! finalizes a pass either when a termination signal cuts it or when input
//! runs out. [`FrameFeeder`] drives the same cycle for frames that arrive one
//! at a time.

pub mod context;
pub mod cycle;
pub mod feeder;
pub mod instance;
pub mod reject;
pub mod report;
pub mod scheduler;
pub mod search;
pub mod segment;
pub mod stream;

pub use context::{EngineContext, SchedulerOptions, VadDecision, VoiceActivityDetector};
pub use feeder::{FeedEvent, FeedMessage, FeedOutcome, FeederStation, FrameFeeder};
pub use instance::{DecodeInstance, InstanceId, ResultStatus};
pub use report::{PassEnd, PassReport};
pub use scheduler::{DecodeScheduler, StepOutcome};
pub use search::{MockSearchEngine, SearchEngine, StepReport};
pub use segment::{CarryOverFinalizer, SegmentFinalizer};
pub use stream::{FeatureFrame, FeatureStream, StreamId};
