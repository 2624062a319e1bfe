//! Common imports for typical client usage.
pub use crate::{
    AbortHandle, Callbacks, ChannelSink, ClientConfig, ClientError, Completion, Document,
    DomainEvent, EventSink, Evaluation, IngestSummary, NoopSink, ProgressNotice, SinkMessage,
    StepResult, StreamCall, StreamClient, StreamOutcome, TaskBreakdown,
};
