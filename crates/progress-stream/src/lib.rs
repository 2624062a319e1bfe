//! Client for chunked progress streams.
//!
//! A response body is consumed as raw bytes and turned into typed
//! [`DomainEvent`]s: bytes are decoded with carry-over for split UTF-8
//! sequences, split into lines, classified (bare JSON line, `data:` frame,
//! control line, or `[DONE]` sentinel), and interpreted. A [`StreamSession`]
//! dispatches each event to an [`EventSink`] as it arrives and settles into a
//! single result.
//!
//! # Polishing text
//!
//! ```no_run
//! use progress_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = StreamClient::new(ClientConfig::new("http://localhost:8000"))?;
//! let call = client.polish(
//!     "负责后端开发",
//!     Callbacks::new().with_progress(|event| println!("{event:?}")),
//! )?;
//!
//! match call.finish().await? {
//!     StreamOutcome::Completed(text) => println!("{text}"),
//!     StreamOutcome::Cancelled => println!("cancelled"),
//! }
//! # Ok(())
//! # }
//! ```

/// Cancellation handles and the call handle.
pub mod call;
/// Stream entry points and client configuration.
pub mod client;
/// Public error types.
pub mod errors;
/// Typed events reconstructed from payload frames.
pub mod event;
/// Payload-to-event mapping.
pub mod interpreter;
/// Tracing subscriber setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Session state machine and consumption loop.
pub mod session;
/// Event sinks (callbacks, channels).
pub mod sink;
/// Transport seam and HTTP implementation.
pub mod transport;
/// Chunk decoding and line framing below the interpreter.
pub mod wire;

pub use call::{AbortHandle, AbortSignal, StreamCall, StreamOutcome, abort_pair};
pub use client::{ClientConfig, Endpoints, Evaluation, IngestSummary, StreamClient};
pub use errors::{ClientError, TransportError};
pub use event::{
    Completion, DomainEvent, PlannedStep, ProgressNotice, StepResult, TaskBreakdown,
};
pub use interpreter::{MalformedFrame, interpret};
pub use observability::init_observability;
pub use session::{Flow, SessionReport, SessionState, StreamSession};
pub use sink::{Callbacks, ChannelSink, EventSink, NoopSink, SinkMessage};
pub use transport::{
    ByteStream, Document, OpenedStream, ReqwestTransport, RequestBody, StreamKind, StreamRequest,
    StreamTransport,
};
