//! Entry points that open a request and hand its body to a [`StreamSession`].

mod config;
mod evaluation;
mod ingest;
mod polish;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use crate::call::{AbortSignal, StreamCall, abort_pair};
use crate::errors::ClientError;
use crate::session::{SessionReport, StreamSession};
use crate::sink::EventSink;
use crate::transport::{
    Document, ReqwestTransport, RequestBody, StreamKind, StreamRequest, StreamTransport,
};

pub use config::{ClientConfig, DEFAULT_BASE_URL, Endpoints};
pub use evaluation::Evaluation;
pub use ingest::IngestSummary;

/// Client for the evaluation, polish, and ingest streams.
///
/// Every call runs on its own tokio task, so calls must be started from
/// within a tokio runtime. Concurrent calls share nothing but the transport.
#[derive(Clone)]
pub struct StreamClient {
    transport: Arc<dyn StreamTransport>,
    config: ClientConfig,
}

impl StreamClient {
    /// Creates a client with the default HTTP transport.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let transport = ReqwestTransport::new(config.connect_timeout)?;
        Ok(Self {
            transport: Arc::new(transport),
            config,
        })
    }

    /// Creates a client from `PROGRESS_STREAM_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Creates a client over a custom transport.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn StreamTransport>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        Ok(Self { transport, config })
    }

    fn start<T, F>(
        &self,
        kind: StreamKind,
        url: String,
        body: RequestBody,
        sink: Box<dyn EventSink>,
        finalize: F,
    ) -> StreamCall<T>
    where
        T: Send + 'static,
        F: FnOnce(SessionReport) -> Result<T, ClientError> + Send + 'static,
    {
        let session = StreamSession::new(kind);
        let session_id = session.id();
        let request = StreamRequest {
            session_id,
            kind,
            url,
            body,
            timeout: self.config.timeout,
        };
        let (abort_handle, abort) = abort_pair();
        let (result_tx, result_rx) = oneshot::channel();
        debug!(session_id = %session_id, kind = %kind, url = %request.url, "starting stream call");
        tokio::spawn(stream_task(
            self.transport.clone(),
            request,
            session,
            sink,
            abort,
            self.config.simulated_delay,
            finalize,
            result_tx,
        ));
        StreamCall::new(session_id, abort_handle, result_rx)
    }
}

#[allow(clippy::too_many_arguments)]
async fn stream_task<T, F>(
    transport: Arc<dyn StreamTransport>,
    request: StreamRequest,
    session: StreamSession,
    mut sink: Box<dyn EventSink>,
    abort: AbortSignal,
    replay_delay: Option<Duration>,
    finalize: F,
    result_tx: oneshot::Sender<Result<crate::call::StreamOutcome<T>, ClientError>>,
) where
    F: FnOnce(SessionReport) -> Result<T, ClientError>,
{
    let report = run_session(
        transport,
        &request,
        session,
        sink.as_mut(),
        abort,
        replay_delay,
    )
    .await;
    let _ = result_tx.send(report.into_outcome(finalize));
}

async fn run_session(
    transport: Arc<dyn StreamTransport>,
    request: &StreamRequest,
    mut session: StreamSession,
    sink: &mut dyn EventSink,
    mut abort: AbortSignal,
    replay_delay: Option<Duration>,
) -> SessionReport {
    let opened = tokio::select! {
        biased;
        _ = abort.aborted() => {
            session.cancel();
            return session.into_report();
        }
        opened = transport.open(request) => opened,
    };
    match opened {
        Err(err) => {
            session.fail(err.into(), sink);
            session.into_report()
        }
        Ok(opened) if request.kind == StreamKind::Evaluation && opened.is_json_document() => {
            session
                .replay_document(opened.body, replay_delay, sink, abort)
                .await
        }
        Ok(opened) => session.drive(opened.body, sink, abort).await,
    }
}

fn validate_document(document: &Document) -> Result<(), ClientError> {
    if document.file_name.trim().is_empty() {
        return Err(ClientError::Validation(
            "document file name must not be empty".into(),
        ));
    }
    if document.is_empty() {
        return Err(ClientError::Validation(format!(
            "document `{}` is empty",
            document.file_name
        )));
    }
    Ok(())
}
