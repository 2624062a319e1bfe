use tokio::sync::{oneshot, watch};

use crate::errors::ClientError;

/// Handle used to cancel a running stream call.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// No sink callback fires after the session observes the request; events
    /// already delivered stay delivered.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }

    /// Whether cancellation has been requested.
    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Session-side view of an [`AbortHandle`].
#[derive(Clone, Debug)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// Non-blocking check.
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; pends forever if every
    /// handle is dropped without aborting.
    pub async fn aborted(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Creates a connected handle/signal pair.
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx }, AbortSignal { rx })
}

/// Successful settlement of a stream call.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamOutcome<T> {
    /// The stream finished and produced its aggregated value.
    Completed(T),
    /// The caller cancelled before the stream finished.
    Cancelled,
}

impl<T> StreamOutcome<T> {
    /// Returns the value of a completed call.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Handle to a stream call running on its own task.
///
/// Events reach the sink supplied when the call was started; `finish()`
/// waits for the settled result.
pub struct StreamCall<T> {
    session_id: uuid::Uuid,
    abort_handle: AbortHandle,
    result_rx: oneshot::Receiver<Result<StreamOutcome<T>, ClientError>>,
}

impl<T> StreamCall<T> {
    pub(crate) fn new(
        session_id: uuid::Uuid,
        abort_handle: AbortHandle,
        result_rx: oneshot::Receiver<Result<StreamOutcome<T>, ClientError>>,
    ) -> Self {
        Self {
            session_id,
            abort_handle,
            result_rx,
        }
    }

    /// Identifier used in this call's log records.
    pub fn session_id(&self) -> uuid::Uuid {
        self.session_id
    }

    /// Returns a handle that can cancel the call from elsewhere.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Cancels the call.
    pub fn abort(&self) {
        self.abort_handle.abort();
    }

    /// Waits for the call to settle.
    pub async fn finish(self) -> Result<StreamOutcome<T>, ClientError> {
        match self.result_rx.await {
            Ok(result) => result,
            Err(_) => Err(ClientError::protocol_msg(format!(
                "stream task ended without a result (session={})",
                self.session_id
            ))),
        }
    }
}
