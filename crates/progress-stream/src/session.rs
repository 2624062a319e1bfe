use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt as _};
use tracing::{debug, info, warn};

use crate::call::{AbortSignal, StreamOutcome};
use crate::errors::ClientError;
use crate::event::{Completion, DomainEvent};
use crate::interpreter::{MalformedFrame, interpret};
use crate::sink::EventSink;
use crate::transport::StreamKind;
use crate::wire::{Frame, LineFramer, Utf8Decoder, classify};

/// Lifecycle of one stream session. Terminal states are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn allows(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Init, Streaming | Failed | Cancelled) | (Streaming, Completed | Failed | Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the consumption loop should keep pulling chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Everything a finished session leaves behind.
#[derive(Clone, Debug)]
pub struct SessionReport {
    pub session_id: uuid::Uuid,
    pub kind: StreamKind,
    pub state: SessionState,
    /// Delivered events in arrival order (completion and errors excluded).
    pub results: Vec<DomainEvent>,
    pub completion: Option<Completion>,
    pub failure: Option<ClientError>,
    pub malformed_frames: usize,
}

impl SessionReport {
    /// Settles the report into a call result, aggregating completed sessions
    /// with `finalize`.
    pub fn into_outcome<T>(
        mut self,
        finalize: impl FnOnce(SessionReport) -> Result<T, ClientError>,
    ) -> Result<StreamOutcome<T>, ClientError> {
        match self.state {
            SessionState::Completed => finalize(self).map(StreamOutcome::Completed),
            SessionState::Cancelled => Ok(StreamOutcome::Cancelled),
            SessionState::Failed => Err(self.failure.take().unwrap_or_else(|| {
                ClientError::protocol_msg("session failed without recording an error")
            })),
            state @ (SessionState::Init | SessionState::Streaming) => Err(
                ClientError::protocol_msg(format!("session ended in non-terminal state {state}")),
            ),
        }
    }
}

/// Stateful orchestrator for one response body.
///
/// Owns the decoder carry bytes, the line buffer, and the ordered results.
/// Events are dispatched to the sink synchronously, one line at a time.
pub struct StreamSession {
    id: uuid::Uuid,
    kind: StreamKind,
    state: SessionState,
    decoder: Utf8Decoder,
    framer: LineFramer,
    results: Vec<DomainEvent>,
    completion: Option<Completion>,
    failure: Option<ClientError>,
    malformed_frames: usize,
    saw_breakdown: bool,
    saw_step: bool,
}

impl StreamSession {
    pub fn new(kind: StreamKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            kind,
            state: SessionState::Init,
            decoder: Utf8Decoder::default(),
            framer: LineFramer::default(),
            results: Vec::new(),
            completion: None,
            failure: None,
            malformed_frames: 0,
            saw_breakdown: false,
            saw_step: false,
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn results(&self) -> &[DomainEvent] {
        &self.results
    }

    pub fn malformed_frames(&self) -> usize {
        self.malformed_frames
    }

    /// Moves `Init -> Streaming`.
    pub fn begin(&mut self) -> bool {
        let started = self.transition(SessionState::Streaming);
        if started {
            info!(session_id = %self.id, kind = %self.kind, "stream session started");
        }
        started
    }

    /// Decodes, frames, and dispatches one chunk.
    ///
    /// `abort` is checked before every line so that no event is dispatched
    /// once cancellation has been requested.
    pub fn feed(
        &mut self,
        chunk: &[u8],
        sink: &mut dyn EventSink,
        abort: Option<&AbortSignal>,
    ) -> Flow {
        if self.state != SessionState::Streaming {
            return Flow::Stop;
        }
        let text = self.decoder.decode(chunk);
        let lines = self.framer.feed(&text);
        self.process_lines(lines, sink, abort)
    }

    /// Handles natural end of stream: flushes carry bytes and the last
    /// unterminated line, then completes.
    pub fn end_of_input(&mut self, sink: &mut dyn EventSink, abort: Option<&AbortSignal>) -> Flow {
        if self.state != SessionState::Streaming {
            return Flow::Stop;
        }
        let tail = self.decoder.finish();
        let mut lines: Vec<String> = self.framer.feed(&tail).collect();
        lines.extend(self.framer.finish());
        if self.process_lines(lines, sink, abort) == Flow::Stop {
            return Flow::Stop;
        }
        if abort.is_some_and(AbortSignal::is_aborted) {
            self.cancel();
        } else {
            debug!(session_id = %self.id, "stream ended without sentinel");
            self.complete(None, sink);
        }
        Flow::Stop
    }

    /// Fails the session (transport errors, or a failure before streaming).
    pub fn fail(&mut self, error: ClientError, sink: &mut dyn EventSink) {
        if !self.transition(SessionState::Failed) {
            return;
        }
        let message = error.to_string();
        warn!(session_id = %self.id, kind = %self.kind, delivered = self.results.len(), error = %message, "stream session failed");
        sink.on_error(&message);
        self.failure = Some(error);
    }

    /// Marks the session cancelled; nothing is dispatched afterwards.
    pub fn cancel(&mut self) {
        if self.transition(SessionState::Cancelled) {
            info!(session_id = %self.id, kind = %self.kind, delivered = self.results.len(), "stream session cancelled");
        }
    }

    pub fn into_report(self) -> SessionReport {
        info!(
            session_id = %self.id,
            kind = %self.kind,
            state = %self.state,
            results = self.results.len(),
            malformed_frames = self.malformed_frames,
            "stream session finished"
        );
        SessionReport {
            session_id: self.id,
            kind: self.kind,
            state: self.state,
            results: self.results,
            completion: self.completion,
            failure: self.failure,
            malformed_frames: self.malformed_frames,
        }
    }

    /// Consumes a live response body until a terminal condition.
    ///
    /// The body is released exactly once when this returns, whatever the
    /// exit path.
    pub async fn drive<S, E>(
        mut self,
        body: S,
        sink: &mut dyn EventSink,
        mut abort: AbortSignal,
    ) -> SessionReport
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Into<ClientError>,
    {
        if !self.begin() {
            return self.into_report();
        }
        let signal = abort.clone();
        let mut reader = Reader::new(self.id, body);
        loop {
            tokio::select! {
                biased;
                _ = abort.aborted() => {
                    self.cancel();
                    break;
                }
                next = reader.next() => {
                    let flow = match next {
                        Some(Ok(chunk)) => self.feed(&chunk, sink, Some(&signal)),
                        Some(Err(err)) => {
                            self.fail(err.into(), sink);
                            Flow::Stop
                        }
                        None => self.end_of_input(sink, Some(&signal)),
                    };
                    if flow == Flow::Stop {
                        break;
                    }
                }
            }
        }
        drop(reader);
        self.into_report()
    }

    /// Consumes a non-streaming body: a whole JSON array whose entries are
    /// replayed through the same pipeline, optionally spaced by `delay`.
    ///
    /// Bodies that are not a JSON array are fed through unchanged, so a
    /// mislabelled line stream still works.
    pub async fn replay_document<S, E>(
        mut self,
        body: S,
        delay: Option<Duration>,
        sink: &mut dyn EventSink,
        mut abort: AbortSignal,
    ) -> SessionReport
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Into<ClientError>,
    {
        if !self.begin() {
            return self.into_report();
        }
        let signal = abort.clone();
        let mut reader = Reader::new(self.id, body);
        let mut document = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = abort.aborted() => {
                    self.cancel();
                    return self.into_report();
                }
                next = reader.next() => {
                    match next {
                        Some(Ok(chunk)) => document.extend_from_slice(&chunk),
                        Some(Err(err)) => {
                            self.fail(err.into(), sink);
                            return self.into_report();
                        }
                        None => break,
                    }
                }
            }
        }
        drop(reader);

        let entries = match serde_json::from_slice::<serde_json::Value>(&document) {
            Ok(serde_json::Value::Array(entries)) => entries,
            _ => {
                debug!(session_id = %self.id, bytes = document.len(), "document is not a JSON array; framing as lines");
                self.feed(&document, sink, Some(&signal));
                self.end_of_input(sink, Some(&signal));
                return self.into_report();
            }
        };
        debug!(session_id = %self.id, entries = entries.len(), "replaying buffered evaluation document");

        for (index, entry) in entries.into_iter().enumerate() {
            if index > 0
                && let Some(delay) = delay.filter(|d| !d.is_zero())
            {
                tokio::select! {
                    biased;
                    _ = abort.aborted() => {
                        self.cancel();
                        return self.into_report();
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            let line = format!("{entry}\n");
            if self.feed(line.as_bytes(), sink, Some(&signal)) == Flow::Stop {
                return self.into_report();
            }
        }
        self.end_of_input(sink, Some(&signal));
        self.into_report()
    }

    fn transition(&mut self, next: SessionState) -> bool {
        if !self.state.allows(next) {
            warn!(session_id = %self.id, from = %self.state, to = %next, "rejected session transition");
            return false;
        }
        debug!(session_id = %self.id, from = %self.state, to = %next, "session transition");
        self.state = next;
        true
    }

    fn process_lines(
        &mut self,
        lines: impl IntoIterator<Item = String>,
        sink: &mut dyn EventSink,
        abort: Option<&AbortSignal>,
    ) -> Flow {
        for line in lines {
            if abort.is_some_and(AbortSignal::is_aborted) {
                self.cancel();
                return Flow::Stop;
            }
            if self.process_line(&line, sink) == Flow::Stop {
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn process_line(&mut self, line: &str, sink: &mut dyn EventSink) -> Flow {
        match classify(line) {
            Frame::Ignorable => Flow::Continue,
            Frame::Sentinel => {
                debug!(session_id = %self.id, "received stream sentinel");
                self.complete(None, sink);
                Flow::Stop
            }
            Frame::Payload(payload) => match interpret(&payload) {
                Ok(event) => self.dispatch(event, sink),
                Err(err) => {
                    self.skip_malformed(&payload, &err);
                    Flow::Continue
                }
            },
        }
    }

    fn dispatch(&mut self, event: DomainEvent, sink: &mut dyn EventSink) -> Flow {
        if self.state != SessionState::Streaming {
            return Flow::Stop;
        }
        match event {
            DomainEvent::Completion(completion) => {
                self.complete(Some(completion), sink);
                Flow::Stop
            }
            DomainEvent::StreamError { message } => {
                let partial = self.results.clone();
                self.fail(ClientError::Stream { message, partial }, sink);
                Flow::Stop
            }
            event => {
                if let Err(err) = self.check_order(&event) {
                    self.skip_malformed(event.kind(), &err);
                    return Flow::Continue;
                }
                debug!(
                    session_id = %self.id,
                    kind = %self.kind,
                    event = event.kind(),
                    step = ?event.step(),
                    seq = self.results.len(),
                    "dispatching stream event"
                );
                self.results.push(event);
                if let Some(delivered) = self.results.last() {
                    sink.on_event(delivered);
                }
                Flow::Continue
            }
        }
    }

    fn check_order(&mut self, event: &DomainEvent) -> Result<(), MalformedFrame> {
        match event {
            DomainEvent::TaskBreakdown(_) if self.saw_breakdown => Err(MalformedFrame::OutOfOrder(
                "duplicate task breakdown".into(),
            )),
            DomainEvent::TaskBreakdown(_) if self.saw_step => Err(MalformedFrame::OutOfOrder(
                "task breakdown after step results".into(),
            )),
            DomainEvent::TaskBreakdown(_) => {
                self.saw_breakdown = true;
                Ok(())
            }
            DomainEvent::StepResult(_) => {
                self.saw_step = true;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn complete(&mut self, completion: Option<Completion>, sink: &mut dyn EventSink) {
        let has_text = completion
            .as_ref()
            .is_some_and(|c| c.final_text.is_some());
        if self.kind.requires_final_text() && !has_text {
            let message = format!("{} stream ended without final text", self.kind);
            self.fail(ClientError::protocol_msg(message), sink);
            return;
        }
        if !self.transition(SessionState::Completed) {
            return;
        }
        if let Some(completion) = completion {
            sink.on_complete(&completion);
            self.completion = Some(completion);
        }
    }

    fn skip_malformed(&mut self, payload: &str, err: &MalformedFrame) {
        self.malformed_frames += 1;
        warn!(session_id = %self.id, kind = %self.kind, error = %err, payload = %truncate(payload, 120), "skipping malformed frame");
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Owns the response body for the lifetime of the loop.
struct Reader<S> {
    session_id: uuid::Uuid,
    body: S,
}

impl<S> Reader<S>
where
    S: Stream + Unpin,
{
    fn new(session_id: uuid::Uuid, body: S) -> Self {
        Self { session_id, body }
    }

    async fn next(&mut self) -> Option<S::Item> {
        self.body.next().await
    }
}

impl<S> Drop for Reader<S> {
    fn drop(&mut self) {
        debug!(session_id = %self.session_id, "stream reader released");
    }
}
