use tokio::sync::mpsc;

use crate::event::{Completion, DomainEvent};

/// Receiver of everything a session delivers.
///
/// Calls happen synchronously on the session task, in wire order, before the
/// next chunk is read. Only `on_event` is required.
pub trait EventSink: Send {
    /// A non-terminal event (breakdown, step, or progress notice).
    fn on_event(&mut self, event: &DomainEvent);

    /// The stream finished successfully with a completion payload.
    fn on_complete(&mut self, _completion: &Completion) {}

    /// The stream failed; `message` is the same text the call fails with.
    fn on_error(&mut self, _message: &str) {}
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn on_event(&mut self, event: &DomainEvent) {
        (**self).on_event(event);
    }

    fn on_complete(&mut self, completion: &Completion) {
        (**self).on_complete(completion);
    }

    fn on_error(&mut self, message: &str) {
        (**self).on_error(message);
    }
}

/// Sink that drops everything; useful when only the final value matters.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn on_event(&mut self, _event: &DomainEvent) {}
}

type ProgressFn = Box<dyn FnMut(&DomainEvent) + Send>;
type CompleteFn = Box<dyn FnMut(&Completion) + Send>;
type ErrorFn = Box<dyn FnMut(&str) + Send>;

/// Closure-based sink with optional progress, completion, and error hooks.
#[derive(Default)]
pub struct Callbacks {
    progress: Option<ProgressFn>,
    complete: Option<CompleteFn>,
    error: Option<ErrorFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called for every non-terminal event.
    pub fn with_progress(mut self, f: impl FnMut(&DomainEvent) + Send + 'static) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    /// Called once when the stream completes with a completion payload.
    pub fn with_complete(mut self, f: impl FnMut(&Completion) + Send + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }

    /// Called once with the failure message.
    pub fn with_error(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }
}

impl EventSink for Callbacks {
    fn on_event(&mut self, event: &DomainEvent) {
        if let Some(f) = self.progress.as_mut() {
            f(event);
        }
    }

    fn on_complete(&mut self, completion: &Completion) {
        if let Some(f) = self.complete.as_mut() {
            f(completion);
        }
    }

    fn on_error(&mut self, message: &str) {
        if let Some(f) = self.error.as_mut() {
            f(message);
        }
    }
}

/// Item forwarded by a [`ChannelSink`].
#[derive(Clone, Debug, PartialEq)]
pub enum SinkMessage {
    Event(DomainEvent),
    Complete(Completion),
    Error(String),
}

/// Push-stream adapter: forwards deliveries into an unbounded channel.
///
/// Sink calls are synchronous and run inside the read loop, so they cannot
/// wait for channel capacity. The queue is bounded by the stream itself:
/// one message per dispatched frame plus one terminal message.
///
/// A dropped receiver is not an error; later deliveries are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn on_event(&mut self, event: &DomainEvent) {
        let _ = self.tx.send(SinkMessage::Event(event.clone()));
    }

    fn on_complete(&mut self, completion: &Completion) {
        let _ = self.tx.send(SinkMessage::Complete(completion.clone()));
    }

    fn on_error(&mut self, message: &str) {
        let _ = self.tx.send(SinkMessage::Error(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ProgressNotice;
    use std::sync::{Arc, Mutex};

    fn notice(message: &str) -> DomainEvent {
        DomainEvent::Progress(ProgressNotice {
            message: message.into(),
            percent: None,
            stage: None,
            detail: None,
        })
    }

    #[test]
    fn callbacks_route_each_delivery_kind() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (p, c, e) = (log.clone(), log.clone(), log.clone());
        let mut sink = Callbacks::new()
            .with_progress(move |_| p.lock().unwrap().push("progress"))
            .with_complete(move |_| c.lock().unwrap().push("complete"))
            .with_error(move |_| e.lock().unwrap().push("error"));
        sink.on_event(&notice("a"));
        sink.on_complete(&Completion::default());
        sink.on_error("boom");
        assert_eq!(*log.lock().unwrap(), vec!["progress", "complete", "error"]);
    }

    #[test]
    fn missing_callbacks_are_skipped() {
        let mut sink = Callbacks::new();
        sink.on_event(&notice("a"));
        sink.on_error("ignored");
    }

    #[tokio::test]
    async fn channel_sink_forwards_in_order() {
        let (mut sink, mut rx) = ChannelSink::new();
        sink.on_event(&notice("a"));
        sink.on_error("boom");
        assert_eq!(rx.recv().await, Some(SinkMessage::Event(notice("a"))));
        assert_eq!(rx.recv().await, Some(SinkMessage::Error("boom".into())));
    }
}
