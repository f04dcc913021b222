//! Named connection events and their listeners.

use std::sync::{Arc, RwLock};

use crate::error::Error;
use crate::message::Message;

/// Event names listeners subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Upgrade handshake finished.
    Open,
    /// A message arrived through the background poller.
    Message,
    /// The connection was torn down.
    Close,
    /// The background poller hit a failure.
    Error,
}

/// An event with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open,
    Message(Message),
    Close,
    Error(Error),
}

impl Event {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Open => EventKind::Open,
            Event::Message(_) => EventKind::Message,
            Event::Close => EventKind::Close,
            Event::Error(_) => EventKind::Error,
        }
    }
}

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Listener registry. Listeners run on the thread that emits: the caller's
/// thread for `open` and `close`, the poller thread for `message` and `error`.
#[derive(Default)]
pub struct EventEmitter {
    listeners: RwLock<Vec<(EventKind, Listener)>>,
}

impl EventEmitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((kind, Arc::new(listener)));
    }

    /// Call every listener registered for the event's kind, in registration
    /// order.
    ///
    /// The registry lock is released before listeners run, so a listener may
    /// register further listeners.
    pub fn emit(&self, event: &Event) {
        let kind = event.kind();
        let matching: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in matching {
            listener(event);
        }
    }

    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .listeners
            .read()
            .map(|l| l.len())
            .unwrap_or_default();
        f.debug_struct("EventEmitter")
            .field("listeners", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_reaches_matching_listeners_only() {
        let emitter = EventEmitter::new();
        let opens = Arc::new(AtomicUsize::new(0));
        let closes = Arc::new(AtomicUsize::new(0));

        let o = Arc::clone(&opens);
        emitter.on(EventKind::Open, move |_| {
            o.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(&closes);
        emitter.on(EventKind::Close, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        emitter.emit(&Event::Open);
        emitter.emit(&Event::Open);
        emitter.emit(&Event::Close);

        assert_eq!(opens.load(Ordering::SeqCst), 2);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_message_payload_and_order() {
        let emitter = EventEmitter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            emitter.on(EventKind::Message, move |event| {
                if let Event::Message(Message::Text(text)) = event {
                    seen.lock().unwrap().push(format!("{tag}:{text}"));
                }
            });
        }

        emitter.emit(&Event::Message(Message::text("hi")));
        assert_eq!(*seen.lock().unwrap(), vec!["first:hi", "second:hi"]);
        assert_eq!(emitter.listener_count(EventKind::Message), 2);
        assert_eq!(emitter.listener_count(EventKind::Error), 0);
    }

    #[test]
    fn test_listener_may_register_during_emit() {
        let emitter = Arc::new(EventEmitter::new());
        let inner = Arc::clone(&emitter);
        emitter.on(EventKind::Open, move |_| {
            inner.on(EventKind::Close, |_| {});
        });

        emitter.emit(&Event::Open);
        assert_eq!(emitter.listener_count(EventKind::Close), 1);
    }

    #[test]
    fn test_error_event_kind() {
        let event = Event::Error(Error::ConnectionClosed);
        assert_eq!(event.kind(), EventKind::Error);
    }
}
