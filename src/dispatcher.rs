// file: src/dispatcher.rs
// description: typed publish/subscribe registry multiplexing envelopes to handlers

use crate::{
    events::{Envelope, EventKind, EventType},
    monitoring::{HANDLER_PANICS, PARSE_ERRORS},
};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{
    Arc, Mutex, Weak,
    atomic::{AtomicU64, Ordering},
};
use tracing::{error, warn};

type RawHandler = Arc<dyn Fn(&Envelope) + Send + Sync>;

#[derive(Clone)]
struct HandlerEntry {
    id: u64,
    handler: RawHandler,
}

/// Fan-out point between the connection manager (producer) and the store,
/// UI and any other interested consumer.
///
/// Handlers for one event type run synchronously in registration order, and
/// dispatch of one envelope completes fully before the next is processed.
/// A handler that panics is caught and logged; it never stops the remaining
/// handlers nor reaches the caller of `emit`.
pub struct EventDispatcher {
    handlers: Mutex<HashMap<EventType, Vec<HandlerEntry>>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handlers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Register a typed handler; the payload type fixes the event tag.
    pub fn on<P, F>(self: &Arc<Self>, handler: F) -> Subscription
    where
        P: EventKind,
        F: Fn(&P, &Envelope) + Send + Sync + 'static,
    {
        self.on_raw(P::EVENT_TYPE, move |envelope| {
            if let Some(payload) = P::extract(&envelope.data) {
                handler(payload, envelope);
            }
        })
    }

    /// Register an envelope-level handler for `event_type`.
    pub fn on_raw<F>(self: &Arc<Self>, event_type: EventType, handler: F) -> Subscription
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = HandlerEntry {
            id,
            handler: Arc::new(handler),
        };
        self.lock().entry(event_type).or_default().push(entry);
        Subscription {
            dispatcher: Arc::downgrade(self),
            event_type,
            id,
        }
    }

    /// Remove one registration. Removing an id that is already gone is a
    /// no-op, which makes repeated unsubscribes harmless.
    pub fn off(&self, event_type: EventType, id: u64) {
        let mut handlers = self.lock();
        if let Some(entries) = handlers.get_mut(&event_type) {
            entries.retain(|entry| entry.id != id);
            if entries.is_empty() {
                handlers.remove(&event_type);
            }
        }
    }

    /// Invoke every handler registered for the envelope's event type, in
    /// registration order. The handler list is snapshotted first, so an
    /// unsubscribe performed mid-dispatch does not affect handlers already
    /// scheduled for this call.
    pub fn emit(&self, envelope: &Envelope) {
        let event_type = envelope.event_type();
        let snapshot: Vec<HandlerEntry> = self
            .lock()
            .get(&event_type)
            .cloned()
            .unwrap_or_default();

        for entry in snapshot {
            let result = catch_unwind(AssertUnwindSafe(|| (entry.handler)(envelope)));
            if result.is_err() {
                HANDLER_PANICS.increment(1);
                error!(event = %event_type, handler_id = entry.id, "event handler panicked; continuing dispatch");
            }
        }
    }

    /// Decode an inbound text frame and fan it out. A malformed frame is
    /// logged and discarded; the connection stays open.
    pub fn dispatch_text(&self, raw: &str) {
        match Envelope::decode(raw) {
            Ok(envelope) => self.emit(&envelope),
            Err(e) => {
                PARSE_ERRORS.increment(1);
                warn!(error = %e, "discarding malformed frame");
            }
        }
    }

    pub fn handler_count(&self, event_type: EventType) -> usize {
        self.lock().get(&event_type).map_or(0, Vec::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<EventType, Vec<HandlerEntry>>> {
        self.handlers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Capability returned by `on`/`on_raw`; removes exactly that registration.
pub struct Subscription {
    dispatcher: Weak<EventDispatcher>,
    event_type: EventType,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Some(dispatcher) = self.dispatcher.upgrade() {
            dispatcher.off(self.event_type, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventData;
    use crate::types::{Notification, NotificationKind, ScanProgress};
    use chrono::Utc;

    fn progress_envelope(scan_id: &str, progress: u8) -> Envelope {
        Envelope::local(EventData::ScanProgress(ScanProgress {
            scan_id: scan_id.to_string(),
            progress,
            status: None,
        }))
    }

    fn notification_envelope() -> Envelope {
        Envelope::local(EventData::Notification(Notification {
            id: "n1".to_string(),
            kind: NotificationKind::Info,
            title: "t".to_string(),
            message: "m".to_string(),
            timestamp: Utc::now(),
            read: false,
        }))
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut subs = Vec::new();
        for i in 0..4u32 {
            let seen = seen.clone();
            subs.push(dispatcher.on(move |_: &ScanProgress, _: &Envelope| {
                seen.lock().unwrap().push(i);
            }));
        }

        dispatcher.emit(&progress_envelope("s1", 10));
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn typed_handlers_only_see_their_event_type() {
        let dispatcher = EventDispatcher::new();
        let hits = Arc::new(Mutex::new(0u32));

        let hits2 = hits.clone();
        let _sub = dispatcher.on(move |_: &Notification, _: &Envelope| {
            *hits2.lock().unwrap() += 1;
        });

        dispatcher.emit(&progress_envelope("s1", 10));
        assert_eq!(*hits.lock().unwrap(), 0);

        dispatcher.emit(&notification_envelope());
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn panicking_handler_does_not_stop_dispatch() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let _a = dispatcher.on(move |_: &ScanProgress, _: &Envelope| {
            panic!("handler bug");
        });
        let seen2 = seen.clone();
        let _b = dispatcher.on(move |_: &ScanProgress, _: &Envelope| {
            seen2.lock().unwrap().push("after");
        });

        // must not propagate the panic
        dispatcher.emit(&progress_envelope("s1", 10));
        assert_eq!(*seen.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn unsubscribe_during_emit_keeps_current_dispatch_intact() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let later_sub: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let later_sub2 = later_sub.clone();
        let _first = dispatcher.on(move |_: &ScanProgress, _: &Envelope| {
            if let Some(sub) = later_sub2.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        });
        let seen2 = seen.clone();
        let second = dispatcher.on(move |_: &ScanProgress, _: &Envelope| {
            seen2.lock().unwrap().push(());
        });
        *later_sub.lock().unwrap() = Some(second);

        // second handler was already scheduled for this emit
        dispatcher.emit(&progress_envelope("s1", 10));
        assert_eq!(seen.lock().unwrap().len(), 1);

        // but it is gone for the next one
        dispatcher.emit(&progress_envelope("s1", 20));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(dispatcher.handler_count(EventType::ScanProgress), 1);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let dispatcher = EventDispatcher::new();
        let sub = dispatcher.on(|_: &ScanProgress, _: &Envelope| {});
        assert_eq!(dispatcher.handler_count(EventType::ScanProgress), 1);
        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(dispatcher.handler_count(EventType::ScanProgress), 0);
    }

    #[test]
    fn malformed_frame_is_swallowed() {
        let dispatcher = EventDispatcher::new();
        let hits = Arc::new(Mutex::new(0u32));
        let hits2 = hits.clone();
        let _sub = dispatcher.on(move |_: &ScanProgress, _: &Envelope| {
            *hits2.lock().unwrap() += 1;
        });

        dispatcher.dispatch_text("{ definitely not an envelope");
        dispatcher.dispatch_text(r#"{"type":"no.such.event","data":{},"timestamp":"2025-08-25T12:00:00Z"}"#);
        assert_eq!(*hits.lock().unwrap(), 0);

        dispatcher.dispatch_text(
            r#"{"type":"scan.progress","data":{"scan_id":"s1","progress":5},"timestamp":"2025-08-25T12:00:00Z"}"#,
        );
        assert_eq!(*hits.lock().unwrap(), 1);
    }
}
