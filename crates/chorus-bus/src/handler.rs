//! Handler registration and the per-subscription FIFO worker.
//!
//! Fan-out spawns one task per handler per event, matching "the emit call
//! must not await the join set" — but a fresh task per event cannot
//! guarantee per-subscriber ordering under executor scheduling jitter, so
//! each subscription instead owns a dedicated worker task draining an
//! unbounded queue serially. `emit` only has to push onto that queue, which
//! is itself non-blocking.

use async_trait::async_trait;
use chorus_common::event::Event;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;
use uuid::Uuid;

/// Registered for one or more event types. Sync handlers from other
/// languages become plain non-suspending implementations of this trait;
/// there is no separate sync/async split in Rust.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event);

    /// Used only in logs; defaults to the type name.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

pub struct Subscription {
    pub id: Uuid,
    queue: mpsc::UnboundedSender<Event>,
    _worker: CancellationToken,
}

impl Subscription {
    pub fn new(handler: Arc<dyn EventHandler>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let token = CancellationToken::new();
        let worker_token = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = worker_token.cancelled() => break,
                    event = rx.recv() => {
                        match event {
                            Some(event) => dispatch(handler.as_ref(), &event).await,
                            None => break,
                        }
                    }
                }
            }
        });
        Subscription {
            id: Uuid::new_v4(),
            queue: tx,
            _worker: token,
        }
    }

    /// Non-blocking: pushes onto the worker's queue. Returns false if the
    /// worker task has already exited (subscription torn down).
    pub fn enqueue(&self, event: Event) -> bool {
        self.queue.send(event).is_ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self._worker.cancel();
    }
}

/// A panicking handler is logged and never affects sibling handlers or
/// future events — tokio already isolates panics to the task they occur
/// in, but `catch_unwind` here keeps the worker loop itself alive even if
/// the panic somehow unwinds into this frame (e.g. a handler that spawns
/// nothing and panics synchronously inside its async fn).
async fn dispatch(handler: &dyn EventHandler, event: &Event) {
    let result = AssertUnwindSafe(handler.handle(event)).catch_unwind().await;
    if let Err(_panic) = result {
        error!(handler = handler.name(), event_id = %event.id, "event handler panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_common::event::{EventData, EventType};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: &Event) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl EventHandler for PanickingHandler {
        async fn handle(&self, _event: &Event) {
            panic!("boom");
        }
    }

    fn dummy_event() -> Event {
        Event::new(
            EventType::SystemHealth,
            EventData::SystemHealth { status: "ok".into() },
            "test",
            HashMap::new(),
        )
    }

    #[tokio::test]
    async fn counting_handler_sees_each_enqueued_event() {
        let count = Arc::new(AtomicUsize::new(0));
        let sub = Subscription::new(Arc::new(CountingHandler { count: count.clone() }));
        sub.enqueue(dummy_event());
        sub.enqueue(dummy_event());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn panicking_handler_does_not_kill_the_worker() {
        let sub = Subscription::new(Arc::new(PanickingHandler));
        sub.enqueue(dummy_event());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        // the worker task must still accept further events without crashing
        assert!(sub.enqueue(dummy_event()));
    }
}
