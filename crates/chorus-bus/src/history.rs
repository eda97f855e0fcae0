//! Bounded FIFO of the most recently emitted events.

use chorus_common::event::{Event, EventType};
use std::collections::VecDeque;
use tokio::sync::Mutex;

pub struct History {
    ring: Mutex<VecDeque<Event>>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        History {
            ring: Mutex::new(VecDeque::with_capacity(limit.min(1024))),
            limit,
        }
    }

    pub async fn push(&self, event: Event) {
        let mut ring = self.ring.lock().await;
        ring.push_back(event);
        while ring.len() > self.limit {
            ring.pop_front();
        }
    }

    pub async fn recent(&self, event_type: Option<EventType>, limit: Option<usize>) -> Vec<Event> {
        let ring = self.ring.lock().await;
        let filtered = ring
            .iter()
            .rev()
            .filter(|e| event_type.map_or(true, |t| e.event_type == t));
        match limit {
            Some(n) => filtered.take(n).cloned().collect(),
            None => filtered.cloned().collect(),
        }
    }

    pub async fn clear(&self) {
        self.ring.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_common::event::EventData;
    use std::collections::HashMap;

    fn dummy_event() -> Event {
        Event::new(
            EventType::SystemHealth,
            EventData::SystemHealth { status: "ok".into() },
            "test",
            HashMap::new(),
        )
    }

    #[tokio::test]
    async fn drops_oldest_when_over_limit() {
        let history = History::new(2);
        for _ in 0..3 {
            history.push(dummy_event()).await;
        }
        assert_eq!(history.recent(None, None).await.len(), 2);
    }

    #[tokio::test]
    async fn clear_empties_the_ring() {
        let history = History::new(10);
        history.push(dummy_event()).await;
        history.clear().await;
        assert!(history.recent(None, None).await.is_empty());
    }
}
