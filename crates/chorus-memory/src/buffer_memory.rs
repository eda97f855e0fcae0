//! Bounded recent-message buffer per channel, backed by an LRU cache so
//! quiet channels are evicted before busy ones grow unbounded.

use chorus_common::domain::Message;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Roughly 4 characters per token; the spec asks for "up to ~500 tokens of
/// recent interactions" when the runtime materializes a transcript.
const CHARS_PER_TOKEN_ESTIMATE: usize = 4;

pub struct ConversationBuffer {
    cache: Mutex<LruCache<String, Vec<Message>>>,
    max_messages_per_channel: usize,
}

impl ConversationBuffer {
    pub fn new(channel_capacity: usize, max_messages_per_channel: usize) -> Self {
        let capacity = NonZeroUsize::new(channel_capacity.max(1)).unwrap();
        ConversationBuffer {
            cache: Mutex::new(LruCache::new(capacity)),
            max_messages_per_channel,
        }
    }

    pub fn record(&self, channel_id: &str, message: Message) {
        let mut cache = self.cache.lock().unwrap();
        let entry = cache.get_or_insert_mut(channel_id.to_string(), Vec::new);
        entry.push(message);
        if entry.len() > self.max_messages_per_channel {
            let overflow = entry.len() - self.max_messages_per_channel;
            entry.drain(0..overflow);
        }
    }

    pub fn recent(&self, channel_id: &str) -> Vec<Message> {
        let mut cache = self.cache.lock().unwrap();
        cache.get(channel_id).cloned().unwrap_or_default()
    }

    /// Formats the buffered messages oldest-first as a plain transcript,
    /// trimmed to approximately `token_budget` tokens. This is the
    /// "materialize to a bounded string at the moment of invocation" step
    /// the reactive loop performs before calling the response generator.
    pub fn format_context(&self, channel_id: &str, token_budget: usize) -> String {
        let budget_chars = token_budget * CHARS_PER_TOKEN_ESTIMATE;
        let messages = self.recent(channel_id);
        let mut lines: Vec<String> = messages
            .iter()
            .map(|m| format!("{}: {}", m.sender_id, m.content))
            .collect();
        let mut total: usize = lines.iter().map(|l| l.len() + 1).sum();
        while total > budget_chars && !lines.is_empty() {
            let dropped = lines.remove(0);
            total -= dropped.len() + 1;
        }
        lines.join("\n")
    }
}
