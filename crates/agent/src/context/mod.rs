//! Process-wide bot state.
//!
//! | Field | Bound | Eviction |
//! |-------|-------|----------|
//! | `event_queue` | unbounded, drained FIFO | popped after processing |
//! | `unread_events` | `max_unread_events` per channel | oldest dropped |
//! | `processed_ids` | unbounded | never |
//! | `chats` | one per channel | never |
//! | `last_interacted` | `max_recent_interacted_channels` | oldest dropped |
//!
//! Everything lives behind one async mutex in [`BotContext`]. Guards are
//! held only for bookkeeping, never across planner calls or RPCs.

pub mod chat;

pub use chat::{ChatContext, CycleHandle, TrimReport};

use parley_config::LoopLimits;
use parley_core::event::Event;
use parley_core::store::ChatStore;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// ── Data Structures ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Pending,
    Ready,
}

#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub event: Event,
    pub status: EventStatus,
}

/// Unread counts across all channels, as shown to the planner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnreadSummary {
    pub total: usize,
    /// `(channel_id, count)` ordered by channel id
    pub per_channel: Vec<(String, usize)>,
}

#[derive(Debug, Default)]
pub struct BotState {
    pub event_queue: VecDeque<PendingEvent>,
    pub unread_events: BTreeMap<String, VecDeque<Event>>,
    pub processed_ids: HashSet<String>,
    pub chats: HashMap<String, ChatContext>,
    /// True while an ingestor drain owns the queue
    pub processing: bool,
    pub last_interacted: VecDeque<String>,
}

impl BotState {
    /// Buffer an unread event, dropping the oldest past `cap`. Returns the
    /// number evicted.
    pub fn push_unread(&mut self, channel_id: &str, event: Event, cap: usize) -> usize {
        let buffer = self.unread_events.entry(channel_id.to_string()).or_default();
        buffer.push_back(event);
        let overflow = buffer.len().saturating_sub(cap);
        buffer.drain(..overflow);
        overflow
    }

    pub fn unread_count(&self, channel_id: &str) -> usize {
        self.unread_events.get(channel_id).map_or(0, VecDeque::len)
    }

    /// Remove and return a channel's unread buffer.
    pub fn take_unread(&mut self, channel_id: &str) -> Vec<Event> {
        self.unread_events
            .remove(channel_id)
            .map(Vec::from)
            .unwrap_or_default()
    }

    pub fn channels_with_unread(&self) -> Vec<String> {
        self.unread_events
            .iter()
            .filter(|(_, events)| !events.is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn unread_summary(&self) -> UnreadSummary {
        let per_channel: Vec<(String, usize)> = self
            .unread_events
            .iter()
            .map(|(id, events)| (id.clone(), events.len()))
            .collect();
        UnreadSummary {
            total: per_channel.iter().map(|(_, n)| n).sum(),
            per_channel,
        }
    }

    /// Remember a channel as recently interacted with.
    pub fn mark_interacted(&mut self, channel_id: &str, cap: usize) {
        if !self.last_interacted.iter().any(|id| id == channel_id) {
            self.last_interacted.push_back(channel_id.to_string());
        }
        while self.last_interacted.len() > cap {
            self.last_interacted.pop_front();
        }
    }

    pub fn chat(&self, channel_id: &str) -> Option<&ChatContext> {
        self.chats.get(channel_id)
    }

    pub fn chat_mut(&mut self, channel_id: &str) -> Option<&mut ChatContext> {
        self.chats.get_mut(channel_id)
    }
}

/// Counters for the debug line logged at the start of each cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSummary {
    pub channels: usize,
    pub queued_events: usize,
    pub unread_total: usize,
    pub processed_ids: usize,
    pub active_cycles: usize,
}

// ── BotContext ────────────────────────────────────────────────────────────

pub struct BotContext {
    state: Mutex<BotState>,
    limits: LoopLimits,
    cycle_seq: AtomicU64,
    shutdown: CancellationToken,
}

impl BotContext {
    pub fn new(limits: LoopLimits) -> Self {
        Self {
            state: Mutex::new(BotState::default()),
            limits,
            cycle_seq: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn limits(&self) -> &LoopLimits {
        &self.limits
    }

    pub async fn state(&self) -> MutexGuard<'_, BotState> {
        self.state.lock().await
    }

    /// Parent of every cycle token; cancelling it stops all cycles.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub(crate) fn next_cycle_id(&self) -> u64 {
        self.cycle_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Create the channel's context on first sight, seeding platform and
    /// self id from the store when it knows the channel.
    pub async fn ensure_chat(&self, store: &dyn ChatStore, channel_id: &str) {
        if self.state.lock().await.chats.contains_key(channel_id) {
            return;
        }

        let known = match store.get_channel(channel_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(channel_id = %channel_id, error = %e, "Channel lookup failed");
                None
            }
        };

        let mut state = self.state.lock().await;
        state
            .chats
            .entry(channel_id.to_string())
            .or_insert_with(|| {
                debug!(
                    channel_id = %channel_id,
                    found_in_store = known.is_some(),
                    "Creating chat context"
                );
                match known {
                    Some(record) => ChatContext::new(channel_id, record.platform, record.self_id),
                    None => ChatContext::new(channel_id, "", ""),
                }
            });
    }

    pub async fn summary(&self) -> ContextSummary {
        let state = self.state.lock().await;
        ContextSummary {
            channels: state.chats.len(),
            queued_events: state.event_queue.len(),
            unread_total: state.unread_events.values().map(VecDeque::len).sum(),
            processed_ids: state.processed_ids.len(),
            active_cycles: state
                .chats
                .values()
                .filter(|c| c.current_cycle().is_some())
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::event::{EventChannel, EventMessage};
    use parley_store::InMemoryStore;

    fn event(channel: &str, message: &str) -> Event {
        Event {
            channel: Some(EventChannel {
                id: channel.into(),
                name: None,
            }),
            message: Some(EventMessage {
                id: message.into(),
                content: format!("content {message}"),
                ..EventMessage::default()
            }),
            ..Event::default()
        }
    }

    #[test]
    fn unread_buffer_drops_oldest() {
        let mut state = BotState::default();
        let mut evicted = 0;
        for i in 0..23 {
            evicted += state.push_unread("c1", event("c1", &i.to_string()), 20);
        }
        assert_eq!(evicted, 3);
        assert_eq!(state.unread_count("c1"), 20);
        let first = state.unread_events["c1"].front().unwrap();
        assert_eq!(first.message.as_ref().unwrap().id, "3");
    }

    #[test]
    fn take_unread_removes_entry() {
        let mut state = BotState::default();
        state.push_unread("c1", event("c1", "a"), 5);
        state.push_unread("c1", event("c1", "b"), 5);

        let taken = state.take_unread("c1");
        assert_eq!(taken.len(), 2);
        assert!(!state.unread_events.contains_key("c1"));
        assert!(state.take_unread("c1").is_empty());
    }

    #[test]
    fn summary_counts_every_channel() {
        let mut state = BotState::default();
        state.push_unread("b", event("b", "1"), 5);
        state.push_unread("a", event("a", "1"), 5);
        state.push_unread("a", event("a", "2"), 5);

        let summary = state.unread_summary();
        assert_eq!(summary.total, 3);
        assert_eq!(
            summary.per_channel,
            vec![("a".to_string(), 2), ("b".to_string(), 1)]
        );
        assert_eq!(state.channels_with_unread(), ["a", "b"]);
    }

    #[test]
    fn recent_channels_evict_oldest() {
        let mut state = BotState::default();
        for id in ["a", "b", "a", "c", "d"] {
            state.mark_interacted(id, 3);
        }
        let ids: Vec<_> = state.last_interacted.iter().cloned().collect();
        assert_eq!(ids, ["b", "c", "d"]);
    }

    #[tokio::test]
    async fn ensure_chat_seeds_identity_from_store() {
        let store = InMemoryStore::new();
        store
            .record_channel("c1", "general", "discord", "bot-1")
            .await
            .unwrap();
        let ctx = BotContext::new(LoopLimits::default());

        ctx.ensure_chat(&store, "c1").await;
        ctx.ensure_chat(&store, "c2").await;

        let state = ctx.state().await;
        assert_eq!(state.chat("c1").unwrap().self_id, "bot-1");
        assert_eq!(state.chat("c2").unwrap().platform, "");
        assert_eq!(state.chats.len(), 2);
    }

    #[tokio::test]
    async fn cycle_ids_are_unique() {
        let ctx = BotContext::new(LoopLimits::default());
        let a = ctx.next_cycle_id();
        let b = ctx.next_cycle_id();
        assert_ne!(a, b);
        assert_eq!(ctx.summary().await, ContextSummary::default());
    }
}
