//! Event ingestion: dedup, persistence, unread buffering, and the
//! message-triggered cycle.
//!
//! Draining is single-owner. Whoever flips `processing` processes the queue
//! head by head, awaiting each channel's full step before moving on.

use parley_core::event::Event;
use parley_core::store::ChatStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::{EventStatus, PendingEvent};
use crate::scheduler::Scheduler;

pub struct Ingestor {
    scheduler: Arc<Scheduler>,
    store: Arc<dyn ChatStore>,
}

impl Ingestor {
    pub fn new(scheduler: Arc<Scheduler>, store: Arc<dyn ChatStore>) -> Self {
        Self { scheduler, store }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Queue an event unless it was seen before, then drain.
    pub async fn admit(&self, event: Event) {
        if self.enqueue(event).await {
            self.drain().await;
        }
    }

    /// Append an event to the queue in arrival order. Returns false when the
    /// event has no message or was seen before.
    ///
    /// Callers that hand draining to another task must enqueue first, so
    /// queue order follows arrival order rather than task scheduling.
    pub async fn enqueue(&self, event: Event) -> bool {
        let Some(key) = event.dedup_key() else {
            debug!(kind = %event.kind, "Ignoring event without message");
            return false;
        };

        let mut state = self.scheduler.context().state().await;
        if !state.processed_ids.insert(key.clone()) {
            debug!(event_key = %key, "Duplicate event dropped");
            return false;
        }
        state.event_queue.push_back(PendingEvent {
            event,
            status: EventStatus::Ready,
        });
        true
    }

    /// Process queued events until the queue is empty or its head is not
    /// ready. Returns at once if another drain is running.
    pub async fn drain(&self) {
        let ctx = self.scheduler.context();
        {
            let mut state = ctx.state().await;
            if state.processing {
                return;
            }
            state.processing = true;
        }

        loop {
            let event = {
                let mut state = ctx.state().await;
                match state.event_queue.front() {
                    Some(head) if head.status == EventStatus::Ready => head.event.clone(),
                    _ => {
                        state.processing = false;
                        return;
                    }
                }
            };

            self.process(event).await;
            ctx.state().await.event_queue.pop_front();
        }
    }

    async fn process(&self, event: Event) {
        let ctx = self.scheduler.context();
        let channel_id = event
            .channel_id()
            .filter(|id| !id.is_empty())
            .unwrap_or("unknown")
            .to_string();

        ctx.ensure_chat(self.store.as_ref(), &channel_id).await;

        let (platform, self_id) = {
            let mut state = ctx.state().await;
            let Some(chat) = state.chat_mut(&channel_id) else {
                return;
            };
            if chat.platform.is_empty() {
                chat.platform = if event.platform.is_empty() {
                    "unknown".to_string()
                } else {
                    event.platform.clone()
                };
            }
            if chat.self_id.is_empty() {
                chat.self_id = event.resolved_self_id().unwrap_or("unknown").to_string();
            }
            (chat.platform.clone(), chat.self_id.clone())
        };

        let channel_name = event.channel_name().unwrap_or(&channel_id);
        if let Err(e) = self
            .store
            .record_channel(&channel_id, channel_name, &platform, &self_id)
            .await
        {
            warn!(channel_id = %channel_id, error = %e, "Failed to persist channel");
        }

        let author = event.author_id();
        if let (Some(user_id), Some(content)) = (author, event.content()) {
            let user_name = event.author_name().unwrap_or(user_id);
            if let Err(e) = self
                .store
                .record_message(&channel_id, user_id, user_name, content)
                .await
            {
                warn!(channel_id = %channel_id, error = %e, "Failed to persist message");
            }
        }

        if author == Some(self_id.as_str()) {
            debug!(channel_id = %channel_id, self_id = %self_id, "Skipping the bot's own message");
            return;
        }

        {
            let cap = ctx.limits().max_unread_events;
            let mut state = ctx.state().await;
            let evicted = state.push_unread(&channel_id, event.clone(), cap);
            if evicted > 0 {
                debug!(channel_id = %channel_id, evicted, "Unread buffer full, dropped oldest");
            }
        }

        info!(channel_id = %channel_id, "Event buffered, triggering immediate reaction");
        self.scheduler.step(&channel_id, Some(event)).await;
    }
}
