//! The per-channel step function and the periodic sweep that drives it.
//!
//! Each channel holds at most one live cycle. Starting a cycle cancels the
//! one before it; a cancelled cycle stops at its next suspension point and
//! never writes its result back. A continuation is a new cycle that only
//! starts if its predecessor still owns the channel.

use chrono::Utc;
use parley_core::event::Event;
use parley_core::store::ChatStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::action::ActionRecord;
use crate::context::{BotContext, CycleHandle};
use crate::dispatcher::Dispatcher;
use crate::planner::{Planner, PlannerError, PlanningInput};

pub struct Scheduler {
    ctx: Arc<BotContext>,
    planner: Arc<Planner>,
    dispatcher: Dispatcher,
    store: Arc<dyn ChatStore>,
}

impl Scheduler {
    pub fn new(
        ctx: Arc<BotContext>,
        planner: Arc<Planner>,
        dispatcher: Dispatcher,
        store: Arc<dyn ChatStore>,
    ) -> Self {
        Self {
            ctx,
            planner,
            dispatcher,
            store,
        }
    }

    pub fn context(&self) -> &Arc<BotContext> {
        &self.ctx
    }

    /// Run cycles for `channel_id` until one goes idle or is superseded.
    ///
    /// `incoming` is shown to the planner on the first cycle only.
    pub async fn step(&self, channel_id: &str, incoming: Option<Event>) {
        self.ctx.ensure_chat(self.store.as_ref(), channel_id).await;

        let mut incoming = incoming;
        let mut previous = None;

        while let Some(cycle) = self.begin_cycle(channel_id, previous).await {
            let should_continue = self.run_cycle(channel_id, &cycle, incoming.take()).await;

            if should_continue {
                let delay = self.ctx.limits().continue_delay();
                let resumed = tokio::select! {
                    biased;
                    () = cycle.token.cancelled() => false,
                    () = tokio::time::sleep(delay) => true,
                };
                if resumed {
                    previous = Some(cycle.id);
                    continue;
                }
            }

            self.finish_cycle(channel_id, cycle.id).await;
            break;
        }
    }

    /// Install a fresh cycle. With `previous` set this is a continuation and
    /// yields `None` if that cycle no longer owns the channel.
    async fn begin_cycle(&self, channel_id: &str, previous: Option<u64>) -> Option<CycleHandle> {
        let limits = self.ctx.limits();
        let shutdown = self.ctx.shutdown_token();
        if shutdown.is_cancelled() {
            return None;
        }

        let handle = {
            let mut state = self.ctx.state().await;
            let chat = state.chat_mut(channel_id)?;
            if let Some(prev) = previous
                && !chat.owns(prev)
            {
                debug!(channel_id = %channel_id, cycle = prev, "Continuation superseded");
                return None;
            }

            let handle = CycleHandle {
                id: self.ctx.next_cycle_id(),
                token: shutdown.child_token(),
                started_at: Utc::now(),
            };
            if let Some(old) = chat.install_cycle(handle.clone())
                && previous != Some(old)
            {
                info!(
                    channel_id = %channel_id,
                    cancelled = old,
                    cycle = handle.id,
                    "Superseding in-flight cycle"
                );
            }

            let report = chat.trim(limits);
            if report.messages_dropped > 0 || report.actions_dropped > 0 {
                info!(
                    channel_id = %channel_id,
                    messages_dropped = report.messages_dropped,
                    actions_dropped = report.actions_dropped,
                    "Trimmed chat context"
                );
            }

            state.mark_interacted(channel_id, limits.max_recent_interacted_channels);
            handle
        };

        let summary = self.ctx.summary().await;
        debug!(
            channel_id = %channel_id,
            cycle = handle.id,
            channels = summary.channels,
            queued_events = summary.queued_events,
            unread_total = summary.unread_total,
            processed_ids = summary.processed_ids,
            active_cycles = summary.active_cycles,
            "Cycle started"
        );
        Some(handle)
    }

    /// Reason and act once. Returns whether to continue.
    async fn run_cycle(
        &self,
        channel_id: &str,
        cycle: &CycleHandle,
        incoming: Option<Event>,
    ) -> bool {
        let input = {
            let state = self.ctx.state().await;
            let Some(chat) = state.chat(channel_id) else {
                return false;
            };
            PlanningInput {
                messages: chat.messages.clone(),
                actions: chat.actions.clone(),
                unread: state.unread_summary(),
                incoming,
            }
        };

        let payload = match self.planner.decide(&input, &cycle.token).await {
            Ok(payload) => payload,
            Err(PlannerError::Cancelled) => {
                debug!(channel_id = %channel_id, cycle = cycle.id, "Planning interrupted");
                return false;
            }
            Err(e) => {
                warn!(channel_id = %channel_id, cycle = cycle.id, error = %e, "Planning failed");
                return false;
            }
        };

        let result = self
            .dispatcher
            .dispatch(&self.ctx, channel_id, &payload, &cycle.token)
            .await;
        let should_continue = result.should_continue;

        let mut state = self.ctx.state().await;
        match state.chat_mut(channel_id) {
            Some(chat) if chat.owns(cycle.id) => {
                info!(
                    channel_id = %channel_id,
                    cycle = cycle.id,
                    success = result.success,
                    should_continue,
                    "Action completed"
                );
                chat.actions.push(ActionRecord {
                    action: payload,
                    result,
                });
                should_continue
            }
            _ => {
                debug!(
                    channel_id = %channel_id,
                    cycle = cycle.id,
                    "Discarding result of superseded cycle"
                );
                false
            }
        }
    }

    async fn finish_cycle(&self, channel_id: &str, id: u64) {
        let mut state = self.ctx.state().await;
        if let Some(chat) = state.chat_mut(channel_id)
            && chat.clear_cycle(id)
        {
            debug!(channel_id = %channel_id, cycle = id, "Cycle idle");
        }
    }

    /// One pass of the periodic trigger over channels with unread events,
    /// one channel at a time. Returns the number of channels visited.
    pub async fn sweep_once(&self) -> usize {
        let channels = self.ctx.state().await.channels_with_unread();
        if channels.is_empty() {
            debug!("No channels with unread events, skipping periodic check");
            return 0;
        }

        info!(channel_count = channels.len(), "Processing channels with unread events");
        for channel_id in &channels {
            self.step(channel_id, None).await;
        }
        channels.len()
    }

    /// Run [`Self::sweep_once`] every `periodic_loop_interval_ms` until
    /// shutdown.
    pub fn spawn_periodic(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let shutdown = scheduler.ctx.shutdown_token().clone();
            let period = scheduler.ctx.limits().periodic_interval();
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        scheduler.sweep_once().await;
                    }
                }
            }
            debug!("Periodic sweep stopped");
        })
    }
}
