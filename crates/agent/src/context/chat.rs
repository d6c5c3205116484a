//! Per-channel state: conversation window, action history, and the slot
//! holding the single in-flight cycle.

use chrono::{DateTime, Utc};
use parley_config::LoopLimits;
use parley_core::message::Message;
use tokio_util::sync::CancellationToken;

use crate::action::ActionRecord;

/// The live cycle of a channel.
#[derive(Debug, Clone)]
pub struct CycleHandle {
    pub id: u64,
    pub token: CancellationToken,
    pub started_at: DateTime<Utc>,
}

/// What a trim pass discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimReport {
    pub messages_dropped: usize,
    pub actions_dropped: usize,
}

#[derive(Debug)]
pub struct ChatContext {
    pub channel_id: String,
    pub platform: String,
    /// The bot's own account on `platform`, used to filter echoes
    pub self_id: String,
    pub messages: Vec<Message>,
    pub actions: Vec<ActionRecord>,
    current_cycle: Option<CycleHandle>,
}

impl ChatContext {
    pub fn new(
        channel_id: impl Into<String>,
        platform: impl Into<String>,
        self_id: impl Into<String>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            platform: platform.into(),
            self_id: self_id.into(),
            messages: Vec::new(),
            actions: Vec::new(),
            current_cycle: None,
        }
    }

    pub fn current_cycle(&self) -> Option<&CycleHandle> {
        self.current_cycle.as_ref()
    }

    /// True while cycle `id` is installed and not cancelled.
    pub fn owns(&self, id: u64) -> bool {
        self.current_cycle
            .as_ref()
            .is_some_and(|c| c.id == id && !c.token.is_cancelled())
    }

    /// Install a new cycle, cancelling whichever one held the slot.
    pub(crate) fn install_cycle(&mut self, handle: CycleHandle) -> Option<u64> {
        let previous = self.current_cycle.replace(handle);
        previous.map(|old| {
            old.token.cancel();
            old.id
        })
    }

    /// Clear the slot only if cycle `id` still holds it.
    pub(crate) fn clear_cycle(&mut self, id: u64) -> bool {
        if self.current_cycle.as_ref().is_some_and(|c| c.id == id) {
            self.current_cycle = None;
            true
        } else {
            false
        }
    }

    /// Bound the message and action windows.
    ///
    /// Each window over its cap is cut to its keep size and a notice is
    /// appended to `messages` so the planner knows history was lost.
    pub fn trim(&mut self, limits: &LoopLimits) -> TrimReport {
        let mut report = TrimReport::default();

        // A keep size at or above the window length drops nothing.
        if self.messages.len() > limits.max_messages_in_context
            && self.messages.len() > limits.messages_keep_on_trim
        {
            let before = self.messages.len();
            let keep = limits.messages_keep_on_trim;
            let dropped = before.saturating_sub(keep);
            self.messages.drain(..dropped);
            report.messages_dropped = dropped;
            self.messages.push(Message::notice(format!(
                "Approaching to system context limit, message history reduced from {before} to {keep}, history may be lost."
            )));
        }

        if self.actions.len() > limits.max_actions_in_context
            && self.actions.len() > limits.actions_keep_on_trim
        {
            let before = self.actions.len();
            let keep = limits.actions_keep_on_trim;
            let dropped = before.saturating_sub(keep);
            self.actions.drain(..dropped);
            report.actions_dropped = dropped;
            self.messages.push(Message::notice(format!(
                "Approaching to system context limit, action history reduced from {before} to {keep}, history of actions may be lost."
            )));
        }

        report
    }

    /// Forget the conversation and action history (the `break` action).
    pub fn clear_history(&mut self) {
        self.messages.clear();
        self.actions.clear();
    }
}
