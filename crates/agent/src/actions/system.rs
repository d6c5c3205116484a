//! Loop-control and introspection actions.

use async_trait::async_trait;
use parley_core::error::ActionError;
use parley_core::store::ChatStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::ActionHandler;
use crate::action::{Action, ActionResult};
use crate::context::BotContext;

pub struct ContinueHandler;

#[async_trait]
impl ActionHandler for ContinueHandler {
    fn name(&self) -> &str {
        "continue"
    }

    async fn execute(
        &self,
        _ctx: &BotContext,
        _channel_id: &str,
        _action: &Action,
        _cancel: &CancellationToken,
    ) -> Result<ActionResult, ActionError> {
        Ok(ActionResult::ok(
            "Acknowledged, will now wait for user input.",
            false,
        ))
    }
}

pub struct BreakHandler;

#[async_trait]
impl ActionHandler for BreakHandler {
    fn name(&self) -> &str {
        "break"
    }

    async fn execute(
        &self,
        ctx: &BotContext,
        channel_id: &str,
        _action: &Action,
        _cancel: &CancellationToken,
    ) -> Result<ActionResult, ActionError> {
        let mut state = ctx.state().await;
        let chat = state
            .chat_mut(channel_id)
            .ok_or_else(|| ActionError::UnknownChannel(channel_id.to_string()))?;
        chat.clear_history();
        Ok(ActionResult::ok("Memory cleared. Loop broken.", false))
    }
}

pub struct SleepHandler;

impl SleepHandler {
    fn duration(ctx: &BotContext, action: &Action) -> Duration {
        match action {
            Action::Sleep {
                duration: Some(ms), ..
            } => Duration::from_millis(*ms),
            Action::Sleep {
                seconds: Some(secs),
                ..
            } if secs.is_finite() && *secs >= 0.0 => Duration::from_secs_f64(*secs),
            _ => ctx.limits().sleep_duration(),
        }
    }
}

#[async_trait]
impl ActionHandler for SleepHandler {
    fn name(&self) -> &str {
        "sleep"
    }

    async fn execute(
        &self,
        ctx: &BotContext,
        channel_id: &str,
        action: &Action,
        cancel: &CancellationToken,
    ) -> Result<ActionResult, ActionError> {
        let duration = Self::duration(ctx, action);
        debug!(channel_id = %channel_id, ms = duration.as_millis() as u64, "Sleeping");

        tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(ActionResult::ok("Sleep interrupted.", false)),
            () = tokio::time::sleep(duration) => Ok(ActionResult::ok(
                format!("Slept for {} seconds.", duration.as_secs()),
                true,
            )),
        }
    }
}

pub struct ListChannelsHandler {
    store: Arc<dyn ChatStore>,
}

impl ListChannelsHandler {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ActionHandler for ListChannelsHandler {
    fn name(&self) -> &str {
        "list_channels"
    }

    async fn execute(
        &self,
        _ctx: &BotContext,
        _channel_id: &str,
        _action: &Action,
        _cancel: &CancellationToken,
    ) -> Result<ActionResult, ActionError> {
        let channels = self.store.list_channels().await?;
        if channels.is_empty() {
            return Ok(ActionResult::ok("No channels known yet.", true));
        }

        let lines: Vec<String> = channels
            .iter()
            .map(|c| format!("ID:{}, Name:{}, Platform:{}", c.id, c.name, c.platform))
            .collect();
        Ok(ActionResult::ok(lines.join("\n"), true))
    }
}
