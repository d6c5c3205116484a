use async_trait::async_trait;
use parley_core::error::ActionError;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{ActionHandler, require_channel};
use crate::action::{Action, ActionResult};
use crate::context::BotContext;

/// Hands a channel's unread buffer to the planner and empties it.
pub struct ReadUnreadMessagesHandler;

#[async_trait]
impl ActionHandler for ReadUnreadMessagesHandler {
    fn name(&self) -> &str {
        "read_unread_messages"
    }

    async fn execute(
        &self,
        ctx: &BotContext,
        _channel_id: &str,
        action: &Action,
        _cancel: &CancellationToken,
    ) -> Result<ActionResult, ActionError> {
        let requested = match action {
            Action::ReadUnreadMessages { channel_id } => channel_id.as_deref(),
            _ => None,
        };
        let target = require_channel(self.name(), requested)?;

        let events = ctx.state().await.take_unread(target);
        if events.is_empty() {
            return Ok(ActionResult::ok("No unread messages found.", true));
        }

        let lines: Vec<String> = events
            .iter()
            .map(|event| {
                format!(
                    "[{}]: {}",
                    event.author_name().unwrap_or("Unknown"),
                    event.content().unwrap_or("[No content]")
                )
            })
            .collect();

        info!(channel_id = %target, count = events.len(), "Read unread events");
        Ok(ActionResult::ok(
            format!(
                "Read {} unread events from channel {}:\n{}",
                events.len(),
                target,
                lines.join("\n")
            ),
            true,
        ))
    }
}
