use async_trait::async_trait;
use parley_core::channel::MessageSender;
use parley_core::error::ActionError;
use parley_core::message::Message;
use parley_core::store::ChatStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::ActionHandler;
use crate::action::{Action, ActionResult};
use crate::context::BotContext;

/// Sends a message, unless the channel has unread events the planner has
/// not seen yet.
pub struct SendMessageHandler {
    sender: Arc<dyn MessageSender>,
    store: Arc<dyn ChatStore>,
    bot_name: String,
}

impl SendMessageHandler {
    pub fn new(
        sender: Arc<dyn MessageSender>,
        store: Arc<dyn ChatStore>,
        bot_name: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            store,
            bot_name: bot_name.into(),
        }
    }
}

#[async_trait]
impl ActionHandler for SendMessageHandler {
    fn name(&self) -> &str {
        "send_message"
    }

    async fn execute(
        &self,
        ctx: &BotContext,
        channel_id: &str,
        action: &Action,
        cancel: &CancellationToken,
    ) -> Result<ActionResult, ActionError> {
        let Action::SendMessage {
            channel_id: target,
            content,
        } = action
        else {
            return Err(ActionError::InvalidArguments {
                action: self.name().into(),
                reason: "expected channelId and content".into(),
            });
        };
        let target = super::require_channel(self.name(), Some(target.as_str()))?;

        // Guard and routing lookup happen under one lock.
        let (platform, self_id) = {
            let state = ctx.state().await;
            if state.unread_count(target) > 0 {
                warn!(channel_id = %target, "Aborting send, channel has unread events");
                return Ok(ActionResult::recoverable(format!(
                    "[INTERRUPT] Message sending ABORTED. New messages arrived in channel {target}. \
                     Please [read_unread_messages] first to understand the new context."
                )));
            }
            let chat = state
                .chat(target)
                .filter(|c| !c.platform.is_empty())
                .or_else(|| state.chat(channel_id))
                .ok_or_else(|| ActionError::UnknownChannel(target.to_string()))?;
            (chat.platform.clone(), chat.self_id.clone())
        };

        if cancel.is_cancelled() {
            return Ok(ActionResult::recoverable(
                "Message not sent, the cycle was superseded.",
            ));
        }

        self.sender
            .send_message(&platform, &self_id, target, content)
            .await?;
        info!(channel_id = %target, chars = content.len(), "Message sent");

        if let Err(e) = self
            .store
            .record_message(target, "bot", &self.bot_name, content)
            .await
        {
            warn!(channel_id = %target, error = %e, "Failed to persist outgoing message");
        }

        let mut state = ctx.state().await;
        if let Some(chat) = state.chat_mut(target) {
            chat.messages.push(Message::assistant(content.as_str()));
        }

        Ok(ActionResult::ok(format!("Message sent to channel {target}."), true))
    }
}
