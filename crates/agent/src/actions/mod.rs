//! Action handlers and the registry that maps names to them.
//!
//! The registry is filled once at startup and read-only afterwards.

pub mod read_messages;
pub mod send_message;
pub mod system;

use async_trait::async_trait;
use parley_core::channel::MessageSender;
use parley_core::error::ActionError;
use parley_core::store::ChatStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::action::{Action, ActionResult};
use crate::context::BotContext;

pub use read_messages::ReadUnreadMessagesHandler;
pub use send_message::SendMessageHandler;
pub use system::{BreakHandler, ContinueHandler, ListChannelsHandler, SleepHandler};

/// Executes one kind of [`Action`].
///
/// `channel_id` is the channel whose cycle decided on the action. Handlers
/// that suspend should watch `cancel` and return early when it fires.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The `action` name this handler answers to.
    fn name(&self) -> &str;

    async fn execute(
        &self,
        ctx: &BotContext,
        channel_id: &str,
        action: &Action,
        cancel: &CancellationToken,
    ) -> Result<ActionResult, ActionError>;
}

#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The six built-in actions.
    pub fn standard(
        store: Arc<dyn ChatStore>,
        sender: Arc<dyn MessageSender>,
        bot_name: impl Into<String>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(ContinueHandler);
        registry.register(BreakHandler);
        registry.register(SleepHandler);
        registry.register(ListChannelsHandler::new(store.clone()));
        registry.register(ReadUnreadMessagesHandler);
        registry.register(SendMessageHandler::new(sender, store, bot_name));
        registry
    }

    pub fn register(&mut self, handler: impl ActionHandler + 'static) {
        self.handlers
            .insert(handler.name().to_string(), Arc::new(handler));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Require a `channelId` argument.
pub(crate) fn require_channel<'a>(
    action: &str,
    channel_id: Option<&'a str>,
) -> Result<&'a str, ActionError> {
    channel_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ActionError::InvalidArguments {
            action: action.into(),
            reason: "channelId is required".into(),
        })
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use parley_core::channel::MessageSender;
    use parley_core::error::ChannelError;
    use std::sync::Mutex;

    /// Records every send; fails when `fail` is set.
    #[derive(Default)]
    pub struct RecordingSender {
        pub sent: Mutex<Vec<(String, String, String, String)>>,
        pub fail: bool,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send_message(
            &self,
            platform: &str,
            self_id: &str,
            channel_id: &str,
            content: &str,
        ) -> Result<(), ChannelError> {
            if self.fail {
                return Err(ChannelError::DeliveryFailed {
                    channel: channel_id.into(),
                    reason: "HTTP 500".into(),
                });
            }
            self.sent.lock().unwrap().push((
                platform.into(),
                self_id.into(),
                channel_id.into(),
                content.into(),
            ));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_store::InMemoryStore;

    #[test]
    fn standard_registry_has_all_actions() {
        let registry = ActionRegistry::standard(
            Arc::new(InMemoryStore::new()),
            Arc::new(test_support::RecordingSender::default()),
            "Parley",
        );
        assert_eq!(
            registry.names(),
            [
                "break",
                "continue",
                "list_channels",
                "read_unread_messages",
                "send_message",
                "sleep"
            ]
        );
        assert!(registry.get("fly").is_none());
    }

    #[test]
    fn require_channel_rejects_blank() {
        assert!(require_channel("read_unread_messages", Some("  ")).is_err());
        assert!(require_channel("read_unread_messages", None).is_err());
        assert_eq!(require_channel("x", Some("c1")).unwrap(), "c1");
    }
}
