//! Routes a planner payload to its handler and folds every failure into an
//! [`ActionResult`]. Nothing here returns an error.

use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::action::{Action, ActionResult};
use crate::actions::ActionRegistry;
use crate::context::BotContext;

pub struct Dispatcher {
    registry: Arc<ActionRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub async fn dispatch(
        &self,
        ctx: &BotContext,
        channel_id: &str,
        payload: &Value,
        cancel: &CancellationToken,
    ) -> ActionResult {
        let Some(name) = payload.get("action").and_then(Value::as_str) else {
            warn!(channel_id = %channel_id, "Planner payload has no action name");
            return ActionResult::recoverable(format!(
                "Malformed action payload, expected a string \"action\" field: {payload}"
            ));
        };

        let Some(handler) = self.registry.get(name) else {
            warn!(channel_id = %channel_id, action = %name, "Unknown action");
            return ActionResult::recoverable(format!(
                "Unknown action: {name}. Available actions: {}",
                self.registry.names().join(", ")
            ));
        };

        let action = match Action::from_payload(payload) {
            Ok(action) => action,
            Err(e) => {
                warn!(
                    channel_id = %channel_id,
                    action = %name,
                    error = %e,
                    "Invalid action arguments"
                );
                return ActionResult::recoverable(format!(
                    "Invalid arguments for {name}: {e}"
                ));
            }
        };

        debug!(channel_id = %channel_id, action = %name, "Dispatching action");
        match handler.execute(ctx, channel_id, &action, cancel).await {
            Ok(result) => result,
            Err(e) => {
                warn!(channel_id = %channel_id, action = %name, error = %e, "Action failed");
                ActionResult::recoverable(format!("Action {name} failed: {e}"))
            }
        }
    }
}
