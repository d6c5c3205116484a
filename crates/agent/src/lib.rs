//! The Parley control loop.
//!
//! Two triggers drive a per-channel **reason → act → maybe continue** cycle:
//!
//! 1. **Events**: [`Ingestor::admit`] dedups, persists, and buffers an
//!    incoming message, then runs the channel's step with the event attached.
//! 2. **Sweep**: [`Scheduler::spawn_periodic`] revisits every channel that
//!    still has unread events.
//!
//! Each step asks the [`Planner`] for a JSON action and hands it to the
//! [`Dispatcher`], which runs the matching [`ActionHandler`]. A new cycle
//! for a channel cancels the one already running there.

pub mod action;
pub mod actions;
pub mod context;
pub mod dispatcher;
pub mod ingest;
pub mod parse;
pub mod planner;
pub mod prompts;
pub mod runtime;
pub mod scheduler;

pub use action::{Action, ActionRecord, ActionResult};
pub use actions::{ActionHandler, ActionRegistry};
pub use context::{BotContext, BotState, ChatContext, ContextSummary, UnreadSummary};
pub use dispatcher::Dispatcher;
pub use ingest::Ingestor;
pub use parse::{ParseError, parse_action_payload, repair_json};
pub use planner::{Planner, PlannerError, PlanningInput};
pub use runtime::BotRuntime;
pub use scheduler::Scheduler;
