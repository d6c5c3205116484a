//! # Parley Core
//!
//! Domain types, collaborator traits, and error definitions for the Parley
//! chat bot. This crate has **no I/O of its own**: it defines the model that
//! the event source, the store, the LLM provider, and the control loop all
//! implement against.
//!
//! ## Collaborators
//!
//! - [`Provider`] generates text from a conversation.
//! - [`ChatStore`] records channels and messages.
//! - [`EventSource`] delivers typed platform events.
//! - [`MessageSender`] posts a message into a channel.

pub mod channel;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use channel::{EventSource, Inbound, MessageSender};
pub use error::{ActionError, ChannelError, Error, ProviderError, Result, StoreError};
pub use event::{Event, EventChannel, EventMember, EventMessage, EventUser, Login};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use store::{ChannelRecord, ChatStore, StoredMessage};
