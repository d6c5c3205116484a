//! Event source and message sender: the abstraction over the chat protocol.
//!
//! The control loop consumes [`Inbound`] items from an [`EventSource`] and
//! answers through a [`MessageSender`]. Both are implemented by the Satori
//! client; tests substitute in-process fakes.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ChannelError;
use crate::event::{Event, Login};

/// Something the event source delivered.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// The connection is identified; lists the bot accounts behind it.
    Ready(Vec<Login>),
    /// A platform event.
    Event(Box<Event>),
}

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Human-readable source name (e.g., "satori").
    fn name(&self) -> &str;

    /// Start receiving events.
    ///
    /// Connection management (identify, heartbeats, reconnects) happens
    /// inside the implementation. Transport failures are reported on the
    /// receiver without closing it.
    async fn start(&self) -> Result<mpsc::Receiver<Result<Inbound, ChannelError>>, ChannelError>;

    /// Stop receiving and close the connection.
    async fn stop(&self) -> Result<(), ChannelError>;
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Post `content` into `channel_id` as the account `self_id` on `platform`.
    async fn send_message(
        &self,
        platform: &str,
        self_id: &str,
        channel_id: &str,
        content: &str,
    ) -> Result<(), ChannelError>;
}
