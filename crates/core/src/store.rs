//! Persistence abstraction for channels and their messages.
//!
//! The control loop writes through this trait while ingesting and reads it
//! back to resolve channel identity and to answer `list_channels`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A channel the bot has seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: String,
    pub name: String,
    pub platform: String,
    pub self_id: String,
}

/// A recorded message in a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Insert or update a channel by id.
    async fn record_channel(
        &self,
        id: &str,
        name: &str,
        platform: &str,
        self_id: &str,
    ) -> Result<(), StoreError>;

    /// Append a message to a channel's log.
    async fn record_message(
        &self,
        channel_id: &str,
        user_id: &str,
        user_name: &str,
        content: &str,
    ) -> Result<(), StoreError>;

    /// All known channels, ordered by id.
    async fn list_channels(&self) -> Result<Vec<ChannelRecord>, StoreError>;

    /// Look up a single channel.
    async fn get_channel(&self, id: &str) -> Result<Option<ChannelRecord>, StoreError>;

    /// The latest `limit` messages of a channel, oldest first.
    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError>;
}
