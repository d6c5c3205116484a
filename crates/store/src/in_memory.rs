//! In-memory store: useful for testing and ephemeral runs.

use async_trait::async_trait;
use chrono::Utc;
use parley_core::error::StoreError;
use parley_core::store::{ChannelRecord, ChatStore, StoredMessage};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A store that keeps channels in a sorted map and messages in a Vec.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    channels: Arc<RwLock<BTreeMap<String, ChannelRecord>>>,
    messages: Arc<RwLock<Vec<StoredMessage>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of recorded messages across all channels.
    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }
}

#[async_trait]
impl ChatStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn record_channel(
        &self,
        id: &str,
        name: &str,
        platform: &str,
        self_id: &str,
    ) -> Result<(), StoreError> {
        self.channels.write().await.insert(
            id.to_string(),
            ChannelRecord {
                id: id.into(),
                name: name.into(),
                platform: platform.into(),
                self_id: self_id.into(),
            },
        );
        Ok(())
    }

    async fn record_message(
        &self,
        channel_id: &str,
        user_id: &str,
        user_name: &str,
        content: &str,
    ) -> Result<(), StoreError> {
        self.messages.write().await.push(StoredMessage {
            channel_id: channel_id.into(),
            user_id: user_id.into(),
            user_name: user_name.into(),
            content: content.into(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_channels(&self) -> Result<Vec<ChannelRecord>, StoreError> {
        Ok(self.channels.read().await.values().cloned().collect())
    }

    async fn get_channel(&self, id: &str) -> Result<Option<ChannelRecord>, StoreError> {
        Ok(self.channels.read().await.get(id).cloned())
    }

    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let messages = self.messages.read().await;
        let mut recent: Vec<StoredMessage> = messages
            .iter()
            .rev()
            .filter(|m| m.channel_id == channel_id)
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }
}
