//! Persistence collaborator
//!
//! Profiles, conversations, and messages keyed by user identity, treated as
//! a pure create/read sink. The trait seam keeps the turn controller
//! independent of the actual database.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::conversation::Speaker;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    #[error("profile already exists: {0}")]
    ProfileExists(String),

    #[error("conversation not found: {0}")]
    ConversationNotFound(Uuid),
}

/// A signed-in learner's profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub user_id: String,
    pub display_name: String,
    pub native_language: String,
    pub target_language: String,
    pub created_at: DateTime<Utc>,
}

/// One practice conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub conversation_id: Uuid,
    pub user_id: String,
    pub topic: String,
    pub language: String,
    pub started_at: DateTime<Utc>,
}

/// One persisted utterance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub conversation_id: Uuid,
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_profile(&self, profile: ProfileRecord) -> Result<(), StoreError>;

    async fn get_profile(&self, user_id: &str) -> Result<ProfileRecord, StoreError>;

    async fn create_conversation(&self, conversation: ConversationRecord)
        -> Result<(), StoreError>;

    async fn append_message(&self, message: MessageRecord) -> Result<(), StoreError>;

    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<MessageRecord>, StoreError>;
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    profiles: RwLock<HashMap<String, ProfileRecord>>,
    conversations: RwLock<HashMap<Uuid, ConversationRecord>>,
    messages: RwLock<HashMap<Uuid, Vec<MessageRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ConversationStore for MemoryStore {
    async fn create_profile(&self, profile: ProfileRecord) -> Result<(), StoreError> {
        let mut profiles = self.profiles.write().await;
        if profiles.contains_key(&profile.user_id) {
            return Err(StoreError::ProfileExists(profile.user_id));
        }
        profiles.insert(profile.user_id.clone(), profile);
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<ProfileRecord, StoreError> {
        self.profiles
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| StoreError::ProfileNotFound(user_id.to_string()))
    }

    async fn create_conversation(
        &self,
        conversation: ConversationRecord,
    ) -> Result<(), StoreError> {
        let mut conversations = self.conversations.write().await;
        self.messages
            .write()
            .await
            .insert(conversation.conversation_id, Vec::new());
        conversations.insert(conversation.conversation_id, conversation);
        Ok(())
    }

    async fn append_message(&self, message: MessageRecord) -> Result<(), StoreError> {
        let mut messages = self.messages.write().await;
        match messages.get_mut(&message.conversation_id) {
            Some(list) => {
                list.push(message);
                Ok(())
            }
            None => Err(StoreError::ConversationNotFound(message.conversation_id)),
        }
    }

    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<MessageRecord>, StoreError> {
        self.messages
            .read()
            .await
            .get(&conversation_id)
            .cloned()
            .ok_or(StoreError::ConversationNotFound(conversation_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(user_id: &str) -> ProfileRecord {
        ProfileRecord {
            user_id: user_id.to_string(),
            display_name: "Test Learner".to_string(),
            native_language: "English".to_string(),
            target_language: "Spanish".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_profile_roundtrip() {
        let store = MemoryStore::new();
        store.create_profile(profile("u1")).await.unwrap();

        let loaded = store.get_profile("u1").await.unwrap();
        assert_eq!(loaded.target_language, "Spanish");
    }

    #[tokio::test]
    async fn test_duplicate_profile_rejected() {
        let store = MemoryStore::new();
        store.create_profile(profile("u1")).await.unwrap();

        let err = store.create_profile(profile("u1")).await.unwrap_err();
        assert!(matches!(err, StoreError::ProfileExists(_)));
    }

    #[tokio::test]
    async fn test_missing_profile() {
        let store = MemoryStore::new();
        let err = store.get_profile("nobody").await.unwrap_err();
        assert!(matches!(err, StoreError::ProfileNotFound(_)));
    }

    #[tokio::test]
    async fn test_messages_require_conversation() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        let err = store
            .append_message(MessageRecord {
                conversation_id: id,
                speaker: Speaker::User,
                text: "hola".to_string(),
                timestamp: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConversationNotFound(_)));
    }

    #[tokio::test]
    async fn test_message_ordering_preserved() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        store
            .create_conversation(ConversationRecord {
                conversation_id: id,
                user_id: "u1".to_string(),
                topic: "food".to_string(),
                language: "Spanish".to_string(),
                started_at: Utc::now(),
            })
            .await
            .unwrap();

        for text in ["uno", "dos", "tres"] {
            store
                .append_message(MessageRecord {
                    conversation_id: id,
                    speaker: Speaker::User,
                    text: text.to_string(),
                    timestamp: Utc::now(),
                })
                .await
                .unwrap();
        }

        let messages = store.list_messages(id).await.unwrap();
        let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["uno", "dos", "tres"]);
    }
}
