//! Conversation history lookup collaborator.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The end user.
    User,
    /// The assistant.
    Assistant,
}

/// One turn of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who produced the turn.
    pub role: ChatRole,
    /// The turn's text content.
    pub content: String,
}

/// Read access to a conversation/message store.
///
/// The resolver and the prompt assembler consume this contract; persistence
/// itself lives outside the core.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Document-ID sets attached to the last `limit` messages of a
    /// conversation, most recent first, one set per message.
    async fn find_recent_document_refs(
        &self,
        conversation_id: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Vec<String>>>;

    /// The last `limit` turns of a conversation, in chronological order.
    async fn find_recent_turns(
        &self,
        conversation_id: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatTurn>>;
}

/// One recorded exchange in the in-memory history store.
#[derive(Debug, Clone)]
pub struct RecordedMessage {
    /// The user's query text.
    pub query: String,
    /// The assistant's answer, when one was produced.
    pub answer: Option<String>,
    /// Documents referenced while answering.
    pub document_ids: Vec<String>,
}

/// An in-memory [`HistoryStore`] for development and testing.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    conversations: RwLock<HashMap<(String, String), Vec<RecordedMessage>>>,
}

impl InMemoryHistoryStore {
    /// Create a new empty history store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to a conversation.
    pub async fn push(&self, conversation_id: &str, user_id: &str, message: RecordedMessage) {
        let mut conversations = self.conversations.write().await;
        conversations
            .entry((conversation_id.to_string(), user_id.to_string()))
            .or_default()
            .push(message);
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn find_recent_document_refs(
        &self,
        conversation_id: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Vec<String>>> {
        let conversations = self.conversations.read().await;
        let messages = conversations
            .get(&(conversation_id.to_string(), user_id.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(messages.iter().rev().take(limit).map(|m| m.document_ids.clone()).collect())
    }

    async fn find_recent_turns(
        &self,
        conversation_id: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatTurn>> {
        let conversations = self.conversations.read().await;
        let messages = conversations
            .get(&(conversation_id.to_string(), user_id.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut turns = Vec::new();
        for message in messages {
            turns.push(ChatTurn { role: ChatRole::User, content: message.query.clone() });
            if let Some(answer) = &message.answer {
                turns.push(ChatTurn { role: ChatRole::Assistant, content: answer.clone() });
            }
        }
        let skip = turns.len().saturating_sub(limit);
        Ok(turns.split_off(skip))
    }
}
