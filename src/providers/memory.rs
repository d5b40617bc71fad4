use std::collections::VecDeque;
use std::num::NonZeroUsize;

use lru::LruCache;
use tokio::sync::Mutex;

use crate::domains::chat::{ChatTurn, Role};

/// Process-local cache of the most recent turns per conversation. Not a
/// source of truth; durable history lives in the chat store.
pub struct ConversationMemory {
    max_messages: usize,
    buffers: Mutex<LruCache<i32, VecDeque<ChatTurn>>>,
}

impl ConversationMemory {
    pub fn new(max_messages: usize, max_conversations: usize) -> Self {
        let capacity = NonZeroUsize::new(max_conversations).unwrap_or(NonZeroUsize::MIN);
        Self {
            max_messages: max_messages.max(1),
            buffers: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub async fn add(&self, conversation_id: i32, role: Role, content: &str) {
        let mut guard = self.buffers.lock().await;
        let buffer = guard.get_or_insert_mut(conversation_id, VecDeque::new);
        buffer.push_back(ChatTurn::new(role, content));
        while buffer.len() > self.max_messages {
            buffer.pop_front();
        }
    }

    /// A copy of the buffered turns, oldest first.
    pub async fn get(&self, conversation_id: i32) -> Vec<ChatTurn> {
        let mut guard = self.buffers.lock().await;
        guard
            .get(&conversation_id)
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn contains(&self, conversation_id: i32) -> bool {
        let guard = self.buffers.lock().await;
        guard.peek(&conversation_id).is_some_and(|b| !b.is_empty())
    }

    /// Replaces the buffer with the tail of `turns`.
    pub async fn hydrate(&self, conversation_id: i32, turns: Vec<ChatTurn>) {
        let skip = turns.len().saturating_sub(self.max_messages);
        let buffer: VecDeque<ChatTurn> = turns.into_iter().skip(skip).collect();
        let mut guard = self.buffers.lock().await;
        guard.put(conversation_id, buffer);
    }

    pub async fn clear(&self, conversation_id: i32) {
        let mut guard = self.buffers.lock().await;
        guard.pop(&conversation_id);
    }
}
