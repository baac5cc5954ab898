//! Session chat history.
//!
//! Conversations that share a session id see each other's questions and
//! answers: the loop controller records turns here and the answer
//! synthesizer replays earlier ones.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::message::{ChatMessage, Role};
use crate::error::HistoryError;

/// Most earlier session turns replayed to the synthesizer.
pub const MAX_REPLAYED_TURNS: usize = 20;

/// What a recorded turn holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    /// The user's question.
    Question,
    /// A query the loop sent to the index.
    SearchQuery,
    /// The final answer.
    Answer,
}

impl TurnKind {
    /// Chat role the turn is replayed as.
    #[must_use]
    pub const fn role(self) -> Role {
        match self {
            Self::Question => Role::User,
            Self::SearchQuery | Self::Answer => Role::Assistant,
        }
    }

    /// Whether the turn is replayed into later answers.
    #[must_use]
    pub const fn is_replayed(self) -> bool {
        !matches!(self, Self::SearchQuery)
    }
}

/// One recorded turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Session the turn belongs to.
    pub session_id: String,
    /// Caller identity, if known.
    pub user_id: Option<String>,
    /// What the turn holds.
    pub kind: TurnKind,
    /// Turn text.
    pub message: String,
    /// When the turn was recorded.
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        user_id: Option<String>,
        kind: TurnKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id,
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Converts the entry into a chat message for replay.
    #[must_use]
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.kind.role(),
            content: self.message.clone(),
        }
    }
}

/// Storage for session turns.
#[async_trait]
pub trait ChatHistoryStore: Send + Sync {
    /// Appends a turn.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError`] if the store rejects the write.
    async fn append(&self, entry: HistoryEntry) -> Result<(), HistoryError>;

    /// Returns a session's turns, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError`] if the store cannot be read.
    async fn history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, HistoryError>;
}

/// Process-local history store.
///
/// Each session keeps only its most recent replayed turns (and the search
/// queries recorded alongside them); older turns are evicted on append.
/// Sessions themselves live as long as the store.
#[derive(Debug)]
pub struct MemoryHistory {
    sessions: RwLock<HashMap<String, VecDeque<HistoryEntry>>>,
    max_turns: usize,
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::with_max_turns(MAX_REPLAYED_TURNS)
    }
}

impl MemoryHistory {
    /// Creates an empty store that keeps as many turns as are replayed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store keeping at most `max_turns` replayed turns
    /// per session.
    #[must_use]
    pub fn with_max_turns(max_turns: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns: max_turns.max(1),
        }
    }

    /// Number of sessions with at least one turn.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl ChatHistoryStore for MemoryHistory {
    async fn append(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        let mut sessions = self.sessions.write().await;
        let turns = sessions.entry(entry.session_id.clone()).or_default();
        turns.push_back(entry);

        let mut replayed = turns.iter().filter(|e| e.kind.is_replayed()).count();
        while replayed > self.max_turns {
            match turns.pop_front() {
                Some(evicted) if evicted.kind.is_replayed() => replayed -= 1,
                Some(_) => {}
                None => break,
            }
        }
        Ok(())
    }

    async fn history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default())
    }
}
