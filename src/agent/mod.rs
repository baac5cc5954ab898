//! Agentic retrieval loop for rfp-chat.
//!
//! Answers a question about RFP documents by searching, having a model
//! review what came back, and searching again until the reviewer is
//! satisfied or the attempt budget runs out. Backed by OpenAI-compatible
//! APIs through a pluggable provider abstraction.
//!
//! # Architecture
//!
//! ```text
//! User query → Orchestrator
//!   ├── loop while Searching:
//!   │   ├── QueryGenerator (next search query)
//!   │   ├── Retriever (SearchIndex, excluding processed ids)
//!   │   └── ResultReviewer (valid / invalid / retry | finalize)
//!   └── AnswerSynthesizer → cited markdown answer
//! ```

pub mod client;
pub mod config;
pub mod conversation;
pub mod history;
pub mod message;
#[cfg(test)]
pub(crate) mod mock;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod query_generator;
pub mod retriever;
pub mod reviewer;
pub mod synthesizer;
pub mod traits;

// Re-export key types
pub use client::{Providers, create_provider};
pub use config::AgentConfig;
pub use conversation::{
    Conversation, ConversationRequest, ConversationResult, IndexBucket, IndexValidationWarning,
    LoopState, ReviewDecision, ReviewOutcome, TraceStep,
};
pub use history::{ChatHistoryStore, HistoryEntry, MemoryHistory, TurnKind};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::Orchestrator;
pub use prompt::PromptSet;
pub use provider::{Embedder, LlmProvider};
pub use query_generator::QueryGenerator;
pub use retriever::Retriever;
pub use reviewer::ResultReviewer;
pub use synthesizer::AnswerSynthesizer;
pub use traits::{Agent, AgentResponse};
