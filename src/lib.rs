//! # rfp-chat
//!
//! Agentic question answering over RFP (request for proposal) documents.
//!
//! A question runs through a bounded search loop: a model writes a search
//! query, a ranked index returns passages, and a second model call judges
//! which passages actually help. The loop repeats with new queries until
//! the reviewer asks to finalize or the attempt budget is spent, and a
//! final call writes a markdown answer citing each claim inline as
//! `<cit>SOURCE - ID</cit>`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rfp_chat::agent::{AgentConfig, Orchestrator, create_provider};
//! use rfp_chat::search::MemoryIndex;
//!
//! # async fn run() -> rfp_chat::Result<()> {
//! let config = AgentConfig::builder().from_env().build()?;
//! let providers = create_provider(&config)?;
//! let index = MemoryIndex::load(std::path::Path::new("corpus.json"))?;
//!
//! let orchestrator = Orchestrator::new(providers.llm, Arc::new(index), config);
//! let result = orchestrator
//!     .run_conversation("What certifications are required?", None)
//!     .await;
//! println!("{}", result.final_answer);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`core`]: evidence items, review verdicts, citation markup
//! - [`agent`]: model providers, the four loop components and the
//!   orchestrator that drives them
//! - [`search`]: the ranked-retrieval seam and its backends
//! - [`cli`]: command-line interface
//! - [`error`]: error types

pub mod agent;
pub mod cli;
pub mod core;
pub mod error;
pub mod search;

// Re-export commonly used types
pub use agent::{
    AgentConfig, ChatHistoryStore, Conversation, ConversationRequest, ConversationResult,
    LlmProvider, MemoryHistory, Orchestrator, TraceStep,
};
pub use core::{Citation, EvidenceItem, Verdict, parse_citations};
pub use error::{AgentError, CommandError, Error, HistoryError, Result, RetrievalError};
pub use search::{AzureSearchConfig, AzureSearchIndex, MemoryIndex, SearchIndex, SearchRequest};
