//! Error types for rfp-chat.
//!
//! Each external capability has its own error enum. Inside the retrieval
//! loop these never escape a component: they are caught at the component
//! boundary and turned into a degraded outcome (fallback query, empty
//! result set, skipped review, apology answer).

use thiserror::Error;

/// Result type alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for library consumers and the CLI.
#[derive(Error, Debug)]
pub enum Error {
    /// Language-model or embedding failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Search index failure.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// Chat history store failure.
    #[error(transparent)]
    History(#[from] HistoryError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by chat-completion and embedding calls.
#[derive(Error, Debug)]
pub enum AgentError {
    /// No API key was configured.
    #[error("API key missing: set OPENAI_API_KEY or RFP_API_KEY")]
    ApiKeyMissing,

    /// Provider name not recognised by the factory.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Requested provider name.
        name: String,
    },

    /// Required configuration value is absent or invalid.
    #[error("configuration error: {message}")]
    Config {
        /// What is wrong.
        message: String,
    },

    /// The provider rejected or failed the request.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Provider error text.
        message: String,
        /// HTTP status, when the provider exposes one.
        status: Option<u16>,
    },

    /// The call did not complete within the configured timeout.
    #[error("request timed out after {seconds}s")]
    Timeout {
        /// Timeout that elapsed.
        seconds: u64,
    },

    /// The model answered with something we could not parse.
    #[error("failed to parse model response: {message}")]
    ResponseParse {
        /// Parse diagnostic.
        message: String,
        /// Raw model output.
        content: String,
    },

    /// The embeddings endpoint failed or returned no vector.
    #[error("embedding failed: {message}")]
    Embedding {
        /// Diagnostic.
        message: String,
    },
}

/// Errors raised by the ranked-retrieval capability.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Network or connection failure.
    #[error("search transport error: {0}")]
    Transport(String),

    /// The index answered with a non-success status.
    #[error("search service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The index response did not have the expected shape.
    #[error("malformed search response: {0}")]
    Malformed(String),

    /// Embedding the query for the vector leg failed.
    #[error("query embedding failed: {0}")]
    Embedding(#[from] AgentError),

    /// A local corpus could not be loaded.
    #[error("failed to load corpus {path}: {message}")]
    Corpus {
        /// Corpus path.
        path: String,
        /// Diagnostic.
        message: String,
    },

    /// Index connection settings are missing.
    #[error("search configuration error: {0}")]
    Config(String),
}

/// Errors raised by chat history stores.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// The store could not be reached or rejected the operation.
    #[error("history store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by CLI commands.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The command could not run to completion.
    #[error("command failed: {0}")]
    ExecutionFailed(String),

    /// Output could not be rendered.
    #[error("output format error: {0}")]
    OutputFormat(String),
}
