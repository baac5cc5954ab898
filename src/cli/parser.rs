//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::search::DEFAULT_TOP_K;

/// rfp-chat: cited question answering over RFP documents.
///
/// Searches an index of proposal documents in a review loop and answers
/// with inline citations to the passages it used.
#[derive(Parser, Debug)]
#[command(name = "rfp-chat")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a question from the indexed RFP documents.
    ///
    /// Runs the search/review loop and prints the cited answer. Requires an
    /// OpenAI-compatible API key. Without `--corpus` the hosted search
    /// index configured by the `RFP_SEARCH_*` variables is used.
    #[command(after_help = r#"Examples:
  rfp-chat ask "What certifications are required?"
  rfp-chat ask "When are bids due?" --scope "City Transit"
  rfp-chat ask "What bond is required?" --corpus ./corpus.json --max-attempts 2
  rfp-chat --format json ask "List the evaluation criteria" | jq '.citations[].id'
"#)]
    Ask {
        /// The question to answer.
        question: String,

        /// Restrict retrieval to one document collection.
        #[arg(short, long)]
        scope: Option<String>,

        /// Maximum search attempts (overrides RFP_MAX_ATTEMPTS).
        #[arg(short = 'n', long)]
        max_attempts: Option<usize>,

        /// Answer from a local JSON corpus instead of the hosted index.
        #[arg(short, long)]
        corpus: Option<PathBuf>,

        /// Session identifier recorded with the conversation.
        #[arg(long)]
        session: Option<String>,

        /// Directory containing prompt template files.
        #[arg(long, env = "RFP_PROMPT_DIR")]
        prompt_dir: Option<PathBuf>,
    },

    /// Run a single retrieval without the review loop.
    ///
    /// Useful for checking what the index returns for a query. With
    /// `--corpus` no API key is needed.
    #[command(after_help = r#"Examples:
  rfp-chat search "insurance requirements" --corpus ./corpus.json
  rfp-chat search "submission deadline" --scope "City Transit" -k 10
"#)]
    Search {
        /// Search query text.
        query: String,

        /// Restrict retrieval to one document collection.
        #[arg(short, long)]
        scope: Option<String>,

        /// Maximum number of results.
        #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,

        /// Search a local JSON corpus instead of the hosted index.
        #[arg(short, long)]
        corpus: Option<PathBuf>,
    },

    /// Write the default prompt templates to a directory.
    ///
    /// Existing files are left untouched. Defaults to
    /// `~/.config/rfp-chat/prompts/`.
    #[command(name = "init-prompts")]
    InitPrompts {
        /// Target directory.
        dir: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from([
            "rfp-chat",
            "--format",
            "json",
            "ask",
            "What is due?",
            "--scope",
            "City Transit",
            "-n",
            "2",
        ])
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(cli.format, "json");
        match cli.command {
            Commands::Ask {
                question,
                scope,
                max_attempts,
                corpus,
                ..
            } => {
                assert_eq!(question, "What is due?");
                assert_eq!(scope.as_deref(), Some("City Transit"));
                assert_eq!(max_attempts, Some(2));
                assert!(corpus.is_none());
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_search_defaults() {
        let cli = Cli::try_parse_from(["rfp-chat", "search", "bonds", "-v"])
            .unwrap_or_else(|_| unreachable!());
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Search { top_k: DEFAULT_TOP_K, .. }
        ));
    }

    #[test]
    fn test_ask_requires_question() {
        assert!(Cli::try_parse_from(["rfp-chat", "ask"]).is_err());
    }
}
