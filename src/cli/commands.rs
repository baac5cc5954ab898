//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::agent::client::{Providers, create_provider};
use crate::agent::config::AgentConfig;
use crate::agent::conversation::{Conversation, ConversationRequest, TraceStep};
use crate::agent::orchestrator::Orchestrator;
use crate::agent::prompt::PromptSet;
use crate::agent::retriever::Retriever;
use crate::cli::output::{OutputFormat, format_answer, format_search_results};
use crate::cli::parser::{Cli, Commands};
use crate::error::{CommandError, Result};
use crate::search::{AzureSearchConfig, AzureSearchIndex, MemoryIndex, SearchIndex};

/// Parameters for the `ask` command.
#[derive(Debug, Clone, Default)]
pub struct AskParams<'a> {
    /// The question to answer.
    pub question: &'a str,
    /// Restrict retrieval to one document collection.
    pub scope: Option<&'a str>,
    /// Attempt bound override.
    pub max_attempts: Option<usize>,
    /// Local corpus to search instead of the hosted index.
    pub corpus: Option<&'a Path>,
    /// Session identifier.
    pub session: Option<&'a str>,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<&'a Path>,
    /// Show detailed diagnostics.
    pub verbose: bool,
}

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Ask {
            question,
            scope,
            max_attempts,
            corpus,
            session,
            prompt_dir,
        } => {
            let params = AskParams {
                question,
                scope: scope.as_deref(),
                max_attempts: *max_attempts,
                corpus: corpus.as_deref(),
                session: session.as_deref(),
                prompt_dir: prompt_dir.as_deref(),
                verbose: cli.verbose,
            };
            cmd_ask(&params, format)
        }
        Commands::Search {
            query,
            scope,
            top_k,
            corpus,
        } => cmd_search(query, scope.as_deref(), *top_k, corpus.as_deref(), format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

/// Opens the local corpus when given, otherwise the hosted index.
fn open_index(corpus: Option<&Path>, providers: Option<&Providers>) -> Result<Arc<dyn SearchIndex>> {
    if let Some(path) = corpus {
        let index = MemoryIndex::load(path)?;
        tracing::debug!(path = %path.display(), items = index.len(), "loaded corpus");
        return Ok(Arc::new(index));
    }

    let providers = providers.ok_or_else(|| {
        CommandError::ExecutionFailed(
            "The hosted search index needs an embedding provider; configure an API key or pass --corpus"
                .to_string(),
        )
    })?;
    let config = AzureSearchConfig::from_env()?;
    Ok(Arc::new(AzureSearchIndex::new(config, Arc::clone(&providers.embedder))?))
}

fn agent_config(prompt_dir: Option<&Path>) -> Result<AgentConfig> {
    let mut builder = AgentConfig::builder().from_env();
    if let Some(dir) = prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    builder.build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Agent configuration error: {e}")).into()
    })
}

fn cmd_ask(params: &AskParams<'_>, format: OutputFormat) -> Result<String> {
    let question = params.question.trim();
    if question.is_empty() {
        return Err(CommandError::ExecutionFailed("Question must not be empty".to_string()).into());
    }

    let config = agent_config(params.prompt_dir)?;
    let providers = create_provider(&config).map_err(|e| {
        CommandError::ExecutionFailed(format!("Provider creation failed: {e}"))
    })?;
    let index = open_index(params.corpus, Some(&providers))?;
    let orchestrator = Orchestrator::new(providers.llm, index, config);

    let mut request = ConversationRequest::new(question);
    request.scope_filter = params.scope.map(str::to_string);
    request.session_id = params.session.map(str::to_string);
    request.max_attempts = params.max_attempts;

    let result = runtime()?.block_on(orchestrator.run(request));
    Ok(format_answer(&result, format, params.verbose)?)
}

fn cmd_search(
    query: &str,
    scope: Option<&str>,
    top_k: usize,
    corpus: Option<&Path>,
    format: OutputFormat,
) -> Result<String> {
    let providers = if corpus.is_some() {
        None
    } else {
        let config = agent_config(None)?;
        Some(create_provider(&config).map_err(|e| {
            CommandError::ExecutionFailed(format!("Provider creation failed: {e}"))
        })?)
    };
    let index = open_index(corpus, providers.as_ref())?;

    let mut conversation = Conversation::new(query, scope.map(str::to_string));
    let retriever = Retriever::new(top_k.max(1));
    runtime()?.block_on(retriever.retrieve(index.as_ref(), &mut conversation, query));

    if let Some(TraceStep::Retrieve {
        error: Some(error), ..
    }) = conversation.thought_process().last()
    {
        return Err(CommandError::ExecutionFailed(format!("Search failed: {error}")).into());
    }

    Ok(format_search_results(
        query,
        conversation.current_results(),
        format,
    )?)
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                output.push_str("  ");
                output.push_str(path.file_name().and_then(|n| n.to_str()).unwrap_or("unknown"));
                output.push('\n');
            }
            output.push_str("\nEdit these files to customize agent system prompts.\n");
            Ok(output)
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_corpus(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("corpus.json");
        let corpus = serde_json::json!([
            {"chunk_id": "c-1", "pursuit_name": "City Transit", "chunk_content": "Bidders must provide a bid bond of five percent."},
            {"chunk_id": "c-2", "pursuit_name": "City Transit", "chunk_content": "Proposals are due on 15 June."},
            {"chunk_id": "c-3", "pursuit_name": "County Health", "chunk_content": "A performance bond is required after award."}
        ]);
        std::fs::write(&path, corpus.to_string()).unwrap_or_else(|_| unreachable!());
        path
    }

    #[test]
    fn test_cmd_init_prompts() {
        let temp = TempDir::new().unwrap_or_else(|_| unreachable!());
        let out = cmd_init_prompts(Some(temp.path()), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(out.contains("Wrote 3 prompt template(s)"));
        assert!(temp.path().join("review.md").exists());

        let again = cmd_init_prompts(Some(temp.path()), OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(again.starts_with("All prompt templates already exist"));
    }

    #[test]
    fn test_cmd_search_corpus() {
        let temp = TempDir::new().unwrap_or_else(|_| unreachable!());
        let corpus = write_corpus(&temp);

        let out = cmd_search("bond", None, 5, Some(&corpus), OutputFormat::Json)
            .unwrap_or_else(|_| unreachable!());
        let value: serde_json::Value = serde_json::from_str(&out).unwrap_or_default();
        assert_eq!(value["count"], 2);

        let scoped = cmd_search("bond", Some("County Health"), 5, Some(&corpus), OutputFormat::Json)
            .unwrap_or_else(|_| unreachable!());
        let value: serde_json::Value = serde_json::from_str(&scoped).unwrap_or_default();
        assert_eq!(value["count"], 1);
        assert_eq!(value["results"][0]["id"], "c-3");
    }

    #[test]
    fn test_cmd_search_missing_corpus() {
        let temp = TempDir::new().unwrap_or_else(|_| unreachable!());
        let missing = temp.path().join("missing.json");
        assert!(cmd_search("bond", None, 5, Some(&missing), OutputFormat::Text).is_err());
    }

    #[test]
    fn test_cmd_ask_rejects_empty_question() {
        let params = AskParams {
            question: "   ",
            ..AskParams::default()
        };
        assert!(cmd_ask(&params, OutputFormat::Text).is_err());
    }
}
