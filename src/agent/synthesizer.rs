//! Answer synthesizer agent.
//!
//! Writes the final markdown answer from vetted evidence, citing each
//! claim inline as `<cit>SOURCE - ID</cit>`.

use async_trait::async_trait;
use tracing::{error, info};

use super::config::AgentConfig;
use super::conversation::{Conversation, TraceStep};
use super::message::ChatMessage;
use super::prompt::build_answer_prompt;
use super::provider::LlmProvider;
use super::traits::Agent;

/// Answer returned when no evidence was vetted.
pub const INSUFFICIENT_INFORMATION_MESSAGE: &str = "I couldn't find relevant information in the RFP documents to answer your question. \
     Please try rephrasing your question or check if the information exists in the uploaded documents.";

/// Builds the answer returned when the model call fails.
#[must_use]
pub fn generation_failure_message(reason: &str) -> String {
    format!(
        "I encountered an error generating the final answer. Error: {reason}. \
         Please try rephrasing your question."
    )
}

/// Agent that synthesizes the final answer.
pub struct AnswerSynthesizer {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl AnswerSynthesizer {
    /// Creates a new synthesizer with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.answer_model.clone(),
            max_tokens: config.answer_max_tokens,
            system_prompt,
        }
    }

    /// Produces the final answer and records it in the trace.
    ///
    /// `prior_turns` are earlier messages from the same session, replayed
    /// between the system prompt and the evidence. Never fails: with no
    /// vetted evidence the fixed insufficient-information answer is returned
    /// without a model call, and a failed call yields an apology that names
    /// the error.
    pub async fn synthesize(
        &self,
        provider: &dyn LlmProvider,
        conversation: &mut Conversation,
        prior_turns: &[ChatMessage],
    ) -> String {
        let answer = if conversation.vetted_results().is_empty() {
            info!("no vetted evidence, returning insufficient-information answer");
            INSUFFICIENT_INFORMATION_MESSAGE.to_string()
        } else {
            let prompt = build_answer_prompt(conversation.user_query(), conversation.vetted_results());
            match self.execute_with_context(provider, prior_turns, &prompt).await {
                Ok(response) => {
                    conversation.add_usage(response.usage);
                    info!(
                        vetted = conversation.vetted_results().len(),
                        tokens = response.usage.total_tokens,
                        "final answer generated"
                    );
                    response.content
                }
                Err(e) => {
                    error!(error = %e, "final answer generation failed");
                    generation_failure_message(&e.to_string())
                }
            }
        };

        conversation.record_trace(TraceStep::Response {
            final_answer: answer.clone(),
        });
        answer
    }
}

#[async_trait]
impl Agent for AnswerSynthesizer {
    fn name(&self) -> &'static str {
        "synthesizer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.1
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
