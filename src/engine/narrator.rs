//! Narration generation seams.
//!
//! The orchestrator depends on two collaborators here: a line generator that
//! produces the date avatar's reaction for a round, and an answer grouper that
//! collapses submitted attributes into weighted wheel slices. Both are traits
//! so the game loop runs unchanged against canned implementations in tests.

use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::time::timeout;
use tracing::warn;

use crate::state::game::{RoundAnswer, WheelSlice};

/// Errors surfaced by a line generator backend.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Backend cannot be reached or is missing credentials.
    #[error("generation backend unavailable: {0}")]
    Unavailable(String),
    /// Backend replied with something unusable.
    #[error("generation produced no usable line: {0}")]
    Empty(String),
}

/// Context handed to the generator for one reaction line.
#[derive(Debug, Clone)]
pub struct ReactionPrompt {
    /// Name of the date avatar speaking the line.
    pub dater_name: String,
    /// The attribute the wheel committed to this round.
    pub winning_attribute: String,
    /// Current round number, 1-based.
    pub round: u32,
    /// Running compatibility score, 0 to 100.
    pub compatibility: u8,
}

/// Produces the date avatar's spoken reaction to a round's winning attribute.
pub trait LineGenerator: Send + Sync + 'static {
    /// Generate one reaction line for the given context.
    fn generate(&self, prompt: &ReactionPrompt) -> BoxFuture<'static, Result<String, GenerationError>>;
}

/// Generator that always fails, forcing the fallback path. Used when no
/// generation credentials are configured.
pub struct OfflineGenerator;

impl LineGenerator for OfflineGenerator {
    fn generate(&self, _prompt: &ReactionPrompt) -> BoxFuture<'static, Result<String, GenerationError>> {
        Box::pin(async { Err(GenerationError::Unavailable("no backend configured".into())) })
    }
}

/// Run the generator with a deadline, substituting a canned line on timeout or
/// error. The game never stalls on a slow backend: a fallback line always
/// comes back within `deadline`.
pub async fn generate_or_fallback(
    generator: &dyn LineGenerator,
    prompt: &ReactionPrompt,
    deadline: Duration,
    fallback_lines: &[String],
) -> String {
    match timeout(deadline, generator.generate(prompt)).await {
        Ok(Ok(line)) if !line.trim().is_empty() => line,
        Ok(Ok(_)) => {
            warn!(round = prompt.round, "generator returned an empty line; using fallback");
            fallback_for(prompt, fallback_lines)
        }
        Ok(Err(err)) => {
            warn!(round = prompt.round, error = %err, "generation failed; using fallback");
            fallback_for(prompt, fallback_lines)
        }
        Err(_) => {
            warn!(
                round = prompt.round,
                deadline_ms = deadline.as_millis() as u64,
                "generation timed out; using fallback"
            );
            fallback_for(prompt, fallback_lines)
        }
    }
}

fn fallback_for(prompt: &ReactionPrompt, fallback_lines: &[String]) -> String {
    if fallback_lines.is_empty() {
        return format!("Wow... {}. I have no words.", prompt.winning_attribute);
    }
    let index = prompt.round.saturating_sub(1) as usize % fallback_lines.len();
    fallback_lines[index].replace("{attribute}", &prompt.winning_attribute)
}

/// Collapses a round's submitted answers into weighted wheel slices.
pub trait AnswerGrouper: Send + Sync + 'static {
    /// Group answers into slices. Implementations must return one slice per
    /// distinct answer, weighted by how many players submitted it.
    fn group(&self, answers: &[RoundAnswer]) -> Vec<WheelSlice>;
}

/// Groups answers by case-insensitive, whitespace-trimmed equality.
///
/// Slice order follows first submission so the wheel layout is stable across
/// re-grouping; the label keeps the first submitter's original casing.
pub struct ExactMatchGrouper;

impl AnswerGrouper for ExactMatchGrouper {
    fn group(&self, answers: &[RoundAnswer]) -> Vec<WheelSlice> {
        let mut slices: Vec<WheelSlice> = Vec::new();
        for answer in answers {
            let trimmed = answer.text.trim();
            if trimmed.is_empty() {
                continue;
            }
            let key = trimmed.to_lowercase();
            match slices
                .iter_mut()
                .find(|slice| slice.label.to_lowercase() == key)
            {
                Some(slice) => slice.weight += 1.0,
                None => slices.push(WheelSlice {
                    label: trimmed.to_owned(),
                    weight: 1.0,
                }),
            }
        }
        slices
    }
}
