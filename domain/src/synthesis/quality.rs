//! Heuristic response quality scoring.
//!
//! Every dimension is a cheap text statistic in `[0, 1]`:
//!
//! | Dimension    | Heuristic                                                  |
//! |--------------|------------------------------------------------------------|
//! | relevance    | share of prompt words present in the response              |
//! | completeness | response length against a target, penalized if truncated  |
//! | clarity      | average sentence length relative to a readable band        |
//! | accuracy     | share of peer responses that agree with this one           |
//! | novelty      | share of this response's words no peer used                |
//!
//! Without a prompt or without peers, the dependent dimensions sit at 0.5.

use super::similarity::{jaccard, tokenize};
use super::value_objects::{QualityScore, QualityWeights};
use crate::core::response::FinishReason;
use crate::util::{split_sentences, word_count};

const TARGET_WORDS: f64 = 150.0;
const TRUNCATION_PENALTY: f64 = 0.7;
const READABLE_SENTENCE_WORDS: (f64, f64) = (10.0, 25.0);
const NEUTRAL: f64 = 0.5;

/// Scores one response against the prompt and its peers.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityScorer {
    weights: QualityWeights,
    similarity_threshold: f64,
}

impl QualityScorer {
    pub fn new(weights: QualityWeights, similarity_threshold: f64) -> Self {
        Self {
            weights,
            similarity_threshold,
        }
    }

    pub fn score(
        &self,
        content: &str,
        finish_reason: FinishReason,
        prompt: Option<&str>,
        peers: &[&str],
    ) -> QualityScore {
        let tokens = tokenize(content);
        let peer_tokens: Vec<_> = peers.iter().map(|p| tokenize(p)).collect();

        let relevance = match prompt.map(tokenize) {
            Some(prompt_tokens) if !prompt_tokens.is_empty() => {
                prompt_tokens.iter().filter(|t| tokens.contains(*t)).count() as f64
                    / prompt_tokens.len() as f64
            }
            _ => NEUTRAL,
        };

        let mut completeness = (word_count(content) as f64 / TARGET_WORDS).min(1.0);
        if finish_reason.is_truncated() {
            completeness *= TRUNCATION_PENALTY;
        }

        let clarity = clarity(content);

        let accuracy = if peer_tokens.is_empty() {
            NEUTRAL
        } else {
            peer_tokens
                .iter()
                .filter(|peer| jaccard(&tokens, peer) >= self.similarity_threshold)
                .count() as f64
                / peer_tokens.len() as f64
        };

        let novelty = if peer_tokens.is_empty() {
            NEUTRAL
        } else if tokens.is_empty() {
            0.0
        } else {
            tokens
                .iter()
                .filter(|t| !peer_tokens.iter().any(|peer| peer.contains(*t)))
                .count() as f64
                / tokens.len() as f64
        };

        let w = &self.weights;
        let overall = (w.accuracy * accuracy
            + w.completeness * completeness
            + w.clarity * clarity
            + w.novelty * novelty
            + w.relevance * relevance)
            .clamp(0.0, 1.0);

        QualityScore {
            accuracy,
            completeness,
            clarity,
            novelty,
            relevance,
            overall,
        }
    }
}

fn clarity(content: &str) -> f64 {
    let sentences = split_sentences(content);
    if sentences.is_empty() {
        return 0.0;
    }
    let words: usize = sentences.iter().map(|s| word_count(s)).sum();
    let average = words as f64 / sentences.len() as f64;
    let (low, high) = READABLE_SENTENCE_WORDS;
    if average < low {
        average / low
    } else if average <= high {
        1.0
    } else {
        (high / average).max(0.2)
    }
}
