//! Synthesis engine: merges successful provider outcomes into one answer.

use super::quality::QualityScorer;
use super::similarity::{jaccard, pairwise_agreement, tokenize};
use super::value_objects::{QualityScore, SynthesisMethod, SynthesisOptions, SynthesisResult};
use crate::core::error::SynthesisError;
use crate::orchestration::ProviderOutcome;
use crate::provider::ProviderId;
use crate::util::split_sentences;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Sentences at least this similar are treated as duplicates when merging.
const DUPLICATE_SIMILARITY: f64 = 0.8;

/// One successful response with its quality score.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub provider: &'a ProviderId,
    pub content: &'a str,
    pub latency_ms: u64,
    pub score: QualityScore,
}

/// Stateless merger of provider outputs.
///
/// Deterministic: the same outcomes, method and options always produce the
/// same result.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynthesisEngine;

impl SynthesisEngine {
    pub fn new() -> Self {
        Self
    }

    /// Merge the successful outcomes with `method`.
    ///
    /// Fails with [`SynthesisError::NoSuccessfulResponses`] when nothing
    /// succeeded; content is never invented. A single success is returned
    /// verbatim whatever the method.
    pub fn synthesize(
        &self,
        outcomes: &[ProviderOutcome],
        method: SynthesisMethod,
        options: &SynthesisOptions,
    ) -> Result<SynthesisResult, SynthesisError> {
        options.validate()?;

        let candidates = self.rank(outcomes, options);
        let Some(best) = candidates.first() else {
            return Err(SynthesisError::NoSuccessfulResponses);
        };

        let contents: Vec<&str> = candidates.iter().map(|c| c.content).collect();
        let consensus_level = pairwise_agreement(&contents, options.similarity_threshold);
        let key_insights = key_insights(&candidates, options);

        if candidates.len() == 1 {
            return Ok(SynthesisResult {
                content: best.content.to_string(),
                confidence: best.score.overall,
                consensus_level,
                key_insights,
                method,
                contributors: vec![best.provider.clone()],
            });
        }

        let (content, confidence, contributors) = match method {
            SynthesisMethod::BestOf | SynthesisMethod::PassThrough => (
                best.content.to_string(),
                best.score.overall,
                vec![best.provider.clone()],
            ),
            SynthesisMethod::Consensus => {
                let winner = most_supported(&candidates, options.similarity_threshold);
                (
                    winner.content.to_string(),
                    (winner.score.overall + consensus_level) / 2.0,
                    vec![winner.provider.clone()],
                )
            }
            SynthesisMethod::WeightedMerge => weighted_merge(&candidates),
            SynthesisMethod::Comprehensive => comprehensive(&candidates, options),
            SynthesisMethod::Extractive => extractive(&candidates, options),
            SynthesisMethod::Abstractive => abstractive(&candidates, options),
        };

        Ok(SynthesisResult {
            content,
            confidence: confidence.clamp(0.0, 1.0),
            consensus_level,
            key_insights,
            method,
            contributors,
        })
    }

    /// Successful outcomes scored and sorted best first.
    ///
    /// Order: higher overall score, then lower latency, then provider id.
    pub fn rank<'a>(
        &self,
        outcomes: &'a [ProviderOutcome],
        options: &SynthesisOptions,
    ) -> Vec<Candidate<'a>> {
        let successes: Vec<_> = outcomes
            .iter()
            .filter(|o| o.success)
            .filter_map(|o| o.response.as_ref())
            .collect();
        let scorer = QualityScorer::new(options.weights, options.similarity_threshold);

        let mut candidates: Vec<Candidate<'a>> = successes
            .iter()
            .enumerate()
            .map(|(i, &response)| {
                let peers: Vec<&str> = successes
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, r)| r.content.as_str())
                    .collect();
                Candidate {
                    provider: &response.provider,
                    content: response.content.as_str(),
                    latency_ms: response.latency_ms,
                    score: scorer.score(
                        &response.content,
                        response.finish_reason,
                        options.prompt.as_deref(),
                        &peers,
                    ),
                }
            })
            .collect();

        candidates.sort_by(compare_candidates);
        candidates
    }
}

fn compare_candidates(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    b.score
        .overall
        .total_cmp(&a.score.overall)
        .then_with(|| a.latency_ms.cmp(&b.latency_ms))
        .then_with(|| a.provider.cmp(b.provider))
}

/// Candidate agreeing with the most peers; rank order breaks ties.
fn most_supported<'c, 'a>(candidates: &'c [Candidate<'a>], threshold: f64) -> &'c Candidate<'a> {
    let sets: Vec<_> = candidates.iter().map(|c| tokenize(c.content)).collect();
    let support = |i: usize| {
        sets.iter()
            .enumerate()
            .filter(|(j, other)| *j != i && jaccard(&sets[i], other) >= threshold)
            .count()
    };

    let mut winner = 0;
    let mut winner_support = support(0);
    for i in 1..candidates.len() {
        let s = support(i);
        if s > winner_support {
            winner = i;
            winner_support = s;
        }
    }
    &candidates[winner]
}

/// A sentence with where it came from.
struct Sentence<'a> {
    text: &'a str,
    tokens: HashSet<String>,
    candidate: usize,
}

fn sentences<'a>(candidates: &[Candidate<'a>]) -> Vec<Sentence<'a>> {
    candidates
        .iter()
        .enumerate()
        .flat_map(|(candidate, c)| {
            split_sentences(c.content)
                .into_iter()
                .map(move |text| Sentence {
                    text,
                    tokens: tokenize(text),
                    candidate,
                })
        })
        .collect()
}

fn is_duplicate(tokens: &HashSet<String>, kept: &[&Sentence<'_>], threshold: f64) -> bool {
    kept.iter().any(|k| jaccard(tokens, &k.tokens) >= threshold)
}

fn contributors_of(candidates: &[Candidate<'_>], kept: &[&Sentence<'_>]) -> Vec<ProviderId> {
    let mut indices: Vec<usize> = kept.iter().map(|s| s.candidate).collect();
    indices.sort_unstable();
    indices.dedup();
    indices
        .into_iter()
        .map(|i| candidates[i].provider.clone())
        .collect()
}

fn mean_score(candidates: &[Candidate<'_>]) -> f64 {
    candidates.iter().map(|c| c.score.overall).sum::<f64>() / candidates.len() as f64
}

/// Every distinct sentence, higher-quality responses first. Confidence is
/// the score-weighted mean of the candidates' scores.
fn weighted_merge(candidates: &[Candidate<'_>]) -> (String, f64, Vec<ProviderId>) {
    let all = sentences(candidates);
    let mut kept: Vec<&Sentence<'_>> = Vec::new();
    for sentence in &all {
        if !is_duplicate(&sentence.tokens, &kept, DUPLICATE_SIMILARITY) {
            kept.push(sentence);
        }
    }

    let total: f64 = candidates.iter().map(|c| c.score.overall).sum();
    let confidence = if total > 0.0 {
        candidates
            .iter()
            .map(|c| c.score.overall * c.score.overall)
            .sum::<f64>()
            / total
    } else {
        0.0
    };

    let content = kept.iter().map(|s| s.text).collect::<Vec<_>>().join(" ");
    (content, confidence, contributors_of(candidates, &kept))
}

/// Best response followed by the points only other responses raised.
fn comprehensive(
    candidates: &[Candidate<'_>],
    options: &SynthesisOptions,
) -> (String, f64, Vec<ProviderId>) {
    let all = sentences(candidates);
    let mut kept: Vec<&Sentence<'_>> = all.iter().filter(|s| s.candidate == 0).collect();
    let base = kept.len();
    for sentence in all.iter().filter(|s| s.candidate != 0) {
        if !is_duplicate(&sentence.tokens, &kept, options.similarity_threshold) {
            kept.push(sentence);
        }
    }

    let mut content = candidates[0].content.trim().to_string();
    if kept.len() > base {
        content.push_str("\n\nAdditional points:");
        for sentence in &kept[base..] {
            content.push_str("\n- ");
            content.push_str(sentence.text);
        }
    }

    let mut contributors = vec![candidates[0].provider.clone()];
    for provider in contributors_of(candidates, &kept[base..]) {
        if !contributors.contains(&provider) {
            contributors.push(provider);
        }
    }
    (content, mean_score(candidates), contributors)
}

/// Top sentences by centrality (agreement with every response) times the
/// quality of the response they came from, kept in reading order.
fn extractive(
    candidates: &[Candidate<'_>],
    options: &SynthesisOptions,
) -> (String, f64, Vec<ProviderId>) {
    let all = sentences(candidates);
    let documents: Vec<_> = candidates.iter().map(|c| tokenize(c.content)).collect();

    let mut scored: Vec<(usize, f64)> = all
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let centrality = documents
                .iter()
                .map(|doc| s.tokens.iter().filter(|t| doc.contains(*t)).count() as f64)
                .sum::<f64>()
                / (documents.len() * s.tokens.len().max(1)) as f64;
            (i, centrality * candidates[s.candidate].score.overall)
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut picked: Vec<usize> = Vec::new();
    for (i, _) in scored {
        if picked.len() >= options.max_summary_sentences {
            break;
        }
        let kept: Vec<&Sentence<'_>> = picked.iter().map(|p| &all[*p]).collect();
        if !is_duplicate(&all[i].tokens, &kept, DUPLICATE_SIMILARITY) {
            picked.push(i);
        }
    }
    picked.sort_unstable();

    let kept: Vec<&Sentence<'_>> = picked.iter().map(|p| &all[*p]).collect();
    let content = kept.iter().map(|s| s.text).collect::<Vec<_>>().join(" ");
    (content, mean_score(candidates), contributors_of(candidates, &kept))
}

/// Clusters similar sentences and keeps the most concise member of the
/// largest clusters.
fn abstractive(
    candidates: &[Candidate<'_>],
    options: &SynthesisOptions,
) -> (String, f64, Vec<ProviderId>) {
    let all = sentences(candidates);
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    for (i, sentence) in all.iter().enumerate() {
        let home = clusters
            .iter_mut()
            .find(|c| jaccard(&sentence.tokens, &all[c[0]].tokens) >= options.similarity_threshold);
        match home {
            Some(cluster) => cluster.push(i),
            None => clusters.push(vec![i]),
        }
    }

    // stable: equal-size clusters keep first-appearance order
    clusters.sort_by(|a, b| b.len().cmp(&a.len()));

    let kept: Vec<&Sentence<'_>> = clusters
        .iter()
        .take(options.max_summary_sentences)
        .filter_map(|cluster| {
            cluster
                .iter()
                .min_by_key(|i| (all[**i].text.len(), **i))
                .map(|i| &all[*i])
        })
        .collect();

    let supported = clusters
        .iter()
        .filter(|c| {
            c.iter()
                .map(|i| all[*i].candidate)
                .collect::<HashSet<_>>()
                .len()
                > 1
        })
        .count();
    let confidence = (mean_score(candidates) + supported as f64 / clusters.len().max(1) as f64) / 2.0;

    let content = kept.iter().map(|s| s.text).collect::<Vec<_>>().join(" ");
    (content, confidence, contributors_of(candidates, &kept))
}

/// Sentences backed by the most responses, strongest first.
fn key_insights(candidates: &[Candidate<'_>], options: &SynthesisOptions) -> Vec<String> {
    if options.max_insights == 0 {
        return Vec::new();
    }
    let all = sentences(candidates);

    let mut scored: Vec<(usize, usize)> = all
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let support = (0..candidates.len())
                .filter(|c| {
                    *c == s.candidate
                        || all.iter().any(|o| {
                            o.candidate == *c && jaccard(&s.tokens, &o.tokens) >= options.similarity_threshold
                        })
                })
                .count();
            (i, support)
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut kept: Vec<&Sentence<'_>> = Vec::new();
    for (i, _) in scored {
        if kept.len() >= options.max_insights {
            break;
        }
        if !is_duplicate(&all[i].tokens, &kept, options.similarity_threshold) {
            kept.push(&all[i]);
        }
    }
    kept.into_iter().map(|s| s.text.to_string()).collect()
}
