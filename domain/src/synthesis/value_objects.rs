//! Synthesis value objects

use crate::core::error::SynthesisError;
use crate::provider::ProviderId;
use serde::{Deserialize, Serialize};

/// How several provider outputs are merged into one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisMethod {
    /// Pick the response the most peers agree with
    #[default]
    Consensus,
    /// Combine sentences weighted by each response's quality score
    WeightedMerge,
    /// Pick the single highest-scoring response
    BestOf,
    /// Best response plus the distinct points raised by the others
    Comprehensive,
    /// Summary built from the most central sentences
    Extractive,
    /// Summary built from one representative per cluster of similar sentences
    Abstractive,
    /// No merging: synthesis was disabled for this collaboration
    PassThrough,
}

impl SynthesisMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SynthesisMethod::Consensus => "consensus",
            SynthesisMethod::WeightedMerge => "weighted_merge",
            SynthesisMethod::BestOf => "best_of",
            SynthesisMethod::Comprehensive => "comprehensive",
            SynthesisMethod::Extractive => "extractive",
            SynthesisMethod::Abstractive => "abstractive",
            SynthesisMethod::PassThrough => "pass_through",
        }
    }
}

impl std::fmt::Display for SynthesisMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SynthesisMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "consensus" => Ok(SynthesisMethod::Consensus),
            "weighted_merge" | "weighted" => Ok(SynthesisMethod::WeightedMerge),
            "best_of" | "best" => Ok(SynthesisMethod::BestOf),
            "comprehensive" => Ok(SynthesisMethod::Comprehensive),
            "extractive" => Ok(SynthesisMethod::Extractive),
            "abstractive" => Ok(SynthesisMethod::Abstractive),
            other => Err(format!(
                "Unknown synthesis method: {}. Valid: consensus, weighted_merge, best_of, comprehensive, extractive, abstractive",
                other
            )),
        }
    }
}

/// Weights of the quality dimensions. Must be non-negative and sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub accuracy: f64,
    pub completeness: f64,
    pub clarity: f64,
    pub novelty: f64,
    pub relevance: f64,
}

impl QualityWeights {
    const SUM_TOLERANCE: f64 = 1e-6;

    pub fn sum(&self) -> f64 {
        self.accuracy + self.completeness + self.clarity + self.novelty + self.relevance
    }

    pub fn validate(&self) -> Result<(), SynthesisError> {
        let all = [
            self.accuracy,
            self.completeness,
            self.clarity,
            self.novelty,
            self.relevance,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(SynthesisError::InvalidOptions(
                "quality weights must be non-negative numbers".to_string(),
            ));
        }
        if (self.sum() - 1.0).abs() > Self::SUM_TOLERANCE {
            return Err(SynthesisError::InvalidOptions(format!(
                "quality weights must sum to 1, got {:.3}",
                self.sum()
            )));
        }
        Ok(())
    }
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            accuracy: 0.2,
            completeness: 0.2,
            clarity: 0.2,
            novelty: 0.2,
            relevance: 0.2,
        }
    }
}

/// Per-dimension quality of one response, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityScore {
    pub accuracy: f64,
    pub completeness: f64,
    pub clarity: f64,
    pub novelty: f64,
    pub relevance: f64,
    /// Weighted sum of the dimensions
    pub overall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisOptions {
    pub weights: QualityWeights,
    /// Similarity at or above which two texts count as agreeing
    pub similarity_threshold: f64,
    pub max_insights: usize,
    /// Sentence budget for the summarizing methods
    pub max_summary_sentences: usize,
    /// Original prompt, used to score relevance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl SynthesisOptions {
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_weights(mut self, weights: QualityWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn validate(&self) -> Result<(), SynthesisError> {
        self.weights.validate()?;
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(SynthesisError::InvalidOptions(
                "similarity_threshold must be between 0 and 1".to_string(),
            ));
        }
        if self.max_summary_sentences == 0 {
            return Err(SynthesisError::InvalidOptions(
                "max_summary_sentences must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            weights: QualityWeights::default(),
            similarity_threshold: 0.5,
            max_insights: 5,
            max_summary_sentences: 5,
            prompt: None,
        }
    }
}

/// Merged answer produced by the synthesis engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub content: String,
    /// Confidence in the merged answer, in `[0, 1]`
    pub confidence: f64,
    /// Fraction of response pairs found mutually similar, in `[0, 1]`
    pub consensus_level: f64,
    /// Most supported points, strongest first
    #[serde(default)]
    pub key_insights: Vec<String>,
    pub method: SynthesisMethod,
    /// Providers whose output contributed to `content`
    #[serde(default)]
    pub contributors: Vec<ProviderId>,
}
