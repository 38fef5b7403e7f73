//! Synthesis configuration from TOML (`[synthesis]` section)

use super::ConfigIssue;
use collab_application::SynthesisSettings;
use collab_domain::{QualityWeights, SynthesisMethod, SynthesisOptions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSynthesisConfig {
    pub enabled: bool,
    pub method: SynthesisMethod,
    pub weights: QualityWeights,
    pub similarity_threshold: f64,
    pub max_insights: usize,
    pub max_summary_sentences: usize,
}

impl Default for FileSynthesisConfig {
    fn default() -> Self {
        let options = SynthesisOptions::default();
        Self {
            enabled: true,
            method: SynthesisMethod::default(),
            weights: options.weights,
            similarity_threshold: options.similarity_threshold,
            max_insights: options.max_insights,
            max_summary_sentences: options.max_summary_sentences,
        }
    }
}

impl FileSynthesisConfig {
    pub fn to_options(&self) -> SynthesisOptions {
        SynthesisOptions {
            weights: self.weights,
            similarity_threshold: self.similarity_threshold,
            max_insights: self.max_insights,
            max_summary_sentences: self.max_summary_sentences,
            prompt: None,
        }
    }

    pub fn to_settings(&self) -> SynthesisSettings {
        SynthesisSettings {
            enabled: self.enabled,
            method: self.method,
            options: self.to_options(),
        }
    }

    pub(super) fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        if self.method == SynthesisMethod::PassThrough {
            issues.push(ConfigIssue::new(
                "synthesis.method",
                "pass_through cannot be configured; set enabled = false instead",
            ));
        }
        if let Err(e) = self.weights.validate() {
            issues.push(ConfigIssue::new("synthesis.weights", e.to_string()));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            issues.push(ConfigIssue::new(
                "synthesis.similarity_threshold",
                "must be between 0 and 1",
            ));
        }
        if self.max_summary_sentences == 0 {
            issues.push(ConfigIssue::new(
                "synthesis.max_summary_sentences",
                "must be at least 1",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_into_options() {
        let file = FileSynthesisConfig::default();
        assert_eq!(file.to_options(), SynthesisOptions::default());
        let settings = file.to_settings();
        assert!(settings.enabled);
        assert_eq!(settings.method, SynthesisMethod::Consensus);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let file = FileSynthesisConfig {
            weights: QualityWeights {
                accuracy: 0.5,
                completeness: 0.5,
                clarity: 0.5,
                novelty: 0.0,
                relevance: 0.0,
            },
            similarity_threshold: 2.0,
            ..Default::default()
        };
        let mut issues = Vec::new();
        file.validate(&mut issues);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].field, "synthesis.weights");
        assert!(issues[0].message.contains("sum to 1"));
    }
}
