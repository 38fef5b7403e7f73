//! Strategy defaults from TOML (`[strategy]` section)

use super::ConfigIssue;
use collab_domain::{ConsensusConfig, IterativeConfig, Strategy, StrategyConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStrategyConfig {
    /// Strategy used when a call names none: parallel, sequential, consensus, iterative
    pub default: String,
    pub timeout_ms: u64,
    pub max_concurrent_providers: usize,
    pub fail_fast: bool,
    pub consensus_threshold: f64,
    pub similarity_threshold: f64,
    pub max_iterations: usize,
    pub improvement_threshold: f64,
    pub rotate_providers: bool,
}

impl Default for FileStrategyConfig {
    fn default() -> Self {
        let shared = StrategyConfig::default();
        let consensus = ConsensusConfig::default();
        let iterative = IterativeConfig::default();
        Self {
            default: "parallel".to_string(),
            timeout_ms: shared.timeout_ms,
            max_concurrent_providers: shared.max_concurrent_providers,
            fail_fast: shared.fail_fast,
            consensus_threshold: consensus.consensus_threshold,
            similarity_threshold: consensus.similarity_threshold,
            max_iterations: consensus.max_iterations,
            improvement_threshold: iterative.improvement_threshold,
            rotate_providers: iterative.rotate_providers,
        }
    }
}

impl FileStrategyConfig {
    pub fn to_strategy_config(&self) -> StrategyConfig {
        StrategyConfig {
            timeout_ms: self.timeout_ms,
            max_concurrent_providers: self.max_concurrent_providers,
            fail_fast: self.fail_fast,
        }
    }

    /// Build the named strategy (or the configured default) with the
    /// thresholds from this section.
    pub fn to_strategy(&self, name: Option<&str>) -> Result<Strategy, String> {
        let strategy = match name.unwrap_or(self.default.as_str()).parse::<Strategy>()? {
            Strategy::Consensus(_) => Strategy::Consensus(ConsensusConfig {
                consensus_threshold: self.consensus_threshold,
                similarity_threshold: self.similarity_threshold,
                max_iterations: self.max_iterations,
            }),
            Strategy::Iterative(_) => Strategy::Iterative(IterativeConfig {
                max_iterations: self.max_iterations,
                improvement_threshold: self.improvement_threshold,
                rotate_providers: self.rotate_providers,
            }),
            plain => plain,
        };
        Ok(strategy)
    }

    pub(super) fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        if let Err(e) = self.default.parse::<Strategy>() {
            issues.push(ConfigIssue::new("strategy.default", e));
        }
        for error in self.to_strategy_config().validate().err().unwrap_or_default() {
            issues.push(ConfigIssue::new("strategy", error));
        }
        // Both threshold-bearing variants share the fields of this section.
        for probe in ["consensus", "iterative"] {
            if let Ok(strategy) = self.to_strategy(Some(probe))
                && let Err(errors) = strategy.validate()
            {
                for error in errors {
                    let issue = ConfigIssue::new("strategy", error);
                    if !issues.contains(&issue) {
                        issues.push(issue);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_mirror_domain_defaults() {
        let file = FileStrategyConfig::default();
        assert_eq!(file.to_strategy_config(), StrategyConfig::default());
        assert_eq!(file.to_strategy(None).unwrap(), Strategy::Parallel);
        assert_eq!(
            file.to_strategy(Some("consensus")).unwrap(),
            Strategy::Consensus(ConsensusConfig::default())
        );
    }

    #[test]
    fn test_thresholds_flow_into_variants() {
        let file = FileStrategyConfig {
            max_iterations: 5,
            improvement_threshold: 0.1,
            rotate_providers: false,
            ..Default::default()
        };
        match file.to_strategy(Some("Iterative")).unwrap() {
            Strategy::Iterative(cfg) => {
                assert_eq!(cfg.max_iterations, 5);
                assert_eq!(cfg.improvement_threshold, 0.1);
                assert!(!cfg.rotate_providers);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(file.to_strategy(Some("round-robin")).is_err());
    }

    #[test]
    fn test_validate_reports_each_problem_once() {
        let file = FileStrategyConfig {
            default: "bogus".into(),
            timeout_ms: 0,
            max_iterations: 0,
            consensus_threshold: 1.5,
            ..Default::default()
        };
        let mut issues = Vec::new();
        file.validate(&mut issues);

        let messages: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
        assert_eq!(issues.len(), 4, "{messages:?}");
        assert!(messages.iter().any(|m| m.starts_with("strategy.default")));
        assert!(messages.iter().any(|m| m.contains("timeout")));
        assert!(messages.iter().any(|m| m.contains("consensus_threshold")));
        assert!(messages.iter().any(|m| m.contains("max_iterations")));
    }
}
