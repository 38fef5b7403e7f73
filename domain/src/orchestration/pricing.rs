//! Per-model token pricing used for cost estimates.

use crate::core::response::TokenUsage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// USD price per 1,000 tokens for one model.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelPricing {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

/// Pluggable price table keyed by model name.
///
/// Models without an entry produce no estimate rather than a zero cost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PricingTable {
    models: HashMap<String, ModelPricing>,
}

impl PricingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>, pricing: ModelPricing) -> Self {
        self.models.insert(model.into(), pricing);
        self
    }

    pub fn insert(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.models.insert(model.into(), pricing);
    }

    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.models.get(model)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelPricing)> {
        self.models.iter().map(|(model, pricing)| (model.as_str(), pricing))
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Estimated cost in USD of `usage` on `model`.
    pub fn estimate(&self, model: &str, usage: &TokenUsage) -> Option<f64> {
        let pricing = self.models.get(model)?;
        Some(
            usage.prompt_tokens as f64 / 1000.0 * pricing.prompt_per_1k
                + usage.completion_tokens as f64 / 1000.0 * pricing.completion_per_1k,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_known_model() {
        let table = PricingTable::new().with_model(
            "gpt-4.1",
            ModelPricing {
                prompt_per_1k: 0.002,
                completion_per_1k: 0.008,
            },
        );
        let cost = table
            .estimate("gpt-4.1", &TokenUsage::new(1000, 500))
            .unwrap();
        assert!((cost - 0.006).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_model_has_no_estimate() {
        let table = PricingTable::new();
        assert!(table.estimate("mystery", &TokenUsage::new(10, 10)).is_none());
    }

    #[test]
    fn test_deserialize_from_map() {
        let table: PricingTable = serde_json::from_str(
            r#"{"claude-sonnet-4": {"prompt_per_1k": 0.003, "completion_per_1k": 0.015}}"#,
        )
        .unwrap();
        assert_eq!(table.get("claude-sonnet-4").unwrap().completion_per_1k, 0.015);
    }
}
