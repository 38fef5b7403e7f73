//! Console output formatter for collaboration results

use crate::output::formatter::OutputFormatter;
use colored::Colorize;
use collab_domain::{CollaborationResult, ProviderOutcome};

/// Formats collaboration results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format the complete result
    pub fn format(prompt: &str, result: &CollaborationResult) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Collaboration Results"));
        output.push('\n');

        output.push_str(&format!("{} {}\n", "Prompt:".cyan().bold(), prompt));
        output.push_str(&format!(
            "{} {} ({})\n",
            "Strategy:".cyan().bold(),
            result.strategy,
            Self::status(result)
        ));
        output.push_str(&format!("{} {}\n", "Id:".cyan().bold(), result.id.dimmed()));

        output.push_str(&Self::section_header("Provider Responses"));
        for outcome in &result.outcomes {
            output.push_str(&Self::outcome(outcome));
        }

        output.push_str(&Self::section_header("Synthesis"));
        match &result.synthesis {
            Some(synthesis) => {
                output.push_str(&format!(
                    "\n{}\n\n{}\n",
                    format!(
                        "{} | confidence {:.2} | agreement {:.2} | from {}",
                        synthesis.method,
                        synthesis.confidence,
                        synthesis.consensus_level,
                        synthesis
                            .contributors
                            .iter()
                            .map(|p| p.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                    .yellow()
                    .bold(),
                    synthesis.content
                ));
                if !synthesis.key_insights.is_empty() {
                    output.push_str(&format!("\n{}\n", "Key Insights:".cyan().bold()));
                    for insight in &synthesis.key_insights {
                        output.push_str(&format!("  * {}\n", insight));
                    }
                }
            }
            None => output.push_str(&format!(
                "\n{}\n",
                result
                    .synthesis_error
                    .as_deref()
                    .unwrap_or("No synthesis produced")
                    .red()
            )),
        }

        output.push_str(&Self::section_header("Metrics"));
        output.push_str(&Self::metrics(result));

        output.push_str(&Self::footer());
        output
    }

    /// Format as JSON
    pub fn format_json(result: &CollaborationResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string())
    }

    /// Format the synthesized answer only
    pub fn format_synthesis_only(result: &CollaborationResult) -> String {
        if let Some(synthesis) = &result.synthesis {
            return format!("{}\n", synthesis.content);
        }

        let mut output = format!(
            "{} {}\n",
            "No answer:".red().bold(),
            result
                .synthesis_error
                .as_deref()
                .unwrap_or("no provider succeeded")
        );
        for outcome in result.outcomes.iter().filter(|o| !o.success) {
            if let Some(error) = &outcome.error {
                output.push_str(&format!(
                    "  {} {}: {}\n",
                    "x".red(),
                    outcome.provider,
                    error.message
                ));
            }
        }
        output
    }

    fn status(result: &CollaborationResult) -> String {
        if result.partial_success {
            "partial success".yellow().to_string()
        } else if result.success {
            "success".green().to_string()
        } else {
            "failed".red().to_string()
        }
    }

    fn outcome(outcome: &ProviderOutcome) -> String {
        match (&outcome.response, &outcome.error) {
            (Some(response), _) if outcome.success => format!(
                "\n{}\n{}\n",
                format!(
                    "── {} ({}, {} ms, {} tokens) ──",
                    outcome.provider,
                    response.model,
                    outcome.execution_time_ms,
                    response.usage.total_tokens
                )
                .yellow()
                .bold(),
                Self::indent(&response.content, "  ")
            ),
            (_, Some(error)) => format!(
                "\n{}\n  {} after {} attempt(s): {}\n",
                format!("── {} ({} ms) ──", outcome.provider, outcome.execution_time_ms)
                    .red()
                    .bold(),
                error.kind,
                error.attempts,
                error.message
            ),
            _ => format!("\n── {} ──\n  (no result)\n", outcome.provider),
        }
    }

    fn metrics(result: &CollaborationResult) -> String {
        let metrics = &result.metrics;
        let mut output = format!(
            "\n  total {} ms (strategy {} ms, synthesis {} ms), {} round(s)\n",
            metrics.total_time_ms, metrics.strategy_time_ms, metrics.synthesis_time_ms, metrics.rounds
        );
        output.push_str(&format!(
            "  tokens: {} prompt + {} completion = {}\n",
            metrics.total_tokens.prompt_tokens,
            metrics.total_tokens.completion_tokens,
            metrics.total_tokens.total_tokens
        ));
        if let Some(cost) = metrics.total_cost_usd {
            output.push_str(&format!("  estimated cost: ${:.4}\n", cost));
        }
        if metrics.cache_hit {
            output.push_str(&format!("  {}\n", "served from cache".dimmed()));
        }
        output
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, prompt: &str, result: &CollaborationResult) -> String {
        Self::format(prompt, result)
    }

    fn format_json(&self, result: &CollaborationResult) -> String {
        Self::format_json(result)
    }

    fn format_synthesis_only(&self, result: &CollaborationResult) -> String {
        Self::format_synthesis_only(result)
    }
}
