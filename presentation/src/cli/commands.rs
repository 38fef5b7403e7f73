//! CLI command definitions

use clap::{Parser, ValueEnum};
use collab_domain::SynthesisMethod;
use std::path::PathBuf;

/// Output format for collaboration results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Every provider response, the synthesis and metrics
    Full,
    /// Only the synthesized answer
    Synthesis,
    /// The complete result as JSON
    Json,
}

/// Coordination strategy selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    Parallel,
    Sequential,
    Consensus,
    Iterative,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Parallel => "parallel",
            StrategyKind::Sequential => "sequential",
            StrategyKind::Consensus => "consensus",
            StrategyKind::Iterative => "iterative",
        }
    }
}

/// CLI arguments for model-collab
#[derive(Parser, Debug)]
#[command(name = "model-collab")]
#[command(author, version, about = "Fan a prompt out to several model providers and synthesize one answer")]
#[command(long_about = r#"
model-collab sends one prompt to several model providers under a coordination
strategy and merges the successful answers into a single synthesized result.

Strategies:
  parallel     every provider at once under one deadline
  sequential   one provider after another (optionally --fail-fast)
  consensus    repeated rounds until the answers agree
  iterative    draft once, then refine until quality stops improving

Configuration files are loaded from (in priority order):
1. COLLAB_* environment variables
2. --config <path>     Explicit config file
3. ./collab.toml       Project-level config
4. ~/.config/model-collab/config.toml   Global config

Example:
  model-collab "What does the borrow checker prevent?"
  model-collab -s consensus -p gpt -p claude "Is P = NP?"
  model-collab -s iterative --max-iterations 4 -o full "Explain monads"
"#)]
pub struct Cli {
    /// The prompt sent to every provider
    pub prompt: Option<String>,

    /// Coordination strategy (defaults to [strategy].default from config)
    #[arg(short, long, value_enum)]
    pub strategy: Option<StrategyKind>,

    /// Providers to use, by configured id (can be specified multiple times; default: all healthy)
    #[arg(short, long = "provider", value_name = "ID")]
    pub providers: Vec<String>,

    /// Model hint passed to every provider
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Sampling temperature (0.0 to 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Maximum tokens per response
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Deadline for the whole strategy run in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Sequential strategy: stop after the first failed provider
    #[arg(long)]
    pub fail_fast: bool,

    /// Consensus/iterative: maximum number of rounds
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<usize>,

    /// Consensus: fraction of agreeing pairs needed to stop (0.0 to 1.0)
    #[arg(long, value_name = "RATIO")]
    pub consensus_threshold: Option<f64>,

    /// Synthesis method: consensus, weighted_merge, best_of, comprehensive, extractive, abstractive
    #[arg(long, value_name = "METHOD", conflicts_with = "no_synthesis")]
    pub synthesis: Option<SynthesisMethod>,

    /// Skip synthesis and return the first successful response
    #[arg(long)]
    pub no_synthesis: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "synthesis")]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and the merged configuration, then exit
    #[arg(long)]
    pub show_config: bool,
}

impl Cli {
    /// `EnvFilter` directive for the requested verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
