//! CLI entrypoint for model-collab
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::Parser;
use collab_application::{
    CollaborationError, CollaborationOrchestrator, ProgressNotifier, ProtocolError,
    ProviderManager, RunCollaborationInput,
};
use collab_domain::{CollaborationRequest, ProviderId};
use collab_infrastructure::{
    AdapterRegistry, ConfigLoader, FileConfig, JsonlCollaborationLogger, MemoryCache,
    TracingMetricsSink,
};
use collab_presentation::{Cli, ConsoleFormatter, OutputFormat, ProgressReporter, SimpleProgress};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // === Configuration ===
    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())?
    };

    if cli.show_config {
        for line in ConfigLoader::describe_sources(cli.config.as_deref()) {
            println!("{}", line);
        }
        println!();
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let _log_guard = init_logging(cli.log_level(), config.logging.log_file.as_deref())?;
    info!("Starting model-collab");

    apply_overrides(&cli, &mut config);
    config.check()?;

    let prompt = match cli.prompt.as_deref() {
        Some(p) if !p.trim().is_empty() => p.to_string(),
        _ => bail!("A prompt is required. Run with --help for usage."),
    };

    // === Dependency Injection ===
    let metrics = Arc::new(TracingMetricsSink);
    let manager = Arc::new(
        ProviderManager::new()
            .with_factory(Arc::new(AdapterRegistry::with_builtin()))
            .with_metrics(metrics.clone()),
    );

    for resolved in config.provider_configs() {
        match resolved {
            Ok(provider) => {
                let id = provider.id.clone();
                if let Err(e) = manager.register_provider(provider).await {
                    warn!(provider = %id, error = %e, "Skipping provider");
                }
            }
            Err(issue) => warn!(%issue, "Skipping provider"),
        }
    }

    if manager.provider_ids().is_empty() {
        bail!("No providers could be registered. Add [[providers]] entries to collab.toml.");
    }

    let mut orchestrator = CollaborationOrchestrator::new(manager.clone(), config.orchestrator_config())
        .with_metrics(metrics)
        .with_pricing(config.pricing.clone());

    if config.cache.is_active() {
        orchestrator = orchestrator.with_cache(Arc::new(MemoryCache::new(config.cache.max_entries)));
    }

    if let Some(path) = &config.logging.transcript_path {
        match JsonlCollaborationLogger::open(path) {
            Some(logger) => orchestrator = orchestrator.with_logger(Arc::new(logger)),
            None => warn!(path = %path.display(), "Transcript disabled"),
        }
    }

    // === Request ===
    let mut request = CollaborationRequest::new(prompt.clone());
    if let Some(model) = &cli.model {
        request = request.with_model(model.clone());
    }
    if let Some(temperature) = cli.temperature {
        request = request.with_temperature(temperature);
    }
    if let Some(max_tokens) = cli.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }

    let strategy = config
        .strategy
        .to_strategy(cli.strategy.map(|s| s.as_str()))
        .map_err(anyhow::Error::msg)?;

    let input = RunCollaborationInput::new(request, strategy)
        .with_providers(cli.providers.iter().map(|p| ProviderId::from(p.as_str())).collect());

    // Execute with or without progress reporting
    let progress: Box<dyn ProgressNotifier> = if cli.quiet {
        Box::new(collab_application::NoProgress)
    } else if std::io::stderr().is_terminal() {
        Box::new(ProgressReporter::new())
    } else {
        Box::new(SimpleProgress)
    };

    let outcome = orchestrator
        .execute_with_progress(input, progress.as_ref())
        .await;
    manager.shutdown().await;

    let result = match outcome {
        Ok(result) => result,
        Err(CollaborationError::Validation(errors)) => {
            bail!("Invalid request: {}", errors.join("; "))
        }
        Err(e) => {
            let error = ProtocolError::from(e);
            match cli.output {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&error).unwrap_or_else(|_| error.to_string())
                ),
                _ => eprintln!("Collaboration failed: {}", error),
            }
            return Ok(());
        }
    };

    // Output results
    let output = match cli.output {
        OutputFormat::Full => ConsoleFormatter::format(&prompt, &result),
        OutputFormat::Synthesis => ConsoleFormatter::format_synthesis_only(&result),
        OutputFormat::Json => ConsoleFormatter::format_json(&result),
    };

    println!("{}", output);

    Ok(())
}

/// Install the stderr subscriber and, when configured, a file writer.
fn init_logging(level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .context("logging.log_file must name a file")?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Fold command-line flags into the loaded configuration.
fn apply_overrides(cli: &Cli, config: &mut FileConfig) {
    if let Some(timeout_ms) = cli.timeout_ms {
        config.strategy.timeout_ms = timeout_ms;
    }
    if cli.fail_fast {
        config.strategy.fail_fast = true;
    }
    if let Some(max_iterations) = cli.max_iterations {
        config.strategy.max_iterations = max_iterations;
    }
    if let Some(threshold) = cli.consensus_threshold {
        config.strategy.consensus_threshold = threshold;
    }
    if let Some(method) = cli.synthesis {
        config.synthesis.method = method;
    }
    if cli.no_synthesis {
        config.synthesis.enabled = false;
    }
}
