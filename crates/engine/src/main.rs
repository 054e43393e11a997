//! Macrosim - Main entry point.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use macrosim_engine::app::{App, Repositories};
use macrosim_engine::infrastructure::{
    app_config::{load_dotenv_from_repo_root, AppConfig, ConfigError, NarrativeBackend, StoreBackend},
    clock::SystemClock,
    ollama::OllamaClient,
    persistence::{InMemoryStore, Scenario, SqliteStore},
    ports::{LogLevel, NarrativePort, OutputLine, OutputPort},
    resilient_llm::{ResilientLlmClient, RetryPolicy},
    terminal::TerminalOutput,
};
use macrosim_engine::use_cases::{
    ImportOutcome, LlmNarrator, RunOutcome, SimulationError, SimulationSettings, TemplateNarrator,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load environment from repo root so `cargo run` works from any crate directory.
    load_dotenv_from_repo_root();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "macrosim_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let code = exit_code_for(&e);
            tracing::error!(error = %format!("{e:#}"), exit_code = code, "Macrosim stopped");
            ExitCode::from(code)
        }
    }
}

async fn run() -> anyhow::Result<u8> {
    tracing::info!("Starting Macrosim");

    // Load configuration
    let config = AppConfig::from_env()?;
    tracing::debug!(?config, "Configuration loaded");

    let output = Arc::new(TerminalOutput::new(config.terminal_colors));

    // Open the scenario store
    let repositories = match config.store {
        StoreBackend::Memory => Repositories::from_store(Arc::new(InMemoryStore::new())),
        StoreBackend::Sqlite => {
            tracing::info!(path = %config.sqlite_path.display(), "Opening SQLite store");
            let store = SqliteStore::open(&config.sqlite_path)
                .await
                .context("failed to open SQLite store")?;
            Repositories::from_store(Arc::new(store))
        }
    };

    let narrator = build_narrator(&config);

    let settings = SimulationSettings {
        time_scale: config.time_scale,
        max_days: config.max_days,
        pre_release_narratives: config.narrative.pre_release,
        fast_forward: config.fast_forward,
        ..SimulationSettings::default()
    };

    let output_port: Arc<dyn OutputPort> = output.clone();
    let app = App::new(
        repositories,
        narrator,
        output_port.clone(),
        Arc::new(SystemClock::new()),
        settings,
    );

    // Import the scenario into an empty store
    let scenario_name = if config.scenario_path.exists() {
        let scenario = Scenario::load(&config.scenario_path)
            .await
            .map_err(|e| SimulationError::Configuration(format!(
                "scenario {}: {}",
                config.scenario_path.display(),
                e
            )))?;
        match app.use_cases.scenario.import.execute(&scenario).await? {
            ImportOutcome::Imported { items, .. } => {
                tracing::info!(items, path = %config.scenario_path.display(), "Scenario loaded");
            }
            ImportOutcome::AlreadyPopulated => {
                tracing::info!("Resuming from existing store contents");
            }
        }
        scenario.name
    } else {
        tracing::warn!(
            path = %config.scenario_path.display(),
            "Scenario file not found, playing back existing store contents"
        );
        None
    };

    output.welcome(scenario_name.as_deref());

    let stats = app.use_cases.scenario.statistics.execute().await?;
    tracing::info!(
        releases = stats.catalog.releases,
        unfired_releases = stats.catalog.unfired_releases,
        events = stats.catalog.events,
        unfired_events = stats.catalog.unfired_events,
        history_records = stats.history_records,
        narratives = stats.narratives,
        "Store statistics"
    );

    let cancel_token = CancellationToken::new();
    setup_shutdown_signal(cancel_token.clone());

    let outcome = app.use_cases.simulation.execute(cancel_token).await?;

    let report = outcome.report();
    let (level, verdict) = match &outcome {
        RunOutcome::Completed(_) => (LogLevel::Success, "completed"),
        RunOutcome::Interrupted(_) => (LogLevel::Warning, "interrupted"),
    };
    output_port.render(OutputLine::system(
        level,
        format!(
            "Playback {}: {} fired, {} remaining, {} narrative failures, wall time {}s",
            verdict,
            report.fired,
            report.progress.remaining,
            report.narrative_failures,
            (report.finished_at - report.started_at).num_seconds()
        ),
    ));

    Ok(u8::try_from(outcome.exit_code()).unwrap_or(1))
}

fn build_narrator(config: &AppConfig) -> Arc<dyn NarrativePort> {
    let narrative = &config.narrative;
    match narrative.backend {
        NarrativeBackend::Template => {
            tracing::info!("Using offline template narrator");
            Arc::new(TemplateNarrator::new())
        }
        NarrativeBackend::Llm => {
            let client = Arc::new(
                OllamaClient::new(&narrative.llm_base_url, &narrative.llm_model)
                    .with_api_key(narrative.llm_api_key.clone()),
            );
            let policy = RetryPolicy::default();
            tracing::info!(
                base_url = %narrative.llm_base_url,
                model = %narrative.llm_model,
                retries = policy.retries,
                initial_backoff_ms = policy.initial_backoff.as_millis() as u64,
                "LLM narrator configured"
            );
            let llm = Arc::new(ResilientLlmClient::new(client, policy));
            Arc::new(LlmNarrator::new(
                llm,
                narrative.max_tokens,
                narrative.temperature,
                narrative.target_words.clone(),
            ))
        }
    }
}

/// Cancels `cancel_token` on SIGINT or SIGTERM.
fn setup_shutdown_signal(cancel_token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, stopping playback...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, stopping playback...");
            }
        }

        cancel_token.cancel();
    });
}

/// Process status for a failed run: 2 for configuration problems, 1 otherwise.
fn exit_code_for(error: &anyhow::Error) -> u8 {
    if error.downcast_ref::<ConfigError>().is_some() {
        return 2;
    }
    match error.downcast_ref::<SimulationError>() {
        Some(e) => u8::try_from(e.exit_code()).unwrap_or(1),
        None => 1,
    }
}
