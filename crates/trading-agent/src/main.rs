use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use decision_engine::{DecisionEngine, InstrumentCycle};
use tokio::signal::unix::SignalKind;
use tokio::time;

mod config;
mod metrics;

use config::AgentConfig;
use metrics::AgentMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting options decision agent");

    let config = AgentConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Session: {} {}-{}", config.session_timezone, config.session_open, config.session_close);
    tracing::info!(
        "  Strikes: step {}, max distance {}%, {} steps",
        config.strike_step,
        config.max_strike_distance_pct,
        config.max_strike_steps
    );
    tracing::info!(
        "  Daily target {} / max loss {}",
        config.daily_profit_target,
        config.max_daily_loss
    );
    tracing::info!("  Input: {}", config.cycle_input.display());

    let engine = Arc::new(DecisionEngine::new(config.engine_config()?)?);
    let mut agent_metrics = AgentMetrics::new(config.metrics_log_interval_cycles);

    if config.cycle_interval_seconds == 0 {
        run_cycle(&engine, &config.cycle_input, &mut agent_metrics).await?;
        agent_metrics.log_metrics();
        return Ok(());
    }

    // Main loop with graceful shutdown (SIGINT + SIGTERM)
    let mut interval = time::interval(Duration::from_secs(config.cycle_interval_seconds));
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = run_cycle(&engine, &config.cycle_input, &mut agent_metrics).await {
                    tracing::error!("Error in decision cycle: {:#}", e);
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, exiting gracefully...");
                agent_metrics.log_metrics();
                break;
            }
        }
    }

    tracing::info!("Decision agent shut down.");
    Ok(())
}

/// Read the instrument batch, evaluate it off the async runtime and print
/// one JSON line per instrument.
async fn run_cycle(engine: &Arc<DecisionEngine>, input: &Path, metrics: &mut AgentMetrics) -> Result<()> {
    let cycle_start = Instant::now();

    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let cycles: Vec<InstrumentCycle> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", input.display()))?;
    tracing::info!("Evaluating {} instruments", cycles.len());

    let worker = Arc::clone(engine);
    let results = tokio::task::spawn_blocking(move || worker.evaluate_all(&cycles))
        .await
        .context("evaluation task panicked")?;

    for (symbol, result) in results {
        let line = match result {
            Ok(record) => {
                metrics.record_decision(&record);
                serde_json::to_string(&record)?
            }
            Err(e) => {
                tracing::warn!("{}: {}", symbol, e);
                metrics.record_error();
                serde_json::json!({ "symbol": symbol, "error": e.to_string() }).to_string()
            }
        };
        println!("{}", line);
    }

    metrics.finish_cycle(cycle_start);
    Ok(())
}
