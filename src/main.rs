//! AUGUR — candle-driven binary-option signal engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! establishes the broker session and runs scheduler passes until Ctrl+C.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use augur::broker::paper::PaperBroker;
use augur::config;
use augur::engine::accountant::{Accountant, PassReport};
use augur::engine::clock::{wait_for_connection, Clock, SystemClock};
use augur::engine::executor::Executor;
use augur::engine::scheduler::Scheduler;

const BANNER: &str = r#"
    _   _   _  ____ _   _ ____
   / \ | | | |/ ___| | | |  _ \
  / _ \| | | | |  _| | | | |_) |
 / ___ \ |_| | |_| | |_| |  _ <
/_/   \_\___/ \____|\___/|_| \_\

  Candle-driven signal engine
  v0.1.0
"#;

/// Pause between session establishment and the first pass.
const WARMUP: Duration = Duration::from_secs(2);
const CONNECT_POLL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("AUGUR_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        period_secs = cfg.agent.period_secs,
        expiration_secs = cfg.agent.expiration_secs,
        threshold = cfg.strategy.prob_threshold,
        martingale_level = cfg.staking.martingale_level,
        instruments = cfg.eligibility.watchlist.len(),
        "AUGUR starting up"
    );

    // -- Initialise components -------------------------------------------

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let broker = Arc::new(PaperBroker::new(
        cfg.paper.clone(),
        cfg.eligibility.watchlist.clone(),
        clock.clone(),
    ));

    wait_for_connection(
        broker.as_ref(),
        CONNECT_POLL,
        Duration::from_secs(cfg.agent.connect_timeout_secs),
    )
    .await
    .context("Broker session could not be established")?;
    tokio::time::sleep(WARMUP).await;

    let executor = Arc::new(Executor::new(broker.clone()));
    let mut scheduler = Scheduler::new(&cfg, broker.clone(), broker, executor, clock);
    let mut accountant = Accountant::new();

    // -- Main loop -------------------------------------------------------

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Entering main loop. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            report = scheduler.run_pass() => {
                log_pass_report(&report);
                accountant.reconcile(&report);
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to listen for shutdown signal");
                }
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    let stats = accountant.stats();
    info!(
        passes = stats.passes,
        runs = stats.runs(),
        won = stats.runs_won,
        capped = stats.runs_capped,
        wagers = stats.wagers_placed,
        pnl = %stats.net_pnl,
        "AUGUR shut down cleanly."
    );

    Ok(())
}

/// Log a human-readable pass summary.
fn log_pass_report(report: &PassReport) {
    let elapsed = report
        .finished_at
        .map(|end| (end - report.started_at).num_seconds())
        .unwrap_or_default();
    info!(
        pass = report.pass_number,
        considered = report.instruments_considered,
        skipped = report.skipped,
        signals = report.signals,
        wagers = report.wagers_placed,
        pnl = %report.net_pnl,
        elapsed_secs = elapsed,
        "Pass complete"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("augur=info"));

    let json_logging = std::env::var("AUGUR_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
