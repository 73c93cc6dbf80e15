//! tapin - proximity-card check-in agent
//!
//! Runs the agent loop in the foreground:
//! - Opens the configured card reader (fatal if it is missing)
//! - Optionally probes the check-in service's health endpoint
//! - Reports every card presentation and prints the outcome
//! - Stops cleanly on Ctrl+C or SIGTERM with exit code 0

mod cli;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tapin_agent::{
    Agent, AgentError, ConsoleSink, Feedback, FeedbackSink, ShutdownSignal, ShutdownTrigger,
    shutdown_channel,
};
use tapin_network::{CheckinClient, CheckinClientConfig, HealthStatus};
use tracing::{error, info, warn};

use crate::cli::Cli;

/// How long to wait for lingering blocking reads (stdin) at exit.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let code = match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("✗ {e:#}");
            ExitCode::FAILURE
        }
    };

    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    code
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "warn,tapin_cli={level},tapin_agent={level},tapin_network={level},tapin_hardware={level}"
                )
                .into()
            }),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.agent_config()?;
    let reader = cli.device.reader()?;

    let client = CheckinClient::new(CheckinClientConfig {
        proxy_from_env: !cli.no_proxy,
        ..CheckinClientConfig::from(&config)
    })
    .context("cannot set up the HTTP client")?;

    let mut sink = ConsoleSink::new();
    sink.emit(&Feedback::banner(tapin_core::VERSION));

    info!(
        version = tapin_core::VERSION,
        device = %cli.device,
        endpoint = %config.endpoint_url,
        timeout_ms = config.request_timeout.as_millis() as u64,
        cooldown_ms = config.post_scan_cooldown.as_millis() as u64,
        retry_delay_ms = config.error_retry_delay.as_millis() as u64,
        "Starting tapin"
    );

    let (trigger, mut signal) = shutdown_channel();
    install_signal_handlers(trigger).context("cannot install signal handlers")?;

    if let Some(url) = &config.health_url {
        if !check_health(&client, url, &mut signal).await {
            return Ok(());
        }
    }

    let mut agent = Agent::new(reader, client, sink, config, signal);
    match agent.run().await {
        Ok(summary) => {
            info!(
                scans = summary.scans,
                checked_in = summary.checked_in,
                checked_out = summary.checked_out,
                unknown_cards = summary.unknown_cards,
                service_errors = summary.service_errors,
                transport_failures = summary.transport_failures,
                device_failures = summary.device_failures,
                "Run finished"
            );
            Ok(())
        }
        Err(e @ AgentError::DeviceUnavailable(_)) => {
            Err(e).context(format!("cannot open card reader `{}`", cli.device))
        }
        Err(e) => Err(e.into()),
    }
}

/// Probe the health endpoint unless shutdown arrives first.
///
/// Returns `false` when interrupted.
async fn check_health(client: &CheckinClient, url: &str, signal: &mut ShutdownSignal) -> bool {
    tokio::select! {
        biased;
        _ = signal.wait() => {
            info!(url, "Shutdown requested during health check");
            false
        }
        status = client.probe_health(url) => {
            report_health(url, status);
            true
        }
    }
}

fn report_health(url: &str, status: HealthStatus) {
    match status {
        HealthStatus::Healthy => info!(url, "Check-in service is healthy"),
        HealthStatus::Unhealthy { status_code } => {
            warn!(url, status = status_code, "Check-in service reports a problem")
        }
        HealthStatus::Unreachable { kind, detail } => warn!(
            url,
            kind = %kind,
            "Check-in service unreachable, scans will fail until it is up: {}",
            detail
        ),
    }
}

/// Flip the agent to `ShuttingDown` on the first interrupt.
fn install_signal_handlers(trigger: ShutdownTrigger) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
            trigger.shutdown();
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C");
                    trigger.shutdown();
                }
                Err(e) => warn!(error = %e, "Cannot listen for Ctrl+C"),
            }
        });
    }

    Ok(())
}
