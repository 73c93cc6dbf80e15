//! Command-line arguments.
//!
//! Every option can also come from a `TAPIN_*` environment variable, which
//! is how the agent is usually configured under systemd.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tapin_core::AgentConfig;
use tapin_core::constants::DEFAULT_ENDPOINT_URL;
use tapin_hardware::{AnyCardReader, LineReader};

#[derive(Debug, Parser)]
#[command(name = "tapin")]
#[command(version)]
#[command(about = "Proximity-card check-in agent")]
#[command(long_about = "
Reads proximity cards and reports each scan to a check-in service.

Each card presentation is sent as POST {card_id, timestamp} to the
endpoint; the answer (check in, check out, unknown card, error) is
printed for the operator. Press Ctrl+C to stop.

Devices:
  -                read hex card ids from stdin, one per line (default)
  <path>           read hex card ids from a TTY, FIFO or file
  pcsc[:<name>]    PC/SC reader, optionally matched by name (feature `pcsc`)
")]
pub struct Cli {
    /// Check-in endpoint receiving scan events
    #[arg(long, env = "TAPIN_ENDPOINT_URL", default_value = DEFAULT_ENDPOINT_URL)]
    pub endpoint: String,

    /// Upper bound on one check-in request (e.g. 5s, 1500ms)
    #[arg(long, env = "TAPIN_REQUEST_TIMEOUT", default_value = "5s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Pause after a scan the service answered
    #[arg(long, env = "TAPIN_COOLDOWN", default_value = "3s", value_parser = humantime::parse_duration)]
    pub cooldown: Duration,

    /// Pause after a reader or network failure
    #[arg(long, env = "TAPIN_RETRY_DELAY", default_value = "1s", value_parser = humantime::parse_duration)]
    pub retry_delay: Duration,

    /// Health endpoint probed once at startup
    #[arg(long, env = "TAPIN_HEALTH_URL")]
    pub health_url: Option<String>,

    /// Card reader to use
    #[arg(short, long, env = "TAPIN_DEVICE", default_value = "-")]
    pub device: DeviceSpec,

    /// Ignore HTTP_PROXY/HTTPS_PROXY from the environment
    #[arg(long)]
    pub no_proxy: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Validated agent configuration.
    pub fn agent_config(&self) -> Result<AgentConfig> {
        let mut config = AgentConfig::default()
            .with_endpoint_url(&self.endpoint)
            .with_request_timeout(self.timeout)
            .with_post_scan_cooldown(self.cooldown)
            .with_error_retry_delay(self.retry_delay);
        if let Some(url) = &self.health_url {
            config = config.with_health_url(url);
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

/// Which reader `--device` selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSpec {
    Stdin,
    Path(PathBuf),
    /// PC/SC reader, optionally filtered by name.
    Pcsc(Option<String>),
}

impl FromStr for DeviceSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("device must not be empty".to_string());
        }
        if s == "-" {
            return Ok(DeviceSpec::Stdin);
        }
        if s == "pcsc" {
            return Ok(DeviceSpec::Pcsc(None));
        }
        if let Some(name) = s.strip_prefix("pcsc:") {
            let name = name.trim();
            return Ok(DeviceSpec::Pcsc((!name.is_empty()).then(|| name.to_string())));
        }
        Ok(DeviceSpec::Path(PathBuf::from(s)))
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSpec::Stdin => write!(f, "-"),
            DeviceSpec::Path(path) => write!(f, "{}", path.display()),
            DeviceSpec::Pcsc(None) => write!(f, "pcsc"),
            DeviceSpec::Pcsc(Some(name)) => write!(f, "pcsc:{name}"),
        }
    }
}

impl DeviceSpec {
    /// Build the (unopened) reader this device names.
    pub fn reader(&self) -> Result<AnyCardReader> {
        match self {
            DeviceSpec::Stdin => Ok(AnyCardReader::Line(LineReader::stdin())),
            DeviceSpec::Path(path) => Ok(AnyCardReader::Line(LineReader::path(path))),
            DeviceSpec::Pcsc(filter) => pcsc_reader(filter.as_deref()),
        }
    }
}

#[cfg(feature = "pcsc")]
fn pcsc_reader(filter: Option<&str>) -> Result<AnyCardReader> {
    use tapin_hardware::PcscReader;

    Ok(AnyCardReader::Pcsc(match filter {
        Some(name) => PcscReader::with_reader(name),
        None => PcscReader::new(),
    }))
}

#[cfg(not(feature = "pcsc"))]
fn pcsc_reader(_filter: Option<&str>) -> Result<AnyCardReader> {
    anyhow::bail!("this build has no PC/SC support (rebuild with `--features pcsc`)")
}
