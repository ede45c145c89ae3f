//! Run configuration.
//!
//! Everything the core needs from the outside world: bin count, advisory
//! peer endpoint, steering mode and sweep log path. Configs load from JSON;
//! missing fields take the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::feedback::{DEFAULT_PEER_HOST, DEFAULT_PEER_PORT, ReconnectPolicy, TcpConnector};
use crate::histogram::DEFAULT_BIN_COUNT;
use crate::sweep::DEFAULT_LOG_PATH;
use crate::view::ViewState;

/// Which component steers the view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteeringMode {
    /// Ask the advisory peer for the next pose every iteration.
    #[default]
    Feedback,
    /// Walk the orientation grid and log every sample.
    Sweep,
}

impl std::fmt::Display for SteeringMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Feedback => write!(f, "feedback"),
            Self::Sweep => write!(f, "sweep"),
        }
    }
}

impl std::str::FromStr for SteeringMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "feedback" | "peer" => Ok(Self::Feedback),
            "sweep" | "log" => Ok(Self::Sweep),
            other => Err(Error::Config(format!("unknown mode '{other}'"))),
        }
    }
}

/// Configuration for one run of the iteration driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Bins in both histograms.
    pub bin_count: usize,
    pub peer_host: String,
    pub peer_port: u16,
    pub mode: SteeringMode,
    /// Sweep log file. Only used in sweep mode.
    pub log_path: PathBuf,
    /// Pose before the first iteration.
    pub initial_view: ViewState,
    /// Reply wait limit. `None` blocks until the peer answers.
    pub read_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub reconnect: ReconnectPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            bin_count: DEFAULT_BIN_COUNT,
            peer_host: DEFAULT_PEER_HOST.to_string(),
            peer_port: DEFAULT_PEER_PORT,
            mode: SteeringMode::default(),
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            initial_view: ViewState::default(),
            read_timeout_ms: None,
            connect_timeout_ms: None,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl DriverConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the core cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.bin_count == 0 {
            return Err(Error::Config("bin_count must be positive".into()));
        }
        if self.bin_count % 2 == 0 {
            log::warn!(
                "bin_count {} is even; renderers expect an odd bin count",
                self.bin_count
            );
        }
        if self.mode == SteeringMode::Feedback {
            if self.peer_host.trim().is_empty() {
                return Err(Error::Config("peer_host must not be empty".into()));
            }
            if self.peer_port == 0 {
                return Err(Error::Config("peer_port must not be 0".into()));
            }
        }
        if self.mode == SteeringMode::Sweep && self.log_path.as_os_str().is_empty() {
            return Err(Error::Config("log_path must not be empty in sweep mode".into()));
        }
        Ok(())
    }

    /// `host:port` of the advisory peer.
    pub fn peer_addr(&self) -> String {
        format!("{}:{}", self.peer_host, self.peer_port)
    }

    /// TCP connector for the configured peer and timeouts.
    pub fn connector(&self) -> TcpConnector {
        TcpConnector::new(&self.peer_host, self.peer_port)
            .with_connect_timeout(self.connect_timeout_ms.map(Duration::from_millis))
            .with_read_timeout(self.read_timeout_ms.map(Duration::from_millis))
    }
}
