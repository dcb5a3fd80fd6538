//! Configuration for the display receiver.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use strobe_core::{CoreError, EngineConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrobeConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Frame engine sizing and timing.
    pub engine: EngineConfig,
    /// Statistics reporting.
    pub monitor: MonitorConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// UDP address to receive frame packets on.
    pub bind_address: String,
    /// Largest datagram accepted (header included).
    pub max_datagram: usize,
    /// Datagrams read per ingestion tick.
    pub packets_per_cycle: usize,
    /// Ingestion tick period in milliseconds.
    pub ingest_tick_ms: u64,
    /// Socket receive buffer in bytes (0 = OS default).
    pub recv_buffer: usize,
}

/// Statistics reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Reporting period in milliseconds.
    pub interval_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Optional log file path. If empty, logs to stderr.
    pub file: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4210".into(),
            max_datagram: 1500,
            packets_per_cycle: 3,
            ingest_tick_ms: 1,
            recv_buffer: 0,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { interval_ms: 3000 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: String::new(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl StrobeConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Check everything the runtime depends on before anything is bound.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.engine.validate()?;
        self.bind_addr()?;
        if self.network.max_datagram <= strobe_core::HEADER_SIZE {
            return Err(CoreError::InvalidConfig(format!(
                "max_datagram {} leaves no room for a payload",
                self.network.max_datagram
            )));
        }
        if self.network.packets_per_cycle == 0 || self.network.ingest_tick_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "packets_per_cycle and ingest_tick_ms must be non-zero".into(),
            ));
        }
        if self.monitor.interval_ms == 0 {
            return Err(CoreError::InvalidConfig("monitor interval must be non-zero".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, CoreError> {
        self.network.bind_address.parse().map_err(|e| {
            CoreError::InvalidConfig(format!("bind_address {:?}: {e}", self.network.bind_address))
        })
    }

    pub fn ingest_tick(&self) -> Duration {
        Duration::from_millis(self.network.ingest_tick_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.interval_ms)
    }
}

// ── Tests ────────────────────────────────────────────────────────
