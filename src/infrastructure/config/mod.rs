use crate::domain::error::{AppError, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const CONFIG_FILE: &str = "casegrid.toml";
pub const ENV_PREFIX: &str = "CASEGRID_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

/// Inclusive range a random delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayBand {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayBand {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }
}

/// Timing knobs for the simulated agent and the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub standard_delay_ms: DelayBand,
    pub simulation_delay_ms: DelayBand,
    /// How long the final progress stays visible before it resets.
    pub progress_reset_delay_ms: u64,
    pub inter_pass_delay_ms: u64,
    pub generation_delay_ms: u64,
    pub sample_data_delay_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            standard_delay_ms: DelayBand::new(2000, 4000),
            simulation_delay_ms: DelayBand::new(300, 600),
            progress_reset_delay_ms: 1500,
            inter_pass_delay_ms: 800,
            generation_delay_ms: 3000,
            sample_data_delay_ms: 1500,
        }
    }
}

impl ExecutionConfig {
    /// No waiting anywhere. Used by tests.
    pub fn immediate() -> Self {
        Self {
            standard_delay_ms: DelayBand::fixed(0),
            simulation_delay_ms: DelayBand::fixed(0),
            progress_reset_delay_ms: 0,
            inter_pass_delay_ms: 0,
            generation_delay_ms: 0,
            sample_data_delay_ms: 0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, band) in [
            ("standard_delay_ms", self.standard_delay_ms),
            ("simulation_delay_ms", self.simulation_delay_ms),
        ] {
            if band.min_ms > band.max_ms {
                return Err(AppError::ConfigError(format!(
                    "execution.{}: min_ms ({}) is greater than max_ms ({})",
                    name, band.min_ms, band.max_ms
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub log_level: String,
    pub execution: ExecutionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            log_level: "info".to_string(),
            execution: ExecutionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, then `casegrid.toml`, then `CASEGRID_*` variables
    /// (`CASEGRID_SERVER__PORT=8080`). A `.env` file is read first if present.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_figment(Self::figment(Path::new(CONFIG_FILE)))
    }

    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: AppConfig = figment.extract()?;
        config.execution.validate()?;
        Ok(config)
    }
}
