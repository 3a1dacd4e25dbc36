//! Pipeline configuration.
//!
//! `PipelineConfig` is deserialized from TOML. Every field has a default, so
//! an empty document is a valid configuration.
//!
//! ```toml
//! resolution_timeout_ms = 10000
//! phase_timeout_ms = 30000
//! parallel_precheck = false
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use agentgate_contracts::error::{GateError, GateResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bound on each registry query.
    pub resolution_timeout_ms: u64,
    /// Bound on each sandboxed phase call.
    pub phase_timeout_ms: u64,
    /// Dispatch policy prechecks concurrently. Reported outcomes stay in
    /// declared order.
    pub parallel_precheck: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resolution_timeout_ms: 10_000,
            phase_timeout_ms: 30_000,
            parallel_precheck: false,
        }
    }
}

impl PipelineConfig {
    /// Parse `s` as TOML and validate the result.
    ///
    /// Returns `GateError::ConfigError` if the TOML is malformed or a
    /// timeout is zero.
    pub fn from_toml_str(s: &str) -> GateResult<Self> {
        let config: PipelineConfig = toml::from_str(s).map_err(|e| GateError::ConfigError {
            reason: format!("failed to parse pipeline TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> GateResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| GateError::ConfigError {
            reason: format!("failed to read pipeline config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> GateResult<()> {
        if self.resolution_timeout_ms == 0 {
            return Err(GateError::ConfigError {
                reason: "resolution_timeout_ms must be greater than zero".to_string(),
            });
        }
        if self.phase_timeout_ms == 0 {
            return Err(GateError::ConfigError {
                reason: "phase_timeout_ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn resolution_timeout(&self) -> Duration {
        Duration::from_millis(self.resolution_timeout_ms)
    }

    pub fn phase_timeout(&self) -> Duration {
        Duration::from_millis(self.phase_timeout_ms)
    }
}
