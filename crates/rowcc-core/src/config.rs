//! Engine configuration

use crate::error::{EngineError, EngineResult};
use rowcc_primitives::DEFAULT_ROW_COUNT;
use rowcc_scheduler::{PartitionMap, Strategy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of rows in the store
    #[serde(default = "default_row_count")]
    pub row_count: usize,
    /// Strategy used by [`Engine::run_default`](crate::Engine::run_default)
    #[serde(default)]
    pub strategy: Strategy,
    /// How often blocked waits re-check cancellation, in milliseconds
    #[serde(default = "default_lock_poll_interval_ms")]
    pub lock_poll_interval_ms: u64,
}

fn default_row_count() -> usize {
    DEFAULT_ROW_COUNT
}

fn default_lock_poll_interval_ms() -> u64 {
    5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            row_count: default_row_count(),
            strategy: Strategy::default(),
            lock_poll_interval_ms: default_lock_poll_interval_ms(),
        }
    }
}

impl EngineConfig {
    /// Default configuration with `row_count` rows
    pub fn with_rows(row_count: usize) -> Self {
        Self {
            row_count,
            ..Self::default()
        }
    }

    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock_poll_interval_ms)
    }

    /// Check that the configuration describes a usable engine
    pub fn validate(&self) -> EngineResult<()> {
        if self.row_count == 0 {
            return Err(EngineError::InvalidConfig("row_count must be positive".into()));
        }
        if self.lock_poll_interval_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "lock_poll_interval_ms must be positive".into(),
            ));
        }
        if let Some(partitions) = self.strategy.partitions() {
            PartitionMap::new(self.row_count, partitions)?;
        }
        Ok(())
    }
}
