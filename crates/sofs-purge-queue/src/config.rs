//! Configuration for the purge queue.

use serde::{Deserialize, Serialize};
use sofs_types::{PoolId, Result, StatusCode, make_error_msg};

/// Configuration for one purge queue instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeQueueConfig {
    /// Maximum number of purge items executing concurrently. Consumption
    /// stalls once this many items are in flight.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Pool whose default layout backs a freshly created journal.
    #[serde(default)]
    pub metadata_pool: PoolId,
}

fn default_max_in_flight() -> usize {
    1
}

impl Default for PurgeQueueConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            metadata_pool: PoolId::default(),
        }
    }
}

impl PurgeQueueConfig {
    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_in_flight == 0 {
            return make_error_msg(
                StatusCode::INVALID_CONFIG,
                "max_in_flight must be at least 1",
            );
        }
        Ok(())
    }
}
