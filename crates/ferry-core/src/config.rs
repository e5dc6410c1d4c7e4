//! Transfer configuration

use serde::{Deserialize, Serialize};

/// Settings for the transfer orchestrator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Children processed per batch when walking a folder tree
    pub op_concurrency: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self { op_concurrency: 5 }
    }
}

impl TransferConfig {
    /// Set the batch size
    pub fn with_op_concurrency(mut self, op_concurrency: usize) -> Self {
        self.op_concurrency = op_concurrency;
        self
    }

    /// Batch size actually used; never zero
    pub fn batch_size(&self) -> usize {
        self.op_concurrency.max(1)
    }
}
