//! Runtime configuration.
//!
//! Each thread owns its own reactive runtime; [`Runtime::configure`] replaces
//! the configuration of the calling thread's runtime. The struct derives
//! `Deserialize` with per-field defaults so applications can embed it in
//! their own settings files.
//!
//! [`Runtime::configure`]: crate::reactive::Runtime::configure

use serde::{Deserialize, Serialize};

/// Default number of diagnostics retained before the oldest are dropped.
pub const DEFAULT_DIAGNOSTIC_CAPACITY: usize = 64;

/// Default bound on consecutive propagation passes triggered by one mutation.
pub const DEFAULT_MAX_PASSES: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How many diagnostics the runtime buffers for [`Runtime::take_diagnostics`].
    ///
    /// [`Runtime::take_diagnostics`]: crate::reactive::Runtime::take_diagnostics
    pub diagnostic_capacity: usize,

    /// How many passes a single mutation may cascade into (reactions that set
    /// other cells start new passes) before propagation is abandoned.
    pub max_passes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            diagnostic_capacity: DEFAULT_DIAGNOSTIC_CAPACITY,
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl RuntimeConfig {
    pub fn with_diagnostic_capacity(mut self, capacity: usize) -> Self {
        self.diagnostic_capacity = capacity;
        self
    }

    pub fn with_max_passes(mut self, passes: usize) -> Self {
        self.max_passes = passes;
        self
    }
}
