//! Projector configuration.

use std::time::Duration;

/// Projector configuration.
#[derive(Debug, Clone)]
pub struct ProjectorConfig {
    /// Upper bound for draining one execution's history. `None` waits forever.
    pub fetch_timeout: Option<Duration>,

    /// Maximum nesting of child executions below the projected one.
    pub max_depth: usize,

    /// Reject child executions that already appear among their ancestors.
    pub detect_cycles: bool,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Some(Duration::from_secs(30)),
            max_depth: 16,
            detect_cycles: true,
        }
    }
}

impl ProjectorConfig {
    /// Builder method to set the fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Builder method to set the maximum nesting depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Builder method to toggle cycle detection.
    pub fn with_cycle_detection(mut self, enabled: bool) -> Self {
        self.detect_cycles = enabled;
        self
    }
}
