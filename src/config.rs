//! Capture configuration
//!
//! One operator-facing switch lives here: `skip_ddl_replication`. It is
//! string-valued ("on" suppresses DDL capture, anything else does not)
//! and is meant for bulk restore, where every object arrives in the
//! dump and queueing its DDL again would duplicate it on peers.
//!
//! The switch is per session, like the rest of the session state; an
//! operator sets it for the restoring session only.

use std::cell::RefCell;

/// Per-session capture configuration.
#[derive(Debug)]
pub struct CaptureConfig {
    /// "on" suppresses DDL and drop capture entirely.
    skip_ddl_replication: RefCell<String>,
}

impl CaptureConfig {
    /// Creates a configuration with capture enabled.
    pub fn new() -> Self {
        Self {
            skip_ddl_replication: RefCell::new("off".to_string()),
        }
    }

    /// Sets the `skip_ddl_replication` switch.
    pub fn set_skip_ddl_replication(&self, value: &str) {
        *self.skip_ddl_replication.borrow_mut() = value.to_string();
    }

    /// Raw value of the switch.
    pub fn skip_ddl_replication(&self) -> String {
        self.skip_ddl_replication.borrow().clone()
    }

    /// Whether DDL capture is suppressed. Only the exact value "on"
    /// counts; every other value leaves capture enabled.
    pub fn skip_ddl(&self) -> bool {
        *self.skip_ddl_replication.borrow() == "on"
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_enabled_by_default() {
        assert!(!CaptureConfig::new().skip_ddl());
    }

    #[test]
    fn test_only_exact_on_suppresses() {
        let config = CaptureConfig::new();
        config.set_skip_ddl_replication("on");
        assert!(config.skip_ddl());

        config.set_skip_ddl_replication("ON");
        assert!(!config.skip_ddl());

        config.set_skip_ddl_replication("true");
        assert!(!config.skip_ddl());
    }
}
