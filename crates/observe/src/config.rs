//! Runtime configuration.

use serde::{Deserialize, Serialize};

/// Upper bound on sweeps performed by one checkpoint.
pub const MAX_DIRTY_CHECK_CYCLES: usize = 1000;

/// How changes reach observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeSourceKind {
    /// Every checkpoint re-evaluates all open observers.
    #[default]
    DirtyChecking,
    /// Mutations emit change records to installed watches; a checkpoint
    /// flushes the pending deliveries.
    NativeNotification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ObserveConfig {
    pub change_source: ChangeSourceKind,
    pub max_dirty_check_cycles: usize,
}

impl Default for ObserveConfig {
    fn default() -> Self {
        Self {
            change_source: ChangeSourceKind::default(),
            max_dirty_check_cycles: MAX_DIRTY_CHECK_CYCLES,
        }
    }
}

impl ObserveConfig {
    pub fn dirty_checking() -> Self {
        Self::default()
    }

    pub fn native() -> Self {
        Self {
            change_source: ChangeSourceKind::NativeNotification,
            ..Self::default()
        }
    }

    pub fn with_max_dirty_check_cycles(mut self, cycles: usize) -> Self {
        self.max_dirty_check_cycles = cycles;
        self
    }

    /// Parses a JSON configuration document. Missing fields take their
    /// defaults.
    ///
    /// ```
    /// use observe::config::{ChangeSourceKind, ObserveConfig};
    ///
    /// let config = ObserveConfig::from_json_str(r#"{"change-source": "native-notification"}"#).unwrap();
    /// assert_eq!(config.change_source, ChangeSourceKind::NativeNotification);
    /// assert_eq!(config.max_dirty_check_cycles, 1000);
    /// ```
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ObserveConfig::default();
        assert_eq!(config.change_source, ChangeSourceKind::DirtyChecking);
        assert_eq!(config.max_dirty_check_cycles, MAX_DIRTY_CHECK_CYCLES);
    }

    #[test]
    fn kebab_case_round_trip() {
        let config = ObserveConfig::native().with_max_dirty_check_cycles(7);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"change-source": "native-notification", "max-dirty-check-cycles": 7})
        );
        let back: ObserveConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn rejects_unknown_source() {
        assert!(ObserveConfig::from_json_str(r#"{"change-source": "polling"}"#).is_err());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(ObserveConfig::from_json_str("{}").unwrap(), ObserveConfig::default());
    }
}
