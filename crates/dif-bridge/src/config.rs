//! Handler configuration

use serde::Deserialize;

use crate::dif::TransceiverId;

/// Configuration for a [`DifHandler`](crate::DifHandler).
///
/// Controls which transceiver the handler speaks as and how strictly moved
/// originals are guarded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Transceiver id stamped on every update this handler emits
    pub transceiver_id: TransceiverId,

    /// Seal originals once their proxy is created, so stray access through
    /// the original fails instead of silently bypassing synchronization
    pub guard_original_access: bool,

    /// Ask the runtime to relay own updates while local observers exist
    pub relay_own_updates_on_observe: bool,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            transceiver_id: 0,
            guard_original_access: cfg!(debug_assertions),
            relay_own_updates_on_observe: true,
        }
    }
}

impl HandlerConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config speaking as a specific transceiver.
    pub fn with_transceiver_id(transceiver_id: TransceiverId) -> Self {
        Self {
            transceiver_id,
            ..Default::default()
        }
    }

    /// Enable or disable the original-access guard.
    pub fn guard_original_access(mut self, enabled: bool) -> Self {
        self.guard_original_access = enabled;
        self
    }

    /// Enable or disable relaying own updates to local observers.
    pub fn relay_own_updates_on_observe(mut self, enabled: bool) -> Self {
        self.relay_own_updates_on_observe = enabled;
        self
    }

    /// Parse a config from JSON; absent fields keep their defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HandlerConfig::default();
        assert_eq!(config.transceiver_id, 0);
        assert!(config.relay_own_updates_on_observe);
        assert_eq!(config.guard_original_access, cfg!(debug_assertions));
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let config = HandlerConfig::from_json(r#"{ "transceiver_id": 7 }"#).unwrap();
        assert_eq!(config.transceiver_id, 7);
        assert!(config.relay_own_updates_on_observe);
    }

    #[test]
    fn test_builders() {
        let config = HandlerConfig::with_transceiver_id(3)
            .guard_original_access(true)
            .relay_own_updates_on_observe(false);
        assert_eq!(config.transceiver_id, 3);
        assert!(config.guard_original_access);
        assert!(!config.relay_own_updates_on_observe);
    }
}
