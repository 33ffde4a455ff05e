//! Settlement configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{SettlementError, SettlementResult};

/// Default distance from a coarser timeframe's trigger instants, in seconds.
pub const DEFAULT_PROXY_MIN_DISTANCE_SECS: i64 = 80;

fn default_proxy_enabled() -> bool {
    true
}

fn default_min_distance_secs() -> i64 {
    DEFAULT_PROXY_MIN_DISTANCE_SECS
}

/// Proxy settlement of coarser timeframes by a finer driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_enabled")]
    pub enabled: bool,
    /// Required distance from both the previous and the next trigger instant.
    #[serde(default = "default_min_distance_secs")]
    pub min_distance_secs: i64,
    /// Shift of every timeframe's trigger grid from the epoch boundary.
    #[serde(default)]
    pub trigger_offset_secs: i64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: default_proxy_enabled(),
            min_distance_secs: default_min_distance_secs(),
            trigger_offset_secs: 0,
        }
    }
}

impl ProxyConfig {
    pub fn min_distance(&self) -> Duration {
        Duration::seconds(self.min_distance_secs)
    }

    pub fn validate(&self) -> SettlementResult<()> {
        if self.min_distance_secs < 0 {
            return Err(SettlementError::InvalidConfig(format!(
                "proxy.min_distance_secs must not be negative, got {}",
                self.min_distance_secs
            )));
        }
        Ok(())
    }
}

/// Settlement engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfig {
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl SettlementConfig {
    pub fn validate(&self) -> SettlementResult<()> {
        self.proxy.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SettlementConfig::default();
        assert!(config.proxy.enabled);
        assert_eq!(config.proxy.min_distance_secs, 80);
        assert_eq!(config.proxy.trigger_offset_secs, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SettlementConfig = toml::from_str(
            r#"
            [proxy]
            min_distance_secs = 120
            "#,
        )
        .unwrap();
        assert!(config.proxy.enabled);
        assert_eq!(config.proxy.min_distance(), Duration::seconds(120));
    }

    #[test]
    fn test_negative_distance_rejected() {
        let config = SettlementConfig {
            proxy: ProxyConfig {
                min_distance_secs: -1,
                ..Default::default()
            },
        };
        assert!(matches!(
            config.validate(),
            Err(SettlementError::InvalidConfig(_))
        ));
    }
}
