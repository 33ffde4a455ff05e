//! Application configuration.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tdbot_core::{Instrument, LedgerScope, Timeframe, TimeframeFamily, TimeframeId};
use tdbot_detector::DetectorConfig;
use tdbot_settlement::{ProfitLockConfig, SettlementConfig};

use crate::error::{AppError, AppResult};

/// Default config path when neither `--config` nor `TDBOT_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Env var overriding the config path.
pub const CONFIG_ENV_VAR: &str = "TDBOT_CONFIG";

/// One instrument/timeframe the driver works on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Instrument symbol (e.g. "BTCUSDT").
    pub instrument: String,
    /// Canonical timeframe.
    pub timeframe: Timeframe,
    /// Second client id settling into the same ledger (e.g. "1h-b").
    #[serde(default)]
    pub alternate_timeframe_id: Option<String>,
    /// JSON Lines candle file for this market.
    pub candles_path: PathBuf,
}

impl MarketConfig {
    pub fn instrument(&self) -> Instrument {
        Instrument::new(&self.instrument)
    }

    pub fn family(&self) -> TimeframeFamily {
        match &self.alternate_timeframe_id {
            Some(alt) => TimeframeFamily::with_alternate(self.timeframe, alt.clone()),
            None => TimeframeFamily::new(self.timeframe),
        }
    }

    pub fn scope(&self) -> LedgerScope {
        LedgerScope::new(self.instrument(), self.family())
    }

    /// Timeframe id stamped on fills that do not name one.
    pub fn canonical_id(&self) -> TimeframeId {
        TimeframeId::from(self.timeframe)
    }

    /// `BTCUSDT/1h` style label for logs and metrics.
    pub fn label(&self) -> String {
        format!("{}/{}", self.instrument, self.timeframe)
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Base directory for ledgers and journals.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Journal records buffered before a flush.
    #[serde(default = "default_journal_buffer_size")]
    pub journal_buffer_size: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_journal_buffer_size() -> usize {
    100
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            journal_buffer_size: default_journal_buffer_size(),
        }
    }
}

impl PersistenceConfig {
    pub fn ledger_dir(&self) -> PathBuf {
        self.data_dir.join("ledger")
    }

    pub fn journal_dir(&self) -> PathBuf {
        self.data_dir.join("signals")
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub profit_lock: ProfitLockConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub markets: Vec<MarketConfig>,
}

impl AppConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Config path: explicit argument > `TDBOT_CONFIG` > default.
    pub fn resolve_path(explicit: Option<String>) -> String {
        explicit
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    pub fn validate(&self) -> AppResult<()> {
        self.settlement
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        self.profit_lock
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        if self.persistence.journal_buffer_size == 0 {
            return Err(AppError::Config(
                "persistence.journal_buffer_size must be at least 1".to_string(),
            ));
        }

        let mut scopes = HashSet::new();
        for market in &self.markets {
            if market.instrument.trim().is_empty() {
                return Err(AppError::Config("market with empty instrument".to_string()));
            }
            if market.alternate_timeframe_id.as_deref() == Some(market.timeframe.as_str()) {
                return Err(AppError::Config(format!(
                    "{}: alternate timeframe id repeats the canonical id",
                    market.label()
                )));
            }
            if !scopes.insert(market.scope().key()) {
                return Err(AppError::Config(format!(
                    "{} configured more than once",
                    market.label()
                )));
            }
        }
        Ok(())
    }

    /// Market configured for `instrument` at `timeframe`.
    pub fn market(&self, instrument: &str, timeframe: Timeframe) -> AppResult<&MarketConfig> {
        self.markets
            .iter()
            .find(|m| m.instrument == instrument && m.timeframe == timeframe)
            .ok_or_else(|| AppError::UnknownMarket {
                instrument: instrument.to_string(),
                timeframe: timeframe.to_string(),
            })
    }

    /// Other markets of the same instrument, candidates for proxy settlement.
    pub fn proxy_targets(&self, driver: &MarketConfig) -> Vec<&MarketConfig> {
        self.markets
            .iter()
            .filter(|m| m.instrument == driver.instrument && m.timeframe != driver.timeframe)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tdbot_detector::{DetectorVariant, RangeScan};

    const SAMPLE: &str = r#"
        [detector]
        variant = "range"
        range_scan = "sequential"

        [settlement.proxy]
        min_distance_secs = 90

        [profit_lock]
        min_profit_pct = "0.5"

        [persistence]
        data_dir = "/tmp/tdbot"

        [[markets]]
        instrument = "BTCUSDT"
        timeframe = "15m"
        candles_path = "data/candles/BTCUSDT_15m.jsonl"

        [[markets]]
        instrument = "BTCUSDT"
        timeframe = "1h"
        alternate_timeframe_id = "1h-b"
        candles_path = "data/candles/BTCUSDT_1h.jsonl"
    "#;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.detector.variant, DetectorVariant::Close);
        assert_eq!(config.settlement.proxy.min_distance_secs, 80);
        assert_eq!(config.persistence.journal_buffer_size, 100);
        assert!(config.markets.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.detector.variant, DetectorVariant::Range);
        assert_eq!(config.detector.range_scan, RangeScan::Sequential);
        assert_eq!(config.settlement.proxy.min_distance_secs, 90);
        assert!(config.settlement.proxy.enabled);
        assert_eq!(config.profit_lock.min_profit_pct, dec!(0.5));
        assert_eq!(config.persistence.ledger_dir(), PathBuf::from("/tmp/tdbot/ledger"));
        assert_eq!(config.markets.len(), 2);

        let hourly = config.market("BTCUSDT", Timeframe::H1).unwrap();
        assert_eq!(hourly.scope().to_string(), "BTCUSDT/1h|1h-b");
        assert!(hourly
            .scope()
            .covers(&Instrument::new("BTCUSDT"), &TimeframeId::new("1h-b")));

        let driver = config.market("BTCUSDT", Timeframe::M15).unwrap();
        let targets = config.proxy_targets(driver);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].timeframe, Timeframe::H1);
    }

    #[test]
    fn test_unknown_market() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        assert!(matches!(
            config.market("ETHUSDT", Timeframe::H1),
            Err(AppError::UnknownMarket { .. })
        ));
    }

    #[test]
    fn test_duplicate_market_rejected() {
        let doubled = format!(
            "{SAMPLE}
            [[markets]]
            instrument = \"BTCUSDT\"
            timeframe = \"1h\"
            candles_path = \"other.jsonl\"
            "
        );
        assert!(matches!(
            AppConfig::from_toml(&doubled),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad = r#"
            [persistence]
            journal_buffer_size = 0
        "#;
        assert!(AppConfig::from_toml(bad).is_err());

        let bad = r#"
            [settlement.proxy]
            min_distance_secs = -5
        "#;
        assert!(AppConfig::from_toml(bad).is_err());

        let bad = r#"
            [detector]
            variant = "unknown"
        "#;
        assert!(AppConfig::from_toml(bad).is_err());
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = AppConfig::from_toml(include_str!("../../../config/default.toml")).unwrap();
        assert_eq!(config.detector.variant, DetectorVariant::Extended);
        assert_eq!(config.markets.len(), 3);
        let driver = config.market("BTCUSDT", Timeframe::M15).unwrap();
        assert_eq!(config.proxy_targets(driver).len(), 2);
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(AppConfig::from_toml(&text).unwrap(), config);
    }
}
