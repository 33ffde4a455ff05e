//! Application orchestration.
//!
//! Runs each command against the configured markets:
//! - Detection over every market's candle file, journaled and counted
//! - Native settlement of a fill file into one market's ledger
//! - Proxy settlement of coarser markets by a finer driver
//! - Daily profit and profit-lock queries over stored ledgers
//!
//! Detection and settlement do blocking file I/O and run on the blocking
//! pool. The stored ledgers are the only state shared between commands.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tdbot_core::{LedgerScope, Price, Size, Timeframe};
use tdbot_detector::{build_detector, DetectorError, SequenceReading};
use tdbot_persistence::{JsonLedgerStore, SignalJournal, SignalRecord};
use tdbot_settlement::{
    daily_profit, DailyProfit, ProxyOutcome, ProxyRun, SettlementEngine, SettlementError,
    SettlementReport,
};
use tdbot_telemetry::Metrics;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, MarketConfig};
use crate::error::{AppError, AppResult};
use crate::feed;

/// Latest reading of one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketReading {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub variant: String,
    pub reading: SequenceReading,
}

/// Answer to a profit-lock query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockableReport {
    pub scope: LedgerScope,
    pub candidate: Price,
    pub min_profit_pct: Decimal,
    /// Quantity sellable at `candidate` with every consumed lot in profit.
    pub quantity: Size,
    /// Profit those lots would realize.
    pub preview: Decimal,
    /// All unmatched BUY quantity.
    pub held: Size,
    pub average_cost: Option<Price>,
}

/// Main application.
pub struct Application {
    config: Arc<AppConfig>,
    engine: Arc<SettlementEngine<JsonLedgerStore>>,
}

impl Application {
    /// Open the ledger store under the configured data directory.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let store = JsonLedgerStore::open(config.persistence.ledger_dir())?;
        let engine = SettlementEngine::new(Arc::new(store), config.settlement.clone());
        info!(
            markets = config.markets.len(),
            variant = %config.detector.variant,
            data_dir = %config.persistence.data_dir.display(),
            "Application initialized"
        );
        Ok(Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn engine(&self) -> &SettlementEngine<JsonLedgerStore> {
        &self.engine
    }

    // =========================================================================
    // Detection
    // =========================================================================

    /// Read every market's candle file and journal the latest readings.
    ///
    /// Markets run concurrently. A market with too few bars is logged and
    /// left out; any other failure aborts the command.
    pub async fn detect_all(&self, now: DateTime<Utc>) -> AppResult<Vec<MarketReading>> {
        let mut tasks = Vec::with_capacity(self.config.markets.len());
        for market in self.config.markets.iter().cloned() {
            let config = Arc::clone(&self.config);
            tasks.push(tokio::task::spawn_blocking(move || {
                let result = detect_market(&config, &market);
                (market, result)
            }));
        }

        let variant = self.config.detector.variant.as_str();
        let mut journal = SignalJournal::open(
            self.config.persistence.journal_dir(),
            self.config.persistence.journal_buffer_size,
        )?;
        let mut readings = Vec::with_capacity(tasks.len());

        for task in tasks {
            let (market, result) = task.await?;
            let reading = match result {
                Ok(reading) => reading,
                Err(AppError::Detector(e @ DetectorError::InsufficientData { .. })) => {
                    warn!(market = %market.label(), error = %e, "Skipping market");
                    Metrics::detector_rejected(variant, "insufficient_data");
                    continue;
                }
                Err(e @ AppError::Core(_)) => {
                    Metrics::detector_rejected(variant, "malformed_series");
                    return Err(e);
                }
                Err(e) => return Err(e),
            };

            Metrics::signal_emitted(variant, reading.signal.side.as_str());
            Metrics::signal_countdown(
                &market.instrument,
                market.timeframe.as_str(),
                reading.countdown,
            );
            journal.append(SignalRecord::from_reading(
                now,
                market.instrument(),
                market.canonical_id(),
                variant,
                &reading,
            ))?;
            info!(
                market = %market.label(),
                side = %reading.signal.side,
                strength = reading.signal.strength,
                confirmed = reading.signal.confirmed,
                countdown = reading.countdown,
                "Sequence reading"
            );

            readings.push(MarketReading {
                instrument: market.instrument.clone(),
                timeframe: market.timeframe,
                variant: variant.to_string(),
                reading,
            });
        }

        journal.close()?;
        Ok(readings)
    }

    // =========================================================================
    // Settlement
    // =========================================================================

    /// Settle the fills in `path` into the market's ledger.
    pub async fn settle_file(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        path: PathBuf,
    ) -> AppResult<SettlementReport> {
        let market = self.config.market(instrument, timeframe)?.clone();
        let engine = Arc::clone(&self.engine);

        let result = tokio::task::spawn_blocking(move || -> AppResult<SettlementReport> {
            let fills = feed::load_fills(&path, &market)?;
            Ok(engine.settle(&market.scope(), fills)?)
        })
        .await?;

        match &result {
            Ok(report) => self.record_settlement(report)?,
            Err(AppError::Settlement(SettlementError::LedgerContention { .. })) => {
                Metrics::settlement_pass("contended");
            }
            Err(AppError::Settlement(_)) => Metrics::settlement_pass("failed"),
            Err(_) => {}
        }
        result
    }

    /// Add the fills in `path` to the market's ledger without matching.
    pub async fn record_file(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        path: PathBuf,
    ) -> AppResult<usize> {
        let market = self.config.market(instrument, timeframe)?.clone();
        let engine = Arc::clone(&self.engine);

        let recorded = tokio::task::spawn_blocking(move || -> AppResult<usize> {
            let fills = feed::load_fills(&path, &market)?;
            Ok(engine.record(&market.scope(), fills)?)
        })
        .await??;

        info!(
            market = %format!("{instrument}/{timeframe}"),
            recorded,
            "Fills recorded for a later pass"
        );
        Ok(recorded)
    }

    /// Settle pending SELL inventory of every coarser market of the same
    /// instrument, driven by the market at `timeframe`.
    pub async fn run_proxies(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ProxyRun>> {
        let driver = self.config.market(instrument, timeframe)?;
        let targets: Vec<LedgerScope> = self
            .config
            .proxy_targets(driver)
            .into_iter()
            .map(MarketConfig::scope)
            .collect();
        let driver = driver.scope();

        if targets.is_empty() {
            debug!(driver = %driver, "No proxy targets configured");
            return Ok(Vec::new());
        }

        let engine = Arc::clone(&self.engine);
        let runs = tokio::task::spawn_blocking(move || engine.settle_proxies(&driver, &targets, now))
            .await??;

        for run in &runs {
            Metrics::proxy_run(run.outcome.label());
            if let ProxyOutcome::Settled { report } = &run.outcome {
                self.record_settlement(report)?;
            }
        }
        Ok(runs)
    }

    /// Count a finished pass and refresh the scope's held gauge.
    fn record_settlement(&self, report: &SettlementReport) -> AppResult<()> {
        if report.is_noop() {
            Metrics::settlement_pass("noop");
            return Ok(());
        }

        Metrics::settlement_pass("committed");
        Metrics::matches_created(
            report.matches.len(),
            to_f64(report.matched_quantity().inner()),
            to_f64(report.realized_profit()),
        );
        Metrics::forced_remainder(to_f64(report.forced_quantity().inner()));

        let ledger = self.engine.ledger(&report.scope)?;
        Metrics::ledger_held(&report.scope.key(), to_f64(ledger.held_quantity().inner()));
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Realized profit of the market's ledger grouped by UTC day.
    pub fn summary(&self, instrument: &str, timeframe: Timeframe) -> AppResult<Vec<DailyProfit>> {
        let scope = self.config.market(instrument, timeframe)?.scope();
        let ledger = self.engine.ledger(&scope)?;
        Ok(daily_profit(ledger.matches()))
    }

    /// Profit-lock query. `min_profit_pct` falls back to the configured
    /// margin.
    pub fn lockable(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        candidate: Price,
        min_profit_pct: Option<Decimal>,
    ) -> AppResult<LockableReport> {
        let min_profit_pct = min_profit_pct.unwrap_or(self.config.profit_lock.min_profit_pct);
        if min_profit_pct.is_sign_negative() {
            return Err(AppError::Config(format!(
                "min_profit_pct must not be negative, got {min_profit_pct}"
            )));
        }

        let scope = self.config.market(instrument, timeframe)?.scope();
        let ledger = self.engine.ledger(&scope)?;
        Ok(LockableReport {
            candidate,
            min_profit_pct,
            quantity: ledger.lockable_quantity(candidate, min_profit_pct),
            preview: ledger.locked_profit_preview(candidate, min_profit_pct),
            held: ledger.held_quantity(),
            average_cost: ledger.average_cost(),
            scope,
        })
    }
}

fn detect_market(config: &AppConfig, market: &MarketConfig) -> AppResult<SequenceReading> {
    let series = feed::load_candles(market)?;
    let detector = build_detector(&config.detector);
    Ok(detector.read(&series)?)
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
