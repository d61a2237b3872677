//! Calculation session for the ToU calculator.
//!
//! A [`CalculationSession`] runs one decode + aggregate pass per request.
//! Files are sourced on blocking worker threads first; the pass itself is
//! synchronous. The session keeps the last good comparison so that a failed
//! or empty run leaves it untouched, and owns the currency formatter used to
//! present results.

use std::path::PathBuf;

use tou_core::error::{Result, TouError};
use tou_core::formatting::CurrencyFormatter;
use tou_core::models::Cell;
use tou_core::settings::{RateConfig, Settings};
use tou_core::tariff::TariffSchedule;
use tou_core::time_utils::resolve_timezone;
use tou_data::aggregator::{CostAggregator, CostComparison};
use tou_data::decoder::{decode, DecodeOptions, Layout};
use tou_data::reader::load_grid;
use tou_data::schedule_csv::load_schedule;

/// Source ID given to readings decoded from a file.
pub const FILE_SOURCE_ID: &str = "file";

// ── CalculationRequest ────────────────────────────────────────────────────────

/// Inputs for one calculation run.
#[derive(Debug, Clone)]
pub struct CalculationRequest {
    pub data_path: PathBuf,
    pub schedule_path: PathBuf,
    pub config: RateConfig,
    pub decode: DecodeOptions,
}

impl CalculationRequest {
    /// Build a request from CLI settings.
    ///
    /// Fails with `InvalidConfig` when a file or the flat rate is missing.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let data_path = settings
            .data
            .clone()
            .ok_or_else(|| TouError::InvalidConfig("a --data file is required".to_string()))?;
        let schedule_path = settings.schedule.clone().ok_or_else(|| {
            TouError::InvalidConfig("a --schedule file is required".to_string())
        })?;
        let config = settings.rate_config()?;

        let source_id = settings
            .source_id
            .clone()
            .unwrap_or_else(|| FILE_SOURCE_ID.to_string());
        let decode = DecodeOptions::new(resolve_timezone(&settings.timezone), source_id)
            .with_fallback_formats(settings.fallback_date_formats());

        Ok(Self {
            data_path,
            schedule_path,
            config,
            decode,
        })
    }
}

// ── Pure pass ─────────────────────────────────────────────────────────────────

/// Decode `grid` and price it against `schedule`.
///
/// `Ok(None)` means there was nothing to price.
pub fn evaluate<S: TariffSchedule>(
    grid: &[Vec<Cell>],
    schedule: &S,
    config: &RateConfig,
    options: &DecodeOptions,
) -> Result<Option<CostComparison>> {
    let aggregator = CostAggregator::new(config.clone(), schedule)?;
    let readings = decode(grid, options)?;
    if readings.layout() == Layout::Undetected {
        return Ok(None);
    }
    Ok(aggregator.aggregate(readings))
}

// ── CalculationSession ────────────────────────────────────────────────────────

/// Runs calculations and remembers the last successful result.
///
/// # Example
/// ```no_run
/// use tou_runtime::session::{CalculationRequest, CalculationSession};
/// use tou_core::settings::Settings;
///
/// # async fn run(settings: Settings) -> tou_core::error::Result<()> {
/// let request = CalculationRequest::from_settings(&settings)?;
/// let mut session = CalculationSession::new();
/// if let Some(result) = session.calculate(&request).await? {
///     println!("flat cost: {}", result.flat_cost());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct CalculationSession {
    /// Most recent non-empty comparison.
    last_result: Option<CostComparison>,
    /// Message of the last failed run, cleared by the next completed one.
    last_error: Option<String>,
    /// Number of runs attempted.
    runs: u32,
    formatter: CurrencyFormatter,
}

impl CalculationSession {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Source both files, then decode and aggregate.
    ///
    /// On success the new comparison replaces the stored one and is
    /// returned. `Ok(None)` signals an empty result; the stored comparison is
    /// kept. On failure the stored comparison is kept and the error message
    /// is remembered.
    pub async fn calculate(
        &mut self,
        request: &CalculationRequest,
    ) -> Result<Option<&CostComparison>> {
        self.runs += 1;
        match Self::run(request).await {
            Ok(Some(result)) => {
                tracing::debug!(
                    readings = result.readings,
                    rules = result.breakdowns.len(),
                    "calculation result updated"
                );
                self.last_error = None;
                self.last_result = Some(result);
                Ok(self.last_result.as_ref())
            }
            Ok(None) => {
                tracing::info!("no usable readings; keeping previous result");
                self.last_error = None;
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "calculation failed; keeping previous result");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn last_result(&self) -> Option<&CostComparison> {
        self.last_result.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn runs(&self) -> u32 {
        self.runs
    }

    /// Formatter whose currency styles persist across runs.
    pub fn formatter(&mut self) -> &mut CurrencyFormatter {
        &mut self.formatter
    }

    /// Present the stored comparison with the session's formatter.
    pub fn with_result<R>(
        &mut self,
        present: impl FnOnce(&CostComparison, &mut CurrencyFormatter) -> R,
    ) -> Option<R> {
        let result = self.last_result.as_ref()?;
        Some(present(result, &mut self.formatter))
    }

    // ── Private helpers ───────────────────────────────────────────────────

    async fn run(request: &CalculationRequest) -> Result<Option<CostComparison>> {
        let data_path = request.data_path.clone();
        let schedule_path = request.schedule_path.clone();

        let (grid, schedule) = tokio::try_join!(
            spawn_load(move || load_grid(&data_path)),
            spawn_load(move || load_schedule(&schedule_path)),
        )?;

        evaluate(&grid, &schedule, &request.config, &request.decode)
    }
}

async fn spawn_load<T, F>(load: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(load)
        .await
        .map_err(|e| TouError::Other(anyhow::Error::new(e).context("loader task failed")))?
}

// ── Tests ─────────────────────────────────────────────────────────────────────
