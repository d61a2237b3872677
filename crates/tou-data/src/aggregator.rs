//! Flat versus time-of-use cost aggregation.
//!
//! Walks a reading stream once, summing the selected property into an
//! overall flat-rate total and into one breakdown per matched tariff rule.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use tou_core::error::Result;
use tou_core::fixed::FixedCost;
use tou_core::models::Reading;
use tou_core::settings::RateConfig;
use tou_core::tariff::{TariffRate, TariffRule, TariffSchedule};
use tracing::debug;

// ── OverallUsage ──────────────────────────────────────────────────────────────

/// Everything measured, priced at the flat rate.
#[derive(Debug, Clone, PartialEq)]
pub struct OverallUsage {
    /// Running total before the first reading, in display units.
    pub reading_start: f64,
    /// Running total after the last reading, in display units.
    pub reading_end: f64,
    pub usage: f64,
    /// Flat rate in whole currency units per display unit.
    pub unit_rate: f64,
}

impl OverallUsage {
    fn new(reading_start: f64, unit_rate: f64) -> Self {
        Self {
            reading_start,
            reading_end: reading_start,
            usage: 0.0,
            unit_rate,
        }
    }

    pub fn cost(&self) -> f64 {
        self.usage * self.unit_rate
    }
}

// ── TouBreakdown ──────────────────────────────────────────────────────────────

/// Usage attributed to one tariff rule.
#[derive(Debug, Clone, PartialEq)]
pub struct TouBreakdown {
    /// Position of the rule in its schedule.
    pub rule_index: usize,
    pub usage: f64,
    pub rates: Vec<TariffRate>,
    currency_divisor: f64,
}

impl TouBreakdown {
    fn new(rule_index: usize, rates: Vec<TariffRate>, currency_divisor: f64) -> Self {
        Self {
            rule_index,
            usage: 0.0,
            rates,
            currency_divisor,
        }
    }

    /// One-based rule number for display.
    pub fn rule_number(&self) -> usize {
        self.rule_index + 1
    }

    /// The rule's first rate, or 0 for a rule without rates.
    pub fn rate(&self) -> f64 {
        self.rates.first().map_or(0.0, TariffRate::value)
    }

    /// Cost across every rate component of the rule.
    pub fn cost(&self) -> f64 {
        self.rates
            .iter()
            .map(|r| self.usage * r.value() / self.currency_divisor)
            .sum()
    }
}

// ── CostComparison ────────────────────────────────────────────────────────────

/// Result of one aggregation pass.
#[derive(Debug, Clone)]
pub struct CostComparison {
    pub overall: OverallUsage,
    /// Sorted by rule index.
    pub breakdowns: Vec<TouBreakdown>,
    pub fixed_costs: Vec<FixedCost>,
    pub first_timestamp: DateTime<Tz>,
    pub last_timestamp: DateTime<Tz>,
    /// Sampling interval inferred from the first two readings of the stream.
    pub step: Option<Duration>,
    /// Readings that contributed to the overall usage.
    pub readings: usize,
    /// Readings that no tariff rule matched.
    pub unmatched: usize,
    pub currency_code: String,
}

impl CostComparison {
    pub fn flat_cost(&self) -> f64 {
        self.overall.cost()
    }

    pub fn tou_cost(&self) -> f64 {
        self.breakdowns.iter().map(TouBreakdown::cost).sum()
    }

    /// Usage-weighted average of each breakdown's nominal rate.
    pub fn effective_tou_rate(&self) -> f64 {
        if self.overall.usage == 0.0 {
            return 0.0;
        }
        self.breakdowns
            .iter()
            .map(|b| b.rate() * (b.usage / self.overall.usage))
            .sum()
    }

    pub fn fixed_cost_total(&self) -> f64 {
        self.fixed_costs.iter().map(|f| f.cost).sum()
    }

    /// `(TOU + fixed) - flat`; negative means the tariff schedule is cheaper.
    pub fn cost_delta(&self) -> f64 {
        self.tou_cost() + self.fixed_cost_total() - self.flat_cost()
    }

    /// End of the priced period: the last reading plus one sampling step.
    pub fn period_end(&self) -> DateTime<Tz> {
        self.last_timestamp + self.step.unwrap_or_else(Duration::zero)
    }
}

// ── CostAggregator ────────────────────────────────────────────────────────────

/// Prices a reading stream against a flat rate and a tariff schedule.
pub struct CostAggregator<'s, S: TariffSchedule> {
    config: RateConfig,
    schedule: &'s S,
}

impl<'s, S: TariffSchedule> CostAggregator<'s, S> {
    /// Fails with `InvalidConfig` when `config` cannot produce sane figures.
    pub fn new(config: RateConfig, schedule: &'s S) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, schedule })
    }

    pub fn config(&self) -> &RateConfig {
        &self.config
    }

    /// Consume `readings` in order.
    ///
    /// Returns `None` when no reading carries the selected property.
    pub fn aggregate<I>(&self, readings: I) -> Option<CostComparison>
    where
        I: IntoIterator<Item = Reading>,
    {
        let property = self.config.property;
        let scale = self.config.scale;
        let quantity = self.config.unit_quantity;
        let to_display = |v: f64| v * scale / quantity;

        let mut overall: Option<OverallUsage> = None;
        let mut first: Option<(DateTime<Tz>, String)> = None;
        let mut last_timestamp: Option<DateTime<Tz>> = None;
        let mut step: Option<Duration> = None;
        let mut breakdowns: BTreeMap<usize, TouBreakdown> = BTreeMap::new();
        let mut used = 0usize;
        let mut unmatched = 0usize;

        for reading in readings {
            let Some(value) = reading.value(property) else {
                continue;
            };

            let totals = overall.get_or_insert_with(|| {
                OverallUsage::new(
                    to_display(reading.start(property).unwrap_or(0.0)),
                    self.config.flat_unit_rate(),
                )
            });
            if let Some((first_ts, source)) = &first {
                if step.is_none() && *source == reading.source_id {
                    step = Some(reading.timestamp - *first_ts);
                }
            } else {
                first = Some((reading.timestamp, reading.source_id.clone()));
            }
            last_timestamp = Some(reading.timestamp);
            used += 1;

            let amount = to_display(value);
            totals.usage += amount;
            if let Some(end) = reading.end(property) {
                totals.reading_end = to_display(end);
            }

            let matched = self.schedule.matches(&reading.timestamp.naive_local());
            if matched.is_empty() {
                unmatched += 1;
                debug!(at = %reading.timestamp, "no tariff rule matches reading");
                continue;
            }
            for index in matched {
                breakdowns
                    .entry(index)
                    .or_insert_with(|| {
                        let rates = self
                            .schedule
                            .rules()
                            .get(index)
                            .map(|rule| rule.rates().to_vec())
                            .unwrap_or_default();
                        TouBreakdown::new(index, rates, self.config.currency_divisor)
                    })
                    .usage += amount;
            }
        }

        let overall = overall?;
        let (first_timestamp, _) = first?;
        let last_timestamp = last_timestamp?;

        let mut comparison = CostComparison {
            overall,
            breakdowns: breakdowns.into_values().collect(),
            fixed_costs: Vec::new(),
            first_timestamp,
            last_timestamp,
            step,
            readings: used,
            unmatched,
            currency_code: self.config.currency_code.clone(),
        };
        comparison.fixed_costs = self.fixed_costs(&comparison);

        debug!(
            readings = used,
            unmatched,
            rules = comparison.breakdowns.len(),
            usage = comparison.overall.usage,
            "aggregation complete"
        );
        Some(comparison)
    }

    /// Prorate every fixed charge over `[first reading, last reading + step)`.
    fn fixed_costs(&self, comparison: &CostComparison) -> Vec<FixedCost> {
        let from = comparison.first_timestamp.naive_local();
        let to = comparison.period_end().naive_local();
        self.config
            .fixed_charges
            .iter()
            .enumerate()
            .map(|(i, charge)| FixedCost {
                name: charge
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("Fixed #{}", i + 1)),
                quantity: charge.quantity(from, to),
                cost: charge.cost(from, to),
            })
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
