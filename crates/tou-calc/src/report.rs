//! Text and JSON rendering of a cost comparison.

use std::fmt::{self, Write};

use serde::Serialize;
use tou_core::error::Result;
use tou_core::formatting::{format_number, format_usage, CurrencyFormatter};
use tou_core::settings::RateConfig;
use tou_data::aggregator::{CostComparison, TouBreakdown};

// ── JSON view ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ReportView<'a> {
    currency_code: &'a str,
    period_start: String,
    period_end: String,
    readings: usize,
    unmatched_readings: usize,
    overall: OverallView,
    breakdown: Vec<BreakdownView<'a>>,
    tou_cost: f64,
    effective_tou_rate: f64,
    fixed_charges: Vec<FixedView<'a>>,
    fixed_cost_total: f64,
    cost_delta: f64,
}

#[derive(Debug, Serialize)]
struct OverallView {
    reading_start: f64,
    reading_end: f64,
    usage: f64,
    rate: f64,
    cost: f64,
}

#[derive(Debug, Serialize)]
struct BreakdownView<'a> {
    rule: usize,
    usage: f64,
    rate: f64,
    cost: f64,
    rates: Vec<RateView<'a>>,
}

#[derive(Debug, Serialize)]
struct RateView<'a> {
    id: &'a str,
    amount: i64,
    exponent: i32,
}

#[derive(Debug, Serialize)]
struct FixedView<'a> {
    name: &'a str,
    quantity: f64,
    cost: f64,
}

impl<'a> BreakdownView<'a> {
    fn new(b: &'a TouBreakdown) -> Self {
        Self {
            rule: b.rule_number(),
            usage: b.usage,
            rate: b.rate(),
            cost: b.cost(),
            rates: b
                .rates
                .iter()
                .map(|r| RateView {
                    id: &r.id,
                    amount: r.amount,
                    exponent: r.exponent,
                })
                .collect(),
        }
    }
}

/// Render `result` as pretty JSON.
pub fn render_json(result: &CostComparison, config: &RateConfig) -> Result<String> {
    let view = ReportView {
        currency_code: &result.currency_code,
        period_start: result.first_timestamp.to_rfc3339(),
        period_end: result.period_end().to_rfc3339(),
        readings: result.readings,
        unmatched_readings: result.unmatched,
        overall: OverallView {
            reading_start: result.overall.reading_start,
            reading_end: result.overall.reading_end,
            usage: result.overall.usage,
            rate: config.flat_rate,
            cost: result.flat_cost(),
        },
        breakdown: result.breakdowns.iter().map(BreakdownView::new).collect(),
        tou_cost: result.tou_cost(),
        effective_tou_rate: result.effective_tou_rate(),
        fixed_charges: result
            .fixed_costs
            .iter()
            .map(|f| FixedView {
                name: &f.name,
                quantity: f.quantity,
                cost: f.cost,
            })
            .collect(),
        fixed_cost_total: result.fixed_cost_total(),
        cost_delta: result.cost_delta(),
    };
    Ok(serde_json::to_string_pretty(&view)?)
}

// ── Text view ─────────────────────────────────────────────────────────────────

/// Whole quantities print as integers, others with three decimals.
fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format_number(quantity, 0)
    } else {
        format_number(quantity, 3)
    }
}

/// Render `result` as a plain-text report.
pub fn render_text(
    result: &CostComparison,
    config: &RateConfig,
    money: &mut CurrencyFormatter,
) -> std::result::Result<String, fmt::Error> {
    let mut out = String::new();
    write_period(&mut out, result)?;
    write_flat(&mut out, result, config, money)?;
    write_breakdown(&mut out, result, money)?;
    write_fixed(&mut out, result, money)?;
    write_delta(&mut out, result, money)?;
    Ok(out)
}

fn write_period(out: &mut String, result: &CostComparison) -> fmt::Result {
    writeln!(
        out,
        "Period: {} to {} ({} readings)",
        result.first_timestamp.format("%Y-%m-%d %H:%M"),
        result.period_end().format("%Y-%m-%d %H:%M"),
        result.readings
    )?;
    writeln!(out)
}

fn write_flat(
    out: &mut String,
    result: &CostComparison,
    config: &RateConfig,
    money: &mut CurrencyFormatter,
) -> fmt::Result {
    let overall = &result.overall;
    let cost = money.format(result.flat_cost(), &result.currency_code);
    writeln!(out, "Flat rate")?;
    writeln!(out, "  {:<14} {:>14}", "Start reading", format_usage(overall.reading_start))?;
    writeln!(out, "  {:<14} {:>14}", "End reading", format_usage(overall.reading_end))?;
    writeln!(out, "  {:<14} {:>14}", "Usage", format_usage(overall.usage))?;
    writeln!(out, "  {:<14} {:>14}", "Rate", config.flat_rate)?;
    writeln!(out, "  {:<14} {:>14}", "Cost", cost)?;
    writeln!(out)
}

fn write_breakdown(
    out: &mut String,
    result: &CostComparison,
    money: &mut CurrencyFormatter,
) -> fmt::Result {
    let code = result.currency_code.as_str();
    writeln!(out, "Time-of-use breakdown")?;
    writeln!(out, "  {:<6} {:>14} {:>10} {:>14}", "Rule", "Usage", "Rate", "Cost")?;
    for b in &result.breakdowns {
        writeln!(
            out,
            "  {:<6} {:>14} {:>10} {:>14}",
            format!("#{}", b.rule_number()),
            format_usage(b.usage),
            b.rate(),
            money.format(b.cost(), code)
        )?;
    }
    writeln!(
        out,
        "  {:<6} {:>14} {:>10} {:>14}",
        "Total",
        format_usage(result.overall.usage),
        format_number(result.effective_tou_rate(), 2),
        money.format(result.tou_cost(), code)
    )?;
    if result.unmatched > 0 {
        writeln!(
            out,
            "  ({} readings matched no tariff rule and are not included)",
            result.unmatched
        )?;
    }
    Ok(())
}

fn write_fixed(out: &mut String, result: &CostComparison, money: &mut CurrencyFormatter) -> fmt::Result {
    if result.fixed_costs.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "Fixed charges")?;
    for fixed in &result.fixed_costs {
        writeln!(
            out,
            "  {:<20} {:>12} {:>14}",
            fixed.name,
            format_quantity(fixed.quantity),
            money.format(fixed.cost, &result.currency_code)
        )?;
    }
    Ok(())
}

fn write_delta(out: &mut String, result: &CostComparison, money: &mut CurrencyFormatter) -> fmt::Result {
    let delta = result.cost_delta();
    let verdict = if delta < 0.0 {
        "cheaper"
    } else if delta > 0.0 {
        "more expensive"
    } else {
        "the same"
    };
    writeln!(out)?;
    writeln!(
        out,
        "Difference (ToU + fixed - flat): {} (time-of-use is {})",
        money.format(delta, &result.currency_code),
        verdict
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
