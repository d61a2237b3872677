use clap::Parser;
use std::path::PathBuf;

use crate::error::{Result, TouError};
use crate::fixed::FixedCharge;
use crate::models::DatumProperty;

/// Fallback text patterns tried after the built-in date formats.
pub const DEFAULT_DATE_FORMATS: &[&str] = &["%m/%d/%Y %H:%M:%S", "%m/%d/%Y %H:%M"];

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Compare a flat electricity rate against a time-of-use tariff
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tou-calc",
    about = "Compare a flat electricity rate against a time-of-use tariff",
    version
)]
pub struct Settings {
    /// Usage data file (CSV or XLSX)
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Tariff schedule CSV
    #[arg(long)]
    pub schedule: Option<PathBuf>,

    /// Flat (non-ToU) rate per quantity unit
    #[arg(long)]
    pub rate: Option<f64>,

    /// Currency unit the rates are expressed in
    #[arg(long, default_value = "$", value_parser = ["$", "c"])]
    pub currency_unit: String,

    /// Usage quantity the rates apply to, in base units (1000 = per kWh)
    #[arg(long, default_value = "1000")]
    pub quantity: f64,

    /// Currency code used for display
    #[arg(long, default_value = "USD")]
    pub currency_code: String,

    /// Datum property to measure
    #[arg(long, default_value = "energy")]
    pub property: String,

    /// Multiplier applied to property values before use
    #[arg(long, default_value = "1")]
    pub scale: f64,

    /// Timezone of the usage data (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Fallback date pattern (chrono syntax), may be repeated
    #[arg(long = "date-format")]
    pub date_formats: Vec<String>,

    /// Source ID assigned to decoded readings
    #[arg(long)]
    pub source_id: Option<String>,

    /// Fixed charge as [NAME:]RATE[c]/UNIT, may be repeated
    #[arg(long = "fixed-charge", value_parser = parse_fixed_charge)]
    pub fixed_charges: Vec<FixedCharge>,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

fn parse_fixed_charge(value: &str) -> std::result::Result<FixedCharge, String> {
    value.parse().map_err(|e: TouError| e.to_string())
}

// ── RateConfig ─────────────────────────────────────────────────────────────────

/// Everything the cost aggregator needs besides the readings and schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RateConfig {
    pub property: DatumProperty,
    /// Multiplier applied to every property value before use.
    pub scale: f64,
    /// Flat rate per `unit_quantity`, in currency subdivisions when
    /// `currency_divisor` is 100.
    pub flat_rate: f64,
    /// 1 for whole currency units, 100 for cents.
    pub currency_divisor: f64,
    /// Divisor turning base-unit usage into display units (1000 for Wh → kWh).
    pub unit_quantity: f64,
    pub currency_code: String,
    pub fixed_charges: Vec<FixedCharge>,
}

impl RateConfig {
    pub fn new(flat_rate: f64, currency_divisor: f64, unit_quantity: f64) -> Self {
        Self {
            property: DatumProperty::Energy,
            scale: 1.0,
            flat_rate,
            currency_divisor,
            unit_quantity,
            currency_code: "USD".to_string(),
            fixed_charges: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: DatumProperty) -> Self {
        self.property = property;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_currency_code(mut self, code: impl Into<String>) -> Self {
        self.currency_code = code.into();
        self
    }

    pub fn with_fixed_charges(mut self, charges: Vec<FixedCharge>) -> Self {
        self.fixed_charges = charges;
        self
    }

    /// The flat rate in whole currency units.
    pub fn flat_unit_rate(&self) -> f64 {
        self.flat_rate / self.currency_divisor
    }

    /// Reject configurations that would make every derived figure meaningless.
    pub fn validate(&self) -> Result<()> {
        if !(self.unit_quantity.is_finite() && self.unit_quantity > 0.0) {
            return Err(TouError::InvalidConfig(format!(
                "quantity must be a positive number, got {}",
                self.unit_quantity
            )));
        }
        if self.currency_divisor != 1.0 && self.currency_divisor != 100.0 {
            return Err(TouError::InvalidConfig(format!(
                "currency divisor must be 1 or 100, got {}",
                self.currency_divisor
            )));
        }
        if !self.flat_rate.is_finite() {
            return Err(TouError::InvalidConfig("flat rate is not a number".to_string()));
        }
        if !self.scale.is_finite() {
            return Err(TouError::InvalidConfig("scale is not a number".to_string()));
        }
        if self.currency_code.trim().is_empty() {
            return Err(TouError::InvalidConfig("currency code is required".to_string()));
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments and resolve `"auto"` values.
    pub fn load() -> Self {
        Self::parse().resolve_auto_values()
    }

    /// Resolve the `"auto"` timezone and apply the `--debug` flag.
    pub fn resolve_auto_values(mut self) -> Self {
        if self.timezone == "auto" {
            self.timezone = crate::time_utils::get_system_timezone();
        }
        if self.debug {
            self.log_level = "DEBUG".to_string();
        }
        self
    }

    /// Fallback date patterns, defaulting to [`DEFAULT_DATE_FORMATS`].
    pub fn fallback_date_formats(&self) -> Vec<String> {
        if self.date_formats.is_empty() {
            DEFAULT_DATE_FORMATS.iter().map(|s| s.to_string()).collect()
        } else {
            self.date_formats.clone()
        }
    }

    /// 1 for whole currency units, 100 for cents.
    pub fn currency_divisor(&self) -> f64 {
        if self.currency_unit == "$" {
            1.0
        } else {
            100.0
        }
    }

    /// Build and validate the aggregator configuration.
    pub fn rate_config(&self) -> Result<RateConfig> {
        let rate = self
            .rate
            .ok_or_else(|| TouError::InvalidConfig("a flat --rate is required".to_string()))?;
        let property: DatumProperty = self.property.parse()?;
        let config = RateConfig::new(rate, self.currency_divisor(), self.quantity)
            .with_property(property)
            .with_scale(self.scale)
            .with_currency_code(self.currency_code.clone())
            .with_fixed_charges(self.fixed_charges.clone());
        config.validate()?;
        Ok(config)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Settings ──────────────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["tou-calc"]);

        assert!(settings.data.is_none());
        assert!(settings.rate.is_none());
        assert_eq!(settings.currency_unit, "$");
        assert_eq!(settings.quantity, 1000.0);
        assert_eq!(settings.currency_code, "USD");
        assert_eq!(settings.property, "energy");
        assert_eq!(settings.scale, 1.0);
        assert_eq!(settings.timezone, "auto");
        assert_eq!(settings.format, "text");
        assert_eq!(settings.log_level, "INFO");
        assert!(settings.fixed_charges.is_empty());
        assert!(!settings.debug);
    }

    #[test]
    fn test_settings_repeated_args() {
        let settings = Settings::parse_from([
            "tou-calc",
            "--fixed-charge",
            "Daily:1.5/day",
            "--fixed-charge",
            "30c/month",
            "--date-format",
            "%d.%m.%Y",
        ]);
        assert_eq!(settings.fixed_charges.len(), 2);
        assert_eq!(settings.fallback_date_formats(), vec!["%d.%m.%Y".to_string()]);
    }

    #[test]
    fn test_settings_default_date_formats() {
        let settings = Settings::parse_from(["tou-calc"]);
        assert_eq!(settings.fallback_date_formats().len(), DEFAULT_DATE_FORMATS.len());
    }

    #[test]
    fn test_settings_do_not_carry_over_between_runs() {
        let first = Settings::parse_from([
            "tou-calc",
            "--data",
            "a.csv",
            "--schedule",
            "old_tariff.csv",
            "--rate",
            "30",
        ])
        .resolve_auto_values();
        assert_eq!(first.rate, Some(30.0));

        let second = Settings::parse_from(["tou-calc", "--data", "b.csv"]).resolve_auto_values();
        assert_eq!(second.data, Some(PathBuf::from("b.csv")));
        assert!(second.schedule.is_none());
        assert!(second.rate.is_none());
        assert!(second.rate_config().is_err());
    }

    #[test]
    fn test_resolve_auto_timezone() {
        let settings = Settings::parse_from(["tou-calc"]).resolve_auto_values();
        assert_ne!(settings.timezone, "auto");

        let settings = Settings::parse_from(["tou-calc", "--timezone", "Europe/Paris"])
            .resolve_auto_values();
        assert_eq!(settings.timezone, "Europe/Paris");
    }

    #[test]
    fn test_debug_overrides_log_level() {
        let settings =
            Settings::parse_from(["tou-calc", "--debug", "--timezone", "UTC"]).resolve_auto_values();
        assert_eq!(settings.log_level, "DEBUG");
    }

    // ── RateConfig ────────────────────────────────────────────────────────────

    #[test]
    fn test_rate_config_from_settings() {
        let settings = Settings::parse_from([
            "tou-calc",
            "--rate",
            "20",
            "--currency-unit",
            "c",
            "--property",
            "power",
            "--scale",
            "0.5",
        ]);
        let config = settings.rate_config().unwrap();
        assert_eq!(config.currency_divisor, 100.0);
        assert_eq!(config.property, DatumProperty::Power);
        assert_eq!(config.scale, 0.5);
        assert!((config.flat_unit_rate() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_rate_config_requires_rate() {
        let settings = Settings::parse_from(["tou-calc"]);
        let err = settings.rate_config().unwrap_err();
        assert!(matches!(err, TouError::InvalidConfig(_)));
    }

    #[test]
    fn test_rate_config_rejects_bad_property() {
        let settings = Settings::parse_from(["tou-calc", "--rate", "1", "--property", "volts"]);
        assert!(matches!(
            settings.rate_config().unwrap_err(),
            TouError::InvalidProperty(_)
        ));
    }

    #[test]
    fn test_rate_config_validate() {
        assert!(RateConfig::new(20.0, 100.0, 1000.0).validate().is_ok());
        assert!(RateConfig::new(20.0, 100.0, 0.0).validate().is_err());
        assert!(RateConfig::new(20.0, 10.0, 1000.0).validate().is_err());
        assert!(RateConfig::new(f64::NAN, 1.0, 1000.0).validate().is_err());
        assert!(RateConfig::new(20.0, 1.0, 1000.0)
            .with_currency_code(" ")
            .validate()
            .is_err());
    }
}
