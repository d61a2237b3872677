use std::collections::HashMap;

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use tou_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let negative = value < 0.0;
    let abs_value = value.abs();

    // Nudge by a tiny epsilon so exact binary midpoints round away from zero.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let integer_part = rounded.trunc() as u64;
    let frac_part = rounded - rounded.trunc();

    let grouped = group_thousands(&integer_part.to_string());

    let result = if decimals == 0 {
        grouped
    } else {
        let frac_str = format!("{:.prec$}", frac_part, prec = decimals as usize);
        // `frac_str` starts with "0.", e.g. "0.50".
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative && result.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", result)
    } else {
        result
    }
}

/// Format an energy (or other) usage figure with three decimals.
///
/// ```
/// use tou_core::formatting::format_usage;
///
/// assert_eq!(format_usage(1234.5), "1,234.500");
/// ```
pub fn format_usage(value: f64) -> String {
    format_number(value, 3)
}

// ── CurrencyFormatter ─────────────────────────────────────────────────────────

/// Display style for one currency code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyStyle {
    pub symbol: String,
    pub decimals: u32,
}

impl CurrencyStyle {
    fn for_code(code: &str) -> Self {
        let (symbol, decimals) = match code {
            "USD" | "NZD" | "AUD" | "CAD" | "SGD" | "HKD" | "MXN" => ("$", 2),
            "EUR" => ("€", 2),
            "GBP" => ("£", 2),
            "JPY" => ("¥", 0),
            "KRW" => ("₩", 0),
            "INR" => ("₹", 2),
            "CHF" => ("CHF ", 2),
            other => {
                return Self {
                    symbol: format!("{} ", other),
                    decimals: 2,
                }
            }
        };
        Self {
            symbol: symbol.to_string(),
            decimals,
        }
    }
}

/// Formats monetary amounts, caching the resolved style per currency code.
///
/// One formatter is owned per calculation session; styles are resolved the
/// first time a code is seen and reused afterwards.
#[derive(Debug, Default)]
pub struct CurrencyFormatter {
    styles: HashMap<String, CurrencyStyle>,
}

impl CurrencyFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve (and cache) the style for `code`.
    pub fn style(&mut self, code: &str) -> &CurrencyStyle {
        let key = code.trim().to_uppercase();
        self.styles
            .entry(key)
            .or_insert_with_key(|k| CurrencyStyle::for_code(k))
    }

    /// Format `amount` in the currency identified by `code`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tou_core::formatting::CurrencyFormatter;
    ///
    /// let mut fmt = CurrencyFormatter::new();
    /// assert_eq!(fmt.format(1234.56, "USD"), "$1,234.56");
    /// assert_eq!(fmt.format(-9.99, "NZD"), "-$9.99");
    /// assert_eq!(fmt.format(500.0, "JPY"), "¥500");
    /// ```
    pub fn format(&mut self, amount: f64, code: &str) -> String {
        let style = self.style(code);
        let body = format_number(amount.abs(), style.decimals);
        let zero = body.chars().all(|c| !c.is_ascii_digit() || c == '0');
        if amount < 0.0 && !zero {
            format!("-{}{}", style.symbol, body)
        } else {
            format!("{}{}", style.symbol, body)
        }
    }

    /// Number of distinct currency codes resolved so far.
    pub fn cached_styles(&self) -> usize {
        self.styles.len()
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── format_number ────────────────────────────────────────────────────────

    #[test]
    fn test_format_number_zero() {
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_number(0.0, 2), "0.00");
    }

    #[test]
    fn test_format_number_with_thousands() {
        assert_eq!(format_number(1_234.5, 1), "1,234.5");
        assert_eq!(format_number(1_234_567.0, 0), "1,234,567");
    }

    #[test]
    fn test_format_number_negative() {
        assert_eq!(format_number(-9_876.5, 1), "-9,876.5");
    }

    #[test]
    fn test_format_number_negative_rounding_to_zero() {
        assert_eq!(format_number(-0.0001, 2), "0.00");
    }

    #[test]
    fn test_format_number_rounds_up() {
        assert_eq!(format_number(1.005, 2), "1.01");
    }

    // ── format_usage ─────────────────────────────────────────────────────────

    #[test]
    fn test_format_usage_three_decimals() {
        assert_eq!(format_usage(0.0), "0.000");
        assert_eq!(format_usage(10.0), "10.000");
    }

    // ── CurrencyFormatter ────────────────────────────────────────────────────

    #[test]
    fn test_currency_known_codes() {
        let mut fmt = CurrencyFormatter::new();
        assert_eq!(fmt.format(20.0, "USD"), "$20.00");
        assert_eq!(fmt.format(1_500.25, "EUR"), "€1,500.25");
        assert_eq!(fmt.format(3.0, "GBP"), "£3.00");
    }

    #[test]
    fn test_currency_unknown_code_uses_prefix() {
        let mut fmt = CurrencyFormatter::new();
        assert_eq!(fmt.format(1.5, "XYZ"), "XYZ 1.50");
    }

    #[test]
    fn test_currency_negative() {
        let mut fmt = CurrencyFormatter::new();
        assert_eq!(fmt.format(-5.0, "USD"), "-$5.00");
        assert_eq!(fmt.format(-0.001, "USD"), "$0.00");
    }

    #[test]
    fn test_currency_styles_cached_per_code() {
        let mut fmt = CurrencyFormatter::new();
        fmt.format(1.0, "usd");
        fmt.format(2.0, "USD");
        fmt.format(3.0, "EUR");
        assert_eq!(fmt.cached_styles(), 2);
        assert_eq!(fmt.style("usd").symbol, "$");
    }
}
