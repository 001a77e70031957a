//! # Currency & Money Formatting
//!
//! Every amount in checkout-rs is an `i64` in the smallest currency unit.
//! Conversions to decimal only happen at the edges (display, provider APIs
//! that want decimals).

use crate::error::{CheckoutError, CheckoutResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
    AUD,
    CHF,
    MXN,
}

impl Currency {
    /// Returns the ISO 4217 currency code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::JPY => "JPY",
            Currency::CAD => "CAD",
            Currency::AUD => "AUD",
            Currency::CHF => "CHF",
            Currency::MXN => "MXN",
        }
    }

    /// Lowercase code, as most provider APIs expect it
    pub fn as_lower(&self) -> String {
        self.code().to_lowercase()
    }

    /// Returns the number of decimal places for this currency
    /// (JPY has 0 decimals, most others have 2)
    pub fn decimal_places(&self) -> u8 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Convert from smallest unit back to decimal
    pub fn from_smallest_unit(&self, amount: i64) -> f64 {
        let divisor = 10_f64.powi(self.decimal_places() as i32);
        amount as f64 / divisor
    }
}

impl FromStr for Currency {
    type Err = CheckoutError;

    fn from_str(s: &str) -> CheckoutResult<Self> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "JPY" => Ok(Currency::JPY),
            "CAD" => Ok(Currency::CAD),
            "AUD" => Ok(Currency::AUD),
            "CHF" => Ok(Currency::CHF),
            "MXN" => Ok(Currency::MXN),
            other => Err(CheckoutError::Configuration(format!(
                "Unsupported currency: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Round a fractional minor-unit amount to the nearest integer,
/// halves away from zero.
pub fn round_minor(value: f64) -> i64 {
    value.round() as i64
}

/// Formats minor-unit amounts for display. Hosts can swap in their own.
pub trait MoneyFormatter: Send + Sync {
    fn format(&self, amount: i64, currency: Currency) -> String;
}

/// `"1,234.56 EUR"`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMoneyFormatter;

impl MoneyFormatter for DefaultMoneyFormatter {
    fn format(&self, amount: i64, currency: Currency) -> String {
        let places = currency.decimal_places() as u32;
        let divisor = 10_i64.pow(places);
        let sign = if amount < 0 { "-" } else { "" };
        let abs = amount.unsigned_abs();
        let major = abs / divisor as u64;
        let minor = abs % divisor as u64;

        let digits = major.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        if places == 0 {
            format!("{}{} {}", sign, grouped, currency)
        } else {
            format!(
                "{}{}.{:0width$} {}",
                sign,
                grouped,
                minor,
                currency,
                width = places as usize
            )
        }
    }
}

/// Format with the default formatter
pub fn format_money(amount: i64, currency: Currency) -> String {
    DefaultMoneyFormatter.format(amount, currency)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_parsing() {
        assert_eq!("eur".parse::<Currency>().unwrap(), Currency::EUR);
        assert_eq!(" CHF ".parse::<Currency>().unwrap(), Currency::CHF);
        assert!("XYZ".parse::<Currency>().is_err());
    }

    #[test]
    fn test_round_minor_halves_away_from_zero() {
        assert_eq!(round_minor(68.5), 69);
        assert_eq!(round_minor(68.49), 68);
        assert_eq!(round_minor(-0.5), -1);
        assert_eq!(round_minor(454.545), 455);
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(43957, Currency::EUR), "439.57 EUR");
        assert_eq!(format_money(123456789, Currency::USD), "1,234,567.89 USD");
        assert_eq!(format_money(-10000, Currency::CHF), "-100.00 CHF");
        assert_eq!(format_money(5, Currency::EUR), "0.05 EUR");
        assert_eq!(format_money(1000, Currency::JPY), "1,000 JPY");
    }

    #[test]
    fn test_from_smallest_unit() {
        assert_eq!(Currency::USD.from_smallest_unit(1099), 10.99);
        assert_eq!(Currency::JPY.from_smallest_unit(1000), 1000.0);
    }
}
