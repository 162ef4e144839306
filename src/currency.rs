//! Multi-currency bookkeeping with a fixed base currency
//!
//! Every amount that leaves the engine is carried as a [`CurrencyValue`]:
//! the original amount, its currency, and a base-currency (GBP) equivalent
//! fixed at creation time. Aggregation and comparison always operate on the
//! base equivalent so that records stay stable even if rate tables change
//! after a projection run.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CurrencyError;

/// Currencies of the configured jurisdictions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "GBP")]
    Gbp,
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
}

impl Currency {
    pub const BASE: Currency = Currency::Gbp;

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Gbp => "GBP",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Exchange rates quoted as units of foreign currency per one GBP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTable {
    rates: HashMap<Currency, f64>,
    as_of: NaiveDate,
}

impl RateTable {
    /// Build a rate table; the base currency is implicit at 1.0
    pub fn new(as_of: NaiveDate) -> Self {
        let mut rates = HashMap::new();
        rates.insert(Currency::BASE, 1.0);
        Self { rates, as_of }
    }

    pub fn with_rate(mut self, currency: Currency, per_base: f64) -> Self {
        self.rates.insert(currency, per_base);
        self
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    pub fn rate(&self, currency: Currency) -> Result<f64, CurrencyError> {
        let rate = self
            .rates
            .get(&currency)
            .copied()
            .ok_or(CurrencyError::MissingRate(currency))?;
        if rate <= 0.0 {
            return Err(CurrencyError::InvalidRate(currency, rate));
        }
        Ok(rate)
    }

    pub fn has(&self, currency: Currency) -> bool {
        self.rates.contains_key(&currency)
    }

    /// Normalize an amount into a [`CurrencyValue`] with its base equivalent
    /// derived at this point and never re-derived later
    pub fn normalize(&self, amount: f64, currency: Currency) -> Result<CurrencyValue, CurrencyError> {
        let rate = self.rate(currency)?;
        Ok(CurrencyValue {
            amount,
            currency,
            base_equivalent: amount / rate,
            exchange_rate: rate,
            as_of: self.as_of,
        })
    }
}

/// An amount paired with its original currency and an immutable
/// base-currency equivalent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrencyValue {
    pub amount: f64,
    pub currency: Currency,
    pub base_equivalent: f64,
    pub exchange_rate: f64,
    pub as_of: NaiveDate,
}

impl CurrencyValue {
    /// Shortcut for an amount already in the base currency
    pub fn base(amount: f64, as_of: NaiveDate) -> Self {
        Self {
            amount,
            currency: Currency::BASE,
            base_equivalent: amount,
            exchange_rate: 1.0,
            as_of,
        }
    }

    /// Base equivalent rounded to 2 decimal places, for external reporting
    /// only; intermediate aggregation stays unrounded
    pub fn rounded_base(&self) -> f64 {
        (self.base_equivalent * 100.0).round() / 100.0
    }
}

/// Sum a set of values on their base equivalents
pub fn sum_base<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a CurrencyValue>,
{
    values.into_iter().map(|v| v.base_equivalent).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table() -> RateTable {
        RateTable::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .with_rate(Currency::Usd, 1.26)
            .with_rate(Currency::Eur, 1.15)
    }

    #[test]
    fn test_normalize_usd() {
        let value = table().normalize(126_000.0, Currency::Usd).unwrap();
        assert_relative_eq!(value.base_equivalent, 100_000.0, epsilon = 1e-9);
        assert_eq!(value.currency, Currency::Usd);
        assert_relative_eq!(value.exchange_rate, 1.26);
    }

    #[test]
    fn test_base_currency_is_identity() {
        let value = table().normalize(5_000.0, Currency::Gbp).unwrap();
        assert_relative_eq!(value.base_equivalent, 5_000.0);
        assert_relative_eq!(value.exchange_rate, 1.0);
    }

    #[test]
    fn test_missing_rate() {
        let table = RateTable::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let err = table.normalize(10.0, Currency::Eur).unwrap_err();
        assert_eq!(err, CurrencyError::MissingRate(Currency::Eur));
    }

    #[test]
    fn test_rounding_only_at_reporting() {
        let value = table().normalize(100.0, Currency::Usd).unwrap();
        // 100 / 1.26 = 79.3650793651...
        assert!(value.base_equivalent != value.rounded_base());
        assert_relative_eq!(value.rounded_base(), 79.37);
    }

    #[test]
    fn test_sum_operates_on_base() {
        let table = table();
        let values = [
            table.normalize(126.0, Currency::Usd).unwrap(),
            table.normalize(100.0, Currency::Gbp).unwrap(),
        ];
        assert_relative_eq!(sum_base(&values), 200.0, epsilon = 1e-9);
    }
}
