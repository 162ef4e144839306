//! Jurisdiction-specific tax computation
//!
//! Each jurisdiction variant is a strategy behind the [`TaxComputer`] trait,
//! selected through a registry keyed by jurisdiction id — never by
//! inspecting the shape of the config. Adding a jurisdiction means adding a
//! variant implementation and registering its document.

mod uk;
mod us;

pub use uk::{LoanRoll, NiBands, NiRates, StudentLoanConfig, TaxBands, TaxRates, UkTax, UkTaxConfig};
pub use us::{Bracket, FederalConfig, FicaConfig, SimpleBracket, UsTax};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::currency::Currency;
use crate::error::TaxError;

/// Structured tax breakdown for one year of gross income
///
/// Every component is non-negative; jurisdictions leave the components they
/// do not levy at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub income_tax: f64,
    pub social_security: f64,
    pub student_loan: f64,
    pub state_tax: f64,
    pub city_tax: f64,
}

impl TaxBreakdown {
    pub fn total(&self) -> f64 {
        self.income_tax + self.social_security + self.student_loan + self.state_tax + self.city_tax
    }
}

/// Result of assessing one year: the breakdown plus the student-loan balance
/// carried into the next year
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxAssessment {
    pub breakdown: TaxBreakdown,
    pub loan_balance_after: f64,
}

/// Jurisdiction variants the engine knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxVariant {
    Uk,
    UsState,
    TaxFree,
}

/// Tax system document as supplied by the configuration collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxSystemDocument {
    pub id: String,
    pub currency: Currency,
    pub variant: TaxVariant,
    /// Ordered component names, for display and diagnostics
    #[serde(default)]
    pub components: Vec<String>,
    pub config: TaxSystemConfig,
}

/// A state/city progressive table with an optional descriptive type tag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalTaxTable {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    pub brackets: Vec<SimpleBracket>,
}

/// Union of the per-variant configuration sections; each variant picks the
/// sections it needs and rejects documents missing them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxSystemConfig {
    // UK sections
    #[serde(default)]
    pub bands: Option<TaxBands>,
    #[serde(default)]
    pub rates: Option<TaxRates>,
    #[serde(default)]
    pub ni_bands: Option<NiBands>,
    #[serde(default)]
    pub ni_rates: Option<NiRates>,
    /// Annual inflation used to uprate UK thresholds after the freeze
    #[serde(default)]
    pub inflation_rate: f64,
    // US sections
    #[serde(default)]
    pub federal: Option<FederalConfig>,
    #[serde(default)]
    pub fica: Option<FicaConfig>,
    #[serde(default)]
    pub state: Option<LocalTaxTable>,
    #[serde(default)]
    pub city: Option<LocalTaxTable>,
    /// Student loan terms; used by the UK variant and, when an expat keeps
    /// repaying from a tax-free jurisdiction, by the tax-free variant too
    #[serde(default)]
    pub student_loan: Option<StudentLoanConfig>,
}

fn require_section<T>(section: Option<T>, id: &str, name: &str) -> Result<T, TaxError> {
    section.ok_or_else(|| TaxError::MalformedBrackets {
        component: format!("{}: {}", id, name),
        reason: format!("missing '{}' config section", name),
    })
}

/// One jurisdiction variant's computation strategy
pub trait TaxComputer: Send + Sync {
    fn compute(
        &self,
        gross_income: f64,
        year: i32,
        loan_balance: f64,
    ) -> Result<TaxAssessment, TaxError>;
}

/// Tax-free jurisdiction: every component zero, with an optional
/// student-loan-only component when configured
#[derive(Debug, Clone)]
pub struct TaxFree {
    student_loan: Option<StudentLoanConfig>,
}

impl TaxComputer for TaxFree {
    fn compute(
        &self,
        gross_income: f64,
        _year: i32,
        loan_balance: f64,
    ) -> Result<TaxAssessment, TaxError> {
        let mut breakdown = TaxBreakdown::default();
        let mut balance_after = loan_balance;
        if let Some(plan) = &self.student_loan {
            let roll = plan.roll(gross_income, loan_balance);
            breakdown.student_loan = roll.repayment;
            balance_after = roll.balance_after;
        }
        Ok(TaxAssessment {
            breakdown,
            loan_balance_after: balance_after,
        })
    }
}

struct RegisteredSystem {
    currency: Currency,
    computer: Box<dyn TaxComputer>,
}

/// Registry of tax systems keyed by jurisdiction id
#[derive(Default)]
pub struct TaxRegistry {
    systems: HashMap<String, RegisteredSystem>,
}

impl TaxRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and register the strategy for a tax system document
    ///
    /// Bracket tables are checked for ascending order here so a malformed
    /// document fails at registration rather than deep inside a projection.
    pub fn register(&mut self, doc: &TaxSystemDocument) -> Result<(), TaxError> {
        let config = &doc.config;
        let computer: Box<dyn TaxComputer> = match doc.variant {
            TaxVariant::Uk => {
                let uk = UkTaxConfig {
                    bands: require_section(config.bands.clone(), &doc.id, "bands")?,
                    rates: require_section(config.rates.clone(), &doc.id, "rates")?,
                    ni_bands: require_section(config.ni_bands.clone(), &doc.id, "ni_bands")?,
                    ni_rates: require_section(config.ni_rates.clone(), &doc.id, "ni_rates")?,
                    inflation_rate: config.inflation_rate,
                };
                Box::new(UkTax::new(uk, config.student_loan.clone())?)
            }
            TaxVariant::UsState => Box::new(UsTax::new(
                require_section(config.federal.clone(), &doc.id, "federal")?,
                require_section(config.fica.clone(), &doc.id, "fica")?,
                config.state.clone().map(|t| t.brackets),
                config.city.clone().map(|t| t.brackets),
            )?),
            TaxVariant::TaxFree => Box::new(TaxFree {
                student_loan: config.student_loan.clone(),
            }),
        };

        self.systems.insert(
            doc.id.clone(),
            RegisteredSystem {
                currency: doc.currency,
                computer,
            },
        );
        Ok(())
    }

    pub fn contains(&self, jurisdiction_id: &str) -> bool {
        self.systems.contains_key(jurisdiction_id)
    }

    pub fn currency_of(&self, jurisdiction_id: &str) -> Option<Currency> {
        self.systems.get(jurisdiction_id).map(|s| s.currency)
    }

    /// Compute the tax breakdown for a year of gross income
    pub fn compute_tax(
        &self,
        gross_income: f64,
        jurisdiction_id: &str,
        year: i32,
        loan_balance: f64,
    ) -> Result<TaxAssessment, TaxError> {
        let system = self
            .systems
            .get(jurisdiction_id)
            .ok_or_else(|| TaxError::UnsupportedJurisdiction(jurisdiction_id.to_string()))?;
        system.computer.compute(gross_income, year, loan_balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use approx::assert_relative_eq;

    fn registry() -> TaxRegistry {
        let mut registry = TaxRegistry::new();
        for doc in catalog::default_tax_systems() {
            registry.register(&doc).unwrap();
        }
        registry
    }

    #[test]
    fn test_unknown_jurisdiction() {
        let err = registry()
            .compute_tax(50_000.0, "atlantis", 2025, 0.0)
            .unwrap_err();
        assert!(matches!(err, TaxError::UnsupportedJurisdiction(_)));
    }

    #[test]
    fn test_tax_free_all_components_zero() {
        let registry = registry();
        for gross in [0.0, 45_000.0, 250_000.0, 1_000_000.0] {
            let assessment = registry
                .compute_tax(gross, "tax_free", 2025, 0.0)
                .unwrap();
            assert_eq!(assessment.breakdown, TaxBreakdown::default());
        }
    }

    #[test]
    fn test_tax_free_keeps_student_loan_component() {
        // Expat repaying Plan 2 from a tax-free jurisdiction
        let assessment = registry()
            .compute_tax(100_000.0, "tax_free", 2025, 40_000.0)
            .unwrap();
        assert!(assessment.breakdown.student_loan > 0.0);
        assert_eq!(assessment.breakdown.income_tax, 0.0);
        assert_eq!(assessment.breakdown.social_security, 0.0);
        assert_relative_eq!(
            assessment.breakdown.student_loan,
            (100_000.0 - 28_470.0) * 0.09,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_currency_lookup() {
        let registry = registry();
        assert_eq!(
            registry.currency_of("uk_income_tax_ni"),
            Some(Currency::Gbp)
        );
        assert_eq!(
            registry.currency_of("us_federal_state_city"),
            Some(Currency::Usd)
        );
        assert_eq!(registry.currency_of("nowhere"), None);
    }
}
