//! US federal, FICA, and optional state/city tax computation

use serde::{Deserialize, Serialize};

use super::{TaxAssessment, TaxBreakdown, TaxComputer};
use crate::error::TaxError;

/// Federal bracket with a cumulative base amount
///
/// `base` is the total tax owed on income filling all lower brackets, so a
/// lookup never re-sums them. `limit: None` marks the top-open bracket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bracket {
    pub limit: Option<f64>,
    pub rate: f64,
    pub base: f64,
}

/// Simple progressive bracket for state/city tables
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimpleBracket {
    pub limit: Option<f64>,
    pub rate: f64,
}

/// FICA parameters: Social Security up to a wage cap, Medicare on all wages,
/// additional Medicare above a high-income threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FicaConfig {
    pub social_security_rate: f64,
    pub social_security_wage_cap: f64,
    pub medicare_rate: f64,
    pub additional_medicare_rate: f64,
    pub additional_medicare_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederalConfig {
    pub standard_deduction: f64,
    pub brackets: Vec<Bracket>,
}

/// US variant: federal progressive brackets with cumulative bases, FICA,
/// optional state and city progressive tables
#[derive(Debug, Clone)]
pub struct UsTax {
    federal: FederalConfig,
    fica: FicaConfig,
    state: Option<Vec<SimpleBracket>>,
    city: Option<Vec<SimpleBracket>>,
}

impl UsTax {
    pub fn new(
        federal: FederalConfig,
        fica: FicaConfig,
        state: Option<Vec<SimpleBracket>>,
        city: Option<Vec<SimpleBracket>>,
    ) -> Result<Self, TaxError> {
        check_ascending("federal", federal.brackets.iter().map(|b| b.limit))?;
        if let Some(state) = &state {
            check_ascending("state", state.iter().map(|b| b.limit))?;
        }
        if let Some(city) = &city {
            check_ascending("city", city.iter().map(|b| b.limit))?;
        }
        Ok(Self {
            federal,
            fica,
            state,
            city,
        })
    }

    /// Federal tax via cumulative-base lookup
    fn federal_tax(&self, gross_income: f64) -> Result<f64, TaxError> {
        let taxable = (gross_income - self.federal.standard_deduction).max(0.0);

        let mut lower = 0.0;
        for bracket in &self.federal.brackets {
            match bracket.limit {
                Some(limit) if taxable > limit => lower = limit,
                _ => return Ok(bracket.base + (taxable - lower) * bracket.rate),
            }
        }
        // Income above every finite limit with no top-open bracket declared
        Err(TaxError::MalformedBrackets {
            component: "federal".into(),
            reason: format!("no bracket covers taxable income {:.2}", taxable),
        })
    }

    fn fica(&self, gross_income: f64) -> f64 {
        let fica = &self.fica;
        let social_security =
            gross_income.min(fica.social_security_wage_cap) * fica.social_security_rate;
        let medicare = gross_income * fica.medicare_rate;
        let additional = (gross_income - fica.additional_medicare_threshold).max(0.0)
            * fica.additional_medicare_rate;
        social_security + medicare + additional
    }
}

/// Marginal accumulation over a simple progressive table
///
/// Produces results identical to a cumulative-base formulation of the same
/// table (verified in tests).
fn progressive_tax(
    component: &str,
    income: f64,
    brackets: &[SimpleBracket],
) -> Result<f64, TaxError> {
    let mut tax = 0.0;
    let mut lower = 0.0;

    for bracket in brackets {
        match bracket.limit {
            Some(limit) => {
                if income > limit {
                    tax += (limit - lower) * bracket.rate;
                    lower = limit;
                } else {
                    return Ok(tax + (income - lower).max(0.0) * bracket.rate);
                }
            }
            None => return Ok(tax + (income - lower).max(0.0) * bracket.rate),
        }
    }
    Err(TaxError::MalformedBrackets {
        component: component.into(),
        reason: format!("no bracket covers income {:.2}", income),
    })
}

fn check_ascending<I>(component: &str, limits: I) -> Result<(), TaxError>
where
    I: Iterator<Item = Option<f64>>,
{
    let mut prev: Option<f64> = None;
    let mut seen_open = false;
    for limit in limits {
        if seen_open {
            return Err(TaxError::MalformedBrackets {
                component: component.into(),
                reason: "brackets after the top-open bracket".into(),
            });
        }
        match limit {
            Some(value) => {
                if let Some(p) = prev {
                    if value <= p {
                        return Err(TaxError::MalformedBrackets {
                            component: component.into(),
                            reason: "bracket limits not sorted ascending".into(),
                        });
                    }
                }
                prev = Some(value);
            }
            None => seen_open = true,
        }
    }
    Ok(())
}

impl TaxComputer for UsTax {
    fn compute(
        &self,
        gross_income: f64,
        _year: i32,
        loan_balance: f64,
    ) -> Result<TaxAssessment, TaxError> {
        let state_tax = match &self.state {
            Some(brackets) => progressive_tax("state", gross_income, brackets)?,
            None => 0.0,
        };
        let city_tax = match &self.city {
            Some(brackets) => progressive_tax("city", gross_income, brackets)?,
            None => 0.0,
        };

        Ok(TaxAssessment {
            breakdown: TaxBreakdown {
                income_tax: self.federal_tax(gross_income)?,
                social_security: self.fica(gross_income),
                student_loan: 0.0,
                state_tax,
                city_tax,
            },
            loan_balance_after: loan_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn federal_2025() -> Vec<Bracket> {
        vec![
            Bracket { limit: Some(11_925.0), rate: 0.10, base: 0.0 },
            Bracket { limit: Some(48_475.0), rate: 0.12, base: 1_192.50 },
            Bracket { limit: Some(96_950.0), rate: 0.22, base: 5_595.50 },
            Bracket { limit: Some(206_700.0), rate: 0.24, base: 17_843.50 },
            Bracket { limit: Some(394_600.0), rate: 0.32, base: 46_253.50 },
            Bracket { limit: Some(626_350.0), rate: 0.35, base: 104_755.50 },
            Bracket { limit: None, rate: 0.37, base: 186_601.50 },
        ]
    }

    fn fica_2025() -> FicaConfig {
        FicaConfig {
            social_security_rate: 0.062,
            social_security_wage_cap: 176_100.0,
            medicare_rate: 0.0145,
            additional_medicare_rate: 0.009,
            additional_medicare_threshold: 200_000.0,
        }
    }

    fn ny_state() -> Vec<SimpleBracket> {
        vec![
            SimpleBracket { limit: Some(8_500.0), rate: 0.04 },
            SimpleBracket { limit: Some(11_700.0), rate: 0.045 },
            SimpleBracket { limit: Some(13_900.0), rate: 0.0525 },
            SimpleBracket { limit: Some(80_650.0), rate: 0.055 },
            SimpleBracket { limit: Some(215_400.0), rate: 0.06 },
            SimpleBracket { limit: Some(1_077_550.0), rate: 0.0685 },
            SimpleBracket { limit: None, rate: 0.0965 },
        ]
    }

    fn nyc_city() -> Vec<SimpleBracket> {
        vec![
            SimpleBracket { limit: Some(12_000.0), rate: 0.03078 },
            SimpleBracket { limit: Some(25_000.0), rate: 0.03762 },
            SimpleBracket { limit: Some(50_000.0), rate: 0.03819 },
            SimpleBracket { limit: None, rate: 0.03876 },
        ]
    }

    fn us_tax(state: Option<Vec<SimpleBracket>>, city: Option<Vec<SimpleBracket>>) -> UsTax {
        UsTax::new(
            FederalConfig {
                standard_deduction: 15_000.0,
                brackets: federal_2025(),
            },
            fica_2025(),
            state,
            city,
        )
        .unwrap()
    }

    #[test]
    fn test_federal_cumulative_base_arithmetic() {
        let tax = us_tax(None, None);
        // Gross 150,000 - 15,000 deduction = 135,000 taxable.
        // Falls in the 24% bracket above 96,950 with base 17,843.50:
        // 17,843.50 + 0.24 * (135,000 - 96,950) = 26,975.50
        assert_relative_eq!(tax.federal_tax(150_000.0).unwrap(), 26_975.50, epsilon = 1e-6);
    }

    #[test]
    fn test_federal_in_22_percent_bracket() {
        let tax = us_tax(None, None);
        // Gross 105,000 -> taxable 90,000, 22% bracket base 5,595.50:
        // 5,595.50 + 0.22 * (90,000 - 48,475) = 14,731.00
        assert_relative_eq!(tax.federal_tax(105_000.0).unwrap(), 14_731.0, epsilon = 1e-6);
    }

    #[test]
    fn test_federal_below_deduction_is_zero() {
        let tax = us_tax(None, None);
        assert_eq!(tax.federal_tax(12_000.0).unwrap(), 0.0);
    }

    #[test]
    fn test_fica_components() {
        let tax = us_tax(None, None);
        // Below wage cap and additional threshold
        assert_relative_eq!(
            tax.fica(100_000.0),
            100_000.0 * 0.062 + 100_000.0 * 0.0145,
            epsilon = 1e-6
        );
        // Above both: SS capped, additional Medicare kicks in
        assert_relative_eq!(
            tax.fica(250_000.0),
            176_100.0 * 0.062 + 250_000.0 * 0.0145 + 50_000.0 * 0.009,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_state_marginal_matches_cumulative() {
        // NY state tax on 150,000, cumulative form:
        // 4,271 flat through 80,650 then 6% above (per the published table)
        let cumulative = 8_500.0 * 0.04
            + (11_700.0 - 8_500.0) * 0.045
            + (13_900.0 - 11_700.0) * 0.0525
            + (80_650.0 - 13_900.0) * 0.055
            + (150_000.0 - 80_650.0) * 0.06;
        let marginal = progressive_tax("state", 150_000.0, &ny_state()).unwrap();
        assert_relative_eq!(marginal, cumulative, epsilon = 1e-6);
    }

    #[test]
    fn test_city_top_open_bracket() {
        let expected = 12_000.0 * 0.03078
            + (25_000.0 - 12_000.0) * 0.03762
            + (50_000.0 - 25_000.0) * 0.03819
            + (150_000.0 - 50_000.0) * 0.03876;
        let city = progressive_tax("city", 150_000.0, &nyc_city()).unwrap();
        assert_relative_eq!(city, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_full_breakdown_with_state_and_city() {
        let tax = us_tax(Some(ny_state()), Some(nyc_city()));
        let assessment = tax.compute(150_000.0, 2025, 0.0).unwrap();
        let b = assessment.breakdown;
        assert!(b.income_tax > 0.0 && b.social_security > 0.0);
        assert!(b.state_tax > 0.0 && b.city_tax > 0.0);
        assert_eq!(b.student_loan, 0.0);
        assert_relative_eq!(
            b.total(),
            b.income_tax + b.social_security + b.state_tax + b.city_tax,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_unsorted_brackets_rejected() {
        let mut brackets = federal_2025();
        brackets.swap(1, 2);
        let result = UsTax::new(
            FederalConfig {
                standard_deduction: 15_000.0,
                brackets,
            },
            fica_2025(),
            None,
            None,
        );
        assert!(matches!(result, Err(TaxError::MalformedBrackets { .. })));
    }

    #[test]
    fn test_income_beyond_finite_table_is_malformed() {
        // A table with no top-open bracket fails only once income crosses it
        let tax = UsTax::new(
            FederalConfig {
                standard_deduction: 0.0,
                brackets: vec![
                    Bracket { limit: Some(50_000.0), rate: 0.10, base: 0.0 },
                ],
            },
            fica_2025(),
            None,
            None,
        )
        .unwrap();
        assert!(tax.federal_tax(40_000.0).is_ok());
        assert!(matches!(
            tax.federal_tax(60_000.0),
            Err(TaxError::MalformedBrackets { .. })
        ));
    }
}
