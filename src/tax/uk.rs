//! UK income tax, National Insurance, and Plan-2 student loan repayment

use serde::{Deserialize, Serialize};

use super::{TaxAssessment, TaxBreakdown, TaxComputer};
use crate::error::TaxError;

/// UK income tax band limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxBands {
    pub personal_allowance: f64,
    pub basic_rate_limit: f64,
    pub higher_rate_limit: f64,
    /// Income above this tapers the personal allowance away
    pub pa_taper_threshold: f64,
    /// Calendar year until which thresholds stay frozen; after it they
    /// uprate with inflation
    #[serde(default)]
    pub threshold_freeze_until: Option<i32>,
}

/// UK income tax band rates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxRates {
    pub basic: f64,
    pub higher: f64,
    pub additional: f64,
}

/// National Insurance thresholds (class 1 employee)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NiBands {
    pub primary_threshold: f64,
    pub upper_earnings_limit: f64,
}

/// National Insurance rates for the two bands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NiRates {
    pub main: f64,
    pub upper: f64,
}

/// Plan-2 student loan repayment and interest terms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentLoanConfig {
    pub threshold: f64,
    pub repayment_rate: f64,
    pub interest_rate_rpi: f64,
    pub interest_rate_max_premium: f64,
    pub interest_lower_income_threshold: f64,
    pub interest_upper_income_threshold: f64,
}

/// Outcome of rolling a loan balance through one year
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoanRoll {
    pub repayment: f64,
    pub interest: f64,
    pub balance_after: f64,
}

impl StudentLoanConfig {
    /// Interest rate scales linearly from RPI at the lower income threshold
    /// to RPI + max premium at the upper
    pub fn interest_rate(&self, gross_income: f64) -> f64 {
        if gross_income <= self.interest_lower_income_threshold {
            self.interest_rate_rpi
        } else if gross_income >= self.interest_upper_income_threshold {
            self.interest_rate_rpi + self.interest_rate_max_premium
        } else {
            let span = self.interest_upper_income_threshold - self.interest_lower_income_threshold;
            let premium = (gross_income - self.interest_lower_income_threshold) / span
                * self.interest_rate_max_premium;
            self.interest_rate_rpi + premium
        }
    }

    /// Accrue interest and deduct the year's repayment
    ///
    /// Repayment applies only while a balance remains and income exceeds the
    /// threshold; it is capped so the balance never goes negative.
    pub fn roll(&self, gross_income: f64, balance: f64) -> LoanRoll {
        if balance <= 0.0 {
            return LoanRoll {
                repayment: 0.0,
                interest: 0.0,
                balance_after: 0.0,
            };
        }

        let interest = balance * self.interest_rate(gross_income);
        let due = if gross_income > self.threshold {
            (gross_income - self.threshold) * self.repayment_rate
        } else {
            0.0
        };
        let repayment = due.min(balance + interest);
        LoanRoll {
            repayment,
            interest,
            balance_after: (balance + interest - repayment).max(0.0),
        }
    }
}

/// UK tax system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UkTaxConfig {
    pub bands: TaxBands,
    pub rates: TaxRates,
    pub ni_bands: NiBands,
    pub ni_rates: NiRates,
    /// Annual inflation used to uprate thresholds after the freeze
    #[serde(default)]
    pub inflation_rate: f64,
}

/// UK variant: tapered personal allowance, three progressive bands, two-band
/// National Insurance, Plan-2 student loan
#[derive(Debug, Clone)]
pub struct UkTax {
    config: UkTaxConfig,
    student_loan: Option<StudentLoanConfig>,
}

impl UkTax {
    pub fn new(
        config: UkTaxConfig,
        student_loan: Option<StudentLoanConfig>,
    ) -> Result<Self, TaxError> {
        let bands = &config.bands;
        if !(bands.personal_allowance <= bands.basic_rate_limit
            && bands.basic_rate_limit <= bands.higher_rate_limit)
        {
            return Err(TaxError::MalformedBrackets {
                component: "uk income_tax".into(),
                reason: "band limits must be ascending".into(),
            });
        }
        if config.ni_bands.primary_threshold > config.ni_bands.upper_earnings_limit {
            return Err(TaxError::MalformedBrackets {
                component: "uk national_insurance".into(),
                reason: "primary threshold above upper earnings limit".into(),
            });
        }
        Ok(Self {
            config,
            student_loan,
        })
    }

    /// Band limits for a calendar year, uprated with inflation once the
    /// threshold freeze has passed
    fn bands_for_year(&self, year: i32) -> (f64, f64, f64, f64) {
        let bands = &self.config.bands;
        let multiplier = match bands.threshold_freeze_until {
            Some(freeze_until) if year >= freeze_until => {
                (1.0 + self.config.inflation_rate).powi(year - freeze_until)
            }
            _ => 1.0,
        };
        (
            bands.personal_allowance * multiplier,
            bands.basic_rate_limit * multiplier,
            bands.higher_rate_limit * multiplier,
            bands.pa_taper_threshold * multiplier,
        )
    }

    fn income_tax(&self, gross_income: f64, year: i32) -> f64 {
        let (mut allowance, basic_limit, higher_limit, taper_threshold) = self.bands_for_year(year);
        let rates = &self.config.rates;

        // Allowance shrinks £1 for every £2 of income above the taper
        // threshold, floored at zero
        if gross_income > taper_threshold {
            allowance = (allowance - (gross_income - taper_threshold) / 2.0).max(0.0);
        }

        let mut taxable = (gross_income - allowance).max(0.0);
        let mut tax = 0.0;

        if taxable > higher_limit - allowance {
            tax += (taxable - (higher_limit - allowance)) * rates.additional;
            taxable = higher_limit - allowance;
        }
        if taxable > basic_limit - allowance {
            tax += (taxable - (basic_limit - allowance)) * rates.higher;
            taxable = basic_limit - allowance;
        }
        tax + taxable * rates.basic
    }

    fn national_insurance(&self, gross_income: f64) -> f64 {
        let bands = &self.config.ni_bands;
        let rates = &self.config.ni_rates;
        let mut ni = 0.0;

        if gross_income > bands.primary_threshold {
            let main_band =
                gross_income.min(bands.upper_earnings_limit) - bands.primary_threshold;
            ni += main_band.max(0.0) * rates.main;
        }
        if gross_income > bands.upper_earnings_limit {
            ni += (gross_income - bands.upper_earnings_limit) * rates.upper;
        }
        ni
    }
}

impl TaxComputer for UkTax {
    fn compute(
        &self,
        gross_income: f64,
        year: i32,
        loan_balance: f64,
    ) -> Result<TaxAssessment, TaxError> {
        let mut breakdown = TaxBreakdown {
            income_tax: self.income_tax(gross_income, year),
            social_security: self.national_insurance(gross_income),
            ..TaxBreakdown::default()
        };

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
