//! Per-year output records for a projection
//!
//! One [`FinancialDataPoint`] is produced per plan year and never mutated
//! afterwards. Every leaf amount is a [`CurrencyValue`] so records keep
//! their original-currency amounts alongside stable base equivalents.

use serde::Serialize;

use crate::currency::{sum_base, Currency, CurrencyValue};
use crate::scenario::ValidationResult;

/// Income components for one year
#[derive(Debug, Clone, Serialize)]
pub struct IncomeBreakdown {
    pub salary: CurrencyValue,
    pub bonus: CurrencyValue,
    pub rsu_vested: CurrencyValue,
    /// Net rental income from a home let out while abroad
    pub rental: CurrencyValue,
}

impl IncomeBreakdown {
    pub fn total_base(&self) -> f64 {
        sum_base([&self.salary, &self.bonus, &self.rsu_vested, &self.rental])
    }
}

/// Universal goal expenses for one year
#[derive(Debug, Clone, Serialize)]
pub struct GoalExpenseBreakdown {
    pub university: CurrencyValue,
    pub marriage: CurrencyValue,
    pub child: CurrencyValue,
    pub personal: CurrencyValue,
    pub parental_support: CurrencyValue,
    pub travel: CurrencyValue,
}

impl GoalExpenseBreakdown {
    pub fn total_base(&self) -> f64 {
        sum_base([
            &self.university,
            &self.marriage,
            &self.child,
            &self.personal,
            &self.parental_support,
            &self.travel,
        ])
    }
}

/// Expense components for one year
#[derive(Debug, Clone, Serialize)]
pub struct ExpenseBreakdown {
    pub rent: CurrencyValue,
    pub healthcare: CurrencyValue,
    pub general: CurrencyValue,
    pub retirement_contribution: CurrencyValue,
    /// Mortgage payments on an owned home
    pub housing: CurrencyValue,
    pub goals: GoalExpenseBreakdown,
}

impl ExpenseBreakdown {
    /// Recurring location expenses, excluding goals
    pub fn location_base(&self) -> f64 {
        sum_base([
            &self.rent,
            &self.healthcare,
            &self.general,
            &self.retirement_contribution,
            &self.housing,
        ])
    }

    pub fn total_base(&self) -> f64 {
        self.location_base() + self.goals.total_base()
    }
}

/// Tax components for one year
#[derive(Debug, Clone, Serialize)]
pub struct TaxValueBreakdown {
    pub income_tax: CurrencyValue,
    pub social_security: CurrencyValue,
    pub student_loan: CurrencyValue,
    pub state_tax: CurrencyValue,
    pub city_tax: CurrencyValue,
}

impl TaxValueBreakdown {
    pub fn total_base(&self) -> f64 {
        sum_base([
            &self.income_tax,
            &self.social_security,
            &self.student_loan,
            &self.state_tax,
            &self.city_tax,
        ])
    }
}

/// Investment flows and balance for one year
#[derive(Debug, Clone, Serialize)]
pub struct InvestmentBreakdown {
    /// Net flow into the portfolio this year (negative when drawing down)
    pub contribution: CurrencyValue,
    /// Return on the balance carried into the year
    pub growth: CurrencyValue,
    /// End-of-year invested balance
    pub balance: CurrencyValue,
    /// Granted but not yet vested equity, tracked outside net worth
    pub unvested_equity: CurrencyValue,
}

/// Net worth position at the end of one year
#[derive(Debug, Clone, Serialize)]
pub struct NetWorthBreakdown {
    pub liquid: CurrencyValue,
    pub property_equity: CurrencyValue,
    pub total: CurrencyValue,
}

/// One plan year of projected financials; immutable after creation
#[derive(Debug, Clone, Serialize)]
pub struct FinancialDataPoint {
    /// 1-based plan year
    pub year: u32,
    pub calendar_year: i32,
    pub age: u32,
    pub phase: String,
    pub jurisdiction: String,
    pub currency: Currency,
    pub income: IncomeBreakdown,
    pub expenses: ExpenseBreakdown,
    pub tax: TaxValueBreakdown,
    pub investments: InvestmentBreakdown,
    pub net_worth: NetWorthBreakdown,
}

/// A completed projection run: the ordered data points plus scenario
/// metadata; re-running produces a fresh object, never a mutation
#[derive(Debug, Clone, Serialize)]
pub struct FinancialScenario {
    pub id: String,
    pub name: String,
    pub description: String,
    pub validation: ValidationResult,
    /// Names of the templates composed into this scenario
    pub composition: Vec<String>,
    pub data_points: Vec<FinancialDataPoint>,
}

impl FinancialScenario {
    pub fn final_net_worth_base(&self) -> f64 {
        self.data_points
            .last()
            .map(|p| p.net_worth.total.base_equivalent)
            .unwrap_or(0.0)
    }

    pub fn total_tax_base(&self) -> f64 {
        self.data_points.iter().map(|p| p.tax.total_base()).sum()
    }

    pub fn average_annual_savings_base(&self) -> f64 {
        if self.data_points.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .data_points
            .iter()
            .map(|p| p.income.total_base() - p.tax.total_base() - p.expenses.total_base())
            .sum();
        total / self.data_points.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn base(amount: f64) -> CurrencyValue {
        CurrencyValue::base(amount, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
    }

    #[test]
    fn test_breakdown_totals_sum_base_equivalents() {
        let income = IncomeBreakdown {
            salary: base(50_000.0),
            bonus: base(5_000.0),
            rsu_vested: base(2_500.0),
            rental: base(0.0),
        };
        assert_relative_eq!(income.total_base(), 57_500.0);

        let tax = TaxValueBreakdown {
            income_tax: base(8_000.0),
            social_security: base(3_000.0),
            student_loan: base(1_500.0),
            state_tax: base(0.0),
            city_tax: base(0.0),
        };
        assert_relative_eq!(tax.total_base(), 12_500.0);
    }

    #[test]
    fn test_expense_total_includes_goals() {
        let zero = base(0.0);
        let expenses = ExpenseBreakdown {
            rent: base(14_400.0),
            healthcare: zero,
            general: base(12_000.0),
            retirement_contribution: zero,
            housing: zero,
            goals: GoalExpenseBreakdown {
                university: base(16_800.0),
                marriage: zero,
                child: zero,
                personal: base(6_000.0),
                parental_support: zero,
                travel: base(3_000.0),
            },
        };
        assert_relative_eq!(expenses.location_base(), 26_400.0);
        assert_relative_eq!(expenses.total_base(), 26_400.0 + 25_800.0);
    }
}
