//! Running state carried across plan years during projection

use crate::currency::Currency;
use crate::scenario::{HousingPlan, PlanAssumptions, RentalIncome};

/// An owned home with its amortizing mortgage, in the housing market's
/// currency
#[derive(Debug, Clone)]
pub struct HouseState {
    pub market: String,
    pub currency: Currency,
    pub value: f64,
    pub mortgage_balance: f64,
    pub equity: f64,
    /// Fixed annual payment from the annuity formula
    pub annual_payment: f64,
    pub mortgage_rate: f64,
    /// Rental terms carried from the purchase plan; the house outlives the
    /// phase that declared it
    pub rental: Option<RentalIncome>,
}

impl HouseState {
    /// Open the position at purchase: equity starts at the deposit
    pub fn purchase(plan: &HousingPlan) -> Self {
        let price = plan.price_at_purchase();
        let deposit = price * plan.deposit_pct;
        let principal = price - deposit;
        Self {
            market: plan.market.clone(),
            currency: plan.currency,
            value: price,
            mortgage_balance: principal,
            equity: deposit,
            annual_payment: plan.annual_payment(principal),
            mortgage_rate: plan.mortgage_rate,
            rental: plan.rental_income.clone(),
        }
    }

    /// Net annual rental income while the plan holder lives outside the
    /// home's market
    pub fn annual_rental_income(&self, current_location: &str) -> f64 {
        match &self.rental {
            Some(rental) if rental.when_abroad && current_location != self.market => {
                rental.monthly_rate * 12.0 * (1.0 - rental.management_fee_pct)
            }
            _ => 0.0,
        }
    }

    /// Advance the mortgage twelve monthly payments; principal is
    /// non-increasing and the final payment is clipped so the balance lands
    /// exactly on zero at term
    ///
    /// Returns the cash paid this year.
    pub fn amortize_year(&mut self) -> f64 {
        let monthly_rate = self.mortgage_rate / 12.0;
        let monthly_payment = self.annual_payment / 12.0;
        let mut paid = 0.0;
        for _ in 0..12 {
            if self.mortgage_balance <= 0.0 {
                break;
            }
            let interest = self.mortgage_balance * monthly_rate;
            let payment = monthly_payment.min(self.mortgage_balance + interest);
            let principal_paid = payment - interest;
            self.mortgage_balance = (self.mortgage_balance - principal_paid).max(0.0);
            self.equity += principal_paid;
            paid += payment;
        }
        paid
    }
}

/// One outstanding RSU grant vesting evenly over a fixed horizon
#[derive(Debug, Clone, Copy)]
struct Grant {
    annual_vest: f64,
    first_vest_year: u32,
    last_vest_year: u32,
}

/// Pool of RSU grants; each grant vests evenly from its grant year
#[derive(Debug, Clone, Default)]
pub struct VestingPool {
    grants: Vec<Grant>,
}

impl VestingPool {
    /// Record a grant made in `year` vesting over `vesting_years` years
    pub fn grant(&mut self, year: u32, total_value: f64, vesting_years: u32) {
        if total_value <= 0.0 {
            return;
        }
        let years = vesting_years.max(1);
        self.grants.push(Grant {
            annual_vest: total_value / years as f64,
            first_vest_year: year,
            last_vest_year: year + years - 1,
        });
    }

    /// Value vesting (joining income) in a plan year
    pub fn vested_in(&self, year: u32) -> f64 {
        self.grants
            .iter()
            .filter(|g| year >= g.first_vest_year && year <= g.last_vest_year)
            .map(|g| g.annual_vest)
            .sum()
    }

    /// Granted value still unvested at the end of a plan year
    pub fn unvested_after(&self, year: u32) -> f64 {
        self.grants
            .iter()
            .filter(|g| g.last_vest_year > year)
            .map(|g| g.annual_vest * (g.last_vest_year - year.max(g.first_vest_year - 1)) as f64)
            .sum()
    }
}

/// State threaded through the year loop; aggregate amounts in the base
/// currency, house amounts in the housing market's currency
#[derive(Debug, Clone)]
pub struct ProjectionState {
    pub invested_balance: f64,
    pub net_worth: f64,
    /// Outstanding student loan, in the loan jurisdiction's currency
    pub student_loan_balance: f64,
    pub house: Option<HouseState>,
    pub vesting: VestingPool,
}

impl ProjectionState {
    pub fn new(assumptions: &PlanAssumptions) -> Self {
        Self {
            invested_balance: 0.0,
            net_worth: 0.0,
            student_loan_balance: assumptions.student_loan_debt,
            house: None,
            vesting: VestingPool::default(),
        }
    }
}
