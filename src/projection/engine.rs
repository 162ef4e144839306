//! Phase scheduler and year-by-year financial projector
//!
//! The engine walks plan years 1..=duration, advancing a phase state
//! machine, and builds exactly one [`FinancialDataPoint`] per year. Pure,
//! single-threaded computation: no I/O, no shared mutable state within a
//! run, so independent scenarios can project in parallel.

use std::sync::Arc;

use log::{debug, info};

use super::datapoint::{
    ExpenseBreakdown, FinancialDataPoint, GoalExpenseBreakdown, IncomeBreakdown,
    InvestmentBreakdown, NetWorthBreakdown, TaxValueBreakdown,
};
use super::state::{HouseState, ProjectionState};
use crate::currency::{Currency, RateTable};
use crate::error::{ProjectionError, TemplateError};
use crate::runner::ResolutionCache;
use crate::scenario::{resolve_salary_plan, ResolvedPhase, ResolvedScenario, SalaryPlan};
use crate::tax::TaxRegistry;
use crate::template::TemplateStore;

/// Lifecycle of one scenario's projection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionPhase {
    Pending,
    InPhase(usize),
    Complete,
    Failed,
}

/// State machine tracking which phase the projection is in
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    current: ProjectionPhase,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: ProjectionPhase::Pending,
        }
    }

    pub fn state(&self) -> ProjectionPhase {
        self.current
    }

    /// Advance to the phase containing `plan_year`, returning its index
    ///
    /// `PENDING -> IN_PHASE(0)` on start, `IN_PHASE(i) -> IN_PHASE(i+1)`
    /// once the year passes the phase end. A year no phase covers is a
    /// tiling violation.
    pub fn advance(
        &mut self,
        scenario: &ResolvedScenario,
        plan_year: u32,
    ) -> Result<usize, ProjectionError> {
        let next_index = match self.current {
            ProjectionPhase::Pending => 0,
            ProjectionPhase::InPhase(i)
                if scenario
                    .phases
                    .get(i)
                    .is_some_and(|p| p.contains_year(plan_year)) =>
            {
                i
            }
            ProjectionPhase::InPhase(i)
                if scenario.phases.get(i).is_some_and(|p| plan_year > p.end_year) =>
            {
                i + 1
            }
            _ => usize::MAX,
        };

        match scenario.phases.get(next_index) {
            Some(phase) if phase.contains_year(plan_year) => {
                if self.current != ProjectionPhase::InPhase(next_index) {
                    debug!(
                        "entering phase '{}' ({}..={}) at year {}",
                        phase.name, phase.start_year, phase.end_year, plan_year
                    );
                }
                self.current = ProjectionPhase::InPhase(next_index);
                Ok(next_index)
            }
            _ => {
                self.current = ProjectionPhase::Failed;
                Err(ProjectionError::new(
                    plan_year,
                    "phase",
                    TemplateError::InvalidShape {
                        template: scenario.meta.id.clone(),
                        reason: format!("no phase covers plan year {}", plan_year),
                    },
                ))
            }
        }
    }

    /// `IN_PHASE(last) -> COMPLETE` once the year loop runs past the plan
    pub fn complete(&mut self) {
        self.current = ProjectionPhase::Complete;
    }

    pub fn fail(&mut self) {
        self.current = ProjectionPhase::Failed;
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything produced while projecting one year, before normalization
struct YearLedger {
    salary: f64,
    bonus: f64,
    rsu_vested: f64,
    rental_local: f64,
    rent: f64,
    healthcare: f64,
    general: f64,
    retirement: f64,
    mortgage_payment_local: f64,
    deposit_local: f64,
    equity_delta_local: f64,
}

/// Year-by-year projector over a resolved scenario
pub struct ProjectionEngine<'a> {
    templates: &'a TemplateStore,
    registry: &'a TaxRegistry,
    rates: &'a RateTable,
    cache: Option<&'a ResolutionCache>,
}

impl<'a> ProjectionEngine<'a> {
    pub fn new(
        templates: &'a TemplateStore,
        registry: &'a TaxRegistry,
        rates: &'a RateTable,
    ) -> Self {
        Self {
            templates,
            registry,
            rates,
            cache: None,
        }
    }

    /// Share a resolution memo cache across projection runs
    pub fn with_cache(mut self, cache: &'a ResolutionCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Project every plan year, producing one data point per year
    ///
    /// Any error aborts this scenario only; the tracker ends `Failed` and
    /// the error carries the offending year and component.
    pub fn project(
        &self,
        scenario: &ResolvedScenario,
    ) -> Result<Vec<FinancialDataPoint>, ProjectionError> {
        let duration = scenario.assumptions.plan_duration_years;
        let mut state = ProjectionState::new(&scenario.assumptions);
        let mut tracker = PhaseTracker::new();
        let mut points = Vec::with_capacity(duration as usize);

        for year in 1..=duration {
            let phase_index = tracker.advance(scenario, year)?;
            let phase = &scenario.phases[phase_index];
            match self.project_year(scenario, phase, year, &mut state) {
                Ok(point) => points.push(point),
                Err(e) => {
                    tracker.fail();
                    return Err(e);
                }
            }
        }

        tracker.complete();
        info!(
            "scenario '{}' projected {} years, final net worth {:.0} {}",
            scenario.meta.id,
            points.len(),
            state.net_worth,
            Currency::BASE
        );
        Ok(points)
    }

    fn salary_plan(
        &self,
        phase: &ResolvedPhase,
        plan_year: u32,
    ) -> Result<Arc<SalaryPlan>, TemplateError> {
        match self.cache {
            Some(cache) => cache.salary_plan(self.templates, phase, plan_year),
            None => resolve_salary_plan(self.templates, phase, plan_year).map(Arc::new),
        }
    }

    /// Run the per-year pipeline: income, tax, expenses, housing, currency
    /// normalization, and the net-worth update
    fn project_year(
        &self,
        scenario: &ResolvedScenario,
        phase: &ResolvedPhase,
        year: u32,
        state: &mut ProjectionState,
    ) -> Result<FinancialDataPoint, ProjectionError> {
        let assumptions = &scenario.assumptions;
        let phase_year = year - phase.start_year + 1;
        let calendar_year = assumptions.start_year + year as i32 - 1;
        let inflation = assumptions.inflation_multiplier(year);

        let mut ledger = self.income_for_year(phase, year, phase_year, state)?;

        // (c) taxes on gross earned income; the student loan balance rolls
        // forward through the assessment
        let gross = ledger.salary + ledger.bonus + ledger.rsu_vested;
        let assessment = self
            .registry
            .compute_tax(
                gross,
                &phase.tax_system,
                calendar_year,
                state.student_loan_balance,
            )
            .map_err(|e| ProjectionError::new(year, "tax", e))?;
        state.student_loan_balance = assessment.loan_balance_after;

        // (d) recurring location expenses, inflated; retirement contribution
        // tracks salary instead
        ledger.rent = phase.expenses.rent_monthly * 12.0 * inflation;
        ledger.healthcare = phase.expenses.healthcare_monthly * 12.0 * inflation;
        ledger.general = phase.expenses.general_monthly * 12.0 * inflation;
        ledger.retirement = ledger.salary * phase.expenses.retirement_contribution_pct;
        let goals = scenario.goals.costs_for_year(year, inflation);

        // (e) housing: purchase, amortization, equity delta
        self.housing_for_year(phase, year, state, &mut ledger)?;

        // (f) normalize everything and update running state
        let house_currency = state.house.as_ref().map(|h| h.currency);
        let cv = |amount: f64, currency: Currency| {
            self.rates
                .normalize(amount, currency)
                .map_err(|e| ProjectionError::new(year, "currency", e))
        };
        let local = |amount: f64| cv(amount, phase.currency);
        let housing_cv = |amount: f64| cv(amount, house_currency.unwrap_or(phase.currency));
        let base = |amount: f64| cv(amount, Currency::BASE);

        let income = IncomeBreakdown {
            salary: local(ledger.salary)?,
            bonus: local(ledger.bonus)?,
            rsu_vested: local(ledger.rsu_vested)?,
            rental: housing_cv(ledger.rental_local)?,
        };
        let tax_b = assessment.breakdown;
        let tax = TaxValueBreakdown {
            income_tax: local(tax_b.income_tax)?,
            social_security: local(tax_b.social_security)?,
            student_loan: local(tax_b.student_loan)?,
            state_tax: local(tax_b.state_tax)?,
            city_tax: local(tax_b.city_tax)?,
        };
        let expenses = ExpenseBreakdown {
            rent: local(ledger.rent)?,
            healthcare: local(ledger.healthcare)?,
            general: local(ledger.general)?,
            retirement_contribution: local(ledger.retirement)?,
            housing: housing_cv(ledger.mortgage_payment_local)?,
            goals: GoalExpenseBreakdown {
                university: base(goals.university)?,
                marriage: base(goals.marriage)?,
                child: base(goals.child)?,
                personal: base(goals.personal)?,
                parental_support: base(goals.parental_support)?,
                travel: base(goals.travel)?,
            },
        };

        let income_base = income.total_base();
        let tax_base = tax.total_base();
        let expenses_base = expenses.total_base();
        let deposit_base = housing_cv(ledger.deposit_local)?.base_equivalent;
        let equity_delta_base = housing_cv(ledger.equity_delta_local)?.base_equivalent;

        let growth = state.invested_balance * assumptions.investment_return_rate;
        let savings = income_base - tax_base - expenses_base;
        let contribution = savings - deposit_base;

        state.invested_balance += growth + contribution;
        state.net_worth += savings + growth - deposit_base + equity_delta_base;

        let equity_base = match &state.house {
            Some(house) => housing_cv(house.equity)?.base_equivalent,
            None => 0.0,
        };

        debug!(
            "year {} ({}): gross {:.0}, tax {:.0}, expenses {:.0}, net worth {:.0}",
            year, phase.name, income_base, tax_base, expenses_base, state.net_worth
        );

        Ok(FinancialDataPoint {
            year,
            calendar_year,
            age: assumptions.start_age + year - 1,
            phase: phase.name.clone(),
            jurisdiction: phase.tax_system.clone(),
            currency: phase.currency,
            income,
            expenses,
            tax,
            investments: InvestmentBreakdown {
                contribution: base(contribution)?,
                growth: base(growth)?,
                balance: base(state.invested_balance)?,
                unvested_equity: local(state.vesting.unvested_after(year))?,
            },
            net_worth: NetWorthBreakdown {
                liquid: base(state.invested_balance)?,
                property_equity: base(equity_base)?,
                total: base(state.net_worth)?,
            },
        })
    }

    /// Steps (a) and (b): effective salary, bonus, RSU vesting, and rental
    /// income for the year
    fn income_for_year(
        &self,
        phase: &ResolvedPhase,
        year: u32,
        phase_year: u32,
        state: &mut ProjectionState,
    ) -> Result<YearLedger, ProjectionError> {
        let plan = self
            .salary_plan(phase, year)
            .map_err(|e| ProjectionError::new(year, "income", e))?;
        let adjustment = plan.adjustment_for(&phase.location);

        let salary = plan
            .salary_for_year(phase_year)
            .ok_or_else(|| {
                ProjectionError::new(
                    year,
                    "income",
                    TemplateError::InvalidShape {
                        template: phase.income.template.clone(),
                        reason: format!("no salary entry covers phase year {}", phase_year),
                    },
                )
            })?
            * adjustment.salary_multiplier;

        let bonus = salary * plan.bonus_pct_for_year(phase_year) * adjustment.bonus_multiplier;
        let rsu_grant = salary * plan.rsu_pct_for_year(phase_year) * adjustment.rsu_multiplier;
        state.vesting.grant(year, rsu_grant, plan.rsu_vesting_years);
        let rsu_vested = state.vesting.vested_in(year);

        let rental_local = match &state.house {
            Some(house) => house.annual_rental_income(&phase.location),
            None => 0.0,
        };

        Ok(YearLedger {
            salary,
            bonus,
            rsu_vested,
            rental_local,
            rent: 0.0,
            healthcare: 0.0,
            general: 0.0,
            retirement: 0.0,
            mortgage_payment_local: 0.0,
            deposit_local: 0.0,
            equity_delta_local: 0.0,
        })
    }

    /// Step (e): trigger the purchase on its year, then amortize
    fn housing_for_year(
        &self,
        phase: &ResolvedPhase,
        year: u32,
        state: &mut ProjectionState,
        ledger: &mut YearLedger,
    ) -> Result<(), ProjectionError> {
        let equity_before = state.house.as_ref().map(|h| h.equity).unwrap_or(0.0);
        let mut purchased_this_year = false;

        if let Some(plan) = &phase.housing {
            if state.house.is_none() && year == plan.purchase_year {
                let house = HouseState::purchase(plan);
                info!(
                    "year {}: purchased {} home for {:.0} {} (deposit {:.0})",
                    year, house.market, house.value, house.currency, house.equity
                );
                ledger.deposit_local = house.equity;
                state.house = Some(house);
                purchased_this_year = true;
            }
        }

        if !purchased_this_year {
            if let Some(house) = state.house.as_mut() {
                ledger.mortgage_payment_local = house.amortize_year();
            }
        }

        let equity_after = state.house.as_ref().map(|h| h.equity).unwrap_or(0.0);
        ledger.equity_delta_local = equity_after - equity_before;
        Ok(())
    }
}
