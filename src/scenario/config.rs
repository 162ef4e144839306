//! Scenario, phase, and goal documents plus their resolved forms
//!
//! Documents arrive as already-parsed structured data (the YAML/JSON loading
//! collaborator's job). `resolve_scenario` normalizes single- and
//! multi-phase shapes into one phase list with computed year spans and
//! checks every template reference up front.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::currency::Currency;
use crate::error::TemplateError;
use crate::template::{Bindings, TemplateStore};

/// Scenario identity and description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioMeta {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Plan-wide assumptions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanAssumptions {
    pub start_year: i32,
    pub plan_duration_years: u32,
    pub inflation_rate: f64,
    pub investment_return_rate: f64,
    pub start_age: u32,
    #[serde(default)]
    pub student_loan_debt: f64,
}

impl PlanAssumptions {
    /// Cumulative inflation multiplier for a 1-based plan year
    pub fn inflation_multiplier(&self, plan_year: u32) -> f64 {
        (1.0 + self.inflation_rate).powi(plan_year as i32 - 1)
    }
}

/// Reference to a named template with instance-level overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRef {
    pub template: String,
    #[serde(default)]
    pub overrides: Map<String, Value>,
}

/// Recurring location expenses; flat monthly amounts inflate with the plan's
/// inflation multiplier, the retirement contribution is a salary percentage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationExpenses {
    pub rent_monthly: f64,
    pub healthcare_monthly: f64,
    pub general_monthly: f64,
    #[serde(default)]
    pub retirement_contribution_pct: f64,
}

/// Which housing market a purchase draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HousingStrategy {
    UkHome,
    LocalHome,
}

/// Policy for extending a price-growth sequence beyond its declared length
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthExtension {
    /// Keep compounding with the last declared rate
    #[default]
    RepeatLast,
    /// No growth once the sequence is exhausted
    Zero,
}

/// Net rental income from a home while living elsewhere
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalIncome {
    pub monthly_rate: f64,
    pub management_fee_pct: f64,
    /// Credit rent only while the current phase is outside the home's market
    #[serde(default)]
    pub when_abroad: bool,
}

/// A planned home purchase with mortgage terms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HousingPlan {
    pub strategy: HousingStrategy,
    /// Location id of the housing market the purchase draws from
    pub market: String,
    /// 1-based plan year of purchase
    pub purchase_year: u32,
    pub base_price: f64,
    pub currency: Currency,
    /// Growth rate sequence; rate i+1 applies in compounding step i
    #[serde(default)]
    pub price_growth: Vec<f64>,
    #[serde(default)]
    pub growth_extension: GrowthExtension,
    pub deposit_pct: f64,
    pub mortgage_rate: f64,
    pub mortgage_term_years: u32,
    #[serde(default)]
    pub rental_income: Option<RentalIncome>,
}

impl HousingPlan {
    fn growth_rate(&self, step: usize) -> f64 {
        match self.price_growth.get(step) {
            Some(rate) => *rate,
            None => match self.growth_extension {
                GrowthExtension::RepeatLast => self.price_growth.last().copied().unwrap_or(0.0),
                GrowthExtension::Zero => 0.0,
            },
        }
    }

    /// Property price at the purchase year: the base price compounded
    /// through one growth step per elapsed plan year
    pub fn price_at_purchase(&self) -> f64 {
        let mut price = self.base_price;
        for step in 0..self.purchase_year.saturating_sub(1) as usize {
            price *= 1.0 + self.growth_rate(step);
        }
        price
    }

    pub fn deposit(&self) -> f64 {
        self.price_at_purchase() * self.deposit_pct
    }

    /// Fixed monthly payment from the standard annuity formula
    pub fn monthly_payment(&self, principal: f64) -> f64 {
        let monthly_rate = self.mortgage_rate / 12.0;
        let n = (self.mortgage_term_years * 12) as f64;
        if monthly_rate == 0.0 {
            return principal / n;
        }
        principal * (monthly_rate * (1.0 + monthly_rate).powf(n))
            / ((1.0 + monthly_rate).powf(n) - 1.0)
    }

    pub fn annual_payment(&self, principal: f64) -> f64 {
        self.monthly_payment(principal) * 12.0
    }

    /// Net annual rental income while abroad, if configured
    pub fn annual_rental_income(&self, abroad: bool) -> f64 {
        match &self.rental_income {
            Some(rental) if rental.when_abroad && abroad => {
                rental.monthly_rate * 12.0 * (1.0 - rental.management_fee_pct)
            }
            _ => 0.0,
        }
    }
}

/// One contiguous span of plan years in a fixed location/jurisdiction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseDocument {
    pub name: String,
    /// Span length in years
    pub duration: u32,
    pub location: String,
    pub tax_system: String,
    pub currency: Currency,
    pub income: TemplateRef,
    pub expenses: LocationExpenses,
    #[serde(default)]
    pub housing: Option<HousingPlan>,
    /// Phase parameters bound into template placeholder expressions
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Single-phase convenience shape: phase fields at the document top level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinglePhaseFields {
    pub location: String,
    pub tax_system: String,
    pub currency: Currency,
    pub income: TemplateRef,
    pub expenses: LocationExpenses,
    #[serde(default)]
    pub housing: Option<HousingPlan>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// University fee payment in a single year
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniversityFee {
    pub year: u32,
    pub amount: f64,
}

/// Marriage cost spread evenly over an inclusive year range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarriageGoal {
    pub total_cost: f64,
    pub start_year: u32,
    pub end_year: u32,
}

/// One-off cost at the start year plus an ongoing annual cost after it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildCosts {
    pub start_year: u32,
    pub one_off_cost: f64,
    pub ongoing_annual_cost: f64,
}

/// Year-keyed amounts with an explicit default fallback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalExpenses {
    #[serde(default)]
    pub by_year: BTreeMap<u32, f64>,
    pub default: f64,
}

impl PersonalExpenses {
    pub fn amount_for(&self, plan_year: u32) -> f64 {
        self.by_year.get(&plan_year).copied().unwrap_or(self.default)
    }
}

/// Parental support switching amount around the house purchase year
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentalSupport {
    pub before_house: f64,
    pub after_house: f64,
    pub house_purchase_year: u32,
}

/// Universal goal-based expenses, independent of location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalSchedule {
    #[serde(default)]
    pub university_fee: Option<UniversityFee>,
    #[serde(default)]
    pub marriage: Option<MarriageGoal>,
    #[serde(default)]
    pub child: Option<ChildCosts>,
    #[serde(default)]
    pub personal_expenses: Option<PersonalExpenses>,
    #[serde(default)]
    pub parental_support: Option<ParentalSupport>,
    #[serde(default)]
    pub annual_travel: f64,
}

/// Goal costs for one plan year
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GoalCosts {
    pub university: f64,
    pub marriage: f64,
    pub child: f64,
    pub personal: f64,
    pub parental_support: f64,
    pub travel: f64,
}

impl GoalCosts {
    pub fn total(&self) -> f64 {
        self.university + self.marriage + self.child + self.personal + self.parental_support
            + self.travel
    }
}

impl GoalSchedule {
    /// Goal costs for a plan year; ongoing amounts scale with the inflation
    /// multiplier, one-off commitments (fees, the marriage spread, the child
    /// one-off) are already nominal
    pub fn costs_for_year(&self, plan_year: u32, inflation_multiplier: f64) -> GoalCosts {
        let mut costs = GoalCosts::default();

        if let Some(fee) = &self.university_fee {
            if plan_year == fee.year {
                costs.university = fee.amount;
            }
        }

        if let Some(marriage) = &self.marriage {
            if plan_year >= marriage.start_year && plan_year <= marriage.end_year {
                let span = (marriage.end_year - marriage.start_year + 1) as f64;
                costs.marriage = marriage.total_cost / span;
            }
        }

        if let Some(child) = &self.child {
            if plan_year == child.start_year {
                costs.child = child.one_off_cost;
            } else if plan_year > child.start_year {
                costs.child = child.ongoing_annual_cost * inflation_multiplier;
            }
        }

        if let Some(personal) = &self.personal_expenses {
            costs.personal = personal.amount_for(plan_year) * inflation_multiplier;
        }

        if let Some(support) = &self.parental_support {
            let amount = if plan_year >= support.house_purchase_year {
                support.after_house
            } else {
                support.before_house
            };
            costs.parental_support = amount * inflation_multiplier;
        }

        costs.travel = self.annual_travel * inflation_multiplier;
        costs
    }
}

/// Scenario document as supplied by the configuration collaborator
///
/// Multi-phase scenarios list `phases`; single-phase scenarios put the phase
/// fields at the top level instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDocument {
    pub scenario: ScenarioMeta,
    pub assumptions: PlanAssumptions,
    #[serde(default)]
    pub phases: Vec<PhaseDocument>,
    #[serde(flatten)]
    pub single_phase: Option<SinglePhaseFields>,
    #[serde(default)]
    pub goals: GoalSchedule,
}

/// Salary progression type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressionKind {
    YearlyOverrides,
    CompoundRate,
}

/// Per-year overrides of the progression's computed values
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct YearOverride {
    #[serde(default)]
    pub salary: Option<f64>,
    #[serde(default, alias = "bonus")]
    pub bonus_pct: Option<f64>,
    #[serde(default, alias = "rsu")]
    pub rsu_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionConfig {
    #[serde(rename = "type")]
    pub kind: ProgressionKind,
    #[serde(default)]
    pub rate: Option<f64>,
    #[serde(default)]
    pub overrides: BTreeMap<u32, YearOverride>,
}

/// Salary/bonus/RSU multipliers for one location market
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarketAdjustment {
    #[serde(default = "one")]
    pub salary_multiplier: f64,
    #[serde(default = "one")]
    pub bonus_multiplier: f64,
    #[serde(default = "one")]
    pub rsu_multiplier: f64,
}

fn one() -> f64 {
    1.0
}

impl Default for MarketAdjustment {
    fn default() -> Self {
        Self {
            salary_multiplier: 1.0,
            bonus_multiplier: 1.0,
            rsu_multiplier: 1.0,
        }
    }
}

/// Typed form of a resolved salary template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalaryPlan {
    pub base_salary: f64,
    pub progression: ProgressionConfig,
    #[serde(default)]
    pub bonus_pct: f64,
    #[serde(default)]
    pub rsu_pct: f64,
    /// Years over which each RSU grant vests; 1 means the whole grant lands
    /// in the year it is made
    #[serde(default = "default_vesting_years")]
    pub rsu_vesting_years: u32,
    #[serde(default)]
    pub market_adjustments: HashMap<String, MarketAdjustment>,
}

fn default_vesting_years() -> u32 {
    1
}

impl SalaryPlan {
    /// Multipliers for a location, identity when none are declared
    pub fn adjustment_for(&self, location: &str) -> MarketAdjustment {
        self.market_adjustments
            .get(location)
            .copied()
            .unwrap_or_default()
    }

    /// Effective salary for a 1-based year within the phase, before market
    /// adjustment
    ///
    /// `compound_rate` grows the base salary by the configured rate each
    /// year; an explicit year entry always wins. `yearly_overrides` looks up
    /// the exact year, falling back to the nearest earlier entry.
    pub fn salary_for_year(&self, phase_year: u32) -> Option<f64> {
        let explicit = self
            .progression
            .overrides
            .get(&phase_year)
            .and_then(|o| o.salary);

        match self.progression.kind {
            ProgressionKind::CompoundRate => Some(explicit.unwrap_or_else(|| {
                let rate = self.progression.rate.unwrap_or(0.0);
                self.base_salary * (1.0 + rate).powi(phase_year as i32 - 1)
            })),
            ProgressionKind::YearlyOverrides => explicit.or_else(|| {
                self.progression
                    .overrides
                    .range(..=phase_year)
                    .rev()
                    .find_map(|(_, o)| o.salary)
            }),
        }
    }

    pub fn bonus_pct_for_year(&self, phase_year: u32) -> f64 {
        self.progression
            .overrides
            .get(&phase_year)
            .and_then(|o| o.bonus_pct)
            .unwrap_or(self.bonus_pct)
    }

    pub fn rsu_pct_for_year(&self, phase_year: u32) -> f64 {
        self.progression
            .overrides
            .get(&phase_year)
            .and_then(|o| o.rsu_pct)
            .unwrap_or(self.rsu_pct)
    }
}

/// A phase with its computed year span
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedPhase {
    pub name: String,
    /// Inclusive 1-based span within the plan
    pub start_year: u32,
    pub end_year: u32,
    pub location: String,
    pub tax_system: String,
    pub currency: Currency,
    pub income: TemplateRef,
    pub expenses: LocationExpenses,
    pub housing: Option<HousingPlan>,
    pub params: Map<String, Value>,
}

impl ResolvedPhase {
    pub fn duration(&self) -> u32 {
        self.end_year.saturating_sub(self.start_year).saturating_add(1)
    }

    pub fn contains_year(&self, plan_year: u32) -> bool {
        plan_year >= self.start_year && plan_year <= self.end_year
    }

    pub fn bindings(&self) -> Bindings {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Fully resolved scenario: normalized phases with spans, verified template
/// references, and the scenario's goal schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedScenario {
    pub meta: ScenarioMeta,
    pub assumptions: PlanAssumptions,
    pub phases: Vec<ResolvedPhase>,
    pub goals: GoalSchedule,
    /// Names of the templates composed into this scenario
    pub composition: Vec<String>,
}

impl ResolvedScenario {
    pub fn phase_for_year(&self, plan_year: u32) -> Option<(usize, &ResolvedPhase)> {
        self.phases
            .iter()
            .enumerate()
            .find(|(_, phase)| phase.contains_year(plan_year))
    }
}

/// Normalize a scenario document and verify its template references
///
/// Phases tile cumulatively from year 1; a single-phase document becomes one
/// phase spanning the whole plan. Each phase's salary template is resolved
/// once at its start year to fail fast on dangling references, circular
/// inheritance, and malformed shapes.
pub fn resolve_scenario(
    doc: &ScenarioDocument,
    templates: &TemplateStore,
) -> Result<ResolvedScenario, TemplateError> {
    let phase_docs: Vec<PhaseDocument> = if !doc.phases.is_empty() {
        doc.phases.clone()
    } else if let Some(single) = &doc.single_phase {
        vec![PhaseDocument {
            name: "main".into(),
            duration: doc.assumptions.plan_duration_years,
            location: single.location.clone(),
            tax_system: single.tax_system.clone(),
            currency: single.currency,
            income: single.income.clone(),
            expenses: single.expenses.clone(),
            housing: single.housing.clone(),
            params: single.params.clone(),
        }]
    } else {
        Vec::new()
    };

    let mut phases = Vec::with_capacity(phase_docs.len());
    let mut composition = Vec::new();
    let mut next_start = 1u32;

    for phase_doc in &phase_docs {
        let start_year = next_start;
        let end_year = start_year + phase_doc.duration.saturating_sub(1);
        next_start = end_year + 1;

        let phase = ResolvedPhase {
            name: phase_doc.name.clone(),
            start_year,
            end_year,
            location: phase_doc.location.clone(),
            tax_system: phase_doc.tax_system.clone(),
            currency: phase_doc.currency,
            income: phase_doc.income.clone(),
            expenses: phase_doc.expenses.clone(),
            housing: phase_doc.housing.clone(),
            params: phase_doc.params.clone(),
        };

        // Fail fast: the template must resolve and parse at the phase start
        resolve_salary_plan(templates, &phase, start_year)?;
        composition.push(phase_doc.income.template.clone());

        phases.push(phase);
    }

    composition.sort();
    composition.dedup();

    Ok(ResolvedScenario {
        meta: doc.scenario.clone(),
        assumptions: doc.assumptions.clone(),
        phases,
        goals: doc.goals.clone(),
        composition,
    })
}

/// Resolve a phase's salary template for a plan year and parse it
pub fn resolve_salary_plan(
    templates: &TemplateStore,
    phase: &ResolvedPhase,
    plan_year: u32,
) -> Result<SalaryPlan, TemplateError> {
    let config = templates.resolve(
        &phase.income.template,
        &phase.income.overrides,
        &phase.bindings(),
        plan_year,
    )?;
    serde_json::from_value(Value::Object(config.params.clone())).map_err(|e| {
        TemplateError::InvalidShape {
            template: phase.income.template.clone(),
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_compound_rate_progression() {
        let plan = SalaryPlan {
            base_salary: 55_000.0,
            progression: ProgressionConfig {
                kind: ProgressionKind::CompoundRate,
                rate: Some(0.05),
                overrides: BTreeMap::new(),
            },
            bonus_pct: 0.10,
            rsu_pct: 0.0,
            rsu_vesting_years: 4,
            market_adjustments: HashMap::new(),
        };
        assert_relative_eq!(plan.salary_for_year(1).unwrap(), 55_000.0);
        assert_relative_eq!(plan.salary_for_year(3).unwrap(), 55_000.0 * 1.05 * 1.05);
    }

    #[test]
    fn test_explicit_entry_beats_compound_rate() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            2,
            YearOverride {
                salary: Some(70_000.0),
                ..YearOverride::default()
            },
        );
        let plan = SalaryPlan {
            base_salary: 55_000.0,
            progression: ProgressionConfig {
                kind: ProgressionKind::CompoundRate,
                rate: Some(0.05),
                overrides,
            },
            bonus_pct: 0.0,
            rsu_pct: 0.0,
            rsu_vesting_years: 4,
            market_adjustments: HashMap::new(),
        };
        assert_relative_eq!(plan.salary_for_year(2).unwrap(), 70_000.0);
        assert_relative_eq!(plan.salary_for_year(3).unwrap(), 55_000.0 * 1.05f64.powi(2));
    }

    #[test]
    fn test_yearly_overrides_falls_back_to_nearest_earlier() {
        let mut overrides = BTreeMap::new();
        for (year, salary) in [(1, 100_000.0), (2, 110_000.0), (5, 150_000.0)] {
            overrides.insert(
                year,
                YearOverride {
                    salary: Some(salary),
                    ..YearOverride::default()
                },
            );
        }
        let plan = SalaryPlan {
            base_salary: 0.0,
            progression: ProgressionConfig {
                kind: ProgressionKind::YearlyOverrides,
                rate: None,
                overrides,
            },
            bonus_pct: 0.0,
            rsu_pct: 0.0,
            rsu_vesting_years: 4,
            market_adjustments: HashMap::new(),
        };
        assert_relative_eq!(plan.salary_for_year(2).unwrap(), 110_000.0);
        assert_relative_eq!(plan.salary_for_year(4).unwrap(), 110_000.0);
        assert_relative_eq!(plan.salary_for_year(9).unwrap(), 150_000.0);
    }

    #[test]
    fn test_housing_price_compounds_growth_sequence() {
        let plan = HousingPlan {
            strategy: HousingStrategy::UkHome,
            market: "uk".into(),
            purchase_year: 5,
            base_price: 600_000.0,
            currency: Currency::Gbp,
            price_growth: vec![0.01, 0.04, 0.06, 0.06],
            growth_extension: GrowthExtension::RepeatLast,
            deposit_pct: 0.20,
            mortgage_rate: 0.0525,
            mortgage_term_years: 25,
            rental_income: None,
        };
        let expected = 600_000.0 * 1.01 * 1.04 * 1.06 * 1.06;
        assert_relative_eq!(plan.price_at_purchase(), expected, epsilon = 1e-6);
        assert_relative_eq!(plan.deposit(), expected * 0.20, epsilon = 1e-6);
    }

    #[test]
    fn test_growth_extension_policies() {
        let mut plan = HousingPlan {
            strategy: HousingStrategy::LocalHome,
            market: "seattle".into(),
            purchase_year: 6,
            base_price: 100_000.0,
            currency: Currency::Usd,
            price_growth: vec![0.03, 0.04],
            growth_extension: GrowthExtension::RepeatLast,
            deposit_pct: 0.25,
            mortgage_rate: 0.065,
            mortgage_term_years: 30,
            rental_income: None,
        };
        // Five steps: 0.03, 0.04, then last rate repeated three times
        let repeated = 100_000.0 * 1.03 * 1.04 * 1.04f64.powi(3);
        assert_relative_eq!(plan.price_at_purchase(), repeated, epsilon = 1e-6);

        plan.growth_extension = GrowthExtension::Zero;
        let flat = 100_000.0 * 1.03 * 1.04;
        assert_relative_eq!(plan.price_at_purchase(), flat, epsilon = 1e-6);
    }

    #[test]
    fn test_mortgage_payment_annuity_formula() {
        let plan = HousingPlan {
            strategy: HousingStrategy::UkHome,
            market: "uk".into(),
            purchase_year: 1,
            base_price: 600_000.0,
            currency: Currency::Gbp,
            price_growth: vec![],
            growth_extension: GrowthExtension::RepeatLast,
            deposit_pct: 0.20,
            mortgage_rate: 0.0525,
            mortgage_term_years: 25,
            rental_income: None,
        };
        let principal = 480_000.0;
        let monthly = plan.monthly_payment(principal);
        // Standard annuity reference value
        let r: f64 = 0.0525 / 12.0;
        let n = 300.0;
        let reference = principal * (r * (1.0f64 + r).powf(n)) / ((1.0f64 + r).powf(n) - 1.0);
        assert_relative_eq!(monthly, reference, epsilon = 1e-9);

        // Paying the fixed payment for the full term clears the balance
        let mut balance = principal;
        for _ in 0..300 {
            let interest = balance * r;
            balance = balance + interest - monthly;
        }
        assert!(balance.abs() < 1e-4, "residual balance {}", balance);
    }

    #[test]
    fn test_rental_income_only_when_abroad() {
        let plan = HousingPlan {
            strategy: HousingStrategy::UkHome,
            market: "uk".into(),
            purchase_year: 1,
            base_price: 500_000.0,
            currency: Currency::Gbp,
            price_growth: vec![],
            growth_extension: GrowthExtension::RepeatLast,
            deposit_pct: 0.2,
            mortgage_rate: 0.05,
            mortgage_term_years: 25,
            rental_income: Some(RentalIncome {
                monthly_rate: 2_000.0,
                management_fee_pct: 0.10,
                when_abroad: true,
            }),
        };
        assert_relative_eq!(plan.annual_rental_income(true), 2_000.0 * 12.0 * 0.9);
        assert_eq!(plan.annual_rental_income(false), 0.0);
    }

    #[test]
    fn test_goal_costs_schedule() {
        let goals = GoalSchedule {
            university_fee: Some(UniversityFee {
                year: 1,
                amount: 16_800.0,
            }),
            marriage: Some(MarriageGoal {
                total_cost: 70_000.0,
                start_year: 3,
                end_year: 4,
            }),
            child: Some(ChildCosts {
                start_year: 7,
                one_off_cost: 8_500.0,
                ongoing_annual_cost: 10_000.0,
            }),
            personal_expenses: Some(PersonalExpenses {
                by_year: BTreeMap::from([(1, 6_000.0), (2, 9_000.0)]),
                default: 12_000.0,
            }),
            parental_support: Some(ParentalSupport {
                before_house: 12_000.0,
                after_house: 6_000.0,
                house_purchase_year: 5,
            }),
            annual_travel: 3_000.0,
        };

        let y1 = goals.costs_for_year(1, 1.0);
        assert_relative_eq!(y1.university, 16_800.0);
        assert_relative_eq!(y1.personal, 6_000.0);
        assert_eq!(y1.marriage, 0.0);
        assert_eq!(y1.child, 0.0);
        assert_relative_eq!(y1.parental_support, 12_000.0);

        let y3 = goals.costs_for_year(3, 1.0);
        assert_relative_eq!(y3.marriage, 35_000.0);
        assert_relative_eq!(y3.personal, 12_000.0); // default fallback

        let y7 = goals.costs_for_year(7, 1.0);
        assert_relative_eq!(y7.child, 8_500.0);
        let y8 = goals.costs_for_year(8, 1.1);
        assert_relative_eq!(y8.child, 11_000.0);
        assert_relative_eq!(y8.parental_support, 6_600.0); // after house, inflated
    }

    #[test]
    fn test_single_phase_document_normalizes() {
        let doc: ScenarioDocument = serde_json::from_value(json!({
            "scenario": { "id": "uk_only", "name": "UK Only" },
            "assumptions": {
                "start_year": 2025,
                "plan_duration_years": 10,
                "inflation_rate": 0.025,
                "investment_return_rate": 0.065,
                "start_age": 24,
                "student_loan_debt": 57000.0
            },
            "location": "uk",
            "tax_system": "uk_income_tax_ni",
            "currency": "GBP",
            "income": { "template": "uk_graduate" },
            "expenses": {
                "rent_monthly": 1200.0,
                "healthcare_monthly": 0.0,
                "general_monthly": 1000.0
            }
        }))
        .unwrap();

        let mut templates = TemplateStore::new();
        templates.insert(crate::template::Template {
            name: "uk_graduate".into(),
            version: 1,
            extends: None,
            params: serde_json::from_value(json!({
                "base_salary": 55000.0,
                "progression": { "type": "compound_rate", "rate": 0.05 }
            }))
            .unwrap(),
            overrides: BTreeMap::new(),
        });

        let resolved = resolve_scenario(&doc, &templates).unwrap();
        assert_eq!(resolved.phases.len(), 1);
        assert_eq!(resolved.phases[0].start_year, 1);
        assert_eq!(resolved.phases[0].end_year, 10);
        assert_eq!(resolved.composition, vec!["uk_graduate".to_string()]);
    }

    #[test]
    fn test_multi_phase_spans_tile_cumulatively() {
        let mut templates = TemplateStore::new();
        templates.insert(crate::template::Template {
            name: "t".into(),
            version: 1,
            extends: None,
            params: serde_json::from_value(json!({
                "base_salary": 50000.0,
                "progression": { "type": "compound_rate", "rate": 0.0 }
            }))
            .unwrap(),
            overrides: BTreeMap::new(),
        });

        let phase = |name: &str, duration: u32| PhaseDocument {
            name: name.into(),
            duration,
            location: "uk".into(),
            tax_system: "uk_income_tax_ni".into(),
            currency: Currency::Gbp,
            income: TemplateRef {
                template: "t".into(),
                overrides: Map::new(),
            },
            expenses: LocationExpenses {
                rent_monthly: 0.0,
                healthcare_monthly: 0.0,
                general_monthly: 0.0,
                retirement_contribution_pct: 0.0,
            },
            housing: None,
            params: Map::new(),
        };

        let doc = ScenarioDocument {
            scenario: ScenarioMeta {
                id: "mp".into(),
                name: "multi".into(),
                description: String::new(),
            },
            assumptions: PlanAssumptions {
                start_year: 2025,
                plan_duration_years: 10,
                inflation_rate: 0.02,
                investment_return_rate: 0.065,
                start_age: 24,
                student_loan_debt: 0.0,
            },
            phases: vec![phase("uk", 4), phase("abroad", 6)],
            single_phase: None,
            goals: GoalSchedule::default(),
        };

        let resolved = resolve_scenario(&doc, &templates).unwrap();
        assert_eq!(
            resolved
                .phases
                .iter()
                .map(|p| (p.start_year, p.end_year))
                .collect::<Vec<_>>(),
            vec![(1, 4), (5, 10)]
        );
        assert_eq!(resolved.phase_for_year(4).unwrap().1.name, "uk");
        assert_eq!(resolved.phase_for_year(5).unwrap().1.name, "abroad");
    }

    #[test]
    fn test_dangling_template_reference_fails_fast() {
        let doc: ScenarioDocument = serde_json::from_value(json!({
            "scenario": { "id": "x", "name": "x" },
            "assumptions": {
                "start_year": 2025,
                "plan_duration_years": 5,
                "inflation_rate": 0.02,
                "investment_return_rate": 0.065,
                "start_age": 30
            },
            "location": "uk",
            "tax_system": "uk_income_tax_ni",
            "currency": "GBP",
            "income": { "template": "missing" },
            "expenses": {
                "rent_monthly": 0.0,
                "healthcare_monthly": 0.0,
                "general_monthly": 0.0
            }
        }))
        .unwrap();

        let err = resolve_scenario(&doc, &TemplateStore::new()).unwrap_err();
        assert!(matches!(err, TemplateError::NotFound(_)));
    }
}
