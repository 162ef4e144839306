//! Scenario documents, resolution, and validation

mod config;
mod validate;

pub use config::{
    resolve_salary_plan, resolve_scenario, ChildCosts, GoalCosts, GoalSchedule, GrowthExtension,
    HousingPlan, HousingStrategy, LocationExpenses, MarketAdjustment, MarriageGoal,
    ParentalSupport, PersonalExpenses, PhaseDocument, PlanAssumptions, ProgressionConfig,
    ProgressionKind, RentalIncome, ResolvedPhase, ResolvedScenario, SalaryPlan, ScenarioDocument,
    ScenarioMeta, SinglePhaseFields, TemplateRef, UniversityFee, YearOverride,
};
pub use validate::{validate, Diagnostic, DiagnosticCategory, ValidationResult};
