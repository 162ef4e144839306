//! Structural and cross-reference validation of resolved scenarios
//!
//! Validation never fails — it always returns a [`ValidationResult`] with
//! categorized diagnostics so a caller can render actionable messages and
//! decide per scenario whether to project.

use serde::Serialize;

use super::config::ResolvedScenario;
use crate::currency::RateTable;
use crate::tax::TaxRegistry;
use crate::template::TemplateStore;

/// Category of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiagnosticCategory {
    /// Shape problems: missing phases, broken tiling, zero durations
    Structure,
    /// Dangling ids: tax systems, templates, currencies
    Reference,
    /// Out-of-range numeric values
    Range,
}

/// One validation finding
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub message: String,
}

impl Diagnostic {
    fn new(category: DiagnosticCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// Outcome of validating one scenario
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, category: DiagnosticCategory, message: impl Into<String>) {
        self.errors.push(Diagnostic::new(category, message));
    }

    fn warn(&mut self, category: DiagnosticCategory, message: impl Into<String>) {
        self.warnings.push(Diagnostic::new(category, message));
    }

    /// One-line summary for logs and error messages
    pub fn summary(&self) -> String {
        if self.errors.is_empty() {
            "ok".into()
        } else {
            self.errors
                .iter()
                .map(|d| d.message.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        }
    }
}

/// Run every structural, reference, and range check over a resolved scenario
pub fn validate(
    scenario: &ResolvedScenario,
    templates: &TemplateStore,
    registry: &TaxRegistry,
    rates: &RateTable,
) -> ValidationResult {
    let mut result = ValidationResult::default();

    check_phase_tiling(scenario, &mut result);
    check_references(scenario, templates, registry, rates, &mut result);
    check_ranges(scenario, &mut result);

    result
}

/// The central temporal invariant: phases tile `[1, plan_duration_years]`
/// exactly, with no gaps or overlaps
fn check_phase_tiling(scenario: &ResolvedScenario, result: &mut ValidationResult) {
    let duration = scenario.assumptions.plan_duration_years;

    if scenario.phases.is_empty() {
        result.error(
            DiagnosticCategory::Structure,
            "scenario must have at least one phase",
        );
        return;
    }
    if duration == 0 {
        result.error(
            DiagnosticCategory::Range,
            "plan_duration_years must be at least 1",
        );
        return;
    }

    let mut expected_start = 1u32;
    for phase in &scenario.phases {
        if phase.end_year < phase.start_year {
            result.error(
                DiagnosticCategory::Structure,
                format!(
                    "phase '{}' has non-positive duration ({}..{})",
                    phase.name, phase.start_year, phase.end_year
                ),
            );
            return;
        }
        if phase.start_year != expected_start {
            result.error(
                DiagnosticCategory::Structure,
                format!(
                    "phase '{}' starts at year {} but year {} is next (gap or overlap)",
                    phase.name, phase.start_year, expected_start
                ),
            );
            return;
        }
        expected_start = phase.end_year + 1;
    }

    let covered = expected_start - 1;
    if covered != duration {
        result.error(
            DiagnosticCategory::Structure,
            format!(
                "phases cover years 1..={} but the plan lasts {} years",
                covered, duration
            ),
        );
    }
}

fn check_references(
    scenario: &ResolvedScenario,
    templates: &TemplateStore,
    registry: &TaxRegistry,
    rates: &RateTable,
    result: &mut ValidationResult,
) {
    for phase in &scenario.phases {
        if phase.location.is_empty() {
            result.error(
                DiagnosticCategory::Reference,
                format!("phase '{}' has no location id", phase.name),
            );
        }

        if !templates.contains(&phase.income.template) {
            result.error(
                DiagnosticCategory::Reference,
                format!(
                    "phase '{}' references unknown template '{}'",
                    phase.name, phase.income.template
                ),
            );
        }

        if !registry.contains(&phase.tax_system) {
            result.error(
                DiagnosticCategory::Reference,
                format!(
                    "phase '{}' references unknown tax system '{}'",
                    phase.name, phase.tax_system
                ),
            );
        } else if let Some(declared) = registry.currency_of(&phase.tax_system) {
            if declared != phase.currency {
                result.error(
                    DiagnosticCategory::Reference,
                    format!(
                        "phase '{}' books in {} but tax system '{}' declares {}",
                        phase.name, phase.currency, phase.tax_system, declared
                    ),
                );
            }
        }

        if !rates.has(phase.currency) {
            result.error(
                DiagnosticCategory::Reference,
                format!(
                    "phase '{}' currency {} has no exchange rate",
                    phase.name, phase.currency
                ),
            );
        }

        if let Some(housing) = &phase.housing {
            if !rates.has(housing.currency) {
                result.error(
                    DiagnosticCategory::Reference,
                    format!(
                        "phase '{}' housing currency {} has no exchange rate",
                        phase.name, housing.currency
                    ),
                );
            }
        }
    }
}

fn check_ranges(scenario: &ResolvedScenario, result: &mut ValidationResult) {
    let assumptions = &scenario.assumptions;
    let duration = assumptions.plan_duration_years;

    if assumptions.inflation_rate < 0.0 {
        result.error(DiagnosticCategory::Range, "inflation_rate must be >= 0");
    }
    if assumptions.investment_return_rate < -1.0 {
        result.error(
            DiagnosticCategory::Range,
            "investment_return_rate below -100%",
        );
    }
    if assumptions.student_loan_debt < 0.0 {
        result.error(DiagnosticCategory::Range, "student_loan_debt must be >= 0");
    }

    for phase in &scenario.phases {
        let expenses = &phase.expenses;
        for (label, amount) in [
            ("rent_monthly", expenses.rent_monthly),
            ("healthcare_monthly", expenses.healthcare_monthly),
            ("general_monthly", expenses.general_monthly),
            (
                "retirement_contribution_pct",
                expenses.retirement_contribution_pct,
            ),
        ] {
            if amount < 0.0 {
                result.error(
                    DiagnosticCategory::Range,
                    format!("phase '{}' expense {} must be >= 0", phase.name, label),
                );
            }
        }

        if let Some(housing) = &phase.housing {
            if housing.base_price <= 0.0 {
                result.error(
                    DiagnosticCategory::Range,
                    format!("phase '{}' housing base_price must be > 0", phase.name),
                );
            }
            if !(0.0..=1.0).contains(&housing.deposit_pct) {
                result.error(
                    DiagnosticCategory::Range,
                    format!("phase '{}' deposit_pct must be within [0, 1]", phase.name),
                );
            }
            if housing.mortgage_term_years == 0 {
                result.error(
                    DiagnosticCategory::Range,
                    format!("phase '{}' mortgage term must be >= 1 year", phase.name),
                );
            }
            if housing.purchase_year == 0 || housing.purchase_year > duration {
                result.warn(
                    DiagnosticCategory::Range,
                    format!(
                        "phase '{}' housing purchase year {} is outside the plan; \
                         the purchase will never trigger",
                        phase.name, housing.purchase_year
                    ),
                );
            }
        }
    }

    if let Some(marriage) = &scenario.goals.marriage {
        if marriage.end_year < marriage.start_year {
            result.error(
                DiagnosticCategory::Range,
                "marriage goal end_year precedes start_year",
            );
        }
        if marriage.total_cost < 0.0 {
            result.error(DiagnosticCategory::Range, "marriage total_cost must be >= 0");
        }
    }
    if scenario.goals.annual_travel < 0.0 {
        result.error(DiagnosticCategory::Range, "annual_travel must be >= 0");
    }
}
