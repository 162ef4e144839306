//! fincast - Template-driven multi-phase financial projection engine
//!
//! This library provides:
//! - Template resolution with inheritance, year-keyed overrides, and safe
//!   placeholder expressions
//! - Jurisdiction-specific tax strategies (UK, US federal/state/city,
//!   tax-free) behind a registry keyed by jurisdiction id
//! - Multi-currency bookkeeping with immutable base-currency equivalents
//! - Scenario validation with categorized diagnostics
//! - Year-by-year projection across location phases: income progression,
//!   goal expenses, housing amortization, investment growth, net worth

pub mod catalog;
pub mod currency;
pub mod error;
pub mod projection;
pub mod runner;
pub mod scenario;
pub mod tax;
pub mod template;

// Re-export commonly used types
pub use currency::{Currency, CurrencyValue, RateTable};
pub use projection::{FinancialDataPoint, FinancialScenario, ProjectionEngine, ProjectionPhase};
pub use runner::{ResolutionCache, ScenarioRunner};
pub use scenario::{ResolvedScenario, ScenarioDocument, ValidationResult};
pub use tax::{TaxBreakdown, TaxRegistry};
pub use template::{Template, TemplateStore};
