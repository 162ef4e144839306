//! Error taxonomy for template resolution, tax calculation, and projection

use thiserror::Error;

use crate::currency::Currency;

/// Errors from evaluating a placeholder expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("unexpected token at '{0}'")]
    UnexpectedToken(String),

    #[error("trailing input after expression: '{0}'")]
    TrailingInput(String),

    #[error("identifier '{0}' is bound to a non-numeric value and cannot be used in arithmetic")]
    NonNumericOperand(String),

    #[error("division by zero")]
    DivisionByZero,
}

/// Errors from resolving a template into an effective configuration
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template '{0}' not found")]
    NotFound(String),

    #[error("circular inheritance detected at template '{0}'")]
    CircularInheritance(String),

    #[error("unresolved placeholder '{placeholder}' in template '{template}'")]
    UnresolvedPlaceholder { template: String, placeholder: String },

    #[error("placeholder expression failed in template '{template}': {source}")]
    Expression {
        template: String,
        #[source]
        source: ExpressionError,
    },

    #[error("template '{template}' resolved to an invalid shape: {reason}")]
    InvalidShape { template: String, reason: String },
}

/// Errors from currency normalization
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurrencyError {
    #[error("no exchange rate for {0} in rate table")]
    MissingRate(Currency),

    #[error("exchange rate for {0} must be positive, got {1}")]
    InvalidRate(Currency, f64),
}

/// Errors from tax computation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaxError {
    #[error("no tax system registered for jurisdiction '{0}'")]
    UnsupportedJurisdiction(String),

    #[error("malformed bracket table in '{component}': {reason}")]
    MalformedBrackets { component: String, reason: String },
}

/// Error aborting a single scenario's projection
///
/// Carries the plan year and the pipeline component that failed so a caller
/// can surface an actionable diagnosis.
#[derive(Debug, Error)]
#[error("projection failed in year {year} ({component}): {source}")]
pub struct ProjectionError {
    pub year: u32,
    pub component: &'static str,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl ProjectionError {
    pub fn new<E>(year: u32, component: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            year,
            component,
            source: Box::new(source),
        }
    }
}

/// Top-level error for running a scenario end to end
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("scenario '{scenario}' failed validation: {summary}")]
    Validation { scenario: String, summary: String },

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}
