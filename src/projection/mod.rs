//! Year-by-year projection: state machine, running state, output records

mod datapoint;
mod engine;
mod state;

pub use datapoint::{
    ExpenseBreakdown, FinancialDataPoint, FinancialScenario, GoalExpenseBreakdown,
    IncomeBreakdown, InvestmentBreakdown, NetWorthBreakdown, TaxValueBreakdown,
};
pub use engine::{PhaseTracker, ProjectionEngine, ProjectionPhase};
pub use state::{HouseState, ProjectionState, VestingPool};
