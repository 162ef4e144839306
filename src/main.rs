//! fincast CLI
//!
//! Loads a scenario document (or falls back to the built-in demo), runs
//! validation and projection, prints a per-year table, and writes the full
//! records to CSV.

use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use fincast::catalog;
use fincast::projection::FinancialScenario;
use fincast::scenario::ScenarioDocument;
use fincast::tax::TaxRegistry;
use fincast::ScenarioRunner;

#[derive(Parser)]
#[command(name = "fincast", about = "Template-driven financial projection")]
struct Args {
    /// Scenario document (JSON); the built-in demo runs when omitted
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Output CSV path for the per-year records
    #[arg(short, long, default_value = "projection_output.csv")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let doc: ScenarioDocument = match &args.scenario {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("opening scenario {}", path.display()))?;
            serde_json::from_reader(file)
                .with_context(|| format!("parsing scenario {}", path.display()))?
        }
        None => catalog::demo_scenario(),
    };

    let mut registry = TaxRegistry::new();
    for system in catalog::default_tax_systems() {
        registry
            .register(&system)
            .with_context(|| format!("registering tax system {}", system.id))?;
    }
    let runner = ScenarioRunner::new(
        catalog::default_templates(),
        registry,
        catalog::default_rates(),
    );

    println!("fincast v{}", env!("CARGO_PKG_VERSION"));
    println!("Scenario: {} ({})", doc.scenario.name, doc.scenario.id);
    println!();

    let scenario = runner.run(&doc)?;
    print_table(&scenario);
    write_csv(&scenario, &args.output)?;
    println!("\nFull records written to: {}", args.output.display());

    println!("\nSummary:");
    println!("  Years projected: {}", scenario.data_points.len());
    println!(
        "  Total tax paid: {:.0} GBP",
        scenario.total_tax_base()
    );
    println!(
        "  Average annual savings: {:.0} GBP",
        scenario.average_annual_savings_base()
    );
    println!(
        "  Final net worth: {:.0} GBP",
        scenario.final_net_worth_base()
    );

    Ok(())
}

fn print_table(scenario: &FinancialScenario) {
    println!(
        "{:>4} {:>6} {:>4} {:>10} {:>5} {:>12} {:>12} {:>12} {:>12} {:>14}",
        "Year", "CalYr", "Age", "Phase", "Ccy", "Income", "Tax", "Expenses", "Savings", "Net Worth"
    );
    println!("{}", "-".repeat(102));

    for point in &scenario.data_points {
        let income = point.income.total_base();
        let tax = point.tax.total_base();
        let expenses = point.expenses.total_base();
        println!(
            "{:>4} {:>6} {:>4} {:>10} {:>5} {:>12.0} {:>12.0} {:>12.0} {:>12.0} {:>14.0}",
            point.year,
            point.calendar_year,
            point.age,
            point.phase,
            point.currency.code(),
            income,
            tax,
            expenses,
            income - tax - expenses,
            point.net_worth.total.base_equivalent,
        );
    }
}

fn write_csv(scenario: &FinancialScenario, path: &PathBuf) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    writer.write_record([
        "year",
        "calendar_year",
        "age",
        "phase",
        "jurisdiction",
        "currency",
        "salary",
        "bonus",
        "rsu_vested",
        "rental",
        "income_tax",
        "social_security",
        "student_loan",
        "state_tax",
        "city_tax",
        "rent",
        "healthcare",
        "general",
        "retirement",
        "mortgage",
        "goal_expenses",
        "investment_growth",
        "invested_balance",
        "property_equity",
        "net_worth",
    ])?;

    for p in &scenario.data_points {
        writer.write_record([
            p.year.to_string(),
            p.calendar_year.to_string(),
            p.age.to_string(),
            p.phase.clone(),
            p.jurisdiction.clone(),
            p.currency.code().to_string(),
            format!("{:.2}", p.income.salary.base_equivalent),
            format!("{:.2}", p.income.bonus.base_equivalent),
            format!("{:.2}", p.income.rsu_vested.base_equivalent),
            format!("{:.2}", p.income.rental.base_equivalent),
            format!("{:.2}", p.tax.income_tax.base_equivalent),
            format!("{:.2}", p.tax.social_security.base_equivalent),
            format!("{:.2}", p.tax.student_loan.base_equivalent),
            format!("{:.2}", p.tax.state_tax.base_equivalent),
            format!("{:.2}", p.tax.city_tax.base_equivalent),
            format!("{:.2}", p.expenses.rent.base_equivalent),
            format!("{:.2}", p.expenses.healthcare.base_equivalent),
            format!("{:.2}", p.expenses.general.base_equivalent),
            format!("{:.2}", p.expenses.retirement_contribution.base_equivalent),
            format!("{:.2}", p.expenses.housing.base_equivalent),
            format!("{:.2}", p.expenses.goals.total_base()),
            format!("{:.2}", p.investments.growth.base_equivalent),
            format!("{:.2}", p.investments.balance.base_equivalent),
            format!("{:.2}", p.net_worth.property_equity.base_equivalent),
            format!("{:.2}", p.net_worth.total.base_equivalent),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
