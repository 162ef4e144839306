//! Built-in tax systems, templates, rates, and demo scenarios
//!
//! In-memory defaults mirroring the documents an external configuration
//! loader would supply: UK 2025/26 bands, US 2025 federal brackets and FICA,
//! New York state/city tables, a tax-free jurisdiction, and two demo
//! scenario documents used by the binary and the test-suite.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use crate::currency::{Currency, RateTable};
use crate::scenario::{
    ChildCosts, GoalSchedule, GrowthExtension, HousingPlan, HousingStrategy, LocationExpenses,
    MarriageGoal, ParentalSupport, PersonalExpenses, PhaseDocument, PlanAssumptions, RentalIncome,
    ScenarioDocument, ScenarioMeta, SinglePhaseFields, TemplateRef, UniversityFee,
};
use crate::tax::{
    Bracket, FederalConfig, FicaConfig, LocalTaxTable, NiBands, NiRates, SimpleBracket,
    StudentLoanConfig, TaxBands, TaxRates, TaxSystemConfig, TaxSystemDocument, TaxVariant,
};
use crate::template::{Template, TemplateStore};

fn plan2_student_loan() -> StudentLoanConfig {
    StudentLoanConfig {
        threshold: 28_470.0,
        repayment_rate: 0.09,
        interest_rate_rpi: 0.043,
        interest_rate_max_premium: 0.03,
        interest_lower_income_threshold: 28_470.0,
        interest_upper_income_threshold: 51_245.0,
    }
}

fn federal_brackets_2025() -> Vec<Bracket> {
    vec![
        Bracket { limit: Some(11_925.0), rate: 0.10, base: 0.0 },
        Bracket { limit: Some(48_475.0), rate: 0.12, base: 1_192.50 },
        Bracket { limit: Some(96_950.0), rate: 0.22, base: 5_595.50 },
        Bracket { limit: Some(206_700.0), rate: 0.24, base: 17_843.50 },
        Bracket { limit: Some(394_600.0), rate: 0.32, base: 46_253.50 },
        Bracket { limit: Some(626_350.0), rate: 0.35, base: 104_755.50 },
        Bracket { limit: None, rate: 0.37, base: 186_601.50 },
    ]
}

fn fica_2025() -> FicaConfig {
    FicaConfig {
        social_security_rate: 0.062,
        social_security_wage_cap: 176_100.0,
        medicare_rate: 0.0145,
        additional_medicare_rate: 0.009,
        additional_medicare_threshold: 200_000.0,
    }
}

fn ny_state_brackets() -> Vec<SimpleBracket> {
    vec![
        SimpleBracket { limit: Some(8_500.0), rate: 0.04 },
        SimpleBracket { limit: Some(11_700.0), rate: 0.045 },
        SimpleBracket { limit: Some(13_900.0), rate: 0.0525 },
        SimpleBracket { limit: Some(80_650.0), rate: 0.055 },
        SimpleBracket { limit: Some(215_400.0), rate: 0.06 },
        SimpleBracket { limit: Some(1_077_550.0), rate: 0.0685 },
        SimpleBracket { limit: None, rate: 0.0965 },
    ]
}

fn nyc_city_brackets() -> Vec<SimpleBracket> {
    vec![
        SimpleBracket { limit: Some(12_000.0), rate: 0.03078 },
        SimpleBracket { limit: Some(25_000.0), rate: 0.03762 },
        SimpleBracket { limit: Some(50_000.0), rate: 0.03819 },
        SimpleBracket { limit: None, rate: 0.03876 },
    ]
}

/// Tax system documents for the built-in jurisdictions
pub fn default_tax_systems() -> Vec<TaxSystemDocument> {
    vec![
        TaxSystemDocument {
            id: "uk_income_tax_ni".into(),
            currency: Currency::Gbp,
            variant: TaxVariant::Uk,
            components: vec![
                "income_tax".into(),
                "national_insurance".into(),
                "student_loan".into(),
            ],
            config: TaxSystemConfig {
                bands: Some(TaxBands {
                    personal_allowance: 12_570.0,
                    basic_rate_limit: 50_270.0,
                    higher_rate_limit: 125_140.0,
                    pa_taper_threshold: 100_000.0,
                    threshold_freeze_until: Some(2028),
                }),
                rates: Some(TaxRates {
                    basic: 0.20,
                    higher: 0.40,
                    additional: 0.45,
                }),
                ni_bands: Some(NiBands {
                    primary_threshold: 12_570.0,
                    upper_earnings_limit: 50_270.0,
                }),
                ni_rates: Some(NiRates {
                    main: 0.08,
                    upper: 0.02,
                }),
                inflation_rate: 0.02,
                student_loan: Some(plan2_student_loan()),
                ..TaxSystemConfig::default()
            },
        },
        TaxSystemDocument {
            id: "us_federal_state".into(),
            currency: Currency::Usd,
            variant: TaxVariant::UsState,
            components: vec!["federal_tax".into(), "fica".into()],
            config: TaxSystemConfig {
                federal: Some(FederalConfig {
                    standard_deduction: 15_000.0,
                    brackets: federal_brackets_2025(),
                }),
                fica: Some(fica_2025()),
                ..TaxSystemConfig::default()
            },
        },
        TaxSystemDocument {
            id: "us_federal_state_city".into(),
            currency: Currency::Usd,
            variant: TaxVariant::UsState,
            components: vec![
                "federal_tax".into(),
                "fica".into(),
                "state_tax".into(),
                "city_tax".into(),
            ],
            config: TaxSystemConfig {
                federal: Some(FederalConfig {
                    standard_deduction: 15_000.0,
                    brackets: federal_brackets_2025(),
                }),
                fica: Some(fica_2025()),
                state: Some(LocalTaxTable {
                    kind: Some("progressive".into()),
                    brackets: ny_state_brackets(),
                }),
                city: Some(LocalTaxTable {
                    kind: Some("progressive".into()),
                    brackets: nyc_city_brackets(),
                }),
                ..TaxSystemConfig::default()
            },
        },
        TaxSystemDocument {
            id: "tax_free".into(),
            currency: Currency::Usd,
            variant: TaxVariant::TaxFree,
            components: vec!["student_loan".into()],
            config: TaxSystemConfig {
                student_loan: Some(plan2_student_loan()),
                ..TaxSystemConfig::default()
            },
        },
    ]
}

fn as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Built-in salary templates
pub fn default_templates() -> TemplateStore {
    let mut store = TemplateStore::new();

    store.insert(Template {
        name: "uk_graduate".into(),
        version: 1,
        extends: None,
        params: as_map(json!({
            "base_salary": 55_000.0,
            "progression": {
                "type": "compound_rate",
                "rate": 0.08,
                "overrides": { "2": { "salary": 67_500.0 } }
            },
            "bonus_pct": 0.125
        })),
        overrides: BTreeMap::new(),
    });

    // Seattle big-tech package; the salary ladder comes straight from the
    // relocation research notes
    store.insert(Template {
        name: "seattle_tech".into(),
        version: 1,
        extends: None,
        params: as_map(json!({
            "base_salary": 100_000.0,
            "progression": {
                "type": "yearly_overrides",
                "overrides": {
                    "1": { "salary": 100_000.0 },
                    "2": { "salary": 110_000.0 },
                    "3": { "salary": 120_000.0 },
                    "4": { "salary": 150_000.0 },
                    "5": { "salary": 180_000.0 },
                    "6": { "salary": 200_000.0 },
                    "7": { "salary": 200_000.0 },
                    "8": { "salary": 220_000.0 },
                    "9": { "salary": 220_000.0 },
                    "10": { "salary": 240_000.0 }
                }
            },
            "bonus_pct": 0.10,
            "rsu_pct": 0.25,
            "notes": "relocation after UK year {{ uk_years }}",
            "market_adjustments": {
                "seattle": { "salary_multiplier": 1.1 }
            }
        })),
        // Year-keyed template override: bonus steps up in plan year 8
        overrides: BTreeMap::from([(8, as_map(json!({ "bonus_pct": 0.15 })))]),
    });

    store
}

/// Exchange rates for the configured jurisdictions, quoted per GBP
pub fn default_rates() -> RateTable {
    RateTable::new(NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"))
        .with_rate(Currency::Usd, 1.26)
        .with_rate(Currency::Eur, 1.15)
}

fn default_goals() -> GoalSchedule {
    GoalSchedule {
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
            after_house: 12_000.0,
            house_purchase_year: 5,
        }),
        annual_travel: 3_000.0,
    }
}

fn default_assumptions() -> PlanAssumptions {
    PlanAssumptions {
        start_year: 2025,
        plan_duration_years: 10,
        inflation_rate: 0.025,
        investment_return_rate: 0.065,
        start_age: 24,
        student_loan_debt: 57_000.0,
    }
}

/// Demo multi-phase scenario: four UK years, then Seattle with a UK home
/// purchased in year 5 and let out while abroad
pub fn demo_scenario() -> ScenarioDocument {
    let uk_phase = PhaseDocument {
        name: "uk".into(),
        duration: 4,
        location: "uk".into(),
        tax_system: "uk_income_tax_ni".into(),
        currency: Currency::Gbp,
        income: TemplateRef {
            template: "uk_graduate".into(),
            overrides: Map::new(),
        },
        expenses: LocationExpenses {
            rent_monthly: 1_200.0,
            healthcare_monthly: 0.0,
            general_monthly: 1_000.0,
            retirement_contribution_pct: 0.05,
        },
        housing: None,
        params: Map::new(),
    };

    let seattle_phase = PhaseDocument {
        name: "seattle".into(),
        duration: 6,
        location: "seattle".into(),
        tax_system: "us_federal_state".into(),
        currency: Currency::Usd,
        income: TemplateRef {
            template: "seattle_tech".into(),
            overrides: Map::new(),
        },
        expenses: LocationExpenses {
            rent_monthly: 2_200.0,
            healthcare_monthly: 500.0,
            general_monthly: 2_000.0,
            retirement_contribution_pct: 0.06,
        },
        housing: Some(HousingPlan {
            strategy: HousingStrategy::UkHome,
            market: "uk".into(),
            purchase_year: 5,
            base_price: 575_000.0,
            currency: Currency::Gbp,
            price_growth: vec![0.01, 0.04, 0.06, 0.06],
            growth_extension: GrowthExtension::RepeatLast,
            deposit_pct: 0.25,
            mortgage_rate: 0.0525,
            mortgage_term_years: 25,
            rental_income: Some(RentalIncome {
                monthly_rate: 2_000.0,
                management_fee_pct: 0.10,
                when_abroad: true,
            }),
        }),
        params: as_map(json!({ "uk_years": 4 })),
    };

    ScenarioDocument {
        scenario: ScenarioMeta {
            id: "uk_to_seattle".into(),
            name: "UK to Seattle (move year 5, buy UK home)".into(),
            description: "Four UK years, relocate to Seattle, buy a UK home in year 5".into(),
        },
        assumptions: default_assumptions(),
        phases: vec![uk_phase, seattle_phase],
        single_phase: None,
        goals: default_goals(),
    }
}

/// Demo single-phase UK scenario with a year-5 home purchase
pub fn demo_uk_scenario() -> ScenarioDocument {
    ScenarioDocument {
        scenario: ScenarioMeta {
            id: "uk_baseline".into(),
            name: "UK baseline".into(),
            description: "Stay in the UK, buy a home in year 5".into(),
        },
        assumptions: default_assumptions(),
        phases: Vec::new(),
        single_phase: Some(SinglePhaseFields {
            location: "uk".into(),
            tax_system: "uk_income_tax_ni".into(),
            currency: Currency::Gbp,
            income: TemplateRef {
                template: "uk_graduate".into(),
                overrides: Map::new(),
            },
            expenses: LocationExpenses {
                rent_monthly: 1_200.0,
                healthcare_monthly: 0.0,
                general_monthly: 1_000.0,
                retirement_contribution_pct: 0.05,
            },
            housing: Some(HousingPlan {
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
            }),
            params: Map::new(),
        }),
        goals: default_goals(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::TaxRegistry;

    #[test]
    fn test_default_tax_systems_register() {
        let mut registry = TaxRegistry::new();
        for doc in default_tax_systems() {
            registry.register(&doc).unwrap();
        }
        for id in [
            "uk_income_tax_ni",
            "us_federal_state",
            "us_federal_state_city",
            "tax_free",
        ] {
            assert!(registry.contains(id), "missing {}", id);
        }
    }

    #[test]
    fn test_default_templates_present() {
        let store = default_templates();
        assert!(store.contains("uk_graduate"));
        assert!(store.contains("seattle_tech"));
    }

    #[test]
    fn test_demo_documents_round_trip_json() {
        for doc in [demo_scenario(), demo_uk_scenario()] {
            let text = serde_json::to_string(&doc).unwrap();
            let back: ScenarioDocument = serde_json::from_str(&text).unwrap();
            assert_eq!(doc.scenario.id, back.scenario.id);
            assert_eq!(doc.phases.len(), back.phases.len());
        }
    }
}
