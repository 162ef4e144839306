//! Batch scenario runner with memoized template resolution
//!
//! Holds the template store, tax registry, and rate table once and runs many
//! scenario documents against them. Scenarios are independent, so the batch
//! entry points have partial-failure semantics — one bad scenario never
//! blocks the rest — and the parallel variant hands each scenario to its own
//! rayon worker with no locking beyond the read-mostly resolution cache.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use log::{debug, warn};
use rayon::prelude::*;

use crate::currency::RateTable;
use crate::error::{ScenarioError, TemplateError};
use crate::projection::{FinancialScenario, ProjectionEngine};
use crate::scenario::{
    resolve_salary_plan, resolve_scenario, validate, ResolvedPhase, SalaryPlan, ScenarioDocument,
};
use crate::tax::TaxRegistry;
use crate::template::TemplateStore;

/// Process-wide memo of resolved salary plans
///
/// Keyed by a content hash of the template reference, the phase parameters,
/// and the computation year. Entries are immutable after insertion, so the
/// cache is safe to share across concurrent projection runs behind a
/// read-write lock.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: RwLock<HashMap<u64, Arc<SalaryPlan>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn content_key(phase: &ResolvedPhase, year: u32) -> u64 {
        let mut hasher = DefaultHasher::new();
        phase.income.template.hash(&mut hasher);
        // serde_json maps serialize key-sorted, so overrides and params
        // hash deterministically for identical documents
        serde_json::to_string(&phase.income.overrides)
            .unwrap_or_default()
            .hash(&mut hasher);
        serde_json::to_string(&phase.params)
            .unwrap_or_default()
            .hash(&mut hasher);
        year.hash(&mut hasher);
        hasher.finish()
    }

    /// Resolve a phase's salary plan through the cache
    pub fn salary_plan(
        &self,
        templates: &TemplateStore,
        phase: &ResolvedPhase,
        year: u32,
    ) -> Result<Arc<SalaryPlan>, TemplateError> {
        let key = Self::content_key(phase, year);

        let read = self.entries.read().unwrap_or_else(|e| e.into_inner());
        if let Some(plan) = read.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(plan.clone());
        }
        drop(read);

        self.misses.fetch_add(1, Ordering::Relaxed);
        let plan = Arc::new(resolve_salary_plan(templates, phase, year)?);
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, plan.clone());
        Ok(plan)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Pre-loaded runner for projecting many scenarios efficiently
pub struct ScenarioRunner {
    templates: TemplateStore,
    registry: TaxRegistry,
    rates: RateTable,
    cache: ResolutionCache,
}

impl ScenarioRunner {
    pub fn new(templates: TemplateStore, registry: TaxRegistry, rates: RateTable) -> Self {
        Self {
            templates,
            registry,
            rates,
            cache: ResolutionCache::new(),
        }
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Resolve, validate, and project one scenario document
    ///
    /// Validation findings never abort the call by themselves: a scenario
    /// with errors returns `ScenarioError::Validation`, warnings ride along
    /// on the output.
    pub fn run(&self, doc: &ScenarioDocument) -> Result<FinancialScenario, ScenarioError> {
        let resolved = resolve_scenario(doc, &self.templates)?;
        let validation = validate(&resolved, &self.templates, &self.registry, &self.rates);

        if !validation.is_valid() {
            warn!(
                "scenario '{}' failed validation: {}",
                resolved.meta.id,
                validation.summary()
            );
            return Err(ScenarioError::Validation {
                scenario: resolved.meta.id.clone(),
                summary: validation.summary(),
            });
        }
        for diagnostic in &validation.warnings {
            debug!("scenario '{}': {}", resolved.meta.id, diagnostic.message);
        }

        let engine = ProjectionEngine::new(&self.templates, &self.registry, &self.rates)
            .with_cache(&self.cache);
        let data_points = engine.project(&resolved)?;

        Ok(FinancialScenario {
            id: resolved.meta.id,
            name: resolved.meta.name,
            description: resolved.meta.description,
            validation,
            composition: resolved.composition,
            data_points,
        })
    }

    /// Run a batch sequentially with partial-failure semantics
    pub fn run_batch(
        &self,
        docs: &[ScenarioDocument],
    ) -> Vec<Result<FinancialScenario, ScenarioError>> {
        docs.iter().map(|doc| self.run(doc)).collect()
    }

    /// Run a batch with one rayon worker per scenario
    ///
    /// Safe because each scenario operates on its own immutable resolved
    /// configuration and produces its own output sequence.
    pub fn run_batch_parallel(
        &self,
        docs: &[ScenarioDocument],
    ) -> Vec<Result<FinancialScenario, ScenarioError>> {
        docs.par_iter().map(|doc| self.run(doc)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn runner() -> ScenarioRunner {
        let mut registry = TaxRegistry::new();
        for doc in catalog::default_tax_systems() {
            registry.register(&doc).unwrap();
        }
        ScenarioRunner::new(
            catalog::default_templates(),
            registry,
            catalog::default_rates(),
        )
    }

    #[test]
    fn test_run_demo_scenario() {
        let runner = runner();
        let scenario = runner.run(&catalog::demo_scenario()).unwrap();
        assert_eq!(scenario.data_points.len(), 10);
        assert!(scenario.validation.is_valid());
        assert!(!scenario.composition.is_empty());
    }

    #[test]
    fn test_rerun_produces_fresh_equal_scenario() {
        let runner = runner();
        let doc = catalog::demo_scenario();
        let a = runner.run(&doc).unwrap();
        let b = runner.run(&doc).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_batch_partial_failure() {
        let runner = runner();
        let good = catalog::demo_scenario();
        let mut bad = catalog::demo_scenario();
        bad.phases[0].tax_system = "atlantis".into();

        let results = runner.run_batch(&[bad, good]);
        assert!(results[0].is_err());
        assert!(results[1].is_ok(), "a bad scenario must not block others");
    }

    #[test]
    fn test_parallel_batch_matches_sequential() {
        let runner = runner();
        let docs = vec![
            catalog::demo_scenario(),
            catalog::demo_uk_scenario(),
            catalog::demo_scenario(),
        ];
        let sequential = runner.run_batch(&docs);
        let parallel = runner.run_batch_parallel(&docs);
        for (s, p) in sequential.iter().zip(&parallel) {
            match (s, p) {
                (Ok(a), Ok(b)) => assert_eq!(
                    serde_json::to_string(a).unwrap(),
                    serde_json::to_string(b).unwrap()
                ),
                (Err(_), Err(_)) => {}
                _ => panic!("sequential and parallel outcomes diverged"),
            }
        }
    }

    #[test]
    fn test_resolution_cache_hits_on_repeat() {
        let runner = runner();
        let doc = catalog::demo_scenario();
        runner.run(&doc).unwrap();
        let misses_after_first = runner.cache().misses();
        runner.run(&doc).unwrap();
        assert_eq!(
            runner.cache().misses(),
            misses_after_first,
            "second run should be served entirely from cache"
        );
        assert!(runner.cache().hit_rate() > 0.0);
    }

    #[test]
    fn test_validation_failure_reported_per_scenario() {
        let runner = runner();
        let mut bad = catalog::demo_scenario();
        bad.phases[0].expenses.rent_monthly = -5.0;
        match runner.run(&bad) {
            Err(ScenarioError::Validation { scenario, summary }) => {
                assert_eq!(scenario, "uk_to_seattle");
                assert!(summary.contains("rent_monthly"));
            }
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }
}
