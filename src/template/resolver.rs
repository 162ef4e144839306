//! Template store and resolution into effective configurations
//!
//! A template is a named, immutable parameter document. Resolution composes,
//! in order: the template's inheritance chain (`extends`), its year-keyed
//! `overrides` section, instance-level overrides, and finally placeholder
//! substitution against phase parameters. Instance overrides always win over
//! template defaults; composition of non-colliding keys is order-independent.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::expr::{self, Bindings};
use crate::error::TemplateError;

/// A named, versioned parameter document
///
/// Immutable once registered; many scenario instances may reference one
/// template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub version: u32,
    /// Parent template whose parameters this one refines
    #[serde(default)]
    pub extends: Option<String>,
    /// Base parameter set
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Plan-year keyed parameter overrides
    #[serde(default)]
    pub overrides: BTreeMap<u32, Map<String, Value>>,
}

/// Fully expanded, placeholder-free configuration for one scenario/phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveConfig {
    pub template: String,
    pub params: Map<String, Value>,
}

impl EffectiveConfig {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(Value::as_f64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// Registry of loaded templates, keyed by name
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: HashMap<String, Template>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Resolve a template into an effective configuration
    ///
    /// Resolution order: inherited base parameters, then `overrides[year]`
    /// if the computation year has an entry, then instance overrides, then
    /// placeholder substitution via the expression evaluator.
    pub fn resolve(
        &self,
        name: &str,
        instance_overrides: &Map<String, Value>,
        phase_params: &Bindings,
        year: u32,
    ) -> Result<EffectiveConfig, TemplateError> {
        let mut visited = HashSet::new();
        let mut params = self.inherited_params(name, &mut visited)?;

        let template = self
            .templates
            .get(name)
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))?;
        if let Some(year_overrides) = template.overrides.get(&year) {
            deep_merge(&mut params, year_overrides);
        }

        deep_merge(&mut params, instance_overrides);

        let params = substitute_map(name, params, phase_params)?;

        Ok(EffectiveConfig {
            template: name.to_string(),
            params,
        })
    }

    /// Walk the `extends` chain root-first, deep-merging child over parent
    ///
    /// The visited set turns a self-referencing chain into a
    /// `CircularInheritance` error rather than unbounded recursion.
    fn inherited_params(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
    ) -> Result<Map<String, Value>, TemplateError> {
        if !visited.insert(name.to_string()) {
            return Err(TemplateError::CircularInheritance(name.to_string()));
        }

        let template = self
            .templates
            .get(name)
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))?;

        let mut params = match &template.extends {
            Some(parent) => self.inherited_params(parent, visited)?,
            None => Map::new(),
        };
        deep_merge(&mut params, &template.params);
        Ok(params)
    }
}

/// Deep merge: objects merge recursively, any other value replaces
fn deep_merge(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        let merged = match (base.get(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                let mut combined = existing.clone();
                deep_merge(&mut combined, incoming);
                Value::Object(combined)
            }
            _ => value.clone(),
        };
        base.insert(key.clone(), merged);
    }
}

fn substitute_map(
    template: &str,
    params: Map<String, Value>,
    bindings: &Bindings,
) -> Result<Map<String, Value>, TemplateError> {
    params
        .into_iter()
        .map(|(key, value)| Ok((key, substitute_value(template, value, bindings)?)))
        .collect()
}

fn substitute_value(
    template: &str,
    value: Value,
    bindings: &Bindings,
) -> Result<Value, TemplateError> {
    match value {
        Value::String(s) => substitute_string(template, &s, bindings),
        Value::Object(map) => Ok(Value::Object(substitute_map(template, map, bindings)?)),
        Value::Array(items) => Ok(Value::Array(
            items
                .into_iter()
                .map(|item| substitute_value(template, item, bindings))
                .collect::<Result<_, _>>()?,
        )),
        other => Ok(other),
    }
}

/// Expand `{{ expr }}` placeholders in a string value
///
/// A value that is exactly one placeholder keeps the evaluated type (number
/// or string); placeholders embedded in longer text are rendered inline.
fn substitute_string(
    template: &str,
    input: &str,
    bindings: &Bindings,
) -> Result<Value, TemplateError> {
    if !input.contains("{{") {
        return Ok(Value::String(input.to_string()));
    }

    let trimmed = input.trim();
    if trimmed.starts_with("{{")
        && trimmed.ends_with("}}")
        && !trimmed[2..trimmed.len() - 2].contains("{{")
    {
        let inner = &trimmed[2..trimmed.len() - 2];
        let evaluated = expr::evaluate(inner, bindings).map_err(|source| {
            TemplateError::Expression {
                template: template.to_string(),
                source,
            }
        })?;
        return Ok(evaluated.into_json());
    }

    let mut output = String::new();
    let mut rest = input;
    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| TemplateError::UnresolvedPlaceholder {
                template: template.to_string(),
                placeholder: rest[start..].to_string(),
            })?;
        let inner = &after[..end];
        let evaluated =
            expr::evaluate(inner, bindings).map_err(|source| TemplateError::Expression {
                template: template.to_string(),
                source,
            })?;
        output.push_str(&evaluated.render());
        rest = &after[end + 2..];
    }
    output.push_str(rest);
    Ok(Value::String(output))
}
