//! Template composition: placeholder expressions and resolution

pub mod expr;
mod resolver;

pub use expr::{evaluate, Bindings, ExprValue};
pub use resolver::{EffectiveConfig, Template, TemplateStore};
