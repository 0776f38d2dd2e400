//! Decorator registry and the four decorator-kind capability traits.
//!
//! Modeled the way the teacher models its command handlers: a small
//! capability trait per kind (no inheritance), looked up by name out of a
//! plain map built once at construction and never mutated afterward — the
//! spec calls this out explicitly as "global, read-only-after-init".

use crate::ctx::{CommandResult, Ctx};
use crate::error::ClidefError;
use crate::ir::{Arg, ArgValue, Branches, CommandSeq};
use crate::plan::ExecutionStep;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Duration,
    Identifier,
}

#[derive(Debug, Clone, Copy)]
pub struct ParameterDef {
    pub name: &'static str,
    pub ty: ParamType,
    pub required: bool,
    pub description: &'static str,
}

/// Ordered parameter list a decorator declares; also used by the generator
/// to validate calls it emits and by `plan` mode to preview arguments.
#[derive(Debug, Clone, Default)]
pub struct ParameterSchema(pub Vec<ParameterDef>);

/// Branch-name constraints for a pattern decorator (`@try`'s fixed
/// `main`/`catch`/`finally` vs `@when`'s arbitrary-plus-`default`).
#[derive(Debug, Clone, Default)]
pub struct PatternSchema {
    pub allowed: Vec<&'static str>,
    pub required: Vec<&'static str>,
    pub at_least_one_of: Vec<&'static str>,
    pub wildcard: Option<&'static str>,
    pub arbitrary_identifiers: bool,
}

impl PatternSchema {
    pub fn validate(&self, decorator: &str, branches: &Branches) -> Result<(), ClidefError> {
        for req in &self.required {
            if !branches.contains_key(*req) {
                return Err(ClidefError::parameter_validation(
                    decorator,
                    format!("missing required branch '{req}'"),
                ));
            }
        }
        if !self.at_least_one_of.is_empty()
            && !self.at_least_one_of.iter().any(|b| branches.contains_key(*b))
        {
            return Err(ClidefError::parameter_validation(
                decorator,
                format!(
                    "at least one of [{}] must be present",
                    self.at_least_one_of.join(", ")
                ),
            ));
        }
        if !self.arbitrary_identifiers {
            for name in branches.keys() {
                let is_wildcard = self.wildcard == Some(name.as_str());
                if !is_wildcard && !self.allowed.contains(&name.as_str()) {
                    return Err(ClidefError::parameter_validation(
                        decorator,
                        format!("branch '{name}' is not allowed here"),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Import names a decorator's `generate`-mode emission depends on, fed to
/// the generator to compute the emitted module's import set.
#[derive(Debug, Clone, Default)]
pub struct ImportRequirements(pub Vec<&'static str>);

/// Resolved, validated arguments handed to a decorator implementation.
/// Positional args bind to schema slots in declaration order; named args
/// bind by name — mirrors how the spec describes `Args` as "ordered, each
/// with optional name".
#[derive(Debug, Clone, Default)]
pub struct ArgBindings(HashMap<String, ArgValue>);

impl ArgBindings {
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(ArgValue::as_str)
    }

    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(ArgValue::as_number)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(ArgValue::as_bool)
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.0.get(name)
    }
}

/// Binds an ordered arg list against a schema: positional args fill unnamed
/// slots in order, named args fill by name, unknowns and missing-required
/// are `parameter-validation` errors.
pub fn bind_args(
    decorator: &str,
    schema: &ParameterSchema,
    args: &[Arg],
) -> Result<ArgBindings, ClidefError> {
    let mut bound = HashMap::new();
    let mut positional_idx = 0usize;
    let slot_names: Vec<&str> = schema.0.iter().map(|p| p.name).collect();

    for arg in args {
        let slot = match &arg.name {
            Some(n) => {
                if !slot_names.contains(&n.as_str()) {
                    return Err(ClidefError::parameter_validation(
                        decorator,
                        format!("unknown parameter '{n}'"),
                    ));
                }
                n.clone()
            }
            None => {
                let name = slot_names.get(positional_idx).ok_or_else(|| {
                    ClidefError::parameter_validation(
                        decorator,
                        "too many positional arguments",
                    )
                })?;
                positional_idx += 1;
                name.to_string()
            }
        };
        bound.insert(slot, arg.value.clone());
    }

    for def in &schema.0 {
        if def.required && !bound.contains_key(def.name) {
            return Err(ClidefError::parameter_validation(
                decorator,
                format!("missing required parameter '{}'", def.name),
            ));
        }
    }

    Ok(ArgBindings(bound))
}

#[async_trait]
pub trait ValueDecorator: Send + Sync {
    fn name(&self) -> &'static str;
    fn schema(&self) -> ParameterSchema;
    async fn expand(&self, ctx: &Ctx, args: &[Arg]) -> Result<String, ClidefError>;
    fn import_requirements(&self) -> ImportRequirements {
        ImportRequirements::default()
    }
}

#[async_trait]
pub trait ActionDecorator: Send + Sync {
    fn name(&self) -> &'static str;
    fn schema(&self) -> ParameterSchema;
    async fn run(&self, ctx: &Ctx, args: &[Arg]) -> CommandResult;
    fn describe(&self, ctx: &Ctx, args: &[Arg]) -> ExecutionStep;
    fn import_requirements(&self) -> ImportRequirements {
        ImportRequirements::default()
    }
}

#[async_trait]
pub trait BlockDecorator: Send + Sync {
    fn name(&self) -> &'static str;
    fn schema(&self) -> ParameterSchema;
    async fn wrap_commands(&self, ctx: &Ctx, args: &[Arg], inner: &CommandSeq) -> CommandResult;
    /// Async so a decorator's own branch/inner-step description can resolve
    /// value decorators the same way `plan::build_sequence` does for
    /// ordinary chain elements (§8 invariant 1: plan's leaves must match
    /// what interpret mode actually attempts).
    async fn describe(&self, ctx: &Ctx, args: &[Arg], inner_step: ExecutionStep) -> ExecutionStep;
    fn import_requirements(&self) -> ImportRequirements {
        ImportRequirements::default()
    }
}

#[async_trait]
pub trait PatternDecorator: Send + Sync {
    fn name(&self) -> &'static str;
    fn schema(&self) -> ParameterSchema;
    fn pattern_schema(&self) -> PatternSchema;
    async fn select_branch(&self, ctx: &Ctx, args: &[Arg], branches: &Branches) -> CommandResult;
    async fn describe(&self, ctx: &Ctx, args: &[Arg], branches: &Branches) -> ExecutionStep;
    fn import_requirements(&self) -> ImportRequirements {
        ImportRequirements::default()
    }
}

/// Typed lookup for the four decorator kinds. Built once via
/// [`DecoratorRegistry::with_builtins`] and never mutated after — lookups
/// are plain `HashMap::get`, no locking required.
#[derive(Default)]
pub struct DecoratorRegistry {
    values: HashMap<&'static str, Arc<dyn ValueDecorator>>,
    actions: HashMap<&'static str, Arc<dyn ActionDecorator>>,
    blocks: HashMap<&'static str, Arc<dyn BlockDecorator>>,
    patterns: HashMap<&'static str, Arc<dyn PatternDecorator>>,
}

impl DecoratorRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        crate::decorators::install_builtins(&mut registry);
        registry
    }

    pub fn register_value(&mut self, d: Arc<dyn ValueDecorator>) {
        self.values.insert(d.name(), d);
    }

    pub fn register_action(&mut self, d: Arc<dyn ActionDecorator>) {
        self.actions.insert(d.name(), d);
    }

    pub fn register_block(&mut self, d: Arc<dyn BlockDecorator>) {
        self.blocks.insert(d.name(), d);
    }

    pub fn register_pattern(&mut self, d: Arc<dyn PatternDecorator>) {
        self.patterns.insert(d.name(), d);
    }

    pub fn value(&self, name: &str) -> Option<&Arc<dyn ValueDecorator>> {
        self.values.get(name)
    }

    pub fn action(&self, name: &str) -> Option<&Arc<dyn ActionDecorator>> {
        self.actions.get(name)
    }

    pub fn block(&self, name: &str) -> Option<&Arc<dyn BlockDecorator>> {
        self.blocks.get(name)
    }

    pub fn pattern(&self, name: &str) -> Option<&Arc<dyn PatternDecorator>> {
        self.patterns.get(name)
    }
}
