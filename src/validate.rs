//! Load-time validation pass (§4.2/§7): walks a [`Program`] and checks
//! everything that can be caught before a single command runs.
//!
//! Two checks compose here, deliberately kept separate from the strictly
//! structural ones in [`crate::ir`]:
//!
//! - [`CommandSeq::validate`] (already run by [`Program::validate`]) catches
//!   the append-target invariant — purely structural, no registry needed.
//! - This module additionally binds every decorator invocation's arguments
//!   against its declared schema, and every pattern invocation's branches
//!   against its declared [`PatternSchema`] — both genuinely fatal
//!   (`parameter-validation`, E1001) when the name resolves in the registry.
//!
//! An invocation of a name the registry has never heard of is **not** an
//! error here: §7 classifies `unknown-decorator` as a runtime failure the
//! chain evaluator reports as a non-zero `CommandResult`, not a load-time
//! abort, since the name might be registered by a plugin loaded after this
//! pass runs. `validate_program` only tightens the bolts it can see.

use crate::error::ClidefError;
use crate::ir::{ChainElement, ChainElementKind, CommandSeq, CommandStep, Program};
use crate::registry::{bind_args, DecoratorRegistry};

pub fn validate_program(program: &Program, registry: &DecoratorRegistry) -> Result<(), ClidefError> {
    program.validate()?;
    for seq in program.commands.values() {
        validate_sequence(seq, registry)?;
    }
    Ok(())
}

fn validate_sequence(seq: &CommandSeq, registry: &DecoratorRegistry) -> Result<(), ClidefError> {
    for step in &seq.steps {
        validate_step(step, registry)?;
    }
    Ok(())
}

fn validate_step(step: &CommandStep, registry: &DecoratorRegistry) -> Result<(), ClidefError> {
    for element in &step.elements {
        validate_element(element, registry)?;
    }
    Ok(())
}

fn validate_element(element: &ChainElement, registry: &DecoratorRegistry) -> Result<(), ClidefError> {
    let name = match &element.name {
        Some(n) => n.as_str(),
        None => return Ok(()),
    };

    match element.kind {
        ChainElementKind::Action => {
            if let Some(d) = registry.action(name) {
                bind_args(name, &d.schema(), &element.args)?;
            }
        }
        ChainElementKind::Block => {
            if let Some(d) = registry.block(name) {
                bind_args(name, &d.schema(), &element.args)?;
            }
            for step in &element.inner_steps {
                validate_step(step, registry)?;
            }
        }
        ChainElementKind::Pattern => {
            if let Some(d) = registry.pattern(name) {
                bind_args(name, &d.schema(), &element.args)?;
                d.pattern_schema().validate(name, &element.branches)?;
            }
            for seq in element.branches.values() {
                validate_sequence(seq, registry)?;
            }
        }
        ChainElementKind::Shell => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ElementContent, OpNext};
    use indexmap::IndexMap;

    fn program_with(command: &str, seq: CommandSeq) -> Program {
        let mut commands = IndexMap::new();
        commands.insert(command.to_string(), seq);
        Program { commands }
    }

    #[test]
    fn unknown_decorator_is_not_a_load_time_error() {
        let registry = DecoratorRegistry::with_builtins();
        let seq = CommandSeq::new(vec![CommandStep::new(vec![ChainElement::action(
            "totally-unregistered",
            vec![],
        )])]);
        let program = program_with("build", seq);
        assert!(validate_program(&program, &registry).is_ok());
    }

    #[test]
    fn missing_required_parameter_on_a_known_decorator_is_fatal() {
        let registry = DecoratorRegistry::with_builtins();
        let seq = CommandSeq::new(vec![CommandStep::new(vec![ChainElement::action("cmd", vec![])])]);
        let program = program_with("build", seq);
        assert!(validate_program(&program, &registry).is_err());
    }

    #[test]
    fn try_pattern_missing_main_branch_is_fatal() {
        let registry = DecoratorRegistry::with_builtins();
        let seq = CommandSeq::new(vec![CommandStep::new(vec![ChainElement::pattern(
            "try",
            vec![],
            IndexMap::new(),
        )])]);
        let program = program_with("build", seq);
        assert!(validate_program(&program, &registry).is_err());
    }

    #[test]
    fn valid_program_passes() {
        let registry = DecoratorRegistry::with_builtins();
        let seq = CommandSeq::new(vec![CommandStep::new(vec![ChainElement::shell(
            ElementContent::literal("echo hi"),
            OpNext::None,
        )])]);
        let program = program_with("build", seq);
        assert!(validate_program(&program, &registry).is_ok());
    }
}
