//! `@cmd` (action): invokes another declared command with the *current*
//! `Ctx` — no isolation; shadowing only happens via child contexts from
//! other decorators already in scope (§4.5).

use crate::ctx::{Ctx, CommandResult};
use crate::error::{ClidefError, ErrorCode};
use crate::ir::Arg;
use crate::plan::{ExecutionStep, StepType};
use crate::registry::{bind_args, ActionDecorator, ImportRequirements, ParamType, ParameterDef, ParameterSchema};
use async_trait::async_trait;

pub struct CmdDecorator;

#[async_trait]
impl ActionDecorator for CmdDecorator {
    fn name(&self) -> &'static str {
        "cmd"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema(vec![ParameterDef {
            name: "name",
            ty: ParamType::Identifier,
            required: true,
            description: "name of a declared command to invoke",
        }])
    }

    async fn run(&self, ctx: &Ctx, args: &[Arg]) -> CommandResult {
        let bound = match bind_args("cmd", &self.schema(), args) {
            Ok(b) => b,
            Err(e) => return CommandResult::failure(1, e.to_string()),
        };
        let name = bound.get_str("name").expect("required parameter validated by bind_args");
        match ctx.commands().get(name) {
            Some(seq) => crate::chain::execute_sequence(ctx, seq).await,
            None => {
                let err = ClidefError::runtime(ErrorCode::UnknownCommand, format!("command '{name}' is not declared"));
                CommandResult::failure(1, err.to_string())
            }
        }
    }

    fn describe(&self, _ctx: &Ctx, args: &[Arg]) -> ExecutionStep {
        let name = args
            .iter()
            .find_map(|a| a.value.as_str())
            .unwrap_or("?");
        ExecutionStep::leaf("0", StepType::Decorator, format!("@cmd(name={name})"))
    }

    fn import_requirements(&self) -> ImportRequirements {
        ImportRequirements::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ArgValue, ChainElement, CommandStep, ElementContent, OpNext};
    use crate::registry::DecoratorRegistry;
    use crate::testsupport::test_ctx;
    use indexmap::IndexMap;
    use std::sync::Arc;

    fn name_arg(v: &str) -> Vec<Arg> {
        vec![Arg {
            name: None,
            value: ArgValue::Identifier(v.to_string()),
        }]
    }

    #[tokio::test]
    async fn runs_the_named_command() {
        let mut commands = IndexMap::new();
        commands.insert(
            "greet".to_string(),
            crate::ir::CommandSeq::new(vec![CommandStep::new(vec![ChainElement::shell(
                ElementContent::literal("echo hi"),
                OpNext::None,
            )])]),
        );
        let ctx = test_ctx();
        let ctx = crate::ctx::Ctx::new(
            crate::ctx::EnvSnapshot::from_map(Default::default()),
            Default::default(),
            ctx.workdir().to_path_buf(),
            ctx.stdout().clone(),
            ctx.stderr().clone(),
            ctx.stdin().clone(),
            Arc::new(commands),
            Arc::new(DecoratorRegistry::with_builtins()),
            ctx.ui(),
            false,
        );
        let result = CmdDecorator.run(&ctx, &name_arg("greet")).await;
        assert!(result.is_success());
        assert_eq!(result.stdout.trim(), "hi");
    }

    #[tokio::test]
    async fn unknown_command_fails() {
        let ctx = test_ctx();
        let result = CmdDecorator.run(&ctx, &name_arg("nope")).await;
        assert!(result.is_failure());
    }
}
