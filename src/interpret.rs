//! Interpret evaluator (§4.6): the top-level entry point that resolves a
//! command name against `Ctx.Commands` and hands its body to the chain
//! evaluator. All of the actual dispatch/short-circuit/cancellation logic
//! lives in [`crate::chain`]; this module is the thin pre-order root.

use crate::ctx::{Ctx, CommandResult};
use crate::error::{ClidefError, ErrorCode};

pub async fn run_command(ctx: &Ctx, name: &str) -> CommandResult {
    if ctx.is_cancelled() {
        return CommandResult::failure(
            1,
            format!("cancelled: {}", ctx.cancellation_reason().unwrap_or_else(|| "cancelled".into())),
        );
    }
    match ctx.commands().get(name) {
        Some(seq) => crate::chain::execute_sequence(ctx, seq).await,
        None => {
            let err = ClidefError::runtime(ErrorCode::UnknownCommand, format!("command '{name}' is not declared"));
            CommandResult::failure(1, err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::{BufferSink, EnvSnapshot, ScriptedInput, UiFlags};
    use crate::ir::{ChainElement, CommandSeq, CommandStep, ElementContent, OpNext};
    use crate::registry::DecoratorRegistry;
    use indexmap::IndexMap;
    use std::sync::Arc;

    fn ctx_with_command(name: &str, seq: CommandSeq) -> Ctx {
        let mut commands = IndexMap::new();
        commands.insert(name.to_string(), seq);
        Ctx::new(
            EnvSnapshot::from_map(Default::default()),
            Default::default(),
            std::env::temp_dir(),
            Arc::new(BufferSink::new()),
            Arc::new(BufferSink::new()),
            Arc::new(ScriptedInput::new(vec![])),
            Arc::new(commands),
            Arc::new(DecoratorRegistry::with_builtins()),
            UiFlags::default(),
            false,
        )
    }

    #[tokio::test]
    async fn runs_a_declared_command() {
        let seq = CommandSeq::new(vec![CommandStep::new(vec![ChainElement::shell(
            ElementContent::literal("echo hi"),
            OpNext::None,
        )])]);
        let ctx = ctx_with_command("greet", seq);
        let result = run_command(&ctx, "greet").await;
        assert!(result.is_success());
        assert_eq!(result.stdout.trim(), "hi");
    }

    #[tokio::test]
    async fn unknown_command_is_a_failure() {
        let ctx = ctx_with_command("greet", CommandSeq::default());
        let result = run_command(&ctx, "missing").await;
        assert!(result.is_failure());
    }
}
