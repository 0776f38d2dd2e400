//! `@timeout` (block): races the inner sequence against a deadline on a
//! cancellable child `Ctx` (§4.5, §5).

use crate::ctx::{Ctx, CommandResult};
use crate::duration::{parse_duration, validate_range};
use crate::ir::{Arg, ArgValue, CommandSeq};
use crate::plan::{ExecutionStep, StepType};
use crate::registry::{bind_args, BlockDecorator, ImportRequirements, ParamType, ParameterDef, ParameterSchema};
use async_trait::async_trait;
use std::time::Duration;

pub struct TimeoutDecorator;

fn duration_literal(value: Option<&ArgValue>) -> Option<String> {
    value.map(|v| match v {
        ArgValue::Number(n) => format!("{}", *n as i64),
        other => other.as_str().unwrap_or_default().to_string(),
    })
}

#[async_trait]
impl BlockDecorator for TimeoutDecorator {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema(vec![ParameterDef {
            name: "duration",
            ty: ParamType::Duration,
            required: false,
            description: "deadline for the inner sequence, default 30s",
        }])
    }

    async fn wrap_commands(&self, ctx: &Ctx, args: &[Arg], inner: &CommandSeq) -> CommandResult {
        let bound = match bind_args("timeout", &self.schema(), args) {
            Ok(b) => b,
            Err(e) => return CommandResult::failure(1, e.to_string()),
        };
        let raw = duration_literal(bound.get("duration")).unwrap_or_else(|| "30s".to_string());
        let duration = match parse_duration("timeout", &raw) {
            Ok(d) => d,
            Err(e) => return CommandResult::failure(1, e.to_string()),
        };
        let duration = match validate_range(
            "timeout",
            "duration",
            duration,
            Duration::from_millis(1),
            Duration::from_secs(86_400),
        ) {
            Ok(d) => d,
            Err(e) => return CommandResult::failure(1, e.to_string()),
        };

        let child_ctx = ctx.with_child_cancellation();
        let spawn_ctx = child_ctx.clone();
        let inner = inner.clone();
        let mut handle = tokio::spawn(async move { crate::chain::execute_sequence(&spawn_ctx, &inner).await });

        tokio::select! {
            joined = &mut handle => {
                joined.unwrap_or_else(|_| CommandResult::failure(1, "inner sequence task panicked"))
            }
            _ = tokio::time::sleep(duration) => {
                let message = format!("operation timed out after {}", humantime::format_duration(duration));
                child_ctx.cancel(message.clone());
                // The select above dropped neither future: `handle` stays alive, so the
                // spawned task's own cancellation select (src/chain.rs) can still observe
                // `child_ctx` and actually terminate the live child process instead of
                // the Child being dropped (and orphaned) along with an abandoned future.
                let _ = handle.await;
                CommandResult::failure(1, message)
            }
        }
    }

    async fn describe(&self, _ctx: &Ctx, args: &[Arg], inner_step: ExecutionStep) -> ExecutionStep {
        let raw = duration_literal(args.iter().map(|a| &a.value).next()).unwrap_or_else(|| "30s".to_string());
        ExecutionStep::leaf("0", StepType::Decorator, format!("@timeout(duration={raw})")).with_children(vec![inner_step])
    }

    fn import_requirements(&self) -> ImportRequirements {
        ImportRequirements(vec!["std::sync::mpsc", "std::thread", "std::time::Duration"])
    }
}
