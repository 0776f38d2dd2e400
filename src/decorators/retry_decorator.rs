//! `@retry` (block): re-runs the inner sequence on failure up to a bounded
//! number of attempts, sleeping `delay` between tries (§4.5, §5).

use crate::ctx::{Ctx, CommandResult};
use crate::duration::{parse_duration, validate_range};
use crate::error::ClidefError;
use crate::ir::{Arg, ArgValue, CommandSeq};
use crate::plan::{ExecutionStep, StepType};
use crate::registry::{bind_args, BlockDecorator, ImportRequirements, ParamType, ParameterDef, ParameterSchema};
use async_trait::async_trait;
use std::time::Duration;

pub struct RetryDecorator;

fn literal(value: Option<&ArgValue>) -> Option<String> {
    value.map(|v| match v {
        ArgValue::Number(n) => format!("{}", *n as i64),
        other => other.as_str().unwrap_or_default().to_string(),
    })
}

fn parse_attempts(bound: &crate::registry::ArgBindings) -> Result<u32, ClidefError> {
    let raw = bound
        .get_number("attempts")
        .ok_or_else(|| ClidefError::parameter_validation("retry", "missing required parameter 'attempts'"))?;
    let attempts = raw as i64;
    if !(1..=100).contains(&attempts) {
        return Err(ClidefError::parameter_validation(
            "retry",
            format!("attempts must be an integer between 1 and 100, got {raw}"),
        ));
    }
    Ok(attempts as u32)
}

#[async_trait]
impl BlockDecorator for RetryDecorator {
    fn name(&self) -> &'static str {
        "retry"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema(vec![
            ParameterDef {
                name: "attempts",
                ty: ParamType::Number,
                required: true,
                description: "total tries, integer 1..100",
            },
            ParameterDef {
                name: "delay",
                ty: ParamType::Duration,
                required: false,
                description: "sleep between attempts, default 1s, range 1ms..1h",
            },
        ])
    }

    async fn wrap_commands(&self, ctx: &Ctx, args: &[Arg], inner: &CommandSeq) -> CommandResult {
        let bound = match bind_args("retry", &self.schema(), args) {
            Ok(b) => b,
            Err(e) => return CommandResult::failure(1, e.to_string()),
        };
        let attempts = match parse_attempts(&bound) {
            Ok(n) => n,
            Err(e) => return CommandResult::failure(1, e.to_string()),
        };
        let delay_raw = literal(bound.get("delay")).unwrap_or_else(|| "1s".to_string());
        let delay = match parse_duration("retry", &delay_raw) {
            Ok(d) => d,
            Err(e) => return CommandResult::failure(1, e.to_string()),
        };
        let delay = match validate_range("retry", "delay", delay, Duration::from_millis(1), Duration::from_secs(3_600)) {
            Ok(d) => d,
            Err(e) => return CommandResult::failure(1, e.to_string()),
        };

        let mut last = CommandResult::failure(1, "retry never attempted");
        for attempt in 1..=attempts {
            if ctx.is_cancelled() {
                return CommandResult::failure(
                    1,
                    format!("cancelled: {}", ctx.cancellation_reason().unwrap_or_else(|| "cancelled".into())),
                );
            }
            last = crate::chain::execute_sequence(ctx, inner).await;
            if last.is_success() {
                return last;
            }
            tracing::debug!(attempt, attempts, "retry attempt failed");
            if attempt < attempts {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = ctx.cancellation().cancelled() => {
                        return CommandResult::failure(
                            1,
                            format!("cancelled during retry delay: {}", ctx.cancellation_reason().unwrap_or_else(|| "cancelled".into())),
                        );
                    }
                }
            }
        }
        CommandResult::failure(
            last.exit_code.max(1),
            format!("failed after {attempts} attempts: {}", last.stderr),
        )
    }

    async fn describe(&self, _ctx: &Ctx, args: &[Arg], inner_step: ExecutionStep) -> ExecutionStep {
        let attempts = args
            .iter()
            .find(|a| a.name.as_deref() == Some("attempts"))
            .and_then(|a| a.value.as_number())
            .unwrap_or(0.0);
        ExecutionStep::leaf("0", StepType::Decorator, format!("@retry(attempts={attempts})")).with_children(vec![inner_step])
    }

    fn import_requirements(&self) -> ImportRequirements {
        ImportRequirements(vec!["std::thread", "std::time::Duration"])
    }
}
