//! `@parallel` (block): runs each top-level step of the inner sequence as
//! an independent concurrent task, bounded by an admission semaphore, with
//! input-order-preserving output collection (§4.5, §5).

use crate::ctx::{Ctx, CommandResult};
use crate::error::ClidefError;
use crate::ir::{Arg, CommandSeq};
use crate::plan::{ExecutionStep, StepType};
use crate::registry::{bind_args, BlockDecorator, ImportRequirements, ParamType, ParameterDef, ParameterSchema};
use async_trait::async_trait;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub struct ParallelDecorator;

fn resolve_concurrency(
    requested: Option<i64>,
    task_count: usize,
    uncapped: bool,
    cpu_multiplier: u32,
) -> Result<usize, ClidefError> {
    const HARD_CEILING: usize = 1000;
    if let Some(n) = requested {
        if !(1..=1000).contains(&n) {
            return Err(ClidefError::parameter_validation(
                "parallel",
                format!("concurrency must be an integer between 1 and 1000, got {n}"),
            ));
        }
        return Ok(n as usize);
    }
    let cpu = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let cap = if uncapped {
        task_count
    } else {
        task_count.min(cpu_multiplier as usize * cpu)
    };
    Ok(cap.min(HARD_CEILING).max(1))
}

#[async_trait]
impl BlockDecorator for ParallelDecorator {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema(vec![
            ParameterDef {
                name: "concurrency",
                ty: ParamType::Number,
                required: false,
                description: "admission semaphore size, integer 1..1000",
            },
            ParameterDef {
                name: "failOnFirstError",
                ty: ParamType::Boolean,
                required: false,
                description: "cancel remaining tasks as soon as one fails",
            },
            ParameterDef {
                name: "uncapped",
                ty: ParamType::Boolean,
                required: false,
                description: "drop the 2x-CPU default cap (the 1000 hard ceiling still applies)",
            },
        ])
    }

    async fn wrap_commands(&self, ctx: &Ctx, args: &[Arg], inner: &CommandSeq) -> CommandResult {
        let bound = match bind_args("parallel", &self.schema(), args) {
            Ok(b) => b,
            Err(e) => return CommandResult::failure(1, e.to_string()),
        };
        let uncapped = bound.get_bool("uncapped").unwrap_or(false);
        let fail_fast = bound.get_bool("failOnFirstError").unwrap_or(false);
        let requested = bound.get_number("concurrency").map(|n| n as i64);

        let task_count = inner.steps.len();
        let concurrency = match resolve_concurrency(requested, task_count, uncapped, ctx.parallel_cpu_multiplier()) {
            Ok(c) => c,
            Err(e) => return CommandResult::failure(1, e.to_string()),
        };
        if task_count == 0 {
            return CommandResult::success("");
        }

        let shared_ctx = ctx.with_child_cancellation();
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut futs = FuturesUnordered::new();

        for (idx, step) in inner.steps.iter().cloned().enumerate() {
            let sem = semaphore.clone();
            let task_ctx = shared_ctx.fork_for_task();
            let task_seq = CommandSeq::new(vec![step]);
            futs.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.expect("semaphore never closed");
                let result = crate::chain::execute_sequence(&task_ctx, &task_seq).await;
                (idx, result)
            }));
        }

        let mut results: Vec<Option<CommandResult>> = vec![None; task_count];
        let mut first_completed_error: Option<CommandResult> = None;
        while let Some(joined) = futs.next().await {
            let (idx, result) = match joined {
                Ok(pair) => pair,
                Err(_) => continue,
            };
            if result.is_failure() {
                if first_completed_error.is_none() {
                    first_completed_error = Some(result.clone());
                    if fail_fast {
                        shared_ctx.cancel("a parallel task failed; cancelling the remaining tasks");
                    }
                }
            }
            results[idx] = Some(result);
        }

        let stdout: String = results.iter().flatten().map(|r| r.stdout.as_str()).collect();
        let error = if fail_fast {
            first_completed_error
        } else {
            results.iter().flatten().find(|r| r.is_failure()).cloned()
        };

        match error {
            Some(err) => CommandResult {
                stdout,
                stderr: err.stderr,
                exit_code: err.exit_code,
            },
            None => CommandResult::success(stdout),
        }
    }

    async fn describe(&self, _ctx: &Ctx, args: &[Arg], inner_step: ExecutionStep) -> ExecutionStep {
        let concurrency = args
            .iter()
            .find(|a| a.name.as_deref() == Some("concurrency"))
            .and_then(|a| a.value.as_number());
        let desc = match concurrency {
            Some(c) => format!("@parallel(concurrency={c})"),
            None => "@parallel()".to_string(),
        };
        ExecutionStep::leaf("0", StepType::Decorator, desc)
            .with_children(inner_step.children)
            .with_metadata("kind", "parallel")
    }

    fn import_requirements(&self) -> ImportRequirements {
        ImportRequirements(vec!["std::thread", "std::sync::mpsc"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ChainElement, CommandStep, ElementContent, OpNext};
    use crate::testsupport::test_ctx;

    #[tokio::test]
    async fn preserves_input_order_regardless_of_completion_order() {
        let ctx = test_ctx();
        let inner = CommandSeq::new(vec![
            CommandStep::new(vec![ChainElement::shell(
                ElementContent::literal("sleep 0.2 && echo A"),
                OpNext::None,
            )]),
            CommandStep::new(vec![ChainElement::shell(ElementContent::literal("echo B"), OpNext::None)]),
            CommandStep::new(vec![ChainElement::shell(
                ElementContent::literal("sleep 0.1 && echo C"),
                OpNext::None,
            )]),
        ]);
        let args = vec![Arg {
            name: Some("concurrency".to_string()),
            value: crate::ir::ArgValue::Number(2.0),
        }];
        let result = ParallelDecorator.wrap_commands(&ctx, &args, &inner).await;
        assert!(result.is_success());
        assert_eq!(result.stdout, "A\nB\nC\n");
    }

    #[test]
    fn default_concurrency_caps_at_twice_cpu_count() {
        let resolved = resolve_concurrency(None, 9999, false, 2).unwrap();
        let cpu = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        assert_eq!(resolved, (2 * cpu).min(1000));
    }

    #[test]
    fn uncapped_drops_the_cpu_multiplier_but_keeps_the_hard_ceiling() {
        assert_eq!(resolve_concurrency(None, 5, true, 2).unwrap(), 5);
        assert_eq!(resolve_concurrency(None, 5000, true, 2).unwrap(), 1000);
    }
}
