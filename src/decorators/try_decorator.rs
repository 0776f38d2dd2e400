//! `@try` (pattern): `main`/`catch`/`finally` branches with main > catch >
//! finally error precedence (§4.5).

use crate::ctx::{Ctx, CommandResult};
use crate::ir::{Arg, Branches};
use crate::plan::{describe_branch, ExecutionStep, StepType};
use crate::registry::{ParameterSchema, PatternDecorator, PatternSchema};
use async_trait::async_trait;

pub struct TryDecorator;

#[async_trait]
impl PatternDecorator for TryDecorator {
    fn name(&self) -> &'static str {
        "try"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::default()
    }

    fn pattern_schema(&self) -> PatternSchema {
        PatternSchema {
            allowed: vec!["main", "catch", "finally"],
            required: vec!["main"],
            at_least_one_of: vec!["catch", "finally"],
            wildcard: None,
            arbitrary_identifiers: false,
        }
    }

    async fn select_branch(&self, ctx: &Ctx, _args: &[Arg], branches: &Branches) -> CommandResult {
        if let Err(e) = self.pattern_schema().validate("try", branches) {
            return CommandResult::failure(1, e.to_string());
        }

        let main = branches.get("main").expect("pattern_schema requires 'main'");
        let main_result = crate::chain::execute_sequence(ctx, main).await;
        let mut stdout = main_result.stdout.clone();
        let mut outcome = main_result;

        if outcome.is_failure() {
            if let Some(catch) = branches.get("catch") {
                let catch_result = crate::chain::execute_sequence(ctx, catch).await;
                stdout.push_str(&catch_result.stdout);
                outcome = catch_result;
            }
        }

        if let Some(finally) = branches.get("finally") {
            let finally_result = crate::chain::execute_sequence(ctx, finally).await;
            stdout.push_str(&finally_result.stdout);
            if outcome.is_success() && finally_result.is_failure() {
                outcome = finally_result;
            }
        }

        CommandResult {
            stdout,
            stderr: outcome.stderr,
            exit_code: outcome.exit_code,
        }
    }

    async fn describe(&self, ctx: &Ctx, _args: &[Arg], branches: &Branches) -> ExecutionStep {
        let mut children = Vec::new();
        for name in ["main", "catch", "finally"] {
            if let Some(seq) = branches.get(name) {
                children.push(describe_branch(ctx, name, seq, &format!("0/{name}")).await);
            }
        }
        ExecutionStep::leaf("0", StepType::Decorator, "@try".to_string()).with_children(children)
    }
}
