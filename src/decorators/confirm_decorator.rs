//! `@confirm` (block): prompts before running the inner sequence, with a
//! CI-environment auto-confirm fast path (§4.5).

use crate::ctx::{Ctx, CommandResult};
use crate::ir::{Arg, CommandSeq};
use crate::plan::{ExecutionStep, StepType};
use crate::registry::{bind_args, BlockDecorator, ImportRequirements, ParamType, ParameterDef, ParameterSchema};
use async_trait::async_trait;

const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "TRAVIS",
    "CIRCLECI",
    "JENKINS_URL",
    "GITLAB_CI",
    "BUILDKITE",
    "BUILD_NUMBER",
    "CONTINUOUS_INTEGRATION",
];

fn running_in_ci(ctx: &Ctx) -> bool {
    CI_VARS.iter().any(|k| ctx.get_env(k).map(|v| !v.is_empty()).unwrap_or(false))
}

fn is_confirmed(line: Option<String>, default_yes: bool, case_sensitive: bool) -> bool {
    let answer = line.unwrap_or_default();
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        return default_yes;
    }
    if case_sensitive {
        matches!(trimmed, "y" | "Y" | "yes" | "Yes")
    } else {
        matches!(trimmed.to_lowercase().as_str(), "y" | "yes")
    }
}

pub struct ConfirmDecorator;

impl ConfirmDecorator {
    fn schema_impl() -> ParameterSchema {
        ParameterSchema(vec![
            ParameterDef {
                name: "message",
                ty: ParamType::String,
                required: false,
                description: "prompt text",
            },
            ParameterDef {
                name: "defaultYes",
                ty: ParamType::Boolean,
                required: false,
                description: "default answer when the user presses enter with no input",
            },
            ParameterDef {
                name: "abortOnNo",
                ty: ParamType::Boolean,
                required: false,
                description: "fail the step instead of skipping the inner block on 'no'",
            },
            ParameterDef {
                name: "caseSensitive",
                ty: ParamType::Boolean,
                required: false,
                description: "require exact-case 'y'/'yes' answers",
            },
            ParameterDef {
                name: "ci",
                ty: ParamType::Boolean,
                required: false,
                description: "auto-confirm when a recognized CI environment variable is set",
            },
        ])
    }
}

#[async_trait]
impl BlockDecorator for ConfirmDecorator {
    fn name(&self) -> &'static str {
        "confirm"
    }

    fn schema(&self) -> ParameterSchema {
        Self::schema_impl()
    }

    async fn wrap_commands(&self, ctx: &Ctx, args: &[Arg], inner: &CommandSeq) -> CommandResult {
        let bound = match bind_args("confirm", &self.schema(), args) {
            Ok(b) => b,
            Err(e) => return CommandResult::failure(1, e.to_string()),
        };
        let message = bound.get_str("message").unwrap_or("Do you want to continue?").to_string();
        let default_yes = bound.get_bool("defaultYes").unwrap_or(false);
        let abort_on_no = bound.get_bool("abortOnNo").unwrap_or(true);
        let case_sensitive = bound.get_bool("caseSensitive").unwrap_or(false);
        let ci_enabled = bound.get_bool("ci").unwrap_or(true);

        let confirmed = if ctx.ui().auto_confirm {
            true
        } else if ci_enabled && running_in_ci(ctx) {
            true
        } else {
            let suffix = if default_yes { "[Y/n]" } else { "[y/N]" };
            ctx.stdout().write_line(&format!("{message} {suffix}"));
            let line = ctx.stdin().read_line().unwrap_or(None);
            is_confirmed(line, default_yes, case_sensitive)
        };

        if confirmed {
            crate::chain::execute_sequence(ctx, inner).await
        } else if abort_on_no {
            CommandResult::failure(1, "user cancelled execution")
        } else {
            CommandResult::success("")
        }
    }

    async fn describe(&self, _ctx: &Ctx, args: &[Arg], inner_step: ExecutionStep) -> ExecutionStep {
        let message = args
            .iter()
            .find(|a| a.name.as_deref() == Some("message") || a.name.is_none())
            .and_then(|a| a.value.as_str())
            .unwrap_or("Do you want to continue?");
        ExecutionStep::leaf("0", StepType::Decorator, format!("@confirm(message=\"{message}\")"))
            .with_children(vec![inner_step])
            .with_condition(format!("user confirms \"{message}\""))
    }

    fn import_requirements(&self) -> ImportRequirements {
        ImportRequirements(vec!["std::io::{self, Write, BufRead}"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::{BufferSink, EnvSnapshot, ScriptedInput, UiFlags};
    use crate::ir::{ChainElement, CommandStep, ElementContent, OpNext};
    use crate::registry::DecoratorRegistry;
    use indexmap::IndexMap;
    use std::sync::Arc;

    fn seq() -> CommandSeq {
        CommandSeq::new(vec![CommandStep::new(vec![ChainElement::shell(
            ElementContent::literal("echo ran"),
            OpNext::None,
        )])])
    }

    fn ctx_with(line: &str, ui: UiFlags) -> Ctx {
        Ctx::new(
            EnvSnapshot::from_map(Default::default()),
            Default::default(),
            std::env::temp_dir(),
            Arc::new(BufferSink::new()),
            Arc::new(BufferSink::new()),
            Arc::new(ScriptedInput::new(vec![line.to_string()])),
            Arc::new(IndexMap::new()),
            Arc::new(DecoratorRegistry::with_builtins()),
            ui,
            false,
        )
    }

    #[tokio::test]
    async fn yes_runs_inner_sequence() {
        let ctx = ctx_with("y", UiFlags::default());
        let result = ConfirmDecorator.wrap_commands(&ctx, &[], &seq()).await;
        assert!(result.is_success());
        assert_eq!(result.stdout.trim(), "ran");
    }

    #[tokio::test]
    async fn no_with_abort_on_no_fails() {
        let ctx = ctx_with("n", UiFlags::default());
        let result = ConfirmDecorator.wrap_commands(&ctx, &[], &seq()).await;
        assert!(result.is_failure());
    }

    #[tokio::test]
    async fn auto_confirm_flag_skips_prompt() {
        let ui = UiFlags {
            auto_confirm: true,
            ..UiFlags::default()
        };
        let ctx = ctx_with("n", ui);
        let result = ConfirmDecorator.wrap_commands(&ctx, &[], &seq()).await;
        assert!(result.is_success());
    }
}
