//! `@when` (pattern): selects a branch by matching a variable's resolved
//! value against branch names, falling back to `default` (§4.5).

use crate::ctx::{Ctx, CommandResult};
use crate::ir::{Arg, Branches};
use crate::plan::{describe_branch, ExecutionStep, StepType};
use crate::registry::{bind_args, ParamType, ParameterDef, ParameterSchema, PatternDecorator, PatternSchema};
use async_trait::async_trait;

pub struct WhenDecorator;

#[async_trait]
impl PatternDecorator for WhenDecorator {
    fn name(&self) -> &'static str {
        "when"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema(vec![ParameterDef {
            name: "variable",
            ty: ParamType::String,
            required: true,
            description: "name resolved first against Ctx.Vars then EnvSnapshot",
        }])
    }

    fn pattern_schema(&self) -> PatternSchema {
        PatternSchema {
            allowed: vec![],
            required: vec![],
            at_least_one_of: vec![],
            wildcard: Some("default"),
            arbitrary_identifiers: true,
        }
    }

    async fn select_branch(&self, ctx: &Ctx, args: &[Arg], branches: &Branches) -> CommandResult {
        let bound = match bind_args("when", &self.schema(), args) {
            Ok(b) => b,
            Err(e) => return CommandResult::failure(1, e.to_string()),
        };
        let variable = bound.get_str("variable").expect("required parameter validated by bind_args");

        let value = ctx
            .get_var(variable)
            .or_else(|| ctx.get_env(variable))
            .unwrap_or("")
            .to_string();

        match branches.get(value.as_str()).or_else(|| branches.get("default")) {
            Some(seq) => crate::chain::execute_sequence(ctx, seq).await,
            None => CommandResult::success(""),
        }
    }

    async fn describe(&self, ctx: &Ctx, args: &[Arg], branches: &Branches) -> ExecutionStep {
        let variable = args.iter().find_map(|a| a.value.as_str()).unwrap_or("?");
        let mut children = Vec::with_capacity(branches.len());
        for (name, seq) in branches {
            children.push(describe_branch(ctx, name, seq, &format!("0/{name}")).await);
        }
        ExecutionStep::leaf("0", StepType::Decorator, format!("@when(variable={variable})"))
            .with_children(children)
            .with_metadata("kind", "pattern")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ArgValue, ChainElement, CommandSeq, CommandStep, ContentPart, ElementContent, OpNext};
    use crate::testsupport::test_ctx;
    use indexmap::IndexMap;
    use std::collections::HashMap;

    fn branches() -> Branches {
        let mut b: Branches = IndexMap::new();
        b.insert(
            "release".to_string(),
            CommandSeq::new(vec![CommandStep::new(vec![ChainElement::shell(
                ElementContent::literal("echo R"),
                OpNext::None,
            )])]),
        );
        b.insert(
            "debug".to_string(),
            CommandSeq::new(vec![CommandStep::new(vec![ChainElement::shell(
                ElementContent::literal("echo D"),
                OpNext::None,
            )])]),
        );
        b.insert(
            "default".to_string(),
            CommandSeq::new(vec![CommandStep::new(vec![ChainElement::shell(
                ElementContent::literal("echo O"),
                OpNext::None,
            )])]),
        );
        b
    }

    fn variable_arg() -> Vec<Arg> {
        vec![Arg {
            name: Some("variable".to_string()),
            value: ArgValue::String("BUILD".to_string()),
        }]
    }

    #[tokio::test]
    async fn matches_the_env_value_to_a_branch() {
        let ctx = crate::testsupport::test_ctx_with_env(HashMap::from([("BUILD".to_string(), "release".to_string())]));
        let result = WhenDecorator.select_branch(&ctx, &variable_arg(), &branches()).await;
        assert_eq!(result.stdout.trim(), "R");
    }

    #[tokio::test]
    async fn falls_back_to_default_when_unmatched() {
        let ctx = test_ctx();
        let result = WhenDecorator.select_branch(&ctx, &variable_arg(), &branches()).await;
        assert_eq!(result.stdout.trim(), "O");
    }

    #[tokio::test]
    async fn no_op_success_when_no_match_and_no_default() {
        let mut b = branches();
        b.shift_remove("default");
        let ctx = test_ctx();
        let result = WhenDecorator.select_branch(&ctx, &variable_arg(), &b).await;
        assert!(result.is_success());
        assert!(result.stdout.is_empty());
    }

    #[tokio::test]
    async fn describe_resolves_var_inside_every_branch_not_just_the_selected_one() {
        let mut ctx = test_ctx();
        ctx.set_var("target", "prod");
        let content = ElementContent {
            parts: vec![
                ContentPart::Literal("echo ".to_string()),
                ContentPart::Decorator {
                    name: "var".to_string(),
                    args: vec![Arg {
                        name: None,
                        value: ArgValue::Identifier("target".to_string()),
                    }],
                },
            ],
        };
        let mut b: Branches = IndexMap::new();
        b.insert(
            "release".to_string(),
            CommandSeq::new(vec![CommandStep::new(vec![ChainElement::shell(content, OpNext::None)])]),
        );

        let step = WhenDecorator.describe(&ctx, &variable_arg(), &b).await;
        let branch_step = &step.children[0];
        let leaf = &branch_step.children[0];
        assert_eq!(leaf.description, "echo prod", "plan mode must resolve @var the same way interpret mode does");
    }
}
