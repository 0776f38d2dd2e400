//! Black-box checks for the cross-cutting invariants in SPEC_FULL's §8 that
//! don't fit naturally inside a single module's `#[cfg(test)]` block.

use clidef::ctx::{BufferSink, Ctx, EnvSnapshot, ScriptedInput, UiFlags};
use clidef::ir::{ChainElement, CommandSeq, CommandStep, ElementContent, OpNext};
use clidef::plan::{self, ExecutionStep};
use clidef::registry::DecoratorRegistry;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

fn sequence_ctx(seq: CommandSeq, name: &str) -> (Ctx, Arc<BufferSink>) {
    let mut commands = IndexMap::new();
    commands.insert(name.to_string(), seq);
    let stdout = Arc::new(BufferSink::new());
    let ctx = Ctx::new(
        EnvSnapshot::from_map(HashMap::new()),
        HashMap::new(),
        std::env::temp_dir(),
        stdout.clone(),
        Arc::new(BufferSink::new()),
        Arc::new(ScriptedInput::new(vec![])),
        Arc::new(commands),
        Arc::new(DecoratorRegistry::with_builtins()),
        UiFlags::default(),
        false,
    );
    (ctx, stdout)
}

fn shell_only_sequence(commands: &[&str]) -> CommandSeq {
    let steps = commands
        .iter()
        .map(|c| CommandStep::new(vec![ChainElement::shell(ElementContent::literal(*c), OpNext::None)]))
        .collect();
    CommandSeq::new(steps)
}

fn leaf_commands_in_order(step: &ExecutionStep, out: &mut Vec<String>) {
    if let Some(cmd) = &step.command {
        out.push(cmd.clone());
    }
    for child in &step.children {
        leaf_commands_in_order(child, out);
    }
}

#[tokio::test]
async fn plan_leaf_order_matches_interpret_attempt_order() {
    let commands = ["echo one", "echo two", "echo three"];
    let seq = shell_only_sequence(&commands);
    let (ctx, stdout) = sequence_ctx(seq.clone(), "walk");

    let plan = plan::build(&ctx, "walk", &seq).await;
    let mut leaves = Vec::new();
    for step in &plan.steps {
        leaf_commands_in_order(step, &mut leaves);
    }

    assert_eq!(leaves, commands.to_vec());

    let result = clidef::interpret::run_command(&ctx, "walk").await;
    assert!(result.is_success());
    assert_eq!(stdout.contents(), "one\ntwo\nthree\n");
}

#[tokio::test]
async fn workdir_block_never_touches_the_real_process_cwd() {
    let before = std::env::current_dir().expect("cwd readable");

    let scratch = std::env::temp_dir().join("clidef-cwd-leak-test");
    tokio::fs::create_dir_all(&scratch).await.expect("scratch dir created");

    let inner_step = CommandStep::new(vec![ChainElement::shell(ElementContent::literal("echo inner"), OpNext::None)]);
    let workdir_args = vec![clidef::ir::Arg {
        name: Some("path".to_string()),
        value: clidef::ir::ArgValue::String(scratch.to_string_lossy().into_owned()),
    }];
    let element = ChainElement::block("workdir", workdir_args, vec![inner_step]);
    let seq = CommandSeq::new(vec![CommandStep::new(vec![element])]);
    let (ctx, _stdout) = sequence_ctx(seq, "scoped");

    let result = clidef::interpret::run_command(&ctx, "scoped").await;
    assert!(result.is_success());

    let after = std::env::current_dir().expect("cwd readable");
    assert_eq!(before, after, "running a command with @workdir must not change the process CWD");
}
