//! Plan generator (§4.7): walks the IR producing a deterministic, printable
//! dry-run tree without executing anything.

use crate::ctx::Ctx;
use crate::expand;
use crate::ir::{Arg, ArgValue, ChainElementKind, CommandSeq, CommandStep};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepType {
    Shell,
    Decorator,
    Sequence,
}

/// A dry-run tree node. IDs are assigned once by pre-order walk and the
/// tree is structurally immutable afterward.
#[derive(Debug, Clone)]
pub struct ExecutionStep {
    pub id: String,
    pub step_type: StepType,
    pub description: String,
    pub command: Option<String>,
    pub children: Vec<ExecutionStep>,
    pub metadata: HashMap<String, String>,
    pub condition: Option<String>,
    pub decorator_info: Option<String>,
}

impl ExecutionStep {
    pub fn leaf(id: impl Into<String>, step_type: StepType, description: impl Into<String>) -> Self {
        ExecutionStep {
            id: id.into(),
            step_type,
            description: description.into(),
            command: None,
            children: Vec::new(),
            metadata: HashMap::new(),
            condition: None,
            decorator_info: None,
        }
    }

    pub fn with_children(mut self, children: Vec<ExecutionStep>) -> Self {
        self.children = children;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Then,
    OnSuccess,
    OnFailure,
    Pipe,
    Append,
    Branch,
    Parallel,
}

#[derive(Debug, Clone)]
pub struct PlanEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub steps: Vec<ExecutionStep>,
    pub edges: Vec<PlanEdge>,
    pub context: HashMap<String, String>,
    pub summary: String,
}

fn format_args(args: &[Arg]) -> String {
    args.iter()
        .map(|a| {
            let value = match &a.value {
                ArgValue::String(s) => format!("\"{s}\""),
                ArgValue::Number(n) => n.to_string(),
                ArgValue::Bool(b) => b.to_string(),
                ArgValue::Identifier(s) => s.clone(),
            };
            match &a.name {
                Some(n) => format!("{n}={value}"),
                None => value,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn truncate_command(s: &str) -> String {
    if s.chars().count() > 80 {
        let head: String = s.chars().take(77).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

async fn describe_element_inline(ctx: &Ctx, el: &crate::ir::ChainElement) -> String {
    match el.kind {
        ChainElementKind::Shell => {
            let content = el.content.as_ref().expect("shell element has content");
            expand::resolve(content, ctx)
                .await
                .unwrap_or_else(|e| format!("<expansion error: {e}>"))
        }
        ChainElementKind::Action => {
            let name = el.name.as_deref().unwrap_or_default();
            format!("@{name}({})", format_args(&el.args))
        }
        ChainElementKind::Block => {
            let name = el.name.as_deref().unwrap_or_default();
            format!("@{name}({})", format_args(&el.args))
        }
        ChainElementKind::Pattern => {
            let name = el.name.as_deref().unwrap_or_default();
            format!("@{name}({})", format_args(&el.args))
        }
    }
}

/// Builds the dry-run subtree for a single [`CommandStep`]. When a step is
/// exactly one block/pattern-adjacent element, delegation to that
/// decorator's own `Describe` keeps the tree's shape decorator-specific;
/// otherwise the chain is rendered as one joined line (§4.7).
async fn build_step(ctx: &Ctx, step: &CommandStep, id: &str) -> ExecutionStep {
    if step.elements.len() == 1 {
        let el = &step.elements[0];
        match el.kind {
            ChainElementKind::Action => {
                if let Some(dec) = ctx.registry().action(el.name.as_deref().unwrap_or_default()) {
                    let mut described = dec.describe(ctx, &el.args);
                    described.id = id.to_string();
                    return described;
                }
            }
            ChainElementKind::Block => {
                if let Some(dec) = ctx.registry().block(el.name.as_deref().unwrap_or_default()) {
                    let inner_seq = CommandSeq::new(el.inner_steps.clone());
                    let inner_step = Box::pin(build_sequence(ctx, &inner_seq, &format!("{id}/0"))).await;
                    let mut described = dec.describe(ctx, &el.args, inner_step).await;
                    described.id = id.to_string();
                    return described;
                }
            }
            ChainElementKind::Pattern => {
                if let Some(dec) = ctx.registry().pattern(el.name.as_deref().unwrap_or_default()) {
                    let mut described = dec.describe(ctx, &el.args, &el.branches).await;
                    described.id = id.to_string();
                    return described;
                }
            }
            ChainElementKind::Shell => {}
        }
    }

    let mut line = String::new();
    let mut children = Vec::new();
    for (i, el) in step.elements.iter().enumerate() {
        if i > 0 {
            line.push_str(&format!(" {} ", step.elements[i - 1].op_next));
        }
        line.push_str(&describe_element_inline(ctx, el).await);
        if el.kind == ChainElementKind::Block {
            if let Some(dec) = ctx.registry().block(el.name.as_deref().unwrap_or_default()) {
                let inner_seq = CommandSeq::new(el.inner_steps.clone());
                let inner_step = Box::pin(build_sequence(ctx, &inner_seq, &format!("{id}/{i}"))).await;
                children.push(dec.describe(ctx, &el.args, inner_step).await);
            }
        }
        if el.kind == ChainElementKind::Pattern {
            if let Some(dec) = ctx.registry().pattern(el.name.as_deref().unwrap_or_default()) {
                children.push(dec.describe(ctx, &el.args, &el.branches).await);
            }
        }
    }
    let rendered = truncate_command(&line);
    ExecutionStep::leaf(id, StepType::Shell, rendered.clone())
        .with_children(children)
        .with_metadata("command", rendered)
}

/// Builds the `sequence`-type node for a [`CommandSeq`]: one child per step.
pub async fn build_sequence(ctx: &Ctx, seq: &CommandSeq, id: &str) -> ExecutionStep {
    let mut children = Vec::with_capacity(seq.steps.len());
    for (i, step) in seq.steps.iter().enumerate() {
        children.push(Box::pin(build_step(ctx, step, &format!("{id}/{i}"))).await);
    }
    ExecutionStep::leaf(
        id,
        StepType::Sequence,
        format!("Execute {} command steps", seq.steps.len()),
    )
    .with_children(children)
    .with_metadata("kind", "sequence")
}

fn derive_edges(step: &ExecutionStep, edges: &mut Vec<PlanEdge>) {
    match step.metadata.get("kind").map(String::as_str) {
        Some("sequence") => {
            for pair in step.children.windows(2) {
                edges.push(PlanEdge {
                    from: pair[0].id.clone(),
                    to: pair[1].id.clone(),
                    kind: EdgeKind::Then,
                });
            }
        }
        Some("parallel") => {
            for child in &step.children {
                edges.push(PlanEdge {
                    from: step.id.clone(),
                    to: child.id.clone(),
                    kind: EdgeKind::Parallel,
                });
            }
        }
        Some("pattern") => {
            for child in &step.children {
                edges.push(PlanEdge {
                    from: step.id.clone(),
                    to: child.id.clone(),
                    kind: EdgeKind::Branch,
                });
            }
        }
        _ => {}
    }
    for child in &step.children {
        derive_edges(child, edges);
    }
}

/// Builds the full dry-run plan for one command.
pub async fn build(ctx: &Ctx, command_name: &str, seq: &CommandSeq) -> ExecutionPlan {
    let root = build_sequence(ctx, seq, "0").await;
    let mut edges = Vec::new();
    derive_edges(&root, &mut edges);

    let mut context = HashMap::new();
    context.insert("command".to_string(), command_name.to_string());
    context.insert("workdir".to_string(), ctx.workdir().display().to_string());

    ExecutionPlan {
        steps: vec![root],
        edges,
        context,
        summary: format!("Plan for '{command_name}'"),
    }
}

/// Deterministic structural hash: pre-order node walk, sorted edges, sorted
/// non-volatile context keys (`timestamp`/`process_id` excluded) — §9.
pub fn graph_hash(plan: &ExecutionPlan) -> String {
    let mut hasher = Sha256::new();

    fn walk(step: &ExecutionStep, hasher: &mut Sha256) {
        hasher.update(step.id.as_bytes());
        hasher.update(format!("{:?}", step.step_type).as_bytes());
        hasher.update(step.description.as_bytes());
        if let Some(cmd) = &step.command {
            hasher.update(cmd.as_bytes());
        }
        for child in &step.children {
            walk(child, hasher);
        }
    }
    for step in &plan.steps {
        walk(step, &mut hasher);
    }

    let mut edge_strs: Vec<String> = plan
        .edges
        .iter()
        .map(|e| format!("{}->{}:{:?}", e.from, e.to, e.kind))
        .collect();
    edge_strs.sort();
    for e in &edge_strs {
        hasher.update(e.as_bytes());
    }

    const VOLATILE: [&str; 2] = ["timestamp", "process_id"];
    let mut keys: Vec<&String> = plan
        .context
        .keys()
        .filter(|k| !VOLATILE.contains(&k.as_str()))
        .collect();
    keys.sort();
    for k in keys {
        hasher.update(k.as_bytes());
        hasher.update(plan.context[k].as_bytes());
    }

    format!("{:x}", hasher.finalize())
}

fn render_step(step: &ExecutionStep, prefix: &str, is_last: bool, no_color: bool) -> String {
    let connector = if is_last { "└─ " } else { "├─ " };
    let text = if no_color {
        step.description.clone()
    } else {
        match step.step_type {
            StepType::Shell => format!("\x1b[36m{}\x1b[0m", step.description),
            StepType::Decorator => format!("\x1b[33m{}\x1b[0m", step.description),
            StepType::Sequence => step.description.clone(),
        }
    };
    let mut out = format!("{prefix}{connector}{text}\n");
    let child_prefix = format!("{prefix}{}", if is_last { "   " } else { "│  " });
    for (i, child) in step.children.iter().enumerate() {
        out.push_str(&render_step(
            child,
            &child_prefix,
            i == step.children.len() - 1,
            no_color,
        ));
    }
    out
}

/// Renders a command's plan as an indented Unicode tree, per §4.7's example
/// (`greet:` root label followed by the sequence subtree).
pub fn render(command_name: &str, plan: &ExecutionPlan, no_color: bool) -> String {
    let mut out = format!("{command_name}:\n");
    for (i, step) in plan.steps.iter().enumerate() {
        out.push_str(&render_step(step, "", i == plan.steps.len() - 1, no_color));
    }
    out
}

/// Builds a named branch's subtree for a pattern decorator's `describe`.
/// Delegates straight to [`build_sequence`] so a branch's shell content
/// resolves `@var`/`@env` the same way every other part of the tree does —
/// the §8 carve-out excuses branches `@when`/`@try` doesn't *select* at run
/// time, not unresolved content sitting inside the one that is selected.
pub async fn describe_branch(ctx: &Ctx, label: &str, seq: &CommandSeq, id_prefix: &str) -> ExecutionStep {
    let mut step = Box::pin(build_sequence(ctx, seq, id_prefix)).await;
    step.description = format!("{label}: {} step(s)", seq.steps.len());
    step
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ChainElement, ElementContent, OpNext};
    use crate::testsupport::test_ctx;

    fn greet_seq() -> CommandSeq {
        CommandSeq::new(vec![
            CommandStep::new(vec![ChainElement::shell(
                ElementContent::literal("echo hi"),
                OpNext::None,
            )]),
            CommandStep::new(vec![ChainElement::shell(
                ElementContent::literal("echo bye"),
                OpNext::None,
            )]),
        ])
    }

    #[tokio::test]
    async fn renders_s1_sequence_example() {
        let ctx = test_ctx();
        let seq = greet_seq();
        let plan = build(&ctx, "greet", &seq).await;
        let rendered = render("greet", &plan, true);
        assert_eq!(
            rendered,
            "greet:\n└─ Execute 2 command steps\n   ├─ echo hi\n   └─ echo bye\n"
        );
    }

    #[tokio::test]
    async fn graph_hash_is_deterministic() {
        let ctx = test_ctx();
        let seq = greet_seq();
        let plan_a = build(&ctx, "greet", &seq).await;
        let plan_b = build(&ctx, "greet", &seq).await;
        assert_eq!(graph_hash(&plan_a), graph_hash(&plan_b));
    }

    #[tokio::test]
    async fn and_or_chain_renders_as_single_line() {
        let ctx = test_ctx();
        let seq = CommandSeq::new(vec![CommandStep::new(vec![
            ChainElement::shell(ElementContent::literal("echo a"), OpNext::And),
            ChainElement::shell(ElementContent::literal("false"), OpNext::Or),
            ChainElement::shell(ElementContent::literal("echo b"), OpNext::None),
        ])]);
        let plan = build(&ctx, "chained", &seq).await;
        let rendered = render("chained", &plan, true);
        assert!(rendered.contains("echo a && false || echo b"));
    }
}
