//! Generator (§4.8): walks a [`Program`] and emits standalone Rust source
//! text whose runtime behavior matches the interpret evaluator, without
//! depending on this crate. Each decorator drives its own idiomatic shape —
//! a loop for `@retry`, a channel-joined thread for `@timeout`, a thread
//! pool for `@parallel` — and declares the `std` paths it needs via
//! [`crate::registry::ImportRequirements`]; the generator only aggregates
//! those into the emitted module's `use` block.
//!
//! Two simplifications fall out of targeting a standalone binary rather
//! than a long-lived async runtime, both noted in the ledger:
//! - `@var` has no `Ctx.Vars` to read from once the generated program no
//!   longer carries a `Ctx`, so it resolves the same way `@env` does, against
//!   the process environment.
//! - `@workdir` may set the process's actual current directory for the
//!   duration of its inner sequence and restore it afterward — there is no
//!   concurrent `Ctx` state to leak into since nothing else runs in the
//!   generated program at the same time.

use crate::ir::{
    ChainElement, ChainElementKind, CommandSeq, CommandStep, ContentPart, ElementContent, OpNext, Program,
};
use crate::registry::DecoratorRegistry;
use std::collections::BTreeSet;

pub struct Generator;

impl Generator {
    /// Emits the full module as a `String`. Never touches the filesystem —
    /// writing the result to disk is the embedding CLI's job.
    pub fn emit(program: &Program, registry: &DecoratorRegistry) -> String {
        let mut imports: BTreeSet<&'static str> = BTreeSet::new();
        for seq in program.commands.values() {
            collect_imports(seq, registry, &mut imports);
        }

        let mut out = String::new();
        out.push_str("// Generated by clidef --generate. Do not edit by hand.\n\n");
        for import in &imports {
            out.push_str(&format!("use {import};\n"));
        }
        if !imports.is_empty() {
            out.push('\n');
        }
        out.push_str(PRELUDE);
        out.push('\n');

        for (name, seq) in &program.commands {
            out.push_str(&format!("pub fn cmd_{}() -> CommandResult {{\n", mangle(name)));
            out.push_str(&indent(&emit_sequence(seq, registry), 1));
            out.push_str("\n}\n\n");
        }

        out
    }
}

const PRELUDE: &str = r#"#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn ok(stdout: impl Into<String>) -> Self {
        CommandResult { stdout: stdout.into(), stderr: String::new(), exit_code: 0 }
    }

    pub fn err(exit_code: i32, stderr: impl Into<String>) -> Self {
        CommandResult { stdout: String::new(), stderr: stderr.into(), exit_code }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

fn run_shell(command: &str, stdin_data: Option<String>) -> CommandResult {
    use std::io::Write;
    use std::process::{Command, Stdio};
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(if stdin_data.is_some() { Stdio::piped() } else { Stdio::inherit() });
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => return CommandResult::err(127, format!("failed to spawn shell: {e}")),
    };
    if let Some(data) = stdin_data {
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(data.as_bytes());
        }
    }
    match child.wait_with_output() {
        Ok(output) => CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(1),
        },
        Err(e) => CommandResult::err(127, format!("failed to wait on shell: {e}")),
    }
}

/// Minimal duration-literal parser for the generated program: no external
/// crate dependency, so it only understands the plain suffixed forms
/// (`"30s"`, `"500ms"`, `"1h"`, `"2m"`) plus a bare integer of seconds.
fn parse_duration_literal(raw: &str) -> std::time::Duration {
    let trimmed = raw.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return std::time::Duration::from_secs(secs);
    }
    let (value, unit) = trimmed.split_at(trimmed.find(|c: char| !c.is_ascii_digit()).unwrap_or(trimmed.len()));
    let value: u64 = value.parse().unwrap_or(0);
    match unit {
        "ms" => std::time::Duration::from_millis(value),
        "s" => std::time::Duration::from_secs(value),
        "m" => std::time::Duration::from_secs(value * 60),
        "h" => std::time::Duration::from_secs(value * 3600),
        _ => std::time::Duration::from_secs(value),
    }
}

fn append_to_file(path: &str, content: &str) -> std::io::Result<()> {
    use std::io::Write;
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    let normalized = if content.is_empty() || content.ends_with('\n') { content.to_string() } else { format!("{content}\n") };
    file.write_all(normalized.as_bytes())
}
"#;

/// Turns a declared command name into the `camelCase, first letter
/// uppercased` function suffix `@cmd`'s generate-mode call target uses
/// (§4.5's `@cmd` entry).
fn mangle(name: &str) -> String {
    let mut out = String::new();
    let mut capitalize_next = true;
    for ch in name.chars() {
        if ch == '-' || ch == '_' || ch.is_whitespace() {
            capitalize_next = true;
            continue;
        }
        if capitalize_next {
            out.extend(ch.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn indent(text: &str, levels: usize) -> String {
    let pad = "    ".repeat(levels);
    text.lines().map(|l| if l.is_empty() { l.to_string() } else { format!("{pad}{l}") }).collect::<Vec<_>>().join("\n")
}

fn collect_imports(seq: &CommandSeq, registry: &DecoratorRegistry, out: &mut BTreeSet<&'static str>) {
    for step in &seq.steps {
        for element in &step.elements {
            match element.kind {
                ChainElementKind::Action => {
                    if let Some(d) = element.name.as_deref().and_then(|n| registry.action(n)) {
                        out.extend(d.import_requirements().0);
                    }
                }
                ChainElementKind::Block => {
                    if let Some(d) = element.name.as_deref().and_then(|n| registry.block(n)) {
                        out.extend(d.import_requirements().0);
                    }
                    for step in &element.inner_steps {
                        collect_imports(&CommandSeq::new(vec![step.clone()]), registry, out);
                    }
                }
                ChainElementKind::Pattern => {
                    if let Some(d) = element.name.as_deref().and_then(|n| registry.pattern(n)) {
                        out.extend(d.import_requirements().0);
                    }
                    for branch in element.branches.values() {
                        collect_imports(branch, registry, out);
                    }
                }
                ChainElementKind::Shell => {}
            }
        }
    }
}

/// Emits a Rust block expression of type `CommandResult`, mirroring
/// `chain::execute_sequence`'s first-failure-short-circuits semantics.
fn emit_sequence(seq: &CommandSeq, registry: &DecoratorRegistry) -> String {
    if seq.steps.is_empty() {
        return "CommandResult::ok(\"\")".to_string();
    }
    let mut lines = vec!["{".to_string(), "    let mut last = CommandResult::ok(\"\");".to_string()];
    for step in &seq.steps {
        lines.push("    last = {".to_string());
        lines.push(indent(&emit_step(step, registry), 1));
        lines.push("    };".to_string());
        lines.push("    if !last.is_success() { return last; }".to_string());
    }
    lines.push("    last".to_string());
    lines.push("}".to_string());
    lines.join("\n")
}

/// Emits a Rust block expression of type `CommandResult` for one chain of
/// elements, honoring `&&`/`||`/`|`/`>>` the way `chain::execute_step` does.
fn emit_step(step: &CommandStep, registry: &DecoratorRegistry) -> String {
    let mut lines = vec![
        "let mut result = CommandResult::ok(\"\");".to_string(),
        "let mut pipe_input: Option<String> = None;".to_string(),
        "let mut accumulated = String::new();".to_string(),
    ];

    for (i, element) in step.elements.iter().enumerate() {
        let prev_op = if i == 0 { OpNext::None } else { step.elements[i - 1].op_next };
        let gate = match prev_op {
            OpNext::And => Some("result.is_success()"),
            OpNext::Or => Some("!result.is_success()"),
            OpNext::Pipe | OpNext::Append | OpNext::None => None,
        };

        let stdin_arg = if prev_op == OpNext::Pipe { "pipe_input.take()" } else { "None" };
        let element_expr = emit_element(element, registry, stdin_arg);

        let mut body = vec!["let mut r = {".to_string(), indent(&element_expr, 1), "};".to_string()];
        match element.op_next {
            OpNext::Pipe => body.push("pipe_input = Some(r.stdout.clone());".to_string()),
            OpNext::Append => {
                let target = element.target.as_deref().unwrap_or("");
                body.push(format!(
                    "if let Err(e) = append_to_file({target:?}, &r.stdout) {{ r = CommandResult::err(1, format!(\"failed to append to {target:?}: {{e}}\")); }} else {{ r.stdout.clear(); }}",
                ));
            }
            OpNext::And | OpNext::Or | OpNext::None => body.push("accumulated.push_str(&r.stdout);".to_string()),
        }
        body.push("result = r;".to_string());

        match gate {
            Some(cond) => {
                lines.push(format!("if {cond} {{"));
                lines.push(indent(&body.join("\n"), 1));
                lines.push("}".to_string());
            }
            None => lines.extend(body),
        }
    }

    lines.push("result.stdout = accumulated;".to_string());
    lines.push("result".to_string());
    lines.join("\n")
}

fn emit_element(element: &ChainElement, registry: &DecoratorRegistry, stdin_arg: &str) -> String {
    match element.kind {
        ChainElementKind::Shell => {
            let content = element.content.as_ref().expect("shell element always carries content");
            format!("run_shell(&{}, {stdin_arg})", emit_content(content))
        }
        ChainElementKind::Action => {
            // Only @cmd is a built-in action; its generate-mode form is a
            // direct call to the target's generated function (§4.5).
            let target = element.name.as_deref().unwrap_or("");
            if target == "cmd" {
                let called = element
                    .args
                    .iter()
                    .find_map(|a| a.value.as_str())
                    .map(mangle)
                    .unwrap_or_default();
                format!("cmd_{called}()")
            } else {
                format!("CommandResult::err(1, \"@{target} has no generate-mode emission\")")
            }
        }
        ChainElementKind::Block => emit_block(element, registry),
        ChainElementKind::Pattern => emit_pattern(element, registry),
    }
}

fn emit_content(content: &ElementContent) -> String {
    if content.parts.iter().all(|p| matches!(p, ContentPart::Literal(_))) {
        let text: String = content
            .parts
            .iter()
            .map(|p| match p {
                ContentPart::Literal(t) => t.as_str(),
                ContentPart::Decorator { .. } => unreachable!(),
            })
            .collect();
        return format!("{text:?}.to_string()");
    }

    let mut format_str = String::new();
    let mut format_args = Vec::new();
    for part in &content.parts {
        match part {
            ContentPart::Literal(text) => format_str.push_str(&text.replace('{', "{{").replace('}', "}}")),
            ContentPart::Decorator { name, args } => {
                format_str.push_str("{}");
                format_args.push(emit_value_decorator(name, args));
            }
        }
    }
    format!("format!({:?}, {})", format_str, format_args.join(", "))
}

/// `@var`/`@env` generate-mode expansion (§4.5). Both resolve against the
/// process environment in generated code — see the module doc comment.
fn emit_value_decorator(name: &str, args: &[crate::ir::Arg]) -> String {
    match name {
        "var" => {
            let key = args.iter().find_map(|a| a.value.as_str()).unwrap_or("");
            format!("std::env::var({key:?}).unwrap_or_default()")
        }
        "env" => {
            let key = args.iter().find(|a| a.name.as_deref() == Some("key") || a.name.is_none()).and_then(|a| a.value.as_str()).unwrap_or("");
            let default = args.iter().find(|a| a.name.as_deref() == Some("default")).and_then(|a| a.value.as_str()).unwrap_or("");
            let allow_empty = args.iter().find(|a| a.name.as_deref() == Some("allowEmpty")).and_then(|a| a.value.as_bool()).unwrap_or(false);
            format!(
                "{{ let v = std::env::var({key:?}).unwrap_or_default(); if v.is_empty() && !{allow_empty} {{ {default:?}.to_string() }} else {{ v }} }}"
            )
        }
        other => format!("format!(\"<unresolvable @{other}>\")"),
    }
}

fn emit_block(element: &ChainElement, registry: &DecoratorRegistry) -> String {
    let name = element.name.as_deref().unwrap_or("");
    let inner = CommandSeq::new(element.inner_steps.clone());
    let inner_expr = emit_sequence(&inner, registry);

    match name {
        "workdir" => {
            let path = element.args.iter().find_map(|a| a.value.as_str()).unwrap_or(".");
            format!(
                "{{\n    let __prev = std::env::current_dir().ok();\n    let _ = std::fs::create_dir_all({path:?});\n    let _ = std::env::set_current_dir({path:?});\n    let r = {};\n    if let Some(p) = __prev {{ let _ = std::env::set_current_dir(p); }}\n    r\n}}",
                indent(&inner_expr, 1).trim_start()
            )
        }
        "timeout" => {
            let duration = element
                .args
                .iter()
                .find_map(|a| a.value.as_str().map(str::to_string).or_else(|| a.value.as_number().map(|n| format!("{n}s"))))
                .unwrap_or_else(|| "30s".to_string());
            format!(
                "{{\n    let (tx, rx) = std::sync::mpsc::channel();\n    std::thread::spawn(move || {{ let _ = tx.send({}); }});\n    match rx.recv_timeout(parse_duration_literal({duration:?})) {{\n        Ok(r) => r,\n        Err(_) => CommandResult::err(1, \"operation timed out after {duration}\"),\n    }}\n}}",
                inner_expr
            )
        }
        "retry" => {
            let attempts = element.args.iter().find_map(|a| a.value.as_number()).unwrap_or(1.0) as u32;
            let delay = element
                .args
                .iter()
                .find(|a| a.name.as_deref() == Some("delay"))
                .and_then(|a| a.value.as_str())
                .unwrap_or("1s")
                .to_string();
            format!(
                "{{\n    let mut last = CommandResult::err(1, \"retry never attempted\");\n    for attempt in 1..={attempts}u32 {{\n        last = {};\n        if last.is_success() {{ return last; }}\n        if attempt < {attempts}u32 {{ std::thread::sleep(parse_duration_literal({delay:?})); }}\n    }}\n    CommandResult::err(last.exit_code.max(1), format!(\"failed after {attempts} attempts: {{}}\", last.stderr))\n}}",
                inner_expr
            )
        }
        "parallel" => {
            let task_exprs: Vec<String> = element
                .inner_steps
                .iter()
                .map(|s| emit_sequence(&CommandSeq::new(vec![s.clone()]), registry))
                .collect();
            let spawns: String = task_exprs
                .iter()
                .map(|e| format!("std::thread::spawn(move || {{ {e} }})"))
                .collect::<Vec<_>>()
                .join(",\n        ");
            format!(
                "{{\n    let handles: Vec<std::thread::JoinHandle<CommandResult>> = vec![\n        {spawns}\n    ];\n    let results: Vec<CommandResult> = handles.into_iter().map(|h| h.join().unwrap_or_else(|_| CommandResult::err(1, \"task panicked\"))).collect();\n    let exit_code = results.iter().find(|r| !r.is_success()).map(|r| r.exit_code).unwrap_or(0);\n    let stdout: String = results.iter().map(|r| r.stdout.clone()).collect();\n    CommandResult {{ stdout, stderr: String::new(), exit_code }}\n}}"
            )
        }
        "confirm" => {
            let message = element.args.iter().find_map(|a| a.value.as_str()).unwrap_or("Do you want to continue?");
            format!(
                "{{\n    print!(\"{message} [y/N] \");\n    let _ = std::io::Write::flush(&mut std::io::stdout());\n    let mut line = String::new();\n    let _ = std::io::BufRead::read_line(&mut std::io::stdin().lock(), &mut line);\n    if matches!(line.trim().to_lowercase().as_str(), \"y\" | \"yes\") {{\n        {}\n    }} else {{\n        CommandResult::err(1, \"user cancelled execution\")\n    }}\n}}",
                inner_expr
            )
        }
        other => format!("CommandResult::err(1, \"@{other} has no generate-mode emission\")"),
    }
}

fn emit_pattern(element: &ChainElement, registry: &DecoratorRegistry) -> String {
    let name = element.name.as_deref().unwrap_or("");
    match name {
        "try" => {
            let main = element.branches.get("main").map(|s| emit_sequence(s, registry)).unwrap_or_else(|| "CommandResult::ok(\"\")".to_string());
            let catch = element.branches.get("catch").map(|s| emit_sequence(s, registry));
            let finally = element.branches.get("finally").map(|s| emit_sequence(s, registry));

            let mut block = format!("{{\n    let mut outcome = {main};\n    let mut stdout = outcome.stdout.clone();\n");
            if let Some(catch_expr) = &catch {
                block.push_str(&format!(
                    "    if !outcome.is_success() {{\n        let r = {catch_expr};\n        stdout.push_str(&r.stdout);\n        outcome = r;\n    }}\n"
                ));
            }
            if let Some(finally_expr) = &finally {
                block.push_str(&format!(
                    "    let f = {finally_expr};\n    stdout.push_str(&f.stdout);\n    if outcome.is_success() && !f.is_success() {{ outcome = f; }}\n"
                ));
            }
            block.push_str("    outcome.stdout = stdout;\n    outcome\n}");
            block
        }
        "when" => {
            let variable = element.args.iter().find_map(|a| a.value.as_str()).unwrap_or("");
            let mut arms = String::new();
            let mut default_arm = "CommandResult::ok(\"\")".to_string();
            for (branch_name, seq) in element.branches.iter() {
                let expr = emit_sequence(seq, registry);
                if branch_name == "default" {
                    default_arm = expr;
                } else {
                    arms.push_str(&format!("        {branch_name:?} => {expr},\n"));
                }
            }
            format!(
                "{{\n    let value = std::env::var({variable:?}).unwrap_or_default();\n    match value.as_str() {{\n{arms}        _ => {default_arm},\n    }}\n}}"
            )
        }
        other => format!("CommandResult::err(1, \"@{other} has no generate-mode emission\")"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ArgValue, Arg, ElementContent};
    use indexmap::IndexMap;

    fn program_with(name: &str, seq: CommandSeq) -> Program {
        let mut commands = IndexMap::new();
        commands.insert(name.to_string(), seq);
        Program { commands }
    }

    #[test]
    fn mangles_hyphenated_names_to_upper_camel_case() {
        assert_eq!(mangle("build-release"), "BuildRelease");
        assert_eq!(mangle("deploy"), "Deploy");
    }

    #[test]
    fn emits_one_function_per_command_with_mangled_name() {
        let seq = CommandSeq::new(vec![CommandStep::new(vec![ChainElement::shell(
            ElementContent::literal("echo hi"),
            OpNext::None,
        )])]);
        let program = program_with("build-release", seq);
        let registry = DecoratorRegistry::with_builtins();
        let source = Generator::emit(&program, &registry);
        assert!(source.contains("pub fn cmd_BuildRelease"));
        assert!(source.contains("run_shell"));
    }

    #[test]
    fn retry_block_pulls_in_thread_and_duration_imports() {
        let inner = vec![CommandStep::new(vec![ChainElement::shell(
            ElementContent::literal("false"),
            OpNext::None,
        )])];
        let el = ChainElement::block(
            "retry",
            vec![Arg {
                name: Some("attempts".to_string()),
                value: ArgValue::Number(3.0),
            }],
            inner,
        );
        let seq = CommandSeq::new(vec![CommandStep::new(vec![el])]);
        let program = program_with("flaky", seq);
        let registry = DecoratorRegistry::with_builtins();
        let source = Generator::emit(&program, &registry);
        assert!(source.contains("use std::thread;") || source.contains("use std::time::Duration;"));
        assert!(source.contains("for attempt in 1..=3u32"));
    }

    #[test]
    fn never_depends_on_the_clidef_crate() {
        let program = Program::default();
        let registry = DecoratorRegistry::with_builtins();
        let source = Generator::emit(&program, &registry);
        assert!(!source.contains("crate::"));
        assert!(!source.contains("use clidef"));
    }
}
