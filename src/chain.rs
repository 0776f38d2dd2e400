//! The chain evaluator (§4.3): executes a [`CommandStep`]'s chain of
//! elements honoring `&&`, `||`, `|`, `>>`, tee'ing shell stdout/stderr to
//! the context's sinks while capturing into the returned
//! [`CommandResult`].

use crate::ctx::Ctx;
use crate::expand;
use crate::ir::{ChainElement, ChainElementKind, CommandSeq, CommandStep, OpNext};
use crate::ctx::CommandResult;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

/// Default SIGTERM→SIGKILL grace period (§5); `RuntimeConfig` may shorten
/// it but never lengthen it past this ceiling.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Runs every step of `seq` in order; the first failing step short-circuits
/// the sequence (§3, §4.6).
pub async fn execute_sequence(ctx: &Ctx, seq: &CommandSeq) -> CommandResult {
    let mut last = CommandResult::success("");
    for step in &seq.steps {
        if ctx.is_cancelled() {
            return CommandResult::failure(
                1,
                format!(
                    "cancelled: {}",
                    ctx.cancellation_reason().unwrap_or_else(|| "no reason given".into())
                ),
            );
        }
        last = execute_step(ctx, step).await;
        if last.is_failure() {
            return last;
        }
    }
    last
}

/// Runs a single chain of elements, implementing the execution-gate and
/// output-accumulation rules of §4.3.
pub async fn execute_step(ctx: &Ctx, step: &CommandStep) -> CommandResult {
    let elements = &step.elements;
    let mut last: Option<CommandResult> = None;
    let mut pipe_input: Option<String> = None;
    let mut accumulated_stdout = String::new();
    let mut final_stderr = String::new();
    let mut final_exit = 0;

    for (i, element) in elements.iter().enumerate() {
        let prev_op = if i == 0 {
            OpNext::None
        } else {
            elements[i - 1].op_next
        };

        let gate = match prev_op {
            OpNext::And => last.as_ref().map(CommandResult::is_success).unwrap_or(true),
            OpNext::Or => last.as_ref().map(CommandResult::is_failure).unwrap_or(true),
            OpNext::Pipe | OpNext::Append | OpNext::None => true,
        };

        if !gate {
            continue;
        }

        if ctx.is_cancelled() {
            let reason = ctx.cancellation_reason().unwrap_or_else(|| "cancelled".into());
            final_stderr = reason;
            final_exit = 1;
            break;
        }

        let stdin_for_this = if prev_op == OpNext::Pipe {
            pipe_input.take()
        } else {
            None
        };

        let mut result = execute_element(ctx, element, stdin_for_this).await;

        match element.op_next {
            OpNext::Pipe => {
                pipe_input = Some(result.stdout.clone());
            }
            OpNext::Append => {
                let target = element
                    .target
                    .as_deref()
                    .expect("validated: append requires a target");
                if let Err(e) = append_to_file(target, &result.stdout).await {
                    result = CommandResult::failure(
                        1,
                        format!("failed to append to '{target}': {e}"),
                    );
                } else {
                    result.stdout.clear();
                }
            }
            OpNext::And | OpNext::Or | OpNext::None => {
                accumulated_stdout.push_str(&result.stdout);
            }
        }

        final_stderr = result.stderr.clone();
        final_exit = result.exit_code;
        last = Some(result);
    }

    CommandResult {
        stdout: accumulated_stdout,
        stderr: final_stderr,
        exit_code: final_exit,
    }
}

async fn execute_element(ctx: &Ctx, element: &ChainElement, stdin_data: Option<String>) -> CommandResult {
    match element.kind {
        ChainElementKind::Shell => {
            let content = element
                .content
                .as_ref()
                .expect("shell element always carries content");
            match expand::resolve(content, ctx).await {
                Ok(command) => spawn_shell(ctx, &command, stdin_data).await,
                Err(e) => CommandResult::failure(1, e.to_string()),
            }
        }
        ChainElementKind::Action => {
            let name = element.name.as_deref().unwrap_or_default();
            match ctx.registry().action(name) {
                Some(decorator) => decorator.run(ctx, &element.args).await,
                None => CommandResult::failure(1, format!("decorator @{name} not found")),
            }
        }
        ChainElementKind::Block => {
            let name = element.name.as_deref().unwrap_or_default();
            match ctx.registry().block(name) {
                Some(decorator) => {
                    let inner = CommandSeq::new(element.inner_steps.clone());
                    decorator.wrap_commands(ctx, &element.args, &inner).await
                }
                None => CommandResult::failure(1, format!("decorator @{name} not found")),
            }
        }
        ChainElementKind::Pattern => {
            let name = element.name.as_deref().unwrap_or_default();
            match ctx.registry().pattern(name) {
                Some(decorator) => decorator.select_branch(ctx, &element.args, &element.branches).await,
                None => CommandResult::failure(1, format!("decorator @{name} not found")),
            }
        }
    }
}

/// Spawns `sh -c <command>` under the context's workdir/env, tee'ing
/// stdout/stderr line-by-line to the context's sinks while capturing both
/// streams for the returned result. Honors cooperative cancellation with a
/// SIGTERM→SIGKILL grace period (§5).
async fn spawn_shell(ctx: &Ctx, command: &str, stdin_data: Option<String>) -> CommandResult {
    tracing::debug!(command, workdir = %ctx.workdir().display(), "spawning shell");

    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd.current_dir(ctx.workdir());
    cmd.env_clear();
    for (k, v) in ctx.env_iter() {
        cmd.env(k, v);
    }
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    if stdin_data.is_some() {
        cmd.stdin(std::process::Stdio::piped());
    } else {
        cmd.stdin(ctx.stdin().as_stdio());
    }

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => return CommandResult::failure(127, format!("failed to spawn shell: {e}")),
    };

    if let Some(data) = stdin_data {
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(data.as_bytes()).await;
            let _ = stdin.shutdown().await;
        }
    }

    let stdout = child.stdout.take().expect("stdout piped");
    let stderr = child.stderr.take().expect("stderr piped");
    let quiet = ctx.ui().quiet;
    let out_sink = ctx.stdout().clone();
    let err_sink = ctx.stderr().clone();

    let stdout_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        let mut captured = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            if !quiet {
                out_sink.write_line(&line);
            }
            captured.push_str(&line);
            captured.push('\n');
        }
        captured
    });
    let stderr_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut captured = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            err_sink.write_line(&line);
            captured.push_str(&line);
            captured.push('\n');
        }
        captured
    });

    let cancel = ctx.cancellation().clone();
    let exit_status = tokio::select! {
        status = child.wait() => Some(status),
        _ = cancel.cancelled() => {
            terminate_gracefully(&mut child, ctx.sigterm_grace()).await;
            None
        }
    };

    let stdout_captured = stdout_task.await.unwrap_or_default();
    let stderr_captured = stderr_task.await.unwrap_or_default();

    match exit_status {
        Some(Ok(status)) => CommandResult {
            stdout: stdout_captured,
            stderr: stderr_captured,
            exit_code: status.code().unwrap_or(1),
        },
        Some(Err(e)) => CommandResult::failure(127, format!("failed to wait on shell: {e}")),
        None => CommandResult {
            stdout: stdout_captured,
            stderr: format!(
                "cancelled: {}",
                ctx.cancellation_reason().unwrap_or_else(|| "cancelled".into())
            ),
            exit_code: 1,
        },
    }
}

/// Sends SIGTERM, waits up to `grace`, then SIGKILL if the child hasn't
/// exited (§5: "after a grace period ... SIGKILL").
async fn terminate_gracefully(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }

    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        let _ = child.kill().await;
        let _ = child.wait().await;
    }
}

/// Implements `>>` (§6): create parent dirs (0755) and the target file
/// (0644) if absent, append if present, normalize a trailing newline.
async fn append_to_file(path: &str, content: &str) -> std::io::Result<()> {
    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                tokio::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o755)).await?;
            }
        }
    }

    let mut opts = tokio::fs::OpenOptions::new();
    opts.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o644);
    }
    let mut file = opts.open(path).await?;

    let normalized = if content.is_empty() || content.ends_with('\n') {
        content.to_string()
    } else {
        format!("{content}\n")
    };
    file.write_all(normalized.as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ChainElement, ElementContent, OpNext};
    use crate::testsupport::test_ctx;

    #[tokio::test]
    async fn and_or_short_circuit() {
        let ctx = test_ctx();
        let step = CommandStep::new(vec![
            ChainElement::shell(ElementContent::literal("echo a"), OpNext::And),
            ChainElement::shell(ElementContent::literal("false"), OpNext::Or),
            ChainElement::shell(ElementContent::literal("echo b"), OpNext::None),
        ]);
        let result = execute_step(&ctx, &step).await;
        assert!(result.stdout.contains('a'));
        assert!(result.stdout.contains('b'));
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn pipe_feeds_stdin_to_next_element() {
        let ctx = test_ctx();
        let step = CommandStep::new(vec![
            ChainElement::shell(ElementContent::literal("echo hello"), OpNext::Pipe),
            ChainElement::shell(ElementContent::literal("tr a-z A-Z"), OpNext::None),
        ]);
        let result = execute_step(&ctx, &step).await;
        assert_eq!(result.stdout.trim(), "HELLO");
    }

    #[tokio::test]
    async fn append_writes_file_and_clears_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let ctx = test_ctx().with_workdir(dir.path());

        let mut step = CommandStep::new(vec![ChainElement::shell(
            ElementContent::literal("echo hello | tr a-z A-Z"),
            OpNext::Append,
        )]);
        step.elements[0].target = Some(target.to_string_lossy().to_string());
        let result = execute_step(&ctx, &step).await;
        assert!(result.stdout.is_empty());
        assert_eq!(result.exit_code, 0);

        let contents = std::fs::read_to_string(&target).unwrap();
        assert_eq!(contents, "HELLO\n");
    }

    #[tokio::test]
    async fn sequence_short_circuits_on_failure() {
        let ctx = test_ctx();
        let seq = CommandSeq::new(vec![
            CommandStep::new(vec![ChainElement::shell(
                ElementContent::literal("false"),
                OpNext::None,
            )]),
            CommandStep::new(vec![ChainElement::shell(
                ElementContent::literal("echo should-not-run"),
                OpNext::None,
            )]),
        ]);
        let result = execute_sequence(&ctx, &seq).await;
        assert!(result.is_failure());
        assert!(!result.stdout.contains("should-not-run"));
    }
}
