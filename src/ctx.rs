//! Frozen execution context.
//!
//! `Ctx` bundles everything an evaluator needs to run a command and nothing
//! it should be able to mutate out from under a sibling: an immutable env
//! snapshot, a per-scope variable map, the working directory, I/O sinks, a
//! cancellation token, UI flags, and the command table. Scoping decorators
//! (`@workdir`, `@timeout`, `@retry`'s delay, `@parallel`'s per-task
//! isolation) never touch the process; they clone `Ctx` and hand the clone
//! downward.

use crate::ir::CommandSeq;
use crate::registry::DecoratorRegistry;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Immutable env mapping, captured once per top-level invocation. Shared
/// read-only across a `Ctx` and all of its children — overrides never
/// mutate it, they produce a new `Ctx` instead.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub fn from_process_env() -> Self {
        EnvSnapshot {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_map(vars: HashMap<String, String>) -> Self {
        EnvSnapshot { vars }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// CLI variable values, resolved once at program load (string/number/bool
/// /duration literals only — no cross-references). Deep-copied into child
/// contexts so sibling scopes never observe each other's shadowing.
pub type VarMap = HashMap<String, String>;

/// The result of executing a shell element, an action decorator, or an
/// entire chain/step/sequence. Success iff `exit_code == 0`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(stdout: impl Into<String>) -> Self {
        CommandResult {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        CommandResult {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }
}

/// A shared, line-atomic output destination. Implementations must buffer a
/// caller's write and flush whole lines under a single lock so concurrent
/// `@parallel` tasks never interleave partial lines (§5).
pub trait OutputSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Writes to the process's real stdout/stderr.
pub struct StdSink {
    is_stderr: bool,
}

impl StdSink {
    pub fn stdout() -> Self {
        StdSink { is_stderr: false }
    }

    pub fn stderr() -> Self {
        StdSink { is_stderr: true }
    }
}

impl OutputSink for StdSink {
    fn write_line(&self, line: &str) {
        if self.is_stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
}

/// Captures written lines in memory — used by tests and by `plan` mode,
/// which never touches real stdout.
#[derive(Clone, Default)]
pub struct BufferSink {
    buf: Arc<Mutex<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buf.lock().expect("buffer sink poisoned").clone()
    }
}

impl OutputSink for BufferSink {
    fn write_line(&self, line: &str) {
        let mut buf = self.buf.lock().expect("buffer sink poisoned");
        buf.push_str(line);
        buf.push('\n');
    }
}

/// Discards everything — used for "quiet" UI mode's stdout stream.
pub struct NullSink;

impl OutputSink for NullSink {
    fn write_line(&self, _line: &str) {}
}

/// A line-oriented stdin source, abstracted so `@confirm` can be driven by
/// a fixed script in tests instead of the real terminal.
pub trait InputSource: Send + Sync {
    fn read_line(&self) -> std::io::Result<Option<String>>;

    /// How an un-piped shell element should receive stdin: the real source
    /// inherits the process's terminal, a scripted source (tests) supplies
    /// nothing.
    fn as_stdio(&self) -> std::process::Stdio {
        std::process::Stdio::null()
    }
}

pub struct StdinSource;

impl InputSource for StdinSource {
    fn read_line(&self) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        let n = std::io::stdin().read_line(&mut line)?;
        if n == 0 {
            Ok(None)
        } else {
            Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
        }
    }

    fn as_stdio(&self) -> std::process::Stdio {
        std::process::Stdio::inherit()
    }
}

/// A scripted stdin source for tests: returns each configured line once, in
/// order, then `None`.
#[derive(Clone, Default)]
pub struct ScriptedInput {
    lines: Arc<Mutex<std::collections::VecDeque<String>>>,
}

impl ScriptedInput {
    pub fn new(lines: Vec<String>) -> Self {
        ScriptedInput {
            lines: Arc::new(Mutex::new(lines.into())),
        }
    }
}

impl InputSource for ScriptedInput {
    fn read_line(&self) -> std::io::Result<Option<String>> {
        Ok(self.lines.lock().expect("scripted input poisoned").pop_front())
    }
}

/// UI-facing flags that affect rendering and prompting, not execution
/// semantics.
#[derive(Debug, Clone, Copy, Default)]
pub struct UiFlags {
    pub no_color: bool,
    pub auto_confirm: bool,
    /// Quiet mode: only stderr streams live; stdout is captured only (§4.3).
    pub quiet: bool,
}

/// Frozen execution context. Cheap to clone: the env snapshot and command
/// table are shared behind `Arc`, only the variable map and workdir are
/// deep-copied.
#[derive(Clone)]
pub struct Ctx {
    env: Arc<EnvSnapshot>,
    vars: VarMap,
    workdir: PathBuf,
    stdout: Arc<dyn OutputSink>,
    stderr: Arc<dyn OutputSink>,
    stdin: Arc<dyn InputSource>,
    commands: Arc<IndexMap<String, CommandSeq>>,
    registry: Arc<DecoratorRegistry>,
    ui: UiFlags,
    debug: bool,
    dry_run: bool,
    cancel: CancellationToken,
    /// Flipped by `@confirm`'s "no" branch when `abort_on_no` — read by the
    /// interpret evaluator to short-circuit without re-deriving the reason.
    cancelled_reason: Arc<Mutex<Option<String>>>,
    /// `RuntimeConfig`-sourced values the chain evaluator and `@parallel`
    /// consult; `Ctx::new` bakes in the documented defaults (5s / 2x CPU) so
    /// every existing construction site keeps working unchanged.
    sigterm_grace: std::time::Duration,
    parallel_cpu_multiplier: u32,
}

impl Ctx {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        env: EnvSnapshot,
        vars: VarMap,
        workdir: PathBuf,
        stdout: Arc<dyn OutputSink>,
        stderr: Arc<dyn OutputSink>,
        stdin: Arc<dyn InputSource>,
        commands: Arc<IndexMap<String, CommandSeq>>,
        registry: Arc<DecoratorRegistry>,
        ui: UiFlags,
        dry_run: bool,
    ) -> Self {
        Ctx {
            env: Arc::new(env),
            vars,
            workdir,
            stdout,
            stderr,
            stdin,
            commands,
            registry,
            ui,
            debug: false,
            dry_run,
            cancel: CancellationToken::new(),
            cancelled_reason: Arc::new(Mutex::new(None)),
            sigterm_grace: crate::chain::DEFAULT_GRACE_PERIOD,
            parallel_cpu_multiplier: 2,
        }
    }

    /// Overrides the grace period between SIGTERM and SIGKILL, sourced from
    /// `RuntimeConfig::sigterm_grace_ms`.
    pub fn with_sigterm_grace(mut self, grace: std::time::Duration) -> Self {
        self.sigterm_grace = grace;
        self
    }

    /// Overrides `@parallel`'s default-concurrency CPU multiplier, sourced
    /// from `RuntimeConfig::parallel_cpu_multiplier`.
    pub fn with_parallel_cpu_multiplier(mut self, multiplier: u32) -> Self {
        self.parallel_cpu_multiplier = multiplier;
        self
    }

    pub fn sigterm_grace(&self) -> std::time::Duration {
        self.sigterm_grace
    }

    pub fn parallel_cpu_multiplier(&self) -> u32 {
        self.parallel_cpu_multiplier
    }

    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.env.get(key)
    }

    pub fn env_iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env.iter()
    }

    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn stdout(&self) -> &Arc<dyn OutputSink> {
        &self.stdout
    }

    pub fn stderr(&self) -> &Arc<dyn OutputSink> {
        &self.stderr
    }

    pub fn stdin(&self) -> &Arc<dyn InputSource> {
        &self.stdin
    }

    pub fn commands(&self) -> &IndexMap<String, CommandSeq> {
        &self.commands
    }

    pub fn registry(&self) -> &DecoratorRegistry {
        &self.registry
    }

    pub fn ui(&self) -> UiFlags {
        self.ui
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Records why cancellation happened and fires the token. Idempotent.
    pub fn cancel(&self, reason: impl Into<String>) {
        let mut slot = self.cancelled_reason.lock().expect("cancel reason poisoned");
        if slot.is_none() {
            *slot = Some(reason.into());
        }
        self.cancel.cancel();
    }

    pub fn cancellation_reason(&self) -> Option<String> {
        self.cancelled_reason.lock().expect("cancel reason poisoned").clone()
    }

    /// Returns a new `Ctx` scoped to `path`. The process CWD is never
    /// touched — every command spawn sets its own explicit `cwd` from the
    /// returned context's `workdir()` (§4.1).
    pub fn with_workdir(&self, path: impl Into<PathBuf>) -> Self {
        let mut child = self.clone();
        child.workdir = path.into();
        child
    }

    /// Returns a child `Ctx` whose cancellation token is linked to the
    /// parent's (cancelling the parent cancels the child) alongside an
    /// independent token the caller can cancel without affecting siblings —
    /// used by `@timeout`'s deadline and `@parallel`'s `failOnFirstError`.
    pub fn with_child_cancellation(&self) -> Self {
        let mut child = self.clone();
        child.cancel = self.cancel.child_token();
        child
    }

    /// A context for one `@parallel` task: independent cancellation scope
    /// (still linked to the parent) and its own variable map so a task
    /// cannot leak scoping into siblings (§5).
    pub fn fork_for_task(&self) -> Self {
        self.with_child_cancellation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ctx() -> Ctx {
        Ctx::new(
            EnvSnapshot::from_map(HashMap::from([("FOO".to_string(), "bar".to_string())])),
            HashMap::new(),
            PathBuf::from("/tmp"),
            Arc::new(BufferSink::new()),
            Arc::new(BufferSink::new()),
            Arc::new(ScriptedInput::new(vec![])),
            Arc::new(IndexMap::new()),
            Arc::new(DecoratorRegistry::with_builtins()),
            UiFlags::default(),
            false,
        )
    }

    #[test]
    fn env_is_frozen_across_clones() {
        let ctx = test_ctx();
        let child = ctx.with_workdir("/other");
        assert_eq!(child.get_env("FOO"), Some("bar"));
        assert_eq!(ctx.workdir(), Path::new("/tmp"));
        assert_eq!(child.workdir(), Path::new("/other"));
    }

    #[test]
    fn child_vars_do_not_leak_to_parent() {
        let mut ctx = test_ctx();
        ctx.set_var("x", "1");
        let mut child = ctx.clone();
        child.set_var("x", "2");
        assert_eq!(ctx.get_var("x"), Some("1"));
        assert_eq!(child.get_var("x"), Some("2"));
    }

    #[test]
    fn cancellation_propagates_to_children() {
        let ctx = test_ctx();
        let child = ctx.with_child_cancellation();
        ctx.cancel("test");
        assert!(child.is_cancelled());
    }
}
