//! CLI argument structures and subcommand routing (§6 expansion).
//!
//! Modeled on the teacher's `cli::args` module: a single `Cli` with a
//! `#[command(subcommand)]` enum, `-v`/`-vv` verbosity counting, and
//! per-subcommand flags. File loading/parsing into a [`crate::ir::Program`]
//! stays out of scope here (§1) — `run`/`plan`/`generate`/`validate` all
//! take an already-built `Program` handed in by the embedding binary.

use crate::config::RuntimeConfig;
use crate::ctx::{Ctx, EnvSnapshot, StdSink, StdinSource, UiFlags};
use crate::ir::Program;
use crate::registry::DecoratorRegistry;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "clidef")]
#[command(about = "clidef - run, preview, or export command definitions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace), or set RUST_LOG directly.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable ANSI color in `plan` output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Automatically answer yes to `@confirm` prompts.
    #[arg(short = 'y', long = "yes", global = true)]
    pub auto_confirm: bool,

    /// Working directory to run in (defaults to the current directory).
    #[arg(short = 'C', long = "workdir", global = true)]
    pub workdir: Option<PathBuf>,

    /// Set a CLI variable, repeatable (`--var KEY=VALUE`).
    #[arg(long = "var", value_name = "KEY=VALUE", global = true)]
    pub vars: Vec<String>,

    /// Path to an optional `clidef.toml` overriding runtime defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the program's IR, serialized as JSON. Lexing/parsing a
    /// `.cli` source into this form is out of scope for this crate (§1) —
    /// this flag exists so the runtime has somewhere to load a `Program`
    /// from without the embedding CLI needing its own subcommand wiring.
    #[arg(long, global = true, default_value = "clidef.program.json")]
    pub program: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Loads a [`Program`] from its serialized-JSON form.
pub fn load_program(path: &std::path::Path) -> Result<Program, crate::error::ClidefError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        crate::error::ClidefError::io(format!("failed to read {}", path.display()), Some(path.to_path_buf()), e)
    })?;
    serde_json::from_str(&text).map_err(|e| crate::error::ClidefError::Config {
        message: format!("failed to parse {}: {e}", path.display()),
    })
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command in-process.
    Run {
        /// Name of the command to execute.
        name: String,
    },
    /// Print the deterministic dry-run tree for a command without running it.
    Plan {
        /// Name of the command to preview.
        name: String,
    },
    /// Emit standalone Rust source reproducing interpret semantics.
    Generate {
        /// Name of the command to emit (omit to emit every declared command).
        name: Option<String>,
    },
    /// Validate a program's decorator parameters and pattern branches without running anything.
    Validate,
}

/// Parses `--var KEY=VALUE` entries, same convention the teacher's `--args`
/// flag uses (silently drops malformed entries rather than erroring — the
/// embedding CLI's flag parsing is out of scope per §1).
pub fn parse_vars(raw: &[String]) -> HashMap<String, String> {
    raw.iter()
        .filter_map(|entry| entry.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Builds the root `Ctx` for a CLI invocation: process env snapshot, real
/// stdio, `RuntimeConfig`-sourced overrides layered on top of the baked-in
/// defaults.
pub fn build_root_ctx(cli: &Cli, program: &Program, config: &RuntimeConfig) -> Ctx {
    let workdir = cli.workdir.clone().unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    let ui = UiFlags {
        no_color: cli.no_color || config.no_color,
        auto_confirm: cli.auto_confirm,
        quiet: false,
    };

    Ctx::new(
        EnvSnapshot::from_process_env(),
        parse_vars(&cli.vars),
        workdir,
        Arc::new(StdSink::stdout()),
        Arc::new(StdSink::stderr()),
        Arc::new(StdinSource),
        Arc::new(program.commands.clone()),
        Arc::new(DecoratorRegistry::with_builtins()),
        ui,
        false,
    )
    .with_sigterm_grace(config.sigterm_grace())
    .with_parallel_cpu_multiplier(config.parallel_cpu_multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_var_assignments() {
        let vars = parse_vars(&["NAME=world".to_string(), "BUILD=release".to_string()]);
        assert_eq!(vars.get("NAME"), Some(&"world".to_string()));
        assert_eq!(vars.get("BUILD"), Some(&"release".to_string()));
    }

    #[test]
    fn drops_entries_without_an_equals_sign() {
        let vars = parse_vars(&["NOTAVAR".to_string()]);
        assert!(vars.is_empty());
    }
}
