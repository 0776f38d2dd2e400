//! # clidef
//!
//! A command-definition runtime: users write a `.cli`-style source defining
//! named commands, variables, and decorated blocks (`@timeout`, `@retry`,
//! `@parallel`, `@when`, `@try`, `@workdir`, `@confirm`, `@cmd`, `@var`,
//! `@env`). Three execution modes run over the same immutable IR —
//! *interpret* (run commands in-process), *plan* (print a deterministic
//! dry-run tree), and *generate* (emit standalone Rust source reproducing
//! interpret semantics without this crate).
//!
//! ## Modules
//!
//! - `ir` - the immutable intermediate representation
//! - `ctx` - frozen execution context, I/O sinks/sources, cancellation
//! - `error` - load-time error model
//! - `duration` - duration-literal parsing shared by `@timeout`/`@retry`
//! - `registry` - the four decorator capability traits and their registry
//! - `expand` - value-decorator content resolution for shell elements
//! - `chain` - the chain evaluator (`&&`/`||`/`|`/`>>`)
//! - `decorators` - the ten built-in decorators
//! - `interpret` - top-level command dispatch
//! - `plan` - the plan/dry-run tree generator
//! - `generate` - standalone Rust source emission
//! - `validate` - load-time parameter/pattern validation
//! - `config` - `RuntimeConfig` loading
//! - `cli` - argument parsing and subcommand routing

pub mod chain;
pub mod cli;
pub mod config;
pub mod ctx;
pub mod decorators;
pub mod duration;
pub mod error;
pub mod expand;
pub mod generate;
pub mod interpret;
pub mod ir;
pub mod plan;
pub mod registry;
pub mod validate;

#[cfg(test)]
pub(crate) mod testsupport;
