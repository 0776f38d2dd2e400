//! Unified error type for load-time failures.
//!
//! Runtime failures (a shell command returning non-zero, a decorator timing
//! out, an unset variable) are *not* represented here — per the execution
//! model, those surface as a [`crate::ctx::CommandResult`] with a non-zero
//! exit code and a message in `stderr`. `ClidefError` is reserved for the
//! handful of failures that must stop the program before anything runs:
//! parameter validation, decorator registry misses, and config/IO problems
//! encountered while setting up a run.

use std::path::PathBuf;
use thiserror::Error;

/// Stable error code, surfaced in messages and used by tests to assert on
/// the specific failure kind without string-matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParameterValidation,
    UnknownDecorator,
    Config,
    Io,
    UnknownVariable,
    UnknownCommand,
    ShellNonzero,
    Timeout,
    Cancelled,
    Aggregate,
    TryPropagated,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ParameterValidation => "E1001",
            ErrorCode::UnknownDecorator => "E2001",
            ErrorCode::UnknownVariable => "E2002",
            ErrorCode::UnknownCommand => "E2003",
            ErrorCode::ShellNonzero => "E3001",
            ErrorCode::Timeout => "E3002",
            ErrorCode::Cancelled => "E3003",
            ErrorCode::Aggregate => "E3004",
            ErrorCode::TryPropagated => "E3005",
            ErrorCode::Config => "E4002",
            ErrorCode::Io => "E4001",
        }
    }
}

#[derive(Error, Debug)]
pub enum ClidefError {
    #[error("[{}] invalid parameter for @{decorator}: {message}", ErrorCode::ParameterValidation.as_str())]
    ParameterValidation { decorator: String, message: String },

    #[error("[{}] @{name} not found", ErrorCode::UnknownDecorator.as_str())]
    UnknownDecorator { name: String },

    #[error("[{}] {message}", ErrorCode::Config.as_str())]
    Config { message: String },

    #[error("[{}] {message}", ErrorCode::Io.as_str())]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Catch-all for the runtime (non-fatal) error kinds in §7's table —
    /// `unknown-variable`, `unknown-command`, `shell-nonzero`, `timeout`,
    /// `cancelled`, `aggregate`, `try-propagated`. These are never raised by
    /// `Program::validate`; they're produced inside a decorator's
    /// `expand`/`run`/`wrap_commands`/`select_branch` and caught by the
    /// chain evaluator, which turns them into a `CommandResult` failure
    /// rather than aborting the process.
    #[error("[{}] {message}", code.as_str())]
    Runtime { code: ErrorCode, message: String },
}

impl ClidefError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ClidefError::ParameterValidation { .. } => ErrorCode::ParameterValidation,
            ClidefError::UnknownDecorator { .. } => ErrorCode::UnknownDecorator,
            ClidefError::Config { .. } => ErrorCode::Config,
            ClidefError::Io { .. } => ErrorCode::Io,
            ClidefError::Runtime { code, .. } => *code,
        }
    }

    pub fn parameter_validation(decorator: impl Into<String>, message: impl Into<String>) -> Self {
        ClidefError::ParameterValidation {
            decorator: decorator.into(),
            message: message.into(),
        }
    }

    pub fn unknown_decorator(name: impl Into<String>) -> Self {
        ClidefError::UnknownDecorator { name: name.into() }
    }

    pub fn runtime(code: ErrorCode, message: impl Into<String>) -> Self {
        ClidefError::Runtime {
            code,
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>, path: Option<PathBuf>, source: std::io::Error) -> Self {
        ClidefError::Io {
            message: message.into(),
            path,
            source: Some(source),
        }
    }
}

/// Adds `.context()` chaining to any `Result<_, E: Into<ClidefError>>`, the
/// way callers thread a human-readable trail through effect boundaries.
pub trait ErrorExt<T> {
    fn context(self, message: impl Into<String>) -> Result<T, ClidefError>;
}

impl<T> ErrorExt<T> for Result<T, ClidefError> {
    fn context(self, message: impl Into<String>) -> Result<T, ClidefError> {
        self.map_err(|e| match e {
            ClidefError::Config { message: inner } => ClidefError::Config {
                message: format!("{}: {inner}", message.into()),
            },
            other => other,
        })
    }
}

pub type Result<T> = std::result::Result<T, ClidefError>;
