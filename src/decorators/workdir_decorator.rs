//! `@workdir` (block): scopes the inner sequence to a different working
//! directory without ever touching the process CWD (§4.5, §4.1).

use crate::ctx::{Ctx, CommandResult};
use crate::error::ClidefError;
use crate::ir::{Arg, CommandSeq};
use crate::plan::{ExecutionStep, StepType};
use crate::registry::{bind_args, BlockDecorator, ImportRequirements, ParamType, ParameterDef, ParameterSchema};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub struct WorkdirDecorator;

fn validate_path(path: &str) -> Result<(), ClidefError> {
    if path.is_empty() {
        return Err(ClidefError::parameter_validation("workdir", "path must not be empty"));
    }
    if Path::new(path).components().any(|c| c.as_os_str() == "..") {
        return Err(ClidefError::parameter_validation(
            "workdir",
            "path must not contain '..' segments",
        ));
    }
    Ok(())
}

#[async_trait]
impl BlockDecorator for WorkdirDecorator {
    fn name(&self) -> &'static str {
        "workdir"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema(vec![
            ParameterDef {
                name: "path",
                ty: ParamType::String,
                required: true,
                description: "directory to run the inner sequence under",
            },
            ParameterDef {
                name: "createIfNotExists",
                ty: ParamType::Boolean,
                required: false,
                description: "create the directory (recursively, mode 0755) if it's absent",
            },
        ])
    }

    async fn wrap_commands(&self, ctx: &Ctx, args: &[Arg], inner: &CommandSeq) -> CommandResult {
        let bound = match bind_args("workdir", &self.schema(), args) {
            Ok(b) => b,
            Err(e) => return CommandResult::failure(1, e.to_string()),
        };
        let path = bound.get_str("path").expect("required parameter validated by bind_args");
        if let Err(e) = validate_path(path) {
            return CommandResult::failure(1, e.to_string());
        }
        let create_if_not_exists = bound.get_bool("createIfNotExists").unwrap_or(false);

        let target: PathBuf = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            ctx.workdir().join(path)
        };

        if create_if_not_exists {
            if let Err(e) = tokio::fs::create_dir_all(&target).await {
                return CommandResult::failure(1, format!("failed to create '{}': {e}", target.display()));
            }
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = tokio::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o755)).await;
            }
        } else {
            match tokio::fs::metadata(&target).await {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => {
                    return CommandResult::failure(1, format!("'{}' exists but is not a directory", target.display()))
                }
                Err(e) => {
                    return CommandResult::failure(1, format!("workdir '{}' does not exist: {e}", target.display()))
                }
            }
        }

        let child_ctx = ctx.with_workdir(target);
        crate::chain::execute_sequence(&child_ctx, inner).await
    }

    async fn describe(&self, _ctx: &Ctx, args: &[Arg], inner_step: ExecutionStep) -> ExecutionStep {
        let path = args.iter().find_map(|a| a.value.as_str()).unwrap_or("?");
        ExecutionStep::leaf("0", StepType::Decorator, format!("@workdir(path=\"{path}\")")).with_children(vec![inner_step])
    }

    fn import_requirements(&self) -> ImportRequirements {
        ImportRequirements(vec!["std::fs", "std::path::PathBuf"])
    }
}
