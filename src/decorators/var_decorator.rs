//! `@var` (value): reads a CLI variable (§4.5).

use crate::ctx::Ctx;
use crate::error::{ClidefError, ErrorCode};
use crate::ir::Arg;
use crate::registry::{bind_args, ParamType, ParameterDef, ParameterSchema, ValueDecorator};
use async_trait::async_trait;

pub struct VarDecorator;

#[async_trait]
impl ValueDecorator for VarDecorator {
    fn name(&self) -> &'static str {
        "var"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema(vec![ParameterDef {
            name: "name",
            ty: ParamType::Identifier,
            required: true,
            description: "CLI variable name",
        }])
    }

    async fn expand(&self, ctx: &Ctx, args: &[Arg]) -> Result<String, ClidefError> {
        let bound = bind_args("var", &self.schema(), args)?;
        let name = bound.get_str("name").expect("required parameter validated by bind_args");
        ctx.get_var(name).map(str::to_string).ok_or_else(|| {
            ClidefError::runtime(
                ErrorCode::UnknownVariable,
                format!("variable '{name}' is not defined"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ArgValue;
    use crate::testsupport::test_ctx;

    fn name_arg(v: &str) -> Vec<Arg> {
        vec![Arg {
            name: None,
            value: ArgValue::Identifier(v.to_string()),
        }]
    }

    #[tokio::test]
    async fn reads_defined_variable() {
        let mut ctx = test_ctx();
        ctx.set_var("greeting", "hello");
        let result = VarDecorator.expand(&ctx, &name_arg("greeting")).await.unwrap();
        assert_eq!(result, "hello");
    }

    #[tokio::test]
    async fn unknown_variable_is_a_runtime_error() {
        let ctx = test_ctx();
        let err = VarDecorator.expand(&ctx, &name_arg("missing")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownVariable);
    }
}
