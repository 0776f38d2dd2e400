//! `@env` (value): reads an OS environment variable from the frozen
//! `EnvSnapshot` (§4.5). Never executes sub-commands.

use crate::ctx::Ctx;
use crate::error::ClidefError;
use crate::ir::Arg;
use crate::registry::{bind_args, ParamType, ParameterDef, ParameterSchema, ValueDecorator};
use async_trait::async_trait;

pub struct EnvDecorator;

#[async_trait]
impl ValueDecorator for EnvDecorator {
    fn name(&self) -> &'static str {
        "env"
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema(vec![
            ParameterDef {
                name: "key",
                ty: ParamType::String,
                required: true,
                description: "environment variable name",
            },
            ParameterDef {
                name: "default",
                ty: ParamType::String,
                required: false,
                description: "value used when unset (or empty, unless allowEmpty)",
            },
            ParameterDef {
                name: "allowEmpty",
                ty: ParamType::Boolean,
                required: false,
                description: "accept an empty string as the value instead of falling back to default",
            },
        ])
    }

    async fn expand(&self, ctx: &Ctx, args: &[Arg]) -> Result<String, ClidefError> {
        let bound = bind_args("env", &self.schema(), args)?;
        let key = bound.get_str("key").expect("required parameter validated by bind_args");
        let default = bound.get_str("default").unwrap_or("").to_string();
        let allow_empty = bound.get_bool("allowEmpty").unwrap_or(false);

        let value = match ctx.get_env(key) {
            None => default,
            Some(v) if v.is_empty() && !allow_empty => default,
            Some(v) => v.to_string(),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ArgValue;
    use crate::testsupport::test_ctx_with_env;
    use std::collections::HashMap;

    fn args(key: &str, default: Option<&str>, allow_empty: Option<bool>) -> Vec<Arg> {
        let mut out = vec![Arg {
            name: Some("key".to_string()),
            value: ArgValue::String(key.to_string()),
        }];
        if let Some(d) = default {
            out.push(Arg {
                name: Some("default".to_string()),
                value: ArgValue::String(d.to_string()),
            });
        }
        if let Some(b) = allow_empty {
            out.push(Arg {
                name: Some("allowEmpty".to_string()),
                value: ArgValue::Bool(b),
            });
        }
        out
    }

    #[tokio::test]
    async fn unset_falls_back_to_default() {
        let ctx = test_ctx_with_env(HashMap::new());
        let value = EnvDecorator.expand(&ctx, &args("MISSING", Some("fallback"), None)).await.unwrap();
        assert_eq!(value, "fallback");
    }

    #[tokio::test]
    async fn empty_falls_back_unless_allow_empty() {
        let env = HashMap::from([("FOO".to_string(), String::new())]);
        let ctx = test_ctx_with_env(env.clone());
        let value = EnvDecorator.expand(&ctx, &args("FOO", Some("fallback"), None)).await.unwrap();
        assert_eq!(value, "fallback");

        let ctx = test_ctx_with_env(env);
        let value = EnvDecorator.expand(&ctx, &args("FOO", Some("fallback"), Some(true))).await.unwrap();
        assert_eq!(value, "");
    }

    #[tokio::test]
    async fn set_value_is_returned() {
        let env = HashMap::from([("FOO".to_string(), "bar".to_string())]);
        let ctx = test_ctx_with_env(env);
        let value = EnvDecorator.expand(&ctx, &args("FOO", None, None)).await.unwrap();
        assert_eq!(value, "bar");
    }
}
