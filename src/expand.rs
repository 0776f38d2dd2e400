//! Value-expansion engine: resolves a shell element's [`ElementContent`] to
//! a concrete command string by concatenating literal fragments with value
//! decorator invocations (`@var`, `@env`).

use crate::ctx::Ctx;
use crate::error::ClidefError;
use crate::ir::{ContentPart, ElementContent};

pub async fn resolve(content: &ElementContent, ctx: &Ctx) -> Result<String, ClidefError> {
    let mut out = String::new();
    for part in &content.parts {
        match part {
            ContentPart::Literal(text) => out.push_str(text),
            ContentPart::Decorator { name, args } => {
                let decorator = ctx
                    .registry()
                    .value(name)
                    .ok_or_else(|| ClidefError::unknown_decorator(name.clone()))?
                    .clone();
                let expanded = decorator.expand(ctx, args).await?;
                out.push_str(&expanded);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Arg, ArgValue};
    use crate::testsupport::test_ctx;

    #[tokio::test]
    async fn concatenates_literals_and_var_expansion() {
        let mut ctx = test_ctx();
        ctx.set_var("name", "world");
        let content = ElementContent {
            parts: vec![
                ContentPart::Literal("echo hello ".to_string()),
                ContentPart::Decorator {
                    name: "var".to_string(),
                    args: vec![Arg {
                        name: None,
                        value: ArgValue::Identifier("name".to_string()),
                    }],
                },
            ],
        };
        let resolved = resolve(&content, &ctx).await.unwrap();
        assert_eq!(resolved, "echo hello world");
    }

    #[tokio::test]
    async fn unknown_variable_is_an_expansion_error() {
        let ctx = test_ctx();
        let content = ElementContent {
            parts: vec![ContentPart::Decorator {
                name: "var".to_string(),
                args: vec![Arg {
                    name: None,
                    value: ArgValue::Identifier("missing".to_string()),
                }],
            }],
        };
        assert!(resolve(&content, &ctx).await.is_err());
    }
}
