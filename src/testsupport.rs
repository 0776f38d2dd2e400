//! Shared test-context builder, used by unit tests across modules.
#![cfg(test)]

use crate::ctx::{BufferSink, Ctx, EnvSnapshot, ScriptedInput, UiFlags};
use crate::ir::CommandSeq;
use crate::registry::DecoratorRegistry;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

pub fn test_ctx() -> Ctx {
    Ctx::new(
        EnvSnapshot::from_map(HashMap::new()),
        HashMap::new(),
        std::env::temp_dir(),
        Arc::new(BufferSink::new()),
        Arc::new(BufferSink::new()),
        Arc::new(ScriptedInput::new(vec![])),
        Arc::new(IndexMap::<String, CommandSeq>::new()),
        Arc::new(DecoratorRegistry::with_builtins()),
        UiFlags::default(),
        false,
    )
}

pub fn test_ctx_with_env(env: HashMap<String, String>) -> Ctx {
    Ctx::new(
        EnvSnapshot::from_map(env),
        HashMap::new(),
        std::env::temp_dir(),
        Arc::new(BufferSink::new()),
        Arc::new(BufferSink::new()),
        Arc::new(ScriptedInput::new(vec![])),
        Arc::new(IndexMap::<String, CommandSeq>::new()),
        Arc::new(DecoratorRegistry::with_builtins()),
        UiFlags::default(),
        false,
    )
}
