//! The ten built-in decorators (§4.5), registered once into a fresh
//! [`DecoratorRegistry`].

mod cmd_decorator;
mod confirm_decorator;
mod env_decorator;
mod parallel_decorator;
mod retry_decorator;
mod timeout_decorator;
mod try_decorator;
mod var_decorator;
mod when_decorator;
mod workdir_decorator;

use crate::registry::DecoratorRegistry;
use std::sync::Arc;

pub fn install_builtins(registry: &mut DecoratorRegistry) {
    registry.register_value(Arc::new(var_decorator::VarDecorator));
    registry.register_value(Arc::new(env_decorator::EnvDecorator));

    registry.register_action(Arc::new(cmd_decorator::CmdDecorator));

    registry.register_block(Arc::new(confirm_decorator::ConfirmDecorator));
    registry.register_block(Arc::new(workdir_decorator::WorkdirDecorator));
    registry.register_block(Arc::new(timeout_decorator::TimeoutDecorator));
    registry.register_block(Arc::new(retry_decorator::RetryDecorator));
    registry.register_block(Arc::new(parallel_decorator::ParallelDecorator));

    registry.register_pattern(Arc::new(try_decorator::TryDecorator));
    registry.register_pattern(Arc::new(when_decorator::WhenDecorator));
}
