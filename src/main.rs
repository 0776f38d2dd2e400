//! clidef CLI entry point.
//!
//! A thin composition layer: parse arguments, initialize logging, load the
//! `RuntimeConfig` and the program's IR, route to the requested mode, map
//! the result onto the documented exit codes (§6 expansion).

use clidef::cli::{build_root_ctx, load_program, Cli, Commands};
use clidef::config::RuntimeConfig;
use clap::Parser;
use tracing::error;

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(|| "clidef.toml".into());
    let config = match RuntimeConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            std::process::exit(2);
        }
    };

    let program = match load_program(&cli.program) {
        Ok(p) => p,
        Err(e) => {
            error!("{e}");
            std::process::exit(2);
        }
    };

    let registry = clidef::registry::DecoratorRegistry::with_builtins();
    if let Err(e) = clidef::validate::validate_program(&program, &registry) {
        error!("{e}");
        std::process::exit(2);
    }

    let ctx = build_root_ctx(&cli, &program, &config);

    let exit_code = match &cli.command {
        Commands::Run { name } => {
            let result = clidef::interpret::run_command(&ctx, name).await;
            if result.is_failure() && !result.stderr.is_empty() {
                eprintln!("{}", result.stderr);
            }
            if result.is_success() {
                0
            } else {
                1
            }
        }
        Commands::Plan { name } => match program.commands.get(name) {
            Some(seq) => {
                let plan = clidef::plan::build(&ctx, name, seq).await;
                println!("{}", clidef::plan::render(name, &plan, cli.no_color));
                0
            }
            None => {
                eprintln!("command '{name}' is not declared");
                2
            }
        },
        Commands::Generate { name } => {
            let mut to_emit = program.clone();
            if let Some(name) = name {
                match to_emit.commands.shift_remove(name) {
                    Some(seq) => {
                        to_emit.commands.clear();
                        to_emit.commands.insert(name.clone(), seq);
                    }
                    None => {
                        eprintln!("command '{name}' is not declared");
                        std::process::exit(2);
                    }
                }
            }
            print!("{}", clidef::generate::Generator::emit(&to_emit, &registry));
            0
        }
        Commands::Validate => 0, // validate_program above already ran; reaching here means it passed.
    };

    std::process::exit(exit_code);
}
