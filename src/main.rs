use aesh::Interpreter;
use aesh::command::ExecutionResult;
use aesh::config::ShellConfig;
use aesh::logging;
use anyhow::{Context, Result};
use argh::FromArgs;
use log::LevelFilter;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(FromArgs, Debug)]
/// Interactive shell with typed builtin commands.
struct Args {
    /// run one line and exit with its status
    #[argh(option, short = 'c')]
    command: Option<String>,

    /// configuration file (default: ~/.config/aesh/config.toml)
    #[argh(option)]
    config: Option<PathBuf>,

    /// log level: off, error, warn, info, debug or trace
    #[argh(option)]
    log_level: Option<LevelFilter>,
}

fn main() -> Result<ExitCode> {
    let args: Args = argh::from_env();

    let config = ShellConfig::load(args.config.as_deref())?;
    logging::init(&config.logging, args.log_level)?;
    log::debug!("CLI args parsed: {:?}", args);

    let mut sh = Interpreter::with_builtins()
        .context("invalid builtin schema")?
        .with_config(config);

    match args.command {
        Some(line) => {
            let status = match sh.run_line(&line) {
                Ok(result) => result.map_or(0, ExecutionResult::exit_code),
                Err(_) => ExecutionResult::Failure.exit_code(),
            };
            Ok(ExitCode::from(status))
        }
        None => {
            sh.repl()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
