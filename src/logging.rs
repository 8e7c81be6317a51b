use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode, WriteLogger};
use std::fs::OpenOptions;

/// Install the global logger: append to `config.file` when set, else stderr.
///
/// `level` overrides the configured level.
pub fn init(config: &LoggingConfig, level: Option<LevelFilter>) -> Result<()> {
    let level = match level {
        Some(level) => level,
        None => config.level_filter()?,
    };

    match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            WriteLogger::init(level, Config::default(), file)
        }
        None => TermLogger::init(
            level,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ),
    }
    .context("logger already installed")
}
