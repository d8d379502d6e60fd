#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `wheel`: drive a filter wheel from the command line.

mod cli;
mod console;
mod error_fmt;
mod hw;
mod ops;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{ConfigError, exit_code_for_error, format_error_json, humanize};

fn main() {
    if let Err(e) = color_eyre::install() {
        eprintln!("warning: error reporting hook not installed: {e}");
    }
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = run(&cli) {
        tracing::error!(error = ?e, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("error: {e}\n{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn load_config(path: &Path) -> eyre::Result<wheel_config::Config> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        eyre::Report::new(ConfigError(format!("read {}: {e}", path.display())))
    })?;
    let cfg = wheel_config::load_toml(&text).map_err(|e| {
        eyre::Report::new(ConfigError(format!("parse {}: {e}", path.display())))
    })?;
    cfg.validate()
        .map_err(|e| eyre::Report::new(ConfigError(format!("{e}"))))?;
    Ok(cfg)
}

fn init_tracing(cli: &Cli, logging: &wheel_config::Logging) -> eyre::Result<()> {
    // RUST_LOG wins over --log-level, which wins over [logging].level.
    let default_level = cli
        .log_level
        .clone()
        .or_else(|| logging.level.clone())
        .unwrap_or_else(|| "info".into());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&default_level))
        .map_err(|e| eyre::Report::new(ConfigError(format!("log level {default_level:?}: {e}"))))?;

    // Console logs go to stderr so stdout carries only command output.
    let json_console = cli.json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(false)
    });
    let pretty_console = (!cli.json).then(|| {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    let file_layer = match &logging.file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::Report::new(ConfigError(format!("logging.file {path:?} has no file name"))))?;
            let rotation = match logging.rotation.as_deref() {
                Some("daily") => Rotation::DAILY,
                Some("hourly") => Rotation::HOURLY,
                _ => Rotation::NEVER,
            };
            let appender = RollingFileAppender::new(rotation, dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_thread_ids(true)
                    .with_line_number(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_console)
        .with(pretty_console)
        .with(file_layer)
        .try_init()
        .map_err(|e| eyre::eyre!("init tracing: {e}"))
}

fn run(cli: &Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(cli, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let estop = Arc::new(AtomicBool::new(false));
    {
        let estop = Arc::clone(&estop);
        ctrlc::set_handler(move || {
            // Second Ctrl-C leaves immediately.
            if estop.swap(true, Ordering::Relaxed) {
                std::process::exit(130);
            }
        })
        .map_err(|e| eyre::eyre!("install Ctrl-C handler: {e}"))?;
    }

    let mut wheel = hw::open_wheel(&cfg, &cli.config, Arc::clone(&estop))?;
    tracing::info!(
        slot = wheel.current_slot(),
        filters = wheel.filter_count(),
        calibrated = wheel.is_calibrated(),
        "wheel ready"
    );

    match &cli.cmd {
        Commands::Console => {
            let stdin = std::io::stdin();
            console::run(&mut wheel, stdin.lock(), &estop, cli.json)
        }
        cmd => ops::execute(&mut wheel, cmd, &cfg, cli.json),
    }
}
