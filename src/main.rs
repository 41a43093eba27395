//! skillview - live view of skill executions
//!
//! Watches the state record an executor writes and projects each run as a
//! step list that patches itself as events arrive.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use skillview::Result;
use skillview::app::{self, AppContext};
use skillview::cli::{Cli, Commands};

/// Component log targets that follow the crate's verbosity level.
const LOG_TARGETS: [&str; 10] = [
    "skillview",
    "watch",
    "reconcile",
    "surface",
    "presence",
    "monitor",
    "skill",
    "list",
    "show",
    "status",
];

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.robot {
                let error_json = serde_json::json!({
                    "error": true,
                    "code": e.code(),
                    "message": e.to_string(),
                });
                println!("{}", serde_json::to_string(&error_json).unwrap_or_default());
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let ctx = AppContext::from_cli(cli)?;
    skillview::cli::commands::run(&ctx, &cli.command)
}

fn filter_for(verbose: u8) -> String {
    let (rest, ours) = match verbose {
        0 => ("warn", "info"),
        1 => ("info", "debug"),
        2 => ("debug", "trace"),
        _ => return "trace".to_string(),
    };
    let mut filter = rest.to_string();
    for target in LOG_TARGETS {
        filter.push_str(&format!(",{target}={ours}"));
    }
    filter
}

/// The full-screen view owns the terminal, so its logs go to a file.
fn tui_log_file(cli: &Cli) -> Option<PathBuf> {
    if !matches!(cli.command, Commands::Watch(_)) {
        return None;
    }
    let dir = app::find_root().ok()?.join("logs");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir.join("skillview.log"))
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = filter_for(cli.verbose);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if matches!(cli.command, Commands::Watch(_)) {
        let Some(file) = tui_log_file(cli)
            .and_then(|path| OpenOptions::new().create(true).append(true).open(path).ok())
        else {
            return;
        };
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .init();
    } else if cli.robot {
        // JSON logging for robot mode
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
