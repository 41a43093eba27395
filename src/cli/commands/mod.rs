//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - run() function to execute the command

use clap::Subcommand;

pub mod list;
pub mod show;
pub mod status;
pub mod tail;
pub mod watch;

use crate::app::AppContext;
use crate::error::Result;

pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::List(args) => list::run(ctx, args),
        Commands::Show(args) => show::run(ctx, args),
        Commands::Status(args) => status::run(ctx, args),
        Commands::Tail(args) => tail::run(ctx, args),
        Commands::Watch(args) => watch::run(ctx, args),
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List skills in the skills directory
    List(list::ListArgs),

    /// Show a skill definition with lifecycle tags
    Show(show::ShowArgs),

    /// Print the status of the current or last run
    Status(status::StatusArgs),

    /// Follow the state record and print changes as they happen
    Tail(tail::TailArgs),

    /// Full-screen live view of the current run
    Watch(watch::WatchArgs),
}
