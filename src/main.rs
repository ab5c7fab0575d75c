mod config;
mod destinations;
mod fs;
mod index;
mod library;
mod logging;
mod organizer;
mod server;
mod subcommands;
mod torrent;
mod util;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use subcommands::{DeleteArgs, IndexArgs, MoveArgs, ScanArgs, ServeArgs};

/// Organizes a library of `.strm` folders and tracks where each torrent's folder ends up.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Config file to load. Defaults apply if it does not exist.
    #[arg(long, global(true), default_value = "strmctl.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the library over HTTP.
    Serve(ServeArgs),
    /// List folders containing stream markers.
    Scan(ScanArgs),
    /// Move folders into another folder, updating tracked torrent paths.
    Move(MoveArgs),
    /// Delete folders or single stream files, forgetting their tracked torrent paths.
    Delete(DeleteArgs),
    /// Print the tracked torrent paths.
    Index(IndexArgs),
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = config::Config::load(&args.config)?;
    let log_file = matches!(args.command, Command::Serve(_)).then_some(config.log_file.as_path());
    let _log_guard = logging::init(log_file)?;

    match args.command {
        Command::Serve(args) => args.exec(config),
        Command::Scan(args) => args.exec(&config),
        Command::Move(args) => args.exec(&config),
        Command::Delete(args) => args.exec(&config),
        Command::Index(args) => args.exec(&config),
    }
}
