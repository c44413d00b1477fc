use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "ludio",
    version,
    about = "Play a YouTube playlist as a quest: listen, earn XP, unlock tracks"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a new quest from a playlist id, abandoning any saved one
    Start {
        /// YouTube playlist id (e.g. PL...)
        playlist_id: String,
    },
    /// Resume the saved quest
    Resume,
    /// Print the saved quest snapshot
    Status,
    /// Delete the saved quest snapshot
    Abandon,
    /// Open the interactive player (default)
    Tui,
}
