use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelvault")]
#[command(author, version, about = "Media library import and streaming engine")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a directory as a library root
    AddFolder {
        /// Directory to register
        #[arg(required = true)]
        path: PathBuf,

        /// Library kind: movie or tv
        #[arg(long, default_value = "movie")]
        kind: String,
    },

    /// Scan a library root, importing new files and dropping missing ones
    Scan {
        /// Root to scan; all roots when omitted
        root: Option<PathBuf>,
    },

    /// Match imported files against metadata providers
    Refresh {
        /// Limit to files under this path
        path: Option<PathBuf>,

        /// Re-match files that already carry metadata
        #[arg(long)]
        force: bool,
    },

    /// Probe imported files and persist their stream layout
    Analyze {
        /// Limit to files under this path
        path: Option<PathBuf>,

        /// Re-probe files that already have encodings
        #[arg(long)]
        overwrite: bool,
    },

    /// List media files on disk that are not in the library
    Unmapped {
        /// Directory to inspect
        #[arg(required = true)]
        path: PathBuf,
    },

    /// List registered library roots and their imported files
    List {
        /// Show individual files, not just roots
        #[arg(long)]
        files: bool,
    },

    /// List a user's in-progress playback, most recently watched first
    ContinueWatching {
        /// User id whose progress to list
        #[arg(required = true)]
        user: String,
    },
}
