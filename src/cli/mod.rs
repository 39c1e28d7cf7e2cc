//! CLI module - Command-line interface for YaMDB
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// YaMDB - reviews and ratings for films, books and music
#[derive(Parser)]
#[command(name = "yamdb")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server (default)
    #[command(alias = "web", alias = "runserver")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Load category, genre, user, title, review and comment CSV files
    #[command(alias = "import")]
    ImportCsv {
        /// Directory holding the CSV files (defaults to `import.data_dir`)
        dir: Option<PathBuf>,
    },

    /// Create an admin superuser, or promote an existing account
    CreateSuperuser {
        /// Username of the account
        #[arg(long)]
        username: String,
        /// Email of the account
        #[arg(long)]
        email: String,
    },
}

pub use commands::*;
