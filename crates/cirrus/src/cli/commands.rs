//! CLI command definitions.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Cirrus - backend-agnostic attachment storage
#[derive(Parser, Debug)]
#[command(name = "cirrus")]
#[command(about = "Store, fetch and presign attachments on local, S3, GCS or Azure storage", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file to use instead of the default search path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a file to the selected backend
    Put {
        /// File to upload
        file: PathBuf,

        /// Filename to record instead of the file's own name
        #[arg(long)]
        name: Option<String>,

        /// Record creation time (RFC 3339), defaults to now
        #[arg(long)]
        created_at: Option<DateTime<Utc>>,

        /// Content type to store instead of inferring one
        #[arg(long)]
        content_type: Option<String>,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Print a readable local path for a stored object
    Fetch {
        /// Owning record id
        #[arg(long)]
        id: u64,

        /// Encoded key
        #[arg(long)]
        key: String,

        /// Record creation time (RFC 3339)
        #[arg(long)]
        created_at: DateTime<Utc>,

        /// Local directory of the object, defaults to the creation month
        #[arg(long)]
        dir: Option<String>,
    },

    /// Print a presigned URL for a cloud object
    Url {
        /// Encoded key
        #[arg(long)]
        key: String,

        /// Record creation time (RFC 3339)
        #[arg(long)]
        created_at: DateTime<Utc>,

        /// URL lifetime in seconds, defaults to the backend's expiry
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Delete a cloud object
    Rm {
        /// Encoded key
        #[arg(long)]
        key: String,

        /// Record creation time (RFC 3339)
        #[arg(long)]
        created_at: DateTime<Utc>,
    },

    /// Show the effective settings with secrets masked
    Config,
}

/// Output format options
#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}
