//! Cirrus CLI binary.
//!
//! This binary provides command-line access to Cirrus storage:
//! - Upload files to the configured backend
//! - Resolve and presign stored objects
//! - Delete cloud objects and inspect settings

use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, fetch, print_config, put, remove, url};

    let cli = Cli::parse();
    cirrus::init_tracing(cli.verbose);

    let settings = match &cli.config {
        Some(path) => cirrus::CirrusSettings::from_file(path)?,
        None => cirrus::CirrusSettings::load()?,
    };

    match cli.command {
        Commands::Put {
            file,
            name,
            created_at,
            content_type,
            format,
        } => put(&settings, &file, name, created_at, content_type, format).await?,

        Commands::Fetch {
            id,
            key,
            created_at,
            dir,
        } => fetch(&settings, id, &key, created_at, dir).await?,

        Commands::Url {
            key,
            created_at,
            ttl,
        } => url(&settings, &key, created_at, ttl).await?,

        Commands::Rm { key, created_at } => remove(&settings, &key, created_at).await,

        Commands::Config => print_config(&settings),
    }

    Ok(())
}
