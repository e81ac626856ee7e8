//! COA Bridge CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! coa-cli migrate
//!
//! # Print a shop's COA list as JSON
//! coa-cli fetch --shop oil-co.myshopify.com
//!
//! # Remove a shop's stored token
//! coa-cli forget --shop oil-co.myshopify.com
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "coa-cli")]
#[command(author, version, about = "COA Bridge CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Collect a shop's certificates of analysis and print them as JSON
    Fetch {
        /// Shop domain (e.g., oil-co.myshopify.com)
        #[arg(short, long)]
        shop: String,

        /// Override the page ceiling from `COA_MAX_PAGES`
        #[arg(long)]
        max_pages: Option<usize>,
    },
    /// Delete a shop's stored access token
    Forget {
        /// Shop domain (e.g., oil-co.myshopify.com)
        #[arg(short, long)]
        shop: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing (stderr, so `fetch` output stays pipeable)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coa_cli=info,coa_bridge_server=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Fetch { shop, max_pages } => commands::fetch::run(&shop, max_pages).await?,
        Commands::Forget { shop } => commands::shops::forget(&shop).await?,
    }
    Ok(())
}
