//! Animart CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! animart-cli migrate
//!
//! # Load categories, products and coupons from a YAML file
//! animart-cli seed catalog.yaml
//!
//! # Account management
//! animart-cli user promote -e owner@animart.dev
//! animart-cli user block -e spammer@example.com
//! animart-cli user unblock -e spammer@example.com
//! ```
//!
//! All commands read `DATABASE_URL` from the environment (or `.env`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "animart-cli")]
#[command(author, version, about = "Animart CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the catalog from a YAML file
    Seed {
        /// Path to the seed file
        file: PathBuf,
    },
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Give an account the admin role
    Promote {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Block an account from signing in
    Block {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Lift a block
    Unblock {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file } => {
            commands::seed::run(&file).await?;
        }
        Commands::User { action } => match action {
            UserAction::Promote { email } => commands::user::promote(&email).await?,
            UserAction::Block { email } => commands::user::set_blocked(&email, true).await?,
            UserAction::Unblock { email } => commands::user::set_blocked(&email, false).await?,
        },
    }
    Ok(())
}
