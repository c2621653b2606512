//! Bullet Cloud CLI - Database migrations and order fulfilment tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! bc-cli migrate
//!
//! # Move an order along its lifecycle
//! bc-cli order status 5f0c...e1 processing
//!
//! # Record a carrier tracking number
//! bc-cli order track 5f0c...e1 1Z999AA10123456784
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `order status` - Apply a status transition (same rules as the API)
//! - `order track` - Set an order's tracking number

#![cfg_attr(not(test), forbid(unsafe_code))]

use bullet_cloud_core::{OrderId, OrderStatus};
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bc-cli")]
#[command(author, version, about = "Bullet Cloud CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Fulfilment operations on orders
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Transition an order to a new status
    Status {
        /// Order ID
        id: OrderId,

        /// Target status (`processing`, `shipped`, `delivered`, `cancelled`)
        status: OrderStatus,
    },
    /// Assign a carrier tracking number
    Track {
        /// Order ID
        id: OrderId,

        /// Tracking number
        tracking: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Order { action } => match action {
            OrderAction::Status { id, status } => {
                commands::order::set_status(id, status).await?;
            }
            OrderAction::Track { id, tracking } => {
                commands::order::set_tracking(id, &tracking).await?;
            }
        },
    }
    Ok(())
}
