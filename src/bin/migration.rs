//! Applies or rolls back the embedded schema migrations
//!
//! Run with: cargo run --bin migration -- --database-url sqlite://bakery.db?mode=rwc up

use bakery_api::{
    db::{establish_connection_with_config, DbConfig},
    migrator::Migrator,
};
use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "migration", about = "Bakery API schema migrations")]
struct Cli {
    /// Database connection URL
    #[arg(
        long,
        env = "APP__DATABASE_URL",
        default_value = "sqlite://bakery.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply all pending migrations (default)
    Up,
    /// Roll back the most recent migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Print applied and pending migrations
    Status,
    /// Drop every table and re-apply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let db = establish_connection_with_config(&DbConfig {
        url: cli.database_url.clone(),
        max_connections: 1,
        ..Default::default()
    })
    .await?;

    match cli.command.unwrap_or(Command::Up) {
        Command::Up => {
            Migrator::up(&db, None).await?;
            info!("migrations applied");
        }
        Command::Down { steps } => {
            Migrator::down(&db, Some(steps)).await?;
            info!(steps, "migrations rolled back");
        }
        Command::Status => Migrator::status(&db).await?,
        Command::Fresh => {
            Migrator::fresh(&db).await?;
            info!("database recreated");
        }
    }

    Ok(())
}
