use clap::{Parser, Subcommand};
use tracing::info;
use warehouse_backend::error::AppError;
use warehouse_config::get_config;
use warehouse_database::establish;
use warehouse_database::migrations::Migrator;
use warehouse_telemetry::setup_telemetry;

/// Applies and inspects schema revisions of the warehouse database.
#[derive(Parser)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply every pending revision.
    Upgrade,
    /// Revert the current revision. Irreversible revisions refuse.
    Downgrade,
    /// Print the revision the database is at.
    Current,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), AppError> {
    setup_telemetry();
    let cli = Cli::parse();

    let config = get_config()?;
    let mut connection = establish(&config.database_url).await?;
    let migrator = Migrator::default();

    match cli.command {
        Command::Upgrade => {
            let applied = migrator.upgrade(&mut connection).await?;
            info!(?applied, "upgrade finished");
        }
        Command::Downgrade => {
            let revision = migrator.downgrade(&mut connection).await?;
            info!(revision, "downgrade finished");
        }
        Command::Current => {
            let revision = migrator.current(&mut connection).await?;
            println!("{}", revision.as_deref().unwrap_or("<base>"));
        }
    }
    Ok(())
}
