use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use tagstore::application::audit::RefCountAuditor;
use tagstore::application::blob_store::BlobStore;
use tagstore::infrastructure::persistence::PostgresStore;

/// Recompute blob reference counts from owner rows and report mismatches
#[derive(Parser)]
struct Cli {
    #[arg(long)]
    database_url: Option<String>,

    /// Delete leaked entries and correct miscounted ones
    #[arg(long)]
    fix: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let db_url = cli
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .context("DATABASE_URL must be set or passed with --database-url")?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&db_url)
        .await
        .context("connecting to database")?;

    let store = Arc::new(BlobStore::new(Arc::new(PostgresStore::new(pool))));
    let report = RefCountAuditor::new(store).run(cli.fix).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Entries checked: {}", report.entries_checked);
        println!("Leaked entries: {}", report.leaked.len());
        for tag in &report.leaked {
            println!("  {}", tag);
        }
        println!("Miscounted entries: {}", report.miscounted.len());
        for miscount in &report.miscounted {
            println!(
                "  {} stored={} referenced={}",
                miscount.tag, miscount.stored, miscount.referenced
            );
        }
        println!("Dangling owner references: {}", report.dangling.len());
        for tag in &report.dangling {
            println!("  {}", tag);
        }
        println!("Corrupted entries: {}", report.corrupted.len());
        for tag in &report.corrupted {
            println!("  {}", tag);
        }
        if cli.fix {
            println!("Repaired: {}", report.repaired);
        }
    }

    if (!cli.fix && !report.is_clean()) || report.unrepairable() > 0 {
        std::process::exit(1);
    }

    Ok(())
}
