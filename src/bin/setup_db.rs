//! Create the schema and load demo data into a local database
//! Run with: cargo run --bin setup_db

use anyhow::Result;
use the_bench::config::Config;
use the_bench::database;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("info,the_bench=debug")
        .init();

    println!("🏀 The Bench database setup");
    println!("===========================\n");

    let config = Config::from_env();
    let pool = database::create_pool(&config.database).await?;

    println!("Creating schema...");
    database::setup_schema(&pool).await?;

    let skip_seed = std::env::args().any(|arg| arg == "--schema-only");
    if skip_seed {
        println!("Skipping demo data (--schema-only)");
    } else {
        println!("Seeding demo data...");
        let games = database::seed_demo_data(&pool).await?;
        println!("  - {} games created", games);
    }

    println!("\n✅ Database ready");
    Ok(())
}
