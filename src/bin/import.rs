use std::time::Instant;

use color_eyre::eyre::eyre;
use storefront_api::{entities::Product, storage::PgStorage};
use tracing::info;

const CATALOG_PATH: &str = "assets/catalog.bin.zstd";

// Loads a catalog snapshot written by `export` into postgres.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    run().await
}

async fn run() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    std::env::set_var(
        "RUST_LOG",
        std::env::var("RUST_LOG").unwrap_or_else(|_| String::from("info")),
    );

    // initialize tracing
    tracing_subscriber::fmt::init();

    let file = std::fs::File::open(CATALOG_PATH)?;
    let mut decoder = zstd::stream::Decoder::new(file)?;

    let products: Vec<Product> = bincode::deserialize_from(&mut decoder)?;

    info!("Loaded {} products from {CATALOG_PATH}", products.len());

    let url = std::env::var("DATABASE_URL").map_err(|_| eyre!("DATABASE_URL must be set"))?;
    let max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
        Ok(value) => value.parse()?,
        Err(_) => 5,
    };
    let storage = PgStorage::connect(&url, max_connections).await?;

    let start = Instant::now();

    for product in &products {
        storage.upsert_product(product).await?;
    }

    let elapsed = start.elapsed();
    info!("Done in {elapsed:?}");

    Ok(())
}
