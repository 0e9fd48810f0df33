use std::{io::Write, time::Instant};

use color_eyre::eyre::eyre;
use storefront_api::storage::{PgStorage, Storage};
use tracing::info;

const CATALOG_PATH: &str = "assets/catalog.bin.zstd";

// Dumps the product catalog to a compressed snapshot that `import` can load.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    std::env::set_var(
        "RUST_LOG",
        std::env::var("RUST_LOG").unwrap_or_else(|_| String::from("info")),
    );

    // initialize tracing
    tracing_subscriber::fmt::init();

    let url = std::env::var("DATABASE_URL").map_err(|_| eyre!("DATABASE_URL must be set"))?;
    let storage = PgStorage::connect(&url, 1).await?;

    let now = Instant::now();
    let products = storage.all_products().await?;
    info!("Read {} products in {:?}", products.len(), now.elapsed());

    std::fs::create_dir("assets").ok();
    let output = std::fs::File::create(CATALOG_PATH)?;
    let mut encoder = zstd::stream::Encoder::new(output, 19)?;
    bincode::serialize_into(&mut encoder, &products)?;
    encoder.finish()?.flush()?;

    info!("Wrote {CATALOG_PATH}");

    Ok(())
}
