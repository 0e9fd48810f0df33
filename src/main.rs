use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::Arc;
use storefront_api::{
    cache::ResponseCache,
    config::Config,
    routes,
    storage::{MemoryStorage, PgStorage, Storage},
    AppState,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    std::env::set_var(
        "RUST_LOG",
        std::env::var("RUST_LOG").unwrap_or_else(|_| String::from("info")),
    );
    color_eyre::install()?;

    // initialize tracing
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = match &config.database_url {
        Some(url) => {
            info!("Connecting to postgres");
            Arc::new(PgStorage::connect(url, config.database_max_connections).await?)
        }
        None => {
            warn!("DATABASE_URL not set, data lives in memory and is lost on exit");
            Arc::new(MemoryStorage::new())
        }
    };

    let state = AppState::new(
        storage,
        ResponseCache::new(config.cache_max_capacity),
        config.products_per_page,
    );

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app = routes::router(state)
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .layer(prometheus_layer)
        .layer(TraceLayer::new_for_http());

    info!("listening on {}", config.bind_addr);
    axum::Server::bind(&config.bind_addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
