use color_eyre::{eyre::WrapErr, Result};
use std::{env, fmt::Display, net::SocketAddr, str::FromStr};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// `None` keeps everything in process memory.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub products_per_page: u64,
    pub cache_max_capacity: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_url: None,
            database_max_connections: 5,
            products_per_page: 8,
            cache_max_capacity: 10_000,
        }
    }
}

impl Config {
    /// Reads the configuration from the environment (and `.env`, if loaded).
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            bind_addr: try_load("BIND_ADDR", defaults.bind_addr)?,
            database_url: env::var("DATABASE_URL").ok(),
            database_max_connections: try_load(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            products_per_page: try_load("PRODUCTS_PER_PAGE", defaults.products_per_page)?,
            cache_max_capacity: try_load("CACHE_MAX_CAPACITY", defaults.cache_max_capacity)?,
        })
    }
}

fn try_load<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse()
            .wrap_err_with(|| format!("invalid {key} value: {value}")),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_serve_locally_from_memory() {
        let config = Config::default();
        assert_eq!(config.bind_addr.port(), 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.products_per_page, 8);
    }

    #[test]
    fn unset_keys_fall_back_to_the_default() {
        let value: u64 = try_load("STOREFRONT_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }
}
