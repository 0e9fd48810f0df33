//! In-process response cache.
//!
//! Values are stored as native structures under a typed `(namespace, id)`
//! key. There is no expiry: entries live until the invalidation policy
//! evicts them (or moka drops them for capacity). Every read hands out a
//! clone, so callers never share mutable state with the cache.

use crate::{
    dashboard::{BarCharts, DashboardStats, LineCharts, PieCharts},
    entities::{Order, Product, Review},
};
use color_eyre::eyre::{self, eyre};
use metrics::increment_counter;
use moka::future::Cache;
use std::{fmt, future::Future, sync::Arc};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    LatestProducts,
    ProductCategories,
    AdminProducts,
    Product(Uuid),
    AllOrders,
    Order(Uuid),
    MyOrders(String),
    Reviews(Uuid),
    AdminStats,
    AdminPieCharts,
    AdminBarCharts,
    AdminLineCharts,
}

impl CacheKey {
    #[must_use]
    pub const fn namespace(&self) -> &'static str {
        match self {
            Self::LatestProducts => "latest-products",
            Self::ProductCategories => "product-categories",
            Self::AdminProducts => "admin-products",
            Self::Product(_) => "product",
            Self::AllOrders => "all-orders",
            Self::Order(_) => "order",
            Self::MyOrders(_) => "myOrders",
            Self::Reviews(_) => "reviews",
            Self::AdminStats => "admin-stats",
            Self::AdminPieCharts => "admin-pie-charts",
            Self::AdminBarCharts => "admin-bar-charts",
            Self::AdminLineCharts => "admin-line-charts",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = self.namespace();
        match self {
            Self::Product(id) | Self::Order(id) | Self::Reviews(id) => write!(f, "{ns}-{id}"),
            Self::MyOrders(user) => write!(f, "{ns}-{user}"),
            _ => f.write_str(ns),
        }
    }
}

/// Every payload the cache can hold.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Products(Vec<Product>),
    Product(Product),
    Categories(Vec<String>),
    Orders(Vec<Order>),
    Order(Order),
    Reviews(Vec<Review>),
    Stats(Box<DashboardStats>),
    PieCharts(PieCharts),
    BarCharts(BarCharts),
    LineCharts(LineCharts),
}

pub trait Cacheable: Clone + Send + Sync + 'static {
    fn into_cached(self) -> CachedValue;
    fn from_cached(value: CachedValue) -> Option<Self>;
}

macro_rules! cacheable {
    ($ty:ty => $variant:ident) => {
        impl Cacheable for $ty {
            fn into_cached(self) -> CachedValue {
                CachedValue::$variant(self)
            }

            fn from_cached(value: CachedValue) -> Option<Self> {
                match value {
                    CachedValue::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

cacheable!(Vec<Product> => Products);
cacheable!(Product => Product);
cacheable!(Vec<String> => Categories);
cacheable!(Vec<Order> => Orders);
cacheable!(Order => Order);
cacheable!(Vec<Review> => Reviews);
cacheable!(PieCharts => PieCharts);
cacheable!(BarCharts => BarCharts);
cacheable!(LineCharts => LineCharts);

impl Cacheable for DashboardStats {
    fn into_cached(self) -> CachedValue {
        CachedValue::Stats(Box::new(self))
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::Stats(stats) => Some(*stats),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResponseCache {
    inner: Cache<CacheKey, CachedValue>,
}

impl ResponseCache {
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    #[must_use]
    pub fn has(&self, key: &CacheKey) -> bool {
        self.inner.contains_key(key)
    }

    /// Returns a copy of the cached value. A missing entry or an entry of a
    /// different type are both reported as `None`.
    #[must_use]
    pub fn get<T: Cacheable>(&self, key: &CacheKey) -> Option<T> {
        self.inner.get(key).and_then(T::from_cached)
    }

    pub async fn set<T: Cacheable>(&self, key: CacheKey, value: T) {
        self.inner.insert(key, value.into_cached()).await;
    }

    pub async fn delete<'a, I>(&self, keys: I)
    where
        I: IntoIterator<Item = &'a CacheKey>,
    {
        for key in keys {
            self.inner.invalidate(key).await;
        }
    }

    /// Read-through lookup. Concurrent misses on one key share a single
    /// `init` run; its error reaches every waiter and nothing is stored.
    ///
    /// A miss racing an invalidation can store a value computed before the
    /// write. It is served until the next write evicts the key.
    pub async fn get_or_try_insert_with<T, E, F>(
        &self,
        key: CacheKey,
        init: F,
    ) -> Result<T, Arc<E>>
    where
        T: Cacheable,
        E: From<eyre::Error> + Send + Sync + 'static,
        F: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get::<T>(&key) {
            debug!("cache hit for {key}");
            increment_counter!("storefront_cache_hit", "namespace" => key.namespace());
            return Ok(value);
        }

        // Held under another type: drop it so `init` replaces it.
        if self.has(&key) {
            self.inner.invalidate(&key).await;
        }

        let cached = self
            .inner
            .try_get_with(key.clone(), async {
                debug!("cache miss for {key}");
                increment_counter!("storefront_cache_miss", "namespace" => key.namespace());
                init.await.map(T::into_cached)
            })
            .await?;

        T::from_cached(cached)
            .ok_or_else(|| Arc::new(E::from(eyre!("cache entry {key} holds another type"))))
    }

    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    fn product(name: &str) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price: 120.0,
            stock: 4,
            category: "shoes".to_string(),
            photo: "uploads/shoe.png".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn keys_render_like_the_http_api() {
        let id = Uuid::nil();
        assert_eq!(CacheKey::LatestProducts.to_string(), "latest-products");
        assert_eq!(
            CacheKey::Product(id).to_string(),
            format!("product-{id}")
        );
        assert_eq!(CacheKey::MyOrders("u1".into()).to_string(), "myOrders-u1");
        assert_eq!(CacheKey::AdminPieCharts.to_string(), "admin-pie-charts");
    }

    #[test]
    fn unknown_key_is_absent() {
        let cache = ResponseCache::new(100);
        assert!(!cache.has(&CacheKey::AllOrders));
        assert!(cache.get::<Vec<Order>>(&CacheKey::AllOrders).is_none());
    }

    #[tokio::test]
    async fn set_then_get_returns_an_equal_copy() {
        let cache = ResponseCache::new(100);
        let shoe = product("runner");
        let key = CacheKey::Product(shoe.id);

        cache.set(key.clone(), shoe.clone()).await;

        let mut copy = cache.get::<Product>(&key).unwrap();
        assert_eq!(copy, shoe);

        copy.stock = 0;
        assert_eq!(cache.get::<Product>(&key).unwrap().stock, 4);
    }

    #[tokio::test]
    async fn set_overwrites() {
        let cache = ResponseCache::new(100);
        cache
            .set(CacheKey::ProductCategories, vec!["hats".to_string()])
            .await;
        cache
            .set(CacheKey::ProductCategories, vec!["shoes".to_string()])
            .await;

        assert_eq!(
            cache.get::<Vec<String>>(&CacheKey::ProductCategories),
            Some(vec!["shoes".to_string()])
        );
    }

    #[tokio::test]
    async fn wrong_type_reads_as_miss() {
        let cache = ResponseCache::new(100);
        cache.set(CacheKey::LatestProducts, vec![product("a")]).await;
        assert!(cache.get::<Vec<String>>(&CacheKey::LatestProducts).is_none());
    }

    #[tokio::test]
    async fn delete_removes_every_listed_key() {
        let cache = ResponseCache::new(100);
        cache.set(CacheKey::LatestProducts, vec![product("a")]).await;

        // AdminProducts was never set.
        cache
            .delete(&[CacheKey::LatestProducts, CacheKey::AdminProducts])
            .await;

        assert!(!cache.has(&CacheKey::LatestProducts));
        assert!(!cache.has(&CacheKey::AdminProducts));
    }

    #[tokio::test]
    async fn read_through_populates_on_miss_only() {
        let cache = ResponseCache::new(100);

        let first: Result<Vec<String>, Arc<eyre::Error>> = cache
            .get_or_try_insert_with(CacheKey::ProductCategories, async {
                Ok(vec!["shoes".to_string()])
            })
            .await;
        assert_eq!(first.unwrap(), vec!["shoes".to_string()]);

        let second: Result<Vec<String>, Arc<eyre::Error>> = cache
            .get_or_try_insert_with(CacheKey::ProductCategories, async {
                Ok(vec!["recomputed".to_string()])
            })
            .await;
        assert_eq!(second.unwrap(), vec!["shoes".to_string()]);
    }

    #[tokio::test]
    async fn read_through_does_not_cache_errors() {
        let cache = ResponseCache::new(100);

        let failed: Result<Vec<String>, Arc<eyre::Error>> = cache
            .get_or_try_insert_with(CacheKey::ProductCategories, async {
                Err(eyre!("db down"))
            })
            .await;

        assert_eq!(failed.unwrap_err().to_string(), "db down");
        assert!(!cache.has(&CacheKey::ProductCategories));
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_computation() {
        let cache = ResponseCache::new(100);
        let runs = AtomicUsize::new(0);

        let load = || async {
            runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, eyre::Error>(vec![product("shared")])
        };
        let (a, b, c) = tokio::join!(
            cache.get_or_try_insert_with(CacheKey::AdminProducts, load()),
            cache.get_or_try_insert_with(CacheKey::AdminProducts, load()),
            cache.get_or_try_insert_with(CacheKey::AdminProducts, load()),
        );

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[tokio::test]
    async fn read_through_replaces_an_entry_of_another_type() {
        let cache = ResponseCache::new(100);
        cache.set(CacheKey::AdminProducts, vec!["stale".to_string()]).await;

        let products: Result<Vec<Product>, Arc<eyre::Error>> = cache
            .get_or_try_insert_with(CacheKey::AdminProducts, async {
                Ok(vec![product("fresh")])
            })
            .await;

        assert_eq!(products.unwrap()[0].name, "fresh");
    }
}
