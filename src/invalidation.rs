//! Cache invalidation.
//!
//! Writes describe what they changed with an [`InvalidationSignal`]; the
//! policy turns the signal into an explicit list of keys. Every write path
//! has to send the right flags, a missing flag means stale reads until the
//! next matching write.

use crate::cache::{CacheKey, ResponseCache};
use async_trait::async_trait;
use metrics::increment_counter;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationSignal {
    pub product: bool,
    pub order: bool,
    pub admin: bool,
    pub review: bool,
    pub product_ids: Vec<Uuid>,
    pub order_id: Option<Uuid>,
    pub user_id: Option<String>,
}

impl InvalidationSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn product(mut self) -> Self {
        self.product = true;
        self
    }

    #[must_use]
    pub fn order(mut self) -> Self {
        self.order = true;
        self
    }

    #[must_use]
    pub fn admin(mut self) -> Self {
        self.admin = true;
        self
    }

    #[must_use]
    pub fn review(mut self) -> Self {
        self.review = true;
        self
    }

    #[must_use]
    pub fn product_ids(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.product_ids.extend(ids);
        self
    }

    #[must_use]
    pub fn order_id(mut self, id: Uuid) -> Self {
        self.order_id = Some(id);
        self
    }

    #[must_use]
    pub fn user_id(mut self, id: impl Into<String>) -> Self {
        self.user_id = Some(id.into());
        self
    }

    /// Every key this signal evicts.
    #[must_use]
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys = Vec::new();

        if self.product {
            keys.extend([
                CacheKey::LatestProducts,
                CacheKey::ProductCategories,
                CacheKey::AdminProducts,
            ]);
            keys.extend(self.product_ids.iter().copied().map(CacheKey::Product));
        }

        if self.order {
            keys.push(CacheKey::AllOrders);
            keys.extend(self.order_id.map(CacheKey::Order));
            keys.extend(self.user_id.clone().map(CacheKey::MyOrders));
        }

        if self.admin {
            keys.extend([
                CacheKey::AdminStats,
                CacheKey::AdminPieCharts,
                CacheKey::AdminBarCharts,
                CacheKey::AdminLineCharts,
            ]);
        }

        if self.review {
            keys.extend(self.product_ids.iter().copied().map(CacheKey::Reviews));
        }

        keys
    }
}

/// Evicts cached values after a write.
#[async_trait]
pub trait Invalidator: Send + Sync {
    async fn invalidate(&self, signal: InvalidationSignal);
}

/// Evicts exactly the keys enumerated by [`InvalidationSignal::keys`].
#[derive(Debug, Clone)]
pub struct FlagInvalidator {
    cache: ResponseCache,
}

impl FlagInvalidator {
    #[must_use]
    pub const fn new(cache: ResponseCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Invalidator for FlagInvalidator {
    async fn invalidate(&self, signal: InvalidationSignal) {
        let keys = signal.keys();
        if keys.is_empty() {
            return;
        }

        info!(
            "invalidating {}",
            keys.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        increment_counter!("storefront_invalidation");

        self.cache.delete(&keys).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Order;
    use std::collections::HashSet;

    fn key_set(signal: &InvalidationSignal) -> HashSet<String> {
        signal.keys().iter().map(ToString::to_string).collect()
    }

    fn set(keys: &[&str]) -> HashSet<String> {
        keys.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn no_flags_no_keys() {
        assert!(InvalidationSignal::new()
            .product_ids([Uuid::new_v4()])
            .keys()
            .is_empty());
    }

    #[test]
    fn product_flag_covers_listings_and_each_product() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let signal = InvalidationSignal::new().product().product_ids([a, b]);

        assert_eq!(
            key_set(&signal),
            set(&[
                "latest-products",
                "product-categories",
                "admin-products",
                &format!("product-{a}"),
                &format!("product-{b}"),
            ])
        );
    }

    #[test]
    fn order_flag_skips_ids_it_was_not_given() {
        let signal = InvalidationSignal::new().order();
        assert_eq!(key_set(&signal), set(&["all-orders"]));

        let order = Uuid::new_v4();
        let signal = InvalidationSignal::new().order().order_id(order).user_id("u1");
        assert_eq!(
            key_set(&signal),
            set(&["all-orders", &format!("order-{order}"), "myOrders-u1"])
        );
    }

    #[test]
    fn admin_flag_covers_every_dashboard() {
        assert_eq!(
            key_set(&InvalidationSignal::new().admin()),
            set(&[
                "admin-stats",
                "admin-pie-charts",
                "admin-bar-charts",
                "admin-line-charts"
            ])
        );
    }

    #[test]
    fn review_flag_uses_the_product_ids() {
        let product = Uuid::new_v4();
        let signal = InvalidationSignal::new().review().product_ids([product]);
        assert_eq!(key_set(&signal), set(&[&format!("reviews-{product}")]));
    }

    #[test]
    fn flags_combine_for_a_new_order() {
        let (item, order) = (Uuid::new_v4(), Uuid::new_v4());
        let signal = InvalidationSignal::new()
            .product()
            .order()
            .admin()
            .product_ids([item])
            .order_id(order)
            .user_id("u7");

        let keys = key_set(&signal);
        assert_eq!(keys.len(), 11);
        assert!(keys.contains(&format!("product-{item}")));
        assert!(keys.contains("myOrders-u7"));
        assert!(keys.contains("admin-line-charts"));
        assert!(!keys.iter().any(|k| k.starts_with("reviews-")));
    }

    #[tokio::test]
    async fn invalidator_leaves_unrelated_keys_alone() {
        let cache = ResponseCache::new(100);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        cache.set(CacheKey::AllOrders, Vec::<Order>::new()).await;
        cache.set(CacheKey::ProductCategories, vec!["hats".to_string()]).await;

        FlagInvalidator::new(cache.clone())
            .invalidate(InvalidationSignal::new().product().product_ids([a, b]))
            .await;

        assert!(!cache.has(&CacheKey::ProductCategories));
        assert!(cache.has(&CacheKey::AllOrders));
    }
}
