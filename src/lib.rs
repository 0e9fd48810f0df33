#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(clippy::missing_const_for_fn)]
#![deny(clippy::nursery)]
#![deny(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_precision_loss)]

use cache::ResponseCache;
use invalidation::{FlagInvalidator, InvalidationSignal, Invalidator};
use std::sync::Arc;
use storage::Storage;

pub mod cache;
pub mod charts;
pub mod config;
pub mod dashboard;
pub mod entities;
pub mod error;
pub mod invalidation;
pub mod routes;
pub mod storage;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    // Derived responses, read-through. Writes evict through `invalidator`.
    pub cache: ResponseCache,
    pub invalidator: Arc<dyn Invalidator>,
    pub products_per_page: u64,
}

impl AppState {
    /// Wires a fresh cache to the flag-based invalidation policy.
    pub fn new(storage: Arc<dyn Storage>, cache: ResponseCache, products_per_page: u64) -> Self {
        let invalidator = Arc::new(FlagInvalidator::new(cache.clone()));
        Self {
            storage,
            cache,
            invalidator,
            products_per_page,
        }
    }

    pub async fn invalidate(&self, signal: InvalidationSignal) {
        self.invalidator.invalidate(signal).await;
    }
}
