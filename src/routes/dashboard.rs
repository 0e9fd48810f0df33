use crate::{
    cache::CacheKey,
    dashboard::{self, BarCharts, DashboardStats, LineCharts, PieCharts},
    error::AppError,
    AppState,
};
use axum::{extract::State, Json};
use chrono::Utc;

pub async fn stats(State(state): State<AppState>) -> Result<Json<DashboardStats>, AppError> {
    let stats = state
        .cache
        .get_or_try_insert_with(CacheKey::AdminStats, async {
            Ok::<_, AppError>(dashboard::stats(state.storage.as_ref(), Utc::now()).await?)
        })
        .await?;

    Ok(Json(stats))
}

pub async fn pie_charts(State(state): State<AppState>) -> Result<Json<PieCharts>, AppError> {
    let charts = state
        .cache
        .get_or_try_insert_with(CacheKey::AdminPieCharts, async {
            Ok::<_, AppError>(dashboard::pie_charts(state.storage.as_ref(), Utc::now()).await?)
        })
        .await?;

    Ok(Json(charts))
}

pub async fn bar_charts(State(state): State<AppState>) -> Result<Json<BarCharts>, AppError> {
    let charts = state
        .cache
        .get_or_try_insert_with(CacheKey::AdminBarCharts, async {
            Ok::<_, AppError>(dashboard::bar_charts(state.storage.as_ref(), Utc::now()).await?)
        })
        .await?;

    Ok(Json(charts))
}

pub async fn line_charts(State(state): State<AppState>) -> Result<Json<LineCharts>, AppError> {
    let charts = state
        .cache
        .get_or_try_insert_with(CacheKey::AdminLineCharts, async {
            Ok::<_, AppError>(dashboard::line_charts(state.storage.as_ref(), Utc::now()).await?)
        })
        .await?;

    Ok(Json(charts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::ResponseCache,
        invalidation::InvalidationSignal,
        storage::{MemoryStorage, NewProduct, Storage},
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn admin_views_are_cached_until_an_admin_signal() {
        let storage = Arc::new(MemoryStorage::new());
        let state = AppState::new(storage.clone(), ResponseCache::new(100), 8);

        let Json(first) = bar_charts(State(state.clone())).await.unwrap();
        assert_eq!(first.products.iter().sum::<f64>(), 0.0);

        storage
            .create_product(NewProduct {
                name: "Lamp".into(),
                price: 40.0,
                stock: 2,
                category: "home".into(),
                photo: String::new(),
            })
            .await
            .unwrap();

        // Written behind the cache's back: still the old view.
        let Json(cached) = bar_charts(State(state.clone())).await.unwrap();
        assert_eq!(cached, first);

        state.invalidate(InvalidationSignal::new().admin()).await;
        let Json(fresh) = bar_charts(State(state)).await.unwrap();
        assert_eq!(fresh.products.iter().sum::<f64>(), 1.0);
    }
}
