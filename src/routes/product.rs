use super::Message;
use crate::{
    cache::CacheKey,
    entities::Product,
    error::AppError,
    invalidation::InvalidationSignal,
    storage::{NewProduct, PriceSort, ProductSearch},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use metrics::increment_counter;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

const LATEST_PRODUCTS: u64 = 15;

#[derive(Debug, Deserialize, Validate)]
pub struct NewProductRequest {
    #[validate(length(min = 1, message = "Please provide product name"))]
    pub name: String,
    #[validate(range(min = 0.0, message = "Please provide product price"))]
    pub price: f64,
    #[validate(range(min = 0, message = "Please provide product stock"))]
    pub stock: i32,
    #[validate(length(min = 1, message = "Please provide product category"))]
    pub category: String,
    #[validate(length(min = 1, message = "Please provide product photo"))]
    pub photo: String,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    #[validate(length(min = 1))]
    pub category: Option<String>,
    pub photo: Option<String>,
}

fn normalize_category(category: &str) -> String {
    category.trim().to_lowercase()
}

pub async fn new_product(
    State(state): State<AppState>,
    Json(payload): Json<NewProductRequest>,
) -> Result<Json<Message>, AppError> {
    payload.validate()?;

    let product = state
        .storage
        .create_product(NewProduct {
            name: payload.name,
            price: payload.price,
            stock: payload.stock,
            category: normalize_category(&payload.category),
            photo: payload.photo,
        })
        .await?;
    info!("Created product {}", product.id);

    state
        .invalidate(
            InvalidationSignal::new()
                .product()
                .admin()
                .product_ids([product.id]),
        )
        .await;

    Ok(Json(Message::new("Product created successfully")))
}

pub async fn latest(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    increment_counter!("storefront_request", "route" => "latest_products");

    let products = state
        .cache
        .get_or_try_insert_with(CacheKey::LatestProducts, async {
            let products = state.storage.latest_products(LATEST_PRODUCTS).await?;
            if products.is_empty() {
                return Err(AppError::not_found("No Latest Products Found"));
            }
            Ok(products)
        })
        .await?;

    Ok(Json(products))
}

pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let categories = state
        .cache
        .get_or_try_insert_with(CacheKey::ProductCategories, async {
            let categories = state.storage.product_categories().await?;
            if categories.is_empty() {
                return Err(AppError::not_found("No Categories Found"));
            }
            Ok(categories)
        })
        .await?;

    Ok(Json(categories))
}

pub async fn admin_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    let products = state
        .cache
        .get_or_try_insert_with(CacheKey::AdminProducts, async {
            let products = state.storage.all_products().await?;
            if products.is_empty() {
                return Err(AppError::not_found("No Products Found"));
            }
            Ok(products)
        })
        .await?;

    Ok(Json(products))
}

pub async fn single(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    increment_counter!("storefront_request", "route" => "product");

    let product = state
        .cache
        .get_or_try_insert_with(CacheKey::Product(id), async {
            state
                .storage
                .find_product(id)
                .await?
                .ok_or_else(|| AppError::not_found("No product found"))
        })
        .await?;

    Ok(Json(product))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<Message>, AppError> {
    payload.validate()?;

    let mut product = state
        .storage
        .find_product(id)
        .await?
        .ok_or_else(|| AppError::not_found("No product found"))?;

    if let Some(name) = payload.name {
        product.name = name;
    }
    if let Some(price) = payload.price {
        product.price = price;
    }
    if let Some(stock) = payload.stock {
        product.stock = stock;
    }
    if let Some(category) = payload.category {
        product.category = normalize_category(&category);
    }
    if let Some(photo) = payload.photo {
        product.photo = photo;
    }

    state.storage.save_product(&product).await?;
    info!("Updated product {id}");

    state
        .invalidate(InvalidationSignal::new().product().admin().product_ids([id]))
        .await;

    Ok(Json(Message::new("Product successfully updated")))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Message>, AppError> {
    if !state.storage.delete_product(id).await? {
        return Err(AppError::not_found("No product found"));
    }
    info!("Deleted product {id}");

    // Reviews go with the product.
    state
        .invalidate(
            InvalidationSignal::new()
                .product()
                .admin()
                .review()
                .product_ids([id]),
        )
        .await;

    Ok(Json(Message::new("Product Deleted Successfully")))
}

#[derive(Debug, Deserialize, Default)]
pub struct SearchQuery {
    pub search: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub sort: Option<PriceSort>,
    pub page: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub products: Vec<Product>,
    pub total_pages: u64,
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let limit = state.products_per_page.max(1);
    let page = query.page.unwrap_or(1).max(1);
    // Offsets must also fit a postgres BIGINT.
    let offset = (page - 1)
        .checked_mul(limit)
        .filter(|offset| i64::try_from(*offset).is_ok())
        .ok_or_else(|| AppError::bad_request("Invalid page"))?;

    let (products, total) = state
        .storage
        .search_products(&ProductSearch {
            name: query.search.filter(|s| !s.is_empty()),
            max_price: query.price,
            category: query.category.filter(|c| !c.is_empty()),
            sort: query.sort,
            limit,
            offset,
        })
        .await?;

    if products.is_empty() {
        return Err(AppError::not_found("No products found"));
    }

    Ok(Json(SearchResponse {
        products,
        total_pages: total / limit + u64::from(total % limit != 0),
    }))
}
