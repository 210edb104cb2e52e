use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::baskets::store::{Basket, StockEntry};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_BASKET_NAME: &str = "Untitled Basket";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBasketRequest {
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub stocks: Option<Vec<StockEntry>>,
}

#[derive(Debug, Serialize)]
pub struct CreateBasketResponse {
    pub success: bool,
    pub basket: Basket,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct UserBasketsQuery {
    pub email: Option<String>,
}

/// POST /api/baskets/create
pub async fn create_basket(
    State(state): State<AppState>,
    body: Result<Json<CreateBasketRequest>, JsonRejection>,
) -> ApiResult<Json<CreateBasketResponse>> {
    let Json(req) = body.map_err(|_| ApiError::BadRequest("Invalid basket data"))?;

    let user_email = req
        .user_email
        .filter(|email| !email.is_empty())
        .ok_or(ApiError::BadRequest("Invalid basket data"))?;
    let stocks = req
        .stocks
        .filter(|stocks| !stocks.is_empty())
        .ok_or(ApiError::BadRequest("Invalid basket data"))?;

    let basket = Basket {
        basket_id: Uuid::new_v4().to_string(),
        user_email,
        name: req
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_BASKET_NAME.to_string()),
        stocks,
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        active: true,
    };

    state.baskets.insert(basket.clone()).await.map_err(|e| {
        tracing::error!(error = %e, "Create basket error");
        ApiError::Storage("Failed to create basket")
    })?;

    tracing::info!(
        basket_id = %basket.basket_id,
        user_email = %basket.user_email,
        "Basket created"
    );

    Ok(Json(CreateBasketResponse {
        success: true,
        basket,
    }))
}

/// GET /api/baskets/user?email=
pub async fn user_baskets(
    State(state): State<AppState>,
    Query(query): Query<UserBasketsQuery>,
) -> ApiResult<Json<Vec<Basket>>> {
    let email = query
        .email
        .filter(|email| !email.is_empty())
        .ok_or(ApiError::BadRequest("Missing email"))?;

    let baskets = state.baskets.list_by_owner(&email).await.map_err(|e| {
        tracing::error!(error = %e, "Fetch user baskets error");
        ApiError::Storage("Failed to fetch baskets")
    })?;

    Ok(Json(baskets))
}

/// GET /api/baskets/explore
pub async fn explore_baskets(State(state): State<AppState>) -> ApiResult<Json<Vec<Basket>>> {
    let baskets = state.baskets.list_all().await.map_err(|e| {
        tracing::error!(error = %e, "Explore fetch error");
        ApiError::Storage("Failed to load explore baskets")
    })?;

    Ok(Json(baskets))
}

/// DELETE /api/baskets/{id}
/// Soft delete: the basket stays in the store with `active = false`.
pub async fn delete_basket(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    let existed = state.baskets.deactivate(&id).await.map_err(|e| {
        tracing::error!(error = %e, "Delete basket error");
        ApiError::Storage("Failed to delete basket")
    })?;

    if !existed {
        tracing::debug!(basket_id = %id, "Delete requested for unknown basket");
    }

    Ok(Json(SuccessResponse { success: true }))
}
