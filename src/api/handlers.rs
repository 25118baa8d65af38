//! Query API endpoint handlers

use crate::error::Result;
use crate::gateway::{QueryGateway, SearchResponse, StockDetails};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Shared state for API handlers
pub struct ApiState {
    pub gateway: QueryGateway,
}

impl ApiState {
    pub fn new(gateway: QueryGateway) -> Self {
        Self { gateway }
    }
}

/// Query string of GET /search, kept as raw text so that validation
/// happens in the gateway after the key check
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub limit: Option<String>,
}

fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok())
}

/// Liveness probe - GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Stock details - GET /details/{symbol}
pub async fn get_details(
    State(state): State<Arc<ApiState>>,
    Path(symbol): Path<String>,
    headers: HeaderMap,
) -> Result<Json<StockDetails>> {
    state.gateway.get_details(&symbol, api_key(&headers)).map(Json)
}

/// Symbol / company name search - GET /search
pub async fn search(
    State(state): State<Arc<ApiState>>,
    params: Option<Query<SearchParams>>,
    headers: HeaderMap,
) -> Result<Json<SearchResponse>> {
    // an unparseable query string reads as "no parameters"
    let params = params.map(|Query(p)| p).unwrap_or_default();
    state
        .gateway
        .search(
            params.query.as_deref(),
            params.limit.as_deref(),
            api_key(&headers),
        )
        .map(Json)
}
