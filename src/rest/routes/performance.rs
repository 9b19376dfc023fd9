// rest/routes/performance.rs — Derived metrics, analytics, recommendations.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::performance::AnalyticsPeriod;
use crate::rest::error::ApiError;
use crate::rest::extract::{ensure_owner, AuthUser};
use crate::AppContext;

pub async fn profile(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<i64>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    ensure_owner(&user, user_id)?;
    // Fetching the profile also refreshes the scalar metrics on the user
    // snapshot, so other readers see values no staler than the last fetch.
    let profile = ctx
        .performance
        .persist_metrics(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(serde_json::to_value(profile).unwrap_or(Value::Null)))
}

#[derive(Deserialize)]
pub struct AnalyticsQuery {
    pub period: Option<String>,
}

pub async fn analytics(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<i64>,
    Query(query): Query<AnalyticsQuery>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    ensure_owner(&user, user_id)?;
    let period = query.period.as_deref().unwrap_or("month");
    let period = AnalyticsPeriod::from_str(period).ok_or_else(|| {
        ApiError::BadRequest("Invalid period. Use 'week', 'month', 'quarter', or 'year'".to_string())
    })?;
    let analytics = ctx.performance.analytics(user_id, period).await?;
    Ok(Json(analytics))
}

pub async fn recommendations(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<i64>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    ensure_owner(&user, user_id)?;
    let recommendations = ctx.performance.recommendations(user_id).await?;
    Ok(Json(json!({
        "user_id": user_id,
        "total_recommendations": recommendations.len(),
        "recommendations": recommendations,
        "generated_at": chrono::Utc::now().to_rfc3339(),
    })))
}
