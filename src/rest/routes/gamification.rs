// rest/routes/gamification.rs — Reward profile, achievements, history.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::rest::error::ApiError;
use crate::rest::extract::{ensure_owner, AuthUser};
use crate::rewards::catalog;
use crate::storage::parse_ts;
use crate::AppContext;

/// Cumulative reward snapshot. `lifetime_points` and `longest_streak`
/// currently mirror the live counters; they become distinct fields once
/// point spending / streak history land.
pub async fn reward_profile(
    Path(user_id): Path<i64>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    ensure_owner(&user, user_id)?;
    let last_activity_date = user
        .last_completion_date
        .as_deref()
        .and_then(parse_ts)
        .map(|ts| ts.date_naive().format("%Y-%m-%d").to_string());
    Ok(Json(json!({
        "user_id": user.id,
        "points_balance": user.points_balance,
        "lifetime_points": user.points_balance,
        "streak_count": user.streak_count,
        "longest_streak": user.streak_count,
        "last_activity_date": last_activity_date,
        "total_tasks_completed": user.total_tasks_completed,
        "created_at": user.created_at,
        "updated_at": user.updated_at,
    })))
}

pub async fn achievements(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<i64>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    ensure_owner(&user, user_id)?;
    let unlocked = ctx.rewards.unlocked_achievements(user_id).await?;
    Ok(Json(serde_json::to_value(unlocked).unwrap_or(Value::Null)))
}

pub async fn available_achievements(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<i64>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    ensure_owner(&user, user_id)?;
    let available = catalog::available_achievements(&ctx.storage.pool(), &user).await?;
    Ok(Json(
        serde_json::to_value(available).unwrap_or(Value::Null),
    ))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn history(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    ensure_owner(&user, user_id)?;
    let history = ctx
        .rewards
        .history(user_id, query.limit.unwrap_or(20), query.offset.unwrap_or(0))
        .await?;
    Ok(Json(serde_json::to_value(history).unwrap_or(Value::Null)))
}
