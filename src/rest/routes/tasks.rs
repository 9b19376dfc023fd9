// rest/routes/tasks.rs — Per-user task CRUD.
//
// The false→true completion edge (from PUT or PATCH) is routed through the
// reward engine, which claims the transition and applies the reward in one
// transaction. Everything else is plain CRUD on the task store.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::rest::error::ApiError;
use crate::rest::extract::{ensure_owner, AuthUser};
use crate::rewards::RewardResult;
use crate::storage::tasks::{NewTask, TaskPatch, TaskRow, PRIORITIES};
use crate::AppContext;

fn task_json(task: &TaskRow) -> Value {
    let tags: Vec<String> = serde_json::from_str(&task.tags).unwrap_or_default();
    json!({
        "id": task.id,
        "user_id": task.user_id,
        "title": task.title,
        "description": task.description,
        "completed": task.completed,
        "due_date": task.due_date,
        "priority": task.priority,
        "tags": tags,
        "created_at": task.created_at,
        "updated_at": task.updated_at,
    })
}

fn validate_priority(priority: Option<&str>) -> Result<(), ApiError> {
    match priority {
        Some(p) if !PRIORITIES.contains(&p) => Err(ApiError::BadRequest(format!(
            "Invalid priority '{p}': expected one of {}",
            PRIORITIES.join(", ")
        ))),
        _ => Ok(()),
    }
}

/// Fetch a task and enforce existence + ownership.
async fn owned_task(
    ctx: &AppContext,
    user_id: i64,
    task_id: i64,
) -> Result<TaskRow, ApiError> {
    let task = ctx
        .tasks
        .get_task(task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;
    if task.user_id != user_id {
        return Err(ApiError::Forbidden(
            "Access denied: Task does not belong to user".to_string(),
        ));
    }
    Ok(task)
}

pub async fn list_tasks(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<i64>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    ensure_owner(&user, user_id)?;
    let tasks = ctx.tasks.list_tasks(user_id).await?;
    let list: Vec<Value> = tasks.iter().map(task_json).collect();
    Ok(Json(json!({ "tasks": list })))
}

pub async fn create_task(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<i64>,
    AuthUser(user): AuthUser,
    Json(body): Json<NewTask>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    ensure_owner(&user, user_id)?;
    if body.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title must not be empty".to_string()));
    }
    validate_priority(body.priority.as_deref())?;
    let task = ctx.tasks.create_task(user_id, &body).await?;
    info!(user_id, task_id = task.id, "task created");
    Ok((StatusCode::CREATED, Json(task_json(&task))))
}

pub async fn get_task(
    State(ctx): State<Arc<AppContext>>,
    Path((user_id, task_id)): Path<(i64, i64)>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    ensure_owner(&user, user_id)?;
    let task = owned_task(&ctx, user_id, task_id).await?;
    Ok(Json(task_json(&task)))
}

pub async fn update_task(
    State(ctx): State<Arc<AppContext>>,
    Path((user_id, task_id)): Path<(i64, i64)>,
    AuthUser(user): AuthUser,
    Json(body): Json<TaskPatch>,
) -> Result<Json<Value>, ApiError> {
    ensure_owner(&user, user_id)?;
    validate_priority(body.priority.as_deref())?;
    let task = owned_task(&ctx, user_id, task_id).await?;

    let updated = ctx.tasks.update_task(&task, &body).await?;
    let rewards = apply_completion_flag(&ctx, user_id, &updated, body.completed).await?;

    let task = owned_task(&ctx, user_id, task_id).await?;
    Ok(Json(with_rewards(task_json(&task), rewards)))
}

pub async fn delete_task(
    State(ctx): State<Arc<AppContext>>,
    Path((user_id, task_id)): Path<(i64, i64)>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    ensure_owner(&user, user_id)?;
    owned_task(&ctx, user_id, task_id).await?;
    ctx.tasks.delete_task(task_id).await?;
    info!(user_id, task_id, "task deleted");
    Ok(Json(json!({
        "success": true,
        "message": "Task deleted successfully",
    })))
}

pub async fn complete_task(
    State(ctx): State<Arc<AppContext>>,
    Path((user_id, task_id)): Path<(i64, i64)>,
    AuthUser(user): AuthUser,
    Json(body): Json<TaskPatch>,
) -> Result<Json<Value>, ApiError> {
    ensure_owner(&user, user_id)?;
    let task = owned_task(&ctx, user_id, task_id).await?;

    let rewards = apply_completion_flag(&ctx, user_id, &task, body.completed).await?;

    let task = owned_task(&ctx, user_id, task_id).await?;
    Ok(Json(with_rewards(task_json(&task), rewards)))
}

/// Route a requested completion-flag change. Only the false→true edge goes
/// through the reward engine; a repeated `completed = true` is a no-op and
/// awards nothing.
async fn apply_completion_flag(
    ctx: &AppContext,
    user_id: i64,
    task: &TaskRow,
    completed: Option<bool>,
) -> Result<Option<RewardResult>, ApiError> {
    match completed {
        Some(true) => {
            let result = ctx.rewards.complete_task(user_id, task.id).await?;
            if result.is_some() {
                info!(user_id, task_id = task.id, "task completed");
            }
            Ok(result)
        }
        Some(false) => {
            if task.completed {
                ctx.tasks.mark_incomplete(task.id).await?;
            }
            Ok(None)
        }
        None => Ok(None),
    }
}

fn with_rewards(mut task: Value, rewards: Option<RewardResult>) -> Value {
    if let Some(rewards) = rewards {
        if let Some(obj) = task.as_object_mut() {
            obj.insert(
                "rewards_earned".to_string(),
                serde_json::to_value(rewards).unwrap_or(Value::Null),
            );
        }
    }
    task
}
