// storage/tasks.rs — Task CRUD on the shared SQLite pool.
//
// The false→true completion transition is NOT handled here: it must run
// atomically with the reward mutation, so `rewards::RewardEngine::complete_task`
// owns that transaction. This store covers everything else.

use anyhow::Result;
use serde::Deserialize;
use sqlx::SqlitePool;

use super::now_rfc3339;

pub const PRIORITIES: &[&str] = &["LOW", "MEDIUM", "HIGH", "URGENT"];

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    /// RFC 3339 timestamp, optional.
    pub due_date: Option<String>,
    /// One of LOW | MEDIUM | HIGH | URGENT.
    pub priority: String,
    /// JSON array of strings, e.g. `["work","urgent"]`.
    pub tags: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

impl TaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_task(&self, user_id: i64, task: &NewTask) -> Result<TaskRow> {
        let now = now_rfc3339();
        let priority = task.priority.as_deref().unwrap_or("MEDIUM");
        let tags = serde_json::to_string(task.tags.as_deref().unwrap_or_default())?;
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO tasks (user_id, title, description, completed, due_date, priority, tags, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?7, ?7)
             RETURNING id",
        )
        .bind(user_id)
        .bind(&task.title)
        .bind(task.description.as_deref())
        .bind(task.due_date.as_deref())
        .bind(priority)
        .bind(&tags)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;
        self.get_task(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("task not found after insert"))
    }

    pub async fn get_task(&self, id: i64) -> Result<Option<TaskRow>> {
        Ok(sqlx::query_as("SELECT * FROM tasks WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_tasks(&self, user_id: i64) -> Result<Vec<TaskRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM tasks WHERE user_id = ?1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    /// Apply a partial update to a task. The completion flag is ignored here —
    /// completion transitions go through the reward engine.
    pub async fn update_task(&self, current: &TaskRow, patch: &TaskPatch) -> Result<TaskRow> {
        let title = patch.title.as_deref().unwrap_or(&current.title);
        let description = patch
            .description
            .as_deref()
            .or(current.description.as_deref());
        let due_date = patch.due_date.as_deref().or(current.due_date.as_deref());
        let priority = patch.priority.as_deref().unwrap_or(&current.priority);
        let tags = match &patch.tags {
            Some(tags) => serde_json::to_string(tags)?,
            None => current.tags.clone(),
        };
        sqlx::query(
            "UPDATE tasks SET title = ?1, description = ?2, due_date = ?3, priority = ?4,
                              tags = ?5, updated_at = ?6
             WHERE id = ?7",
        )
        .bind(title)
        .bind(description)
        .bind(due_date)
        .bind(priority)
        .bind(&tags)
        .bind(now_rfc3339())
        .bind(current.id)
        .execute(&self.pool)
        .await?;
        self.get_task(current.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("task not found after update"))
    }

    /// Flip a task back to incomplete. No reward state is touched:
    /// `total_tasks_completed` never decreases.
    pub async fn mark_incomplete(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE tasks SET completed = 0, updated_at = ?1 WHERE id = ?2")
            .bind(now_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_task(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM tasks WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
