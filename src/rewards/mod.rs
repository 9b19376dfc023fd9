// rewards/mod.rs — Reward state transitions on task completion.
//
// Every completion event runs as a single SQLite transaction: base points,
// counter increment, streak transition, achievement unlocks (with bonus
// points), and the history append either all commit or none do. Partial
// application would break the "UserAchievement existence ⇒ reward already
// granted" invariant the idempotent evaluator relies on.

pub mod catalog;

use anyhow::Result;
use chrono::{DateTime, Days, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::storage::{parse_ts, UserRow};
use catalog::AchievementRow;

/// Points awarded for every completion, before achievement bonuses.
pub const BASE_COMPLETION_POINTS: i64 = 10;

/// Outcome of one completion event, attached to the task-update response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RewardResult {
    /// Total points awarded in this event (base + all achievement bonuses).
    pub points: i64,
    pub streak_updated: bool,
    pub achievements_unlocked: Vec<AchievementRow>,
}

/// One row of the completion history, with unlocked ids decoded from JSON.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRead {
    pub id: i64,
    pub task_id: i64,
    pub task_title: String,
    pub points_awarded: i64,
    pub streak_incremented: bool,
    pub achievement_unlocked_ids: Vec<i64>,
    pub completed_at: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionHistory {
    pub user_id: i64,
    pub completions: Vec<CompletionRead>,
    /// Full count of completions for the user, not the page size.
    pub total: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct CompletionRow {
    id: i64,
    task_id: i64,
    task_title: String,
    points_awarded: i64,
    streak_incremented: bool,
    achievement_unlocked_ids: String,
    completed_at: String,
    created_at: String,
}

#[derive(Clone)]
pub struct RewardEngine {
    pool: SqlitePool,
}

impl RewardEngine {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Atomically claim the false→true transition for a task and apply the
    /// completion reward in the same transaction.
    ///
    /// Returns `None` when the task was already completed (or does not belong
    /// to the user): the claim is a check-and-set, so two racing requests for
    /// the same task reward at most once.
    pub async fn complete_task(&self, user_id: i64, task_id: i64) -> Result<Option<RewardResult>> {
        self.complete_task_at(user_id, task_id, Utc::now()).await
    }

    pub async fn complete_task_at(
        &self,
        user_id: i64,
        task_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<RewardResult>> {
        let mut tx = self.pool.begin().await?;
        let claimed = sqlx::query(
            "UPDATE tasks SET completed = 1, updated_at = ?1
             WHERE id = ?2 AND user_id = ?3 AND completed = 0",
        )
        .bind(now.to_rfc3339())
        .bind(task_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() == 0 {
            // Already completed — nothing to reward. Dropping tx rolls back.
            return Ok(None);
        }
        let title: String = sqlx::query_scalar("SELECT title FROM tasks WHERE id = ?1")
            .bind(task_id)
            .fetch_one(&mut *tx)
            .await?;
        let result = apply_completion_on(&mut tx, user_id, task_id, &title, now).await?;
        tx.commit().await?;
        Ok(Some(result))
    }

    /// Apply the reward mutation for a completion event whose false→true
    /// transition has already been established by the caller.
    ///
    /// A missing user yields a zero-valued result with no mutation — the
    /// completion itself already succeeded at the task layer, so this is a
    /// silent no-op rather than a hard failure.
    pub async fn apply_completion(
        &self,
        user_id: i64,
        task_id: i64,
        task_title: &str,
    ) -> Result<RewardResult> {
        self.apply_completion_at(user_id, task_id, task_title, Utc::now())
            .await
    }

    pub async fn apply_completion_at(
        &self,
        user_id: i64,
        task_id: i64,
        task_title: &str,
        now: DateTime<Utc>,
    ) -> Result<RewardResult> {
        let mut tx = self.pool.begin().await?;
        let result = apply_completion_on(&mut tx, user_id, task_id, task_title, now).await?;
        tx.commit().await?;
        Ok(result)
    }

    /// Achievements the user has unlocked, oldest first.
    pub async fn unlocked_achievements(&self, user_id: i64) -> Result<Vec<AchievementRow>> {
        Ok(sqlx::query_as(
            "SELECT a.id, a.name, a.description, a.icon, a.requirement_type,
                    a.requirement_value, a.points_reward
             FROM achievements a
             JOIN user_achievements ua ON ua.achievement_id = a.id
             WHERE ua.user_id = ?1
             ORDER BY ua.unlocked_at, a.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Paginated completion history, newest first. `total` is the full count.
    pub async fn history(&self, user_id: i64, limit: i64, offset: i64) -> Result<CompletionHistory> {
        let limit = limit.clamp(1, 100);
        let offset = offset.max(0);
        let rows: Vec<CompletionRow> = sqlx::query_as(
            "SELECT * FROM task_completions WHERE user_id = ?1
             ORDER BY completed_at DESC, id DESC
             LIMIT ?2 OFFSET ?3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task_completions WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let completions = rows
            .into_iter()
            .map(|row| CompletionRead {
                id: row.id,
                task_id: row.task_id,
                task_title: row.task_title,
                points_awarded: row.points_awarded,
                streak_incremented: row.streak_incremented,
                achievement_unlocked_ids: serde_json::from_str(&row.achievement_unlocked_ids)
                    .unwrap_or_default(),
                completed_at: row.completed_at,
                created_at: row.created_at,
            })
            .collect();
        Ok(CompletionHistory {
            user_id,
            completions,
            total,
        })
    }
}

/// Streak transition based on calendar days, not timestamps. Multiple
/// completions on the same day leave the streak alone; a gap of two or more
/// days resets it to 1 (today's completion itself counts).
fn next_streak(
    last_completion: Option<DateTime<Utc>>,
    current_streak: i64,
    now: DateTime<Utc>,
) -> (i64, bool) {
    let today = now.date_naive();
    match last_completion {
        None => (1, true),
        Some(last) => {
            let last_day = last.date_naive();
            if last_day == today {
                (current_streak, false)
            } else if Some(last_day) == today.checked_sub_days(Days::new(1)) {
                (current_streak + 1, true)
            } else {
                (1, true)
            }
        }
    }
}

async fn apply_completion_on(
    conn: &mut SqliteConnection,
    user_id: i64,
    task_id: i64,
    task_title: &str,
    now: DateTime<Utc>,
) -> Result<RewardResult> {
    let user: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = ?1")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(user) = user else {
        return Ok(RewardResult::default());
    };

    let total_tasks_completed = user.total_tasks_completed + 1;
    let last_completion = user.last_completion_date.as_deref().and_then(parse_ts);
    let (streak_count, streak_updated) = next_streak(last_completion, user.streak_count, now);

    let now_str = now.to_rfc3339();
    // Evaluate against the post-increment counters, in the same transaction.
    let unlocked = catalog::evaluate(conn, user_id, total_tasks_completed, streak_count, &now_str)
        .await?;
    let bonus: i64 = unlocked.iter().map(|a| a.points_reward).sum();
    let points = BASE_COMPLETION_POINTS + bonus;

    sqlx::query(
        "UPDATE users SET points_balance = points_balance + ?1,
                          streak_count = ?2,
                          total_tasks_completed = ?3,
                          last_completion_date = ?4,
                          updated_at = ?4
         WHERE id = ?5",
    )
    .bind(points)
    .bind(streak_count)
    .bind(total_tasks_completed)
    .bind(&now_str)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    let unlocked_ids: Vec<i64> = unlocked.iter().map(|a| a.id).collect();
    sqlx::query(
        "INSERT INTO task_completions (task_id, user_id, task_title, points_awarded,
                                       streak_incremented, achievement_unlocked_ids,
                                       completed_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
    )
    .bind(task_id)
    .bind(user_id)
    .bind(task_title)
    .bind(points)
    .bind(streak_updated)
    .bind(serde_json::to_string(&unlocked_ids)?)
    .bind(&now_str)
    .execute(&mut *conn)
    .await?;

    if !unlocked.is_empty() {
        info!(
            user_id,
            points,
            unlocked = unlocked.len(),
            "completion unlocked achievements"
        );
    }

    Ok(RewardResult {
        points,
        streak_updated,
        achievements_unlocked: unlocked,
    })
}
