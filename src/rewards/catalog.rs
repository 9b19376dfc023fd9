// rewards/catalog.rs — Declarative achievement catalog.
//
// The milestone set lives in one table of records so it can grow without
// touching evaluation logic. Rows are materialized once at startup
// (idempotent seed against the UNIQUE name constraint); evaluation treats
// the catalog as read-only.

use anyhow::Result;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::storage::UserRow;

/// Which cumulative counter an achievement threshold tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    TotalTasks,
    Streak,
}

impl Requirement {
    pub fn as_str(self) -> &'static str {
        match self {
            Requirement::TotalTasks => "total_tasks",
            Requirement::Streak => "streak",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "total_tasks" => Some(Requirement::TotalTasks),
            "streak" => Some(Requirement::Streak),
            _ => None,
        }
    }

    /// Current value of the counter this requirement tests.
    pub fn counter(self, total_tasks_completed: i64, streak_count: i64) -> i64 {
        match self {
            Requirement::TotalTasks => total_tasks_completed,
            Requirement::Streak => streak_count,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub requirement: Requirement,
    pub requirement_value: i64,
    pub points_reward: i64,
}

/// The fixed milestone set. Extending the catalog means adding a row here —
/// the evaluator never special-cases individual entries.
pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        name: "First Steps",
        description: "Complete your first task",
        icon: "🏆",
        requirement: Requirement::TotalTasks,
        requirement_value: 1,
        points_reward: 50,
    },
    CatalogEntry {
        name: "Getting Started",
        description: "Complete 10 tasks",
        icon: "🚀",
        requirement: Requirement::TotalTasks,
        requirement_value: 10,
        points_reward: 100,
    },
    CatalogEntry {
        name: "Productivity Master",
        description: "Complete 50 tasks",
        icon: "⚡",
        requirement: Requirement::TotalTasks,
        requirement_value: 50,
        points_reward: 500,
    },
    CatalogEntry {
        name: "Legend Status",
        description: "Complete 100 tasks",
        icon: "👑",
        requirement: Requirement::TotalTasks,
        requirement_value: 100,
        points_reward: 1000,
    },
    CatalogEntry {
        name: "Consistency King",
        description: "Maintain a 7-day streak",
        icon: "🔥",
        requirement: Requirement::Streak,
        requirement_value: 7,
        points_reward: 250,
    },
];

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AchievementRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub requirement_type: String,
    pub requirement_value: i64,
    pub points_reward: i64,
}

/// Entry in the "available achievements" progress view.
#[derive(Debug, Clone, Serialize)]
pub struct AvailableAchievement {
    #[serde(flatten)]
    pub achievement: AchievementRow,
    pub current_progress: i64,
    pub percentage_complete: f64,
    pub unlocked: bool,
}

/// Materialize catalog rows. Safe to run on every startup and safe under
/// concurrent callers: the UNIQUE name constraint makes the insert a no-op
/// for rows that already exist, and existing rows are never altered.
pub async fn seed(pool: &SqlitePool) -> Result<()> {
    for entry in CATALOG {
        sqlx::query(
            "INSERT INTO achievements (name, description, icon, requirement_type, requirement_value, points_reward)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(entry.name)
        .bind(entry.description)
        .bind(entry.icon)
        .bind(entry.requirement.as_str())
        .bind(entry.requirement_value)
        .bind(entry.points_reward)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Unlock every catalog entry whose threshold the post-increment counters
/// newly satisfy. Idempotent: already-unlocked entries are skipped by the
/// existence check, so re-running with unchanged counters unlocks nothing.
/// Crossing several thresholds at once unlocks all of them in this call.
pub async fn evaluate(
    conn: &mut SqliteConnection,
    user_id: i64,
    total_tasks_completed: i64,
    streak_count: i64,
    now: &str,
) -> Result<Vec<AchievementRow>> {
    let rows: Vec<AchievementRow> = sqlx::query_as("SELECT * FROM achievements ORDER BY id")
        .fetch_all(&mut *conn)
        .await?;
    let unlocked: Vec<i64> =
        sqlx::query_scalar("SELECT achievement_id FROM user_achievements WHERE user_id = ?1")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

    let mut newly_unlocked = Vec::new();
    for row in rows {
        if unlocked.contains(&row.id) {
            continue;
        }
        let Some(requirement) = Requirement::from_str(&row.requirement_type) else {
            continue;
        };
        if requirement.counter(total_tasks_completed, streak_count) >= row.requirement_value {
            sqlx::query(
                "INSERT INTO user_achievements (user_id, achievement_id, unlocked_at)
                 VALUES (?1, ?2, ?3)",
            )
            .bind(user_id)
            .bind(row.id)
            .bind(now)
            .execute(&mut *conn)
            .await?;
            newly_unlocked.push(row);
        }
    }
    Ok(newly_unlocked)
}

/// Every catalog entry with the user's progress toward it. Read-only.
pub async fn available_achievements(
    pool: &SqlitePool,
    user: &UserRow,
) -> Result<Vec<AvailableAchievement>> {
    let rows: Vec<AchievementRow> = sqlx::query_as("SELECT * FROM achievements ORDER BY id")
        .fetch_all(pool)
        .await?;
    let unlocked: Vec<i64> =
        sqlx::query_scalar("SELECT achievement_id FROM user_achievements WHERE user_id = ?1")
            .bind(user.id)
            .fetch_all(pool)
            .await?;

    let mut available = Vec::with_capacity(rows.len());
    for row in rows {
        let progress = Requirement::from_str(&row.requirement_type)
            .map(|r| r.counter(user.total_tasks_completed, user.streak_count))
            .unwrap_or(0);
        let percentage = if row.requirement_value > 0 {
            (progress as f64 / row.requirement_value as f64 * 100.0).min(100.0)
        } else {
            0.0
        };
        let is_unlocked = unlocked.contains(&row.id);
        available.push(AvailableAchievement {
            achievement: row,
            current_progress: progress,
            percentage_complete: (percentage * 100.0).round() / 100.0,
            unlocked: is_unlocked,
        });
    }
    Ok(available)
}
