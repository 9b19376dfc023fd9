// performance/mod.rs — On-demand metric derivation over a user's tasks.
//
// Nothing here is a running total: every call recomputes from the task
// collection (and, for the streak trend, the completion history). The only
// write path is `persist_metrics`, which overwrites the four scalar metrics
// on the user snapshot wholesale.

use anyhow::Result;
use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::BTreeSet;

use crate::storage::{now_rfc3339, parse_ts, tasks::TaskRow, UserRow};

const WEEKDAYS: &[&str] = &[
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    /// Bucket start date, `YYYY-MM-DD`.
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceProfile {
    pub user_id: i64,
    pub points_balance: i64,
    pub streak_count: i64,
    pub total_tasks_completed: i64,
    pub completion_rate: f64,
    pub execution_velocity: f64,
    pub focus_consistency: f64,
    pub collaboration_efficiency: f64,
    pub calculated_at: String,
    pub last_activity_date: Option<String>,
    pub completion_rate_trend: Vec<TrendPoint>,
    pub execution_velocity_trend: Vec<TrendPoint>,
    pub streak_trend: Vec<TrendPoint>,
}

/// Analytics window accepted by the `period` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsPeriod {
    Week,
    Month,
    Quarter,
    Year,
}

impl AnalyticsPeriod {
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "quarter" => Some(Self::Quarter),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        }
    }

    pub fn days(self) -> i64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
            Self::Year => 365,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub id: &'static str,
    pub title: &'static str,
    pub description: String,
    pub priority: &'static str,
}

// ─── Metric formulas ─────────────────────────────────────────────────────────

fn created(task: &TaskRow) -> Option<DateTime<Utc>> {
    parse_ts(&task.created_at)
}

/// Completion time proxy: `updated_at` of a completed task. The row is
/// refreshed on every mutation, but the completion transition is the last
/// mutation for the common case and matches the recorded history timestamp.
fn completed(task: &TaskRow) -> Option<DateTime<Utc>> {
    if task.completed {
        parse_ts(&task.updated_at)
    } else {
        None
    }
}

/// Raw completed/total ratio in [0, 1]. Zero for an empty collection.
/// Deliberately ignores due dates.
pub fn completion_rate(tasks: &[TaskRow]) -> f64 {
    if tasks.is_empty() {
        return 0.0;
    }
    let done = tasks.iter().filter(|t| t.completed).count();
    done as f64 / tasks.len() as f64
}

/// Tasks per week over the trailing 4 weeks. Exactly one qualifying task is
/// defined as 1.0 regardless of its age within the window; zero is 0.0.
/// Elapsed time is floored at one week so a burst never divides by near-zero.
pub fn execution_velocity(tasks: &[TaskRow], now: DateTime<Utc>) -> f64 {
    let window_start = now - Duration::weeks(4);
    let recent: Vec<DateTime<Utc>> = tasks
        .iter()
        .filter_map(completed)
        .filter(|ts| *ts >= window_start)
        .collect();

    match recent.len() {
        0 => 0.0,
        1 => 1.0,
        n => {
            let earliest = recent.iter().min().copied().unwrap_or(now);
            let weeks_elapsed = ((now - earliest).num_days() as f64 / 7.0).max(1.0);
            n as f64 / weeks_elapsed
        }
    }
}

/// Mean creation→completion interval in days, over completed tasks.
pub fn focus_consistency(tasks: &[TaskRow]) -> f64 {
    let mut days = Vec::new();
    for task in tasks {
        if let (Some(start), Some(end)) = (created(task), completed(task)) {
            days.push((end - start).num_seconds() as f64 / 86_400.0);
        }
    }
    if days.is_empty() {
        return 0.0;
    }
    days.iter().sum::<f64>() / days.len() as f64
}

/// Reserved for future multi-user features; not yet meaningful.
pub fn collaboration_efficiency(_tasks: &[TaskRow]) -> f64 {
    0.0
}

/// Day-bucketed completion rate over the last 30 days, restricted to tasks
/// created in each bucket. Buckets with no tasks are omitted, not zero-filled.
pub fn completion_rate_trend(tasks: &[TaskRow], now: DateTime<Utc>) -> Vec<TrendPoint> {
    let today = now.date_naive();
    let mut trend = Vec::new();
    for offset in (1..=30).rev() {
        let day = match today.checked_sub_days(Days::new(offset - 1)) {
            Some(d) => d,
            None => continue,
        };
        let bucket: Vec<TaskRow> = tasks
            .iter()
            .filter(|t| created(t).map(|ts| ts.date_naive() == day).unwrap_or(false))
            .cloned()
            .collect();
        if !bucket.is_empty() {
            trend.push(TrendPoint {
                date: day.format("%Y-%m-%d").to_string(),
                value: completion_rate(&bucket),
            });
        }
    }
    trend
}

/// Week-bucketed execution velocity over the last 4 weeks, restricted to
/// tasks completed in each bucket. Empty buckets are omitted.
pub fn execution_velocity_trend(tasks: &[TaskRow], now: DateTime<Utc>) -> Vec<TrendPoint> {
    let mut trend = Vec::new();
    for i in 0..4 {
        let week_start = now - Duration::weeks(4 - i);
        let week_end = week_start + Duration::weeks(1);
        let bucket: Vec<TaskRow> = tasks
            .iter()
            .filter(|t| {
                completed(t)
                    .map(|ts| ts >= week_start && ts < week_end)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        if !bucket.is_empty() {
            trend.push(TrendPoint {
                date: week_start.date_naive().format("%Y-%m-%d").to_string(),
                value: execution_velocity(&bucket, now),
            });
        }
    }
    trend
}

/// Streak value per active day over the last 30 days, reconstructed from the
/// set of calendar days that have at least one recorded completion. For each
/// such day the value is the length of the consecutive-day run ending there.
pub fn streak_trend(completion_days: &BTreeSet<NaiveDate>, now: DateTime<Utc>) -> Vec<TrendPoint> {
    let today = now.date_naive();
    let mut trend = Vec::new();
    for offset in (0..30).rev() {
        let day = match today.checked_sub_days(Days::new(offset)) {
            Some(d) => d,
            None => continue,
        };
        if !completion_days.contains(&day) {
            continue;
        }
        let mut run = 1i64;
        let mut cursor = day;
        while let Some(prev) = cursor.checked_sub_days(Days::new(1)) {
            if !completion_days.contains(&prev) {
                break;
            }
            run += 1;
            cursor = prev;
        }
        trend.push(TrendPoint {
            date: day.format("%Y-%m-%d").to_string(),
            value: run as f64,
        });
    }
    trend
}

// ─── PerformanceEngine ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PerformanceEngine {
    pool: SqlitePool,
}

impl PerformanceEngine {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn user(&self, user_id: i64) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn user_tasks(&self, user_id: i64) -> Result<Vec<TaskRow>> {
        Ok(sqlx::query_as("SELECT * FROM tasks WHERE user_id = ?1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn completion_days(&self, user_id: i64) -> Result<BTreeSet<NaiveDate>> {
        let stamps: Vec<String> =
            sqlx::query_scalar("SELECT completed_at FROM task_completions WHERE user_id = ?1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(stamps
            .iter()
            .filter_map(|s| parse_ts(s))
            .map(|ts| ts.date_naive())
            .collect())
    }

    /// Full recomputed profile. `None` when the user does not exist.
    pub async fn profile(&self, user_id: i64) -> Result<Option<PerformanceProfile>> {
        self.profile_at(user_id, Utc::now()).await
    }

    pub async fn profile_at(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<PerformanceProfile>> {
        let Some(user) = self.user(user_id).await? else {
            return Ok(None);
        };
        let tasks = self.user_tasks(user_id).await?;
        let completion_days = self.completion_days(user_id).await?;

        Ok(Some(PerformanceProfile {
            user_id,
            points_balance: user.points_balance,
            streak_count: user.streak_count,
            total_tasks_completed: user.total_tasks_completed,
            completion_rate: completion_rate(&tasks),
            execution_velocity: execution_velocity(&tasks, now),
            focus_consistency: focus_consistency(&tasks),
            collaboration_efficiency: collaboration_efficiency(&tasks),
            calculated_at: now.to_rfc3339(),
            last_activity_date: user.last_completion_date,
            completion_rate_trend: completion_rate_trend(&tasks, now),
            execution_velocity_trend: execution_velocity_trend(&tasks, now),
            streak_trend: streak_trend(&completion_days, now),
        }))
    }

    /// Recompute and write the four scalar metrics back onto the user
    /// snapshot. Overwrite, not merge.
    pub async fn persist_metrics(&self, user_id: i64) -> Result<Option<PerformanceProfile>> {
        let Some(profile) = self.profile(user_id).await? else {
            return Ok(None);
        };
        sqlx::query(
            "UPDATE users SET completion_rate = ?1, execution_velocity = ?2,
                              focus_consistency = ?3, collaboration_efficiency = ?4,
                              updated_at = ?5
             WHERE id = ?6",
        )
        .bind(profile.completion_rate)
        .bind(profile.execution_velocity)
        .bind(profile.focus_consistency)
        .bind(profile.collaboration_efficiency)
        .bind(now_rfc3339())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(Some(profile))
    }

    /// Period-bounded aggregation over tasks created in the window.
    pub async fn analytics(&self, user_id: i64, period: AnalyticsPeriod) -> Result<Value> {
        let now = Utc::now();
        let start = now - Duration::days(period.days());
        let tasks: Vec<TaskRow> = self
            .user_tasks(user_id)
            .await?
            .into_iter()
            .filter(|t| created(t).map(|ts| ts >= start).unwrap_or(false))
            .collect();

        let total_tasks = tasks.len();
        let completed_tasks: Vec<&TaskRow> = tasks.iter().filter(|t| t.completed).collect();
        let rate = if total_tasks > 0 {
            completed_tasks.len() as f64 / total_tasks as f64
        } else {
            0.0
        };

        let mut insights = Vec::new();
        let mut day_counts = [0usize; 7];
        for task in &completed_tasks {
            if let Some(ts) = completed(task) {
                day_counts[ts.weekday().num_days_from_monday() as usize] += 1;
            }
        }
        if let Some((day, count)) = day_counts
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .max_by_key(|(_, c)| **c)
        {
            insights.push(json!({
                "type": "most_productive_day",
                "message": format!("You're most productive on {}s", WEEKDAYS[day]),
                "value": count,
            }));
        }

        Ok(json!({
            "period": period.as_str(),
            "summary": {
                "total_tasks": total_tasks,
                "completed_tasks": completed_tasks.len(),
                "completion_rate": rate,
                "tasks_per_day_avg": total_tasks as f64 / period.days() as f64,
            },
            "insights": insights,
            "calculated_at": now.to_rfc3339(),
        }))
    }

    /// Heuristic recommendations derived from task patterns.
    pub async fn recommendations(&self, user_id: i64) -> Result<Vec<Recommendation>> {
        let now = Utc::now();
        let tasks = self.user_tasks(user_id).await?;
        let completed_tasks: Vec<&TaskRow> = tasks.iter().filter(|t| t.completed).collect();
        let mut recommendations = Vec::new();

        if !completed_tasks.is_empty() {
            let total_secs: f64 = completed_tasks
                .iter()
                .filter_map(|t| {
                    let start = created(t)?;
                    let end = completed(t)?;
                    Some((end - start).num_seconds() as f64)
                })
                .sum();
            let avg_hours = total_secs / completed_tasks.len() as f64 / 3600.0;
            if avg_hours > 24.0 {
                recommendations.push(Recommendation {
                    id: "break_down_large_tasks",
                    title: "Break Down Large Tasks",
                    description: format!(
                        "Your tasks take an average of {avg_hours:.1} hours to complete. \
                         Consider breaking large tasks into smaller, more manageable chunks."
                    ),
                    priority: "high",
                });
            }
        }

        let overdue = tasks
            .iter()
            .filter(|t| {
                !t.completed
                    && t.due_date
                        .as_deref()
                        .and_then(parse_ts)
                        .map(|due| due < now)
                        .unwrap_or(false)
            })
            .count();
        if !tasks.is_empty() && overdue as f64 > tasks.len() as f64 * 0.2 {
            recommendations.push(Recommendation {
                id: "improve_deadline_management",
                title: "Improve Deadline Management",
                description: format!(
                    "You have {overdue} overdue tasks. Consider setting more realistic \
                     deadlines or adjusting your priorities."
                ),
                priority: "high",
            });
        }

        let mut day_counts = [0usize; 7];
        for task in &completed_tasks {
            if let Some(ts) = completed(task) {
                day_counts[ts.weekday().num_days_from_monday() as usize] += 1;
            }
        }
        if let Some((day, _)) = day_counts
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .min_by_key(|(_, c)| **c)
        {
            recommendations.push(Recommendation {
                id: "optimize_schedule",
                title: "Optimize Your Schedule",
                description: format!(
                    "You complete fewer tasks on {}s. Consider scheduling your most \
                     important tasks for other days of the week.",
                    WEEKDAYS[day]
                ),
                priority: "medium",
            });
        }

        let long_running = completed_tasks
            .iter()
            .filter(|t| {
                created(t)
                    .zip(completed(t))
                    .map(|(start, end)| (end - start).num_days() > 7)
                    .unwrap_or(false)
            })
            .count();
        if long_running > 0 {
            recommendations.push(Recommendation {
                id: "improve_focus",
                title: "Improve Focus on Long-Term Tasks",
                description: format!(
                    "You have {long_running} tasks that took more than a week to complete. \
                     Consider setting intermediate milestones for better progress tracking."
                ),
                priority: "medium",
            });
        }

        Ok(recommendations)
    }
}
