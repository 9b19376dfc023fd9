//! Integration tests for the performance derivation engine.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::collections::BTreeSet;
use tempfile::TempDir;

use taskd::performance::{
    completion_rate, completion_rate_trend, execution_velocity, execution_velocity_trend,
    focus_consistency, streak_trend, AnalyticsPeriod, PerformanceEngine,
};
use taskd::rewards::{catalog, RewardEngine};
use taskd::storage::tasks::{NewTask, TaskRow, TaskStore};
use taskd::storage::{Storage, UserRow};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
}

fn task(id: i64, completed: bool, created: DateTime<Utc>, updated: DateTime<Utc>) -> TaskRow {
    TaskRow {
        id,
        user_id: 1,
        title: format!("task {id}"),
        description: None,
        completed,
        due_date: None,
        priority: "MEDIUM".to_string(),
        tags: "[]".to_string(),
        created_at: created.to_rfc3339(),
        updated_at: updated.to_rfc3339(),
    }
}

async fn setup() -> (Storage, PerformanceEngine, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Storage::new(dir.path()).await.expect("storage");
    catalog::seed(&storage.pool()).await.expect("seed");
    let engine = PerformanceEngine::new(storage.pool());
    (storage, engine, dir)
}

async fn make_user(storage: &Storage) -> UserRow {
    storage
        .create_user("perf@test.co", "not-a-real-hash", None)
        .await
        .expect("create user")
}

// ── Scalar formulas ──────────────────────────────────────────────────────────

#[test]
fn test_completion_rate_is_raw_ratio() {
    let t = now();
    let tasks = vec![
        task(1, true, t - Duration::days(3), t - Duration::days(1)),
        task(2, false, t - Duration::days(2), t - Duration::days(2)),
        task(3, false, t - Duration::days(1), t - Duration::days(1)),
    ];
    let rate = completion_rate(&tasks);
    assert!((rate - 1.0 / 3.0).abs() < 1e-9, "got {rate}");

    assert_eq!(completion_rate(&[]), 0.0, "no tasks means rate 0, not NaN");
}

#[test]
fn test_velocity_single_task_is_one_regardless_of_age() {
    let t = now();
    let fresh = vec![task(1, true, t - Duration::days(1), t - Duration::hours(2))];
    assert_eq!(execution_velocity(&fresh, t), 1.0);

    let old = vec![task(1, true, t - Duration::weeks(5), t - Duration::weeks(3))];
    assert_eq!(execution_velocity(&old, t), 1.0);

    assert_eq!(execution_velocity(&[], t), 0.0);
}

#[test]
fn test_velocity_divides_by_elapsed_weeks() {
    let t = now();
    // Four completions, earliest two weeks ago: 4 / 2 = 2 tasks/week.
    let tasks = vec![
        task(1, true, t - Duration::weeks(3), t - Duration::weeks(2)),
        task(2, true, t - Duration::weeks(2), t - Duration::days(10)),
        task(3, true, t - Duration::weeks(1), t - Duration::days(4)),
        task(4, true, t - Duration::days(2), t - Duration::days(1)),
    ];
    let velocity = execution_velocity(&tasks, t);
    assert!((velocity - 2.0).abs() < 1e-9, "got {velocity}");
}

#[test]
fn test_velocity_floors_elapsed_time_at_one_week() {
    let t = now();
    // Burst: three completions within a day must not divide by near-zero.
    let tasks = vec![
        task(1, true, t - Duration::days(1), t - Duration::hours(20)),
        task(2, true, t - Duration::days(1), t - Duration::hours(10)),
        task(3, true, t - Duration::days(1), t - Duration::hours(1)),
    ];
    assert_eq!(execution_velocity(&tasks, t), 3.0);
}

#[test]
fn test_velocity_ignores_completions_outside_window() {
    let t = now();
    let tasks = vec![
        task(1, true, t - Duration::weeks(10), t - Duration::weeks(8)),
        task(2, true, t - Duration::weeks(9), t - Duration::weeks(7)),
    ];
    assert_eq!(execution_velocity(&tasks, t), 0.0);
}

#[test]
fn test_focus_consistency_is_mean_days_to_complete() {
    let t = now();
    let tasks = vec![
        task(1, true, t - Duration::days(4), t - Duration::days(2)), // 2 days
        task(2, true, t - Duration::days(5), t - Duration::days(1)), // 4 days
        task(3, false, t - Duration::days(9), t - Duration::days(9)), // ignored
    ];
    let focus = focus_consistency(&tasks);
    assert!((focus - 3.0).abs() < 1e-9, "got {focus}");

    assert_eq!(focus_consistency(&[]), 0.0);
}

// ── Trend series ─────────────────────────────────────────────────────────────

#[test]
fn test_completion_rate_trend_omits_empty_buckets() {
    let t = now();
    let day_a = t - Duration::days(5);
    let day_b = t - Duration::days(2);
    let tasks = vec![
        task(1, true, day_a, day_a + Duration::hours(4)),
        task(2, false, day_a + Duration::hours(1), day_a + Duration::hours(1)),
        task(3, true, day_b, day_b + Duration::hours(2)),
    ];

    let trend = completion_rate_trend(&tasks, t);
    assert_eq!(trend.len(), 2, "only days with created tasks appear");
    assert_eq!(trend[0].date, day_a.date_naive().format("%Y-%m-%d").to_string());
    assert!((trend[0].value - 0.5).abs() < 1e-9);
    assert_eq!(trend[1].value, 1.0);
}

#[test]
fn test_velocity_trend_buckets_by_week() {
    let t = now();
    let tasks = vec![
        // Completed 3.5 weeks ago: first bucket.
        task(1, true, t - Duration::weeks(4), t - Duration::days(25)),
        // Completed 2 days ago: last bucket.
        task(2, true, t - Duration::weeks(1), t - Duration::days(2)),
        task(3, true, t - Duration::days(3), t - Duration::days(2)),
    ];
    let trend = execution_velocity_trend(&tasks, t);
    assert_eq!(trend.len(), 2, "two of four week buckets have completions");
}

#[test]
fn test_streak_trend_reconstructs_runs_from_history() {
    let t = now();
    let today = t.date_naive();
    let d = |offset: u64| today.checked_sub_days(chrono::Days::new(offset)).unwrap();

    let days: BTreeSet<NaiveDate> = [d(5), d(2), d(1), d(0)].into_iter().collect();
    let trend = streak_trend(&days, t);

    assert_eq!(trend.len(), 4);
    let values: Vec<f64> = trend.iter().map(|p| p.value).collect();
    // Isolated day counts 1; the 3-day run climbs 1, 2, 3.
    assert_eq!(values, vec![1.0, 1.0, 2.0, 3.0]);
}

// ── Engine queries ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_profile_missing_user_is_none() {
    let (_storage, engine, _dir) = setup().await;
    assert!(engine.profile(999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_profile_for_fresh_user_is_all_zero() {
    let (storage, engine, _dir) = setup().await;
    let user = make_user(&storage).await;

    let profile = engine.profile(user.id).await.unwrap().unwrap();
    assert_eq!(profile.completion_rate, 0.0);
    assert_eq!(profile.execution_velocity, 0.0);
    assert_eq!(profile.focus_consistency, 0.0);
    assert_eq!(profile.collaboration_efficiency, 0.0);
    assert!(profile.completion_rate_trend.is_empty());
    assert!(profile.streak_trend.is_empty());
}

#[tokio::test]
async fn test_profile_reflects_live_task_state() {
    let (storage, engine, _dir) = setup().await;
    let user = make_user(&storage).await;
    let tasks = TaskStore::new(storage.pool());
    let rewards = RewardEngine::new(storage.pool());

    for i in 0..3 {
        tasks
            .create_task(
                user.id,
                &NewTask {
                    title: format!("task {i}"),
                    description: None,
                    due_date: None,
                    priority: None,
                    tags: None,
                },
            )
            .await
            .unwrap();
    }
    let first = tasks.list_tasks(user.id).await.unwrap().pop().unwrap();
    rewards.complete_task(user.id, first.id).await.unwrap();

    let profile = engine.profile(user.id).await.unwrap().unwrap();
    assert!((profile.completion_rate - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(profile.execution_velocity, 1.0, "single recent completion");
    assert_eq!(profile.total_tasks_completed, 1);
    assert_eq!(profile.streak_count, 1);
    assert_eq!(profile.streak_trend.len(), 1, "one active day in history");
}

#[tokio::test]
async fn test_persist_metrics_overwrites_user_snapshot() {
    let (storage, engine, _dir) = setup().await;
    let user = make_user(&storage).await;
    let tasks = TaskStore::new(storage.pool());
    let rewards = RewardEngine::new(storage.pool());

    let t = tasks
        .create_task(
            user.id,
            &NewTask {
                title: "only task".to_string(),
                description: None,
                due_date: None,
                priority: None,
                tags: None,
            },
        )
        .await
        .unwrap();
    rewards.complete_task(user.id, t.id).await.unwrap();

    let profile = engine.persist_metrics(user.id).await.unwrap().unwrap();
    let user = storage.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(user.completion_rate, profile.completion_rate);
    assert_eq!(user.completion_rate, 1.0);
    assert_eq!(user.execution_velocity, 1.0);
}

#[tokio::test]
async fn test_analytics_summary_counts() {
    let (storage, engine, _dir) = setup().await;
    let user = make_user(&storage).await;
    let tasks = TaskStore::new(storage.pool());
    let rewards = RewardEngine::new(storage.pool());

    for i in 0..4 {
        tasks
            .create_task(
                user.id,
                &NewTask {
                    title: format!("task {i}"),
                    description: None,
                    due_date: None,
                    priority: None,
                    tags: None,
                },
            )
            .await
            .unwrap();
    }
    let one = tasks.list_tasks(user.id).await.unwrap().pop().unwrap();
    rewards.complete_task(user.id, one.id).await.unwrap();

    let analytics = engine
        .analytics(user.id, AnalyticsPeriod::Month)
        .await
        .unwrap();
    let summary = &analytics["summary"];
    assert_eq!(summary["total_tasks"], 4);
    assert_eq!(summary["completed_tasks"], 1);
    assert!((summary["completion_rate"].as_f64().unwrap() - 0.25).abs() < 1e-9);
    assert_eq!(analytics["period"], "month");
}

#[tokio::test]
async fn test_recommendations_flag_overdue_backlog() {
    let (storage, engine, _dir) = setup().await;
    let user = make_user(&storage).await;
    let tasks = TaskStore::new(storage.pool());

    let overdue = (Utc::now() - Duration::days(3)).to_rfc3339();
    for i in 0..3 {
        tasks
            .create_task(
                user.id,
                &NewTask {
                    title: format!("late {i}"),
                    description: None,
                    due_date: Some(overdue.clone()),
                    priority: None,
                    tags: None,
                },
            )
            .await
            .unwrap();
    }

    let recommendations = engine.recommendations(user.id).await.unwrap();
    assert!(
        recommendations
            .iter()
            .any(|r| r.id == "improve_deadline_management"),
        "all tasks overdue should trigger the deadline recommendation"
    );
}
