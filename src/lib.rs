pub mod auth;
pub mod config;
pub mod performance;
pub mod rest;
pub mod rewards;
pub mod storage;

use std::sync::Arc;

use auth::TokenKeys;
use config::TaskdConfig;
use performance::PerformanceEngine;
use rewards::RewardEngine;
use storage::tasks::TaskStore;
use storage::Storage;

/// Shared application state passed to every REST handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<TaskdConfig>,
    pub storage: Arc<Storage>,
    /// Task CRUD on the shared SQLite pool.
    pub tasks: Arc<TaskStore>,
    /// Reward state transitions (points, streaks, achievements, history).
    pub rewards: Arc<RewardEngine>,
    /// On-demand metric derivation over the task collection.
    pub performance: Arc<PerformanceEngine>,
    /// JWT signing/verification keys derived from `auth.jwt_secret`.
    pub tokens: Arc<TokenKeys>,
    pub started_at: std::time::Instant,
}

impl AppContext {
    pub fn new(config: TaskdConfig, storage: Storage) -> Self {
        let pool = storage.pool();
        let tokens = TokenKeys::new(
            &config.auth.jwt_secret,
            config.auth.access_ttl_secs,
            config.auth.refresh_ttl_secs,
        );
        Self {
            config: Arc::new(config),
            storage: Arc::new(storage),
            tasks: Arc::new(TaskStore::new(pool.clone())),
            rewards: Arc::new(RewardEngine::new(pool.clone())),
            performance: Arc::new(PerformanceEngine::new(pool)),
            tokens: Arc::new(tokens),
            started_at: std::time::Instant::now(),
        }
    }
}
