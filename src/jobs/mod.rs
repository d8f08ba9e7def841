use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

use crate::metrics;

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        info!("Starting background job scheduler");

        let mut handles = Vec::new();

        // Only the in-process cache needs sweeping; Redis expires on its own
        if self.context.memory_cache.is_some() {
            handles.push(tokio::spawn(Self::memory_cache_purge_job(Arc::clone(&self))));
        }

        // Spawn monitoring tasks
        handles.push(tokio::spawn(Self::health_check_job(Arc::clone(&self))));

        info!("Background jobs started");
        handles
    }

    /// Purge expired in-memory cache entries (runs every minute)
    async fn memory_cache_purge_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(60)); // Every minute

        loop {
            interval.tick().await;

            match tasks::purge_memory_cache(&scheduler.context) {
                Ok(count) => {
                    metrics::record_background_job("cache_purge", "success");
                    if count > 0 {
                        debug!("Purged {} expired cache entries", count);
                    }
                }
                Err(e) => {
                    metrics::record_background_job("cache_purge", "failure");
                    error!("Failed to purge memory cache: {}", e);
                }
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300)); // Every 5 minutes

        loop {
            interval.tick().await;

            match tasks::health_check(&scheduler.context).await {
                Ok(_) => {
                    // Silent success - health is good
                    metrics::record_background_job("health_check", "success");
                }
                Err(e) => {
                    metrics::record_background_job("health_check", "failure");
                    error!("Health check failed: {}", e);
                }
            }
        }
    }
}
