//! Cache expiry job — collects confirmation payloads past their TTL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::scheduler::CronJob;
use crate::store::Store;

pub struct CacheExpiryJob {
    interval: Duration,
    store: Arc<dyn Store>,
}

impl CacheExpiryJob {
    pub fn new(interval: Duration, store: Arc<dyn Store>) -> Self {
        Self { interval, store }
    }
}

#[async_trait]
impl CronJob for CacheExpiryJob {
    fn name(&self) -> &str {
        "expire-cache"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<()> {
        let deleted = self.store.delete_expired_cache().await?;
        debug!(deleted, "Cache expiry pass complete");
        Ok(())
    }
}
