use chrono::{DateTime, Utc};
use pixelplace_core::{Cooldown, CooldownDecision};
use std::sync::Arc;

use super::{bounded, retry_idempotent};
use crate::config::{RateLimitFailurePolicy, StoreConfig};
use crate::db::{CanvasStore, StoreError};

/// Per-writer cooldown enforcement backed by the document store.
///
/// Checking and recording are separate calls so a caller can skip the
/// record for writers that bypass the cooldown. The pair is not atomic.
pub struct RateLimiter {
    store: Arc<dyn CanvasStore>,
    cooldown: Cooldown,
    on_lookup_error: RateLimitFailurePolicy,
    store_config: StoreConfig,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn CanvasStore>,
        cooldown: Cooldown,
        on_lookup_error: RateLimitFailurePolicy,
        store_config: StoreConfig,
    ) -> Self {
        Self {
            store,
            cooldown,
            on_lookup_error,
            store_config,
        }
    }

    pub fn cooldown(&self) -> Cooldown {
        self.cooldown
    }

    /// Decide whether `writer_id` may act in `category` at `now`. Never writes.
    pub async fn allow(
        &self,
        writer_id: &str,
        category: &str,
        now: DateTime<Utc>,
    ) -> Result<CooldownDecision, StoreError> {
        let lookup = bounded(
            self.store_config.timeout,
            self.store.last_action(category, writer_id),
        )
        .await;

        let last = match lookup {
            Ok(last) => last,
            Err(e) => match self.on_lookup_error {
                RateLimitFailurePolicy::Open => {
                    tracing::warn!(
                        writer_id,
                        category,
                        error = %e,
                        "Cooldown lookup failed, allowing"
                    );
                    None
                }
                RateLimitFailurePolicy::Closed => return Err(e),
            },
        };

        Ok(self.cooldown.check(last, now))
    }

    /// Record `now` as the writer's last accepted action in `category`
    pub async fn commit(
        &self,
        writer_id: &str,
        category: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        retry_idempotent(&self.store_config, "record_action", || {
            self.store.record_action(category, writer_id, now)
        })
        .await
    }
}
