// src/sensor/rate_limited.rs
use std::path::Path;

use async_trait::async_trait;
use metrics::counter;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::error::{PipelineError, Result};
use crate::metrics as m;
use crate::sensor::clock::{Clock, SystemClock};
use crate::sensor::record::{leading_cursor, ContentRecord, Cursor};
use crate::sensor::state::SensorState;
use crate::sensor::store::SensorStore;
use crate::sensor::{Sensor, SourceFetcher};

/// Wraps a [`SourceFetcher`] with admission control, durable state and a
/// buffered fallback.
///
/// Either content is fetched live (allowed, upstream answered) or the
/// persisted buffer is served. Which one depends only on the time elapsed
/// since `last_used`; callers drive the polling cadence.
pub struct RateLimitedSource<F> {
    identity: String,
    store: SensorStore,
    state: SensorState,
    fetcher: F,
    clock: Box<dyn Clock>,
    featured_image: Option<String>,
}

impl<F: SourceFetcher> RateLimitedSource<F> {
    /// Loads `<base>.json`. A missing or corrupt settings document is a config error.
    pub async fn open(identity: impl Into<String>, base: impl AsRef<Path>, fetcher: F) -> Result<Self> {
        let store = SensorStore::new(base);
        let state = store.load_state().await?;
        Ok(Self::with_state(identity, store, state, fetcher))
    }

    /// Builds the source from settings the caller already loaded from `store`.
    pub fn with_state(identity: impl Into<String>, store: SensorStore, state: SensorState, fetcher: F) -> Self {
        m::ensure_described();
        let identity = identity.into();
        let featured_image = state.setting_str("featured_image").map(str::to_string);
        info!(sensor = %identity, fetcher = fetcher.name(), "sensor ready to be called");
        Self {
            identity,
            store,
            state,
            fetcher,
            clock: Box::new(SystemClock),
            featured_image,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_featured_image(mut self, image: impl Into<String>) -> Self {
        self.featured_image = Some(image.into());
        self
    }

    pub fn state(&self) -> &SensorState {
        &self.state
    }

    pub fn store(&self) -> &SensorStore {
        &self.store
    }

    /// Evaluated against the clock on every call; never cached.
    pub fn request_allowed(&self) -> bool {
        self.state.request_allowed(self.clock.now_unix())
    }

    /// One upstream request. `None` when it failed; the caller decides on a fallback.
    async fn fetch_live(&mut self) -> Option<Vec<ContentRecord>> {
        let started = self.clock.now_unix();
        match self.fetcher.fetch(&self.state).await {
            Ok(content) => {
                self.stamp_last_used(started).await;
                if let Err(e) = self.store.write_buffer(&content).await {
                    error!(sensor = %self.identity, error = %e, "buffer write failed");
                } else {
                    debug!(sensor = %self.identity, records = content.len(), "content cached");
                }
                counter!(m::FETCH_LIVE).increment(1);
                info!(sensor = %self.identity, records = content.len(), "fetched new content");
                Some(content)
            }
            Err(e) => {
                // The upstream saw the request even if it refused it.
                if matches!(e, PipelineError::RemoteApi { .. }) {
                    self.stamp_last_used(started).await;
                }
                counter!(m::FETCH_ERRORS).increment(1);
                warn!(sensor = %self.identity, error = %e, "fetch failed");
                None
            }
        }
    }

    async fn stamp_last_used(&mut self, now: i64) {
        self.state.last_used = now;
        if let Err(e) = self.store.save_state(&self.state).await {
            error!(sensor = %self.identity, error = %e, "saving sensor state failed");
        }
    }

    async fn read_buffer(&self) -> Vec<ContentRecord> {
        counter!(m::FETCH_CACHED).increment(1);
        match self.store.read_buffer().await {
            Ok(content) => content,
            Err(e) => {
                warn!(sensor = %self.identity, error = %e, "buffer unavailable, serving nothing");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl<F: SourceFetcher> Sensor for RateLimitedSource<F> {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn metadata(&self) -> &Map<String, Value> {
        self.state.metadata()
    }

    async fn has_updates(&mut self, cursor: &Cursor) -> u32 {
        if !self.request_allowed() {
            return 0;
        }
        match self.fetch_live().await {
            Some(content) if leading_cursor(&content).is_some_and(|c| c != cursor) => 1,
            _ => 0,
        }
    }

    async fn get_content(&mut self, cursor: &Cursor) -> Option<Vec<ContentRecord>> {
        let content = self.get_all().await;
        match leading_cursor(&content) {
            Some(lead) if lead != cursor => Some(content),
            _ => None,
        }
    }

    async fn get_all(&mut self) -> Vec<ContentRecord> {
        if self.request_allowed() {
            if let Some(content) = self.fetch_live().await {
                return content;
            }
        } else {
            debug!(sensor = %self.identity, "request window closed, serving buffer");
        }
        self.read_buffer().await
    }

    fn get_featured_image(&self) -> Option<String> {
        self.featured_image.clone()
    }
}
