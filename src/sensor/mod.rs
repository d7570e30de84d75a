// src/sensor/mod.rs
//! Software sensors: adapters that pull content from a third-party web
//! service while staying inside its rate limits.

pub mod clock;
pub mod http;
pub mod rate_limited;
pub mod record;
pub mod state;
pub mod store;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::sensor::record::{ContentRecord, Cursor};
use crate::sensor::state::SensorState;

pub use rate_limited::RateLimitedSource;

/// Capability set every sensor exposes to a driver and to the publisher.
#[async_trait]
pub trait Sensor: Send + Sync {
    /// Identity used as tag name and grouping key in the CMS.
    fn identity(&self) -> &str;

    /// Read-only source metadata; may carry an `about` text.
    fn metadata(&self) -> &Map<String, Value>;

    /// 1 if a fetch is permitted right now and its leading cursor differs from `cursor`, else 0.
    async fn has_updates(&mut self, cursor: &Cursor) -> u32;

    /// The full current content set if its leading cursor differs from `cursor`.
    async fn get_content(&mut self, cursor: &Cursor) -> Option<Vec<ContentRecord>>;

    /// Fresh content when a fetch is permitted, the buffered snapshot otherwise.
    async fn get_all(&mut self) -> Vec<ContentRecord>;

    /// Optional background image (local path or URL) for this sensor's tag.
    fn get_featured_image(&self) -> Option<String> {
        None
    }

    fn about(&self) -> Option<String> {
        match self.metadata().get("about")? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Narrow seam to the domain-specific part of a source: one upstream
/// request, turned into records. Admission control and caching live in
/// [`RateLimitedSource`].
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, settings: &SensorState) -> Result<Vec<ContentRecord>>;

    fn name(&self) -> &'static str;
}
