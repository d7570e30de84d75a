// src/lib.rs
// Public library surface for the driver binary and integration tests.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod publish;
pub mod sensor;

// ---- Re-exports for stable public API ----
pub use crate::config::PublisherSettings;
pub use crate::error::{PipelineError, Result};
pub use crate::publish::api::CmsApi;
pub use crate::publish::{PublishOutcome, Publisher, PurgeReport};
pub use crate::sensor::record::{ContentRecord, Cursor};
pub use crate::sensor::{RateLimitedSource, Sensor, SourceFetcher};
