//! Polls one sensor once and publishes whatever it returns.
//!
//! Env:
//!   SENSOR_SETTINGS  settings base path without extension, e.g. `sensors/HousingSensor`
//!   SENSOR_IDENTITY  tag name in the CMS (defaults to the base file name)
//!   PUBLISHER_CONFIG_PATH  see `PublisherSettings::load_default`
//!   LOG_FORMAT       `json` for JSON lines, compact text otherwise
//!
//! Run it from cron (one instance per sensor): the sensor's own rate limit
//! decides whether this run hits the upstream service or its buffer.

use std::path::PathBuf;

use anyhow::{Context, Result};
use sensor_publisher::sensor::http::{HttpFetcher, JsonRecordsParser};
use sensor_publisher::sensor::store::SensorStore;
use sensor_publisher::{logging, PublishOutcome, Publisher, PublisherSettings, RateLimitedSource, Sensor};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    logging::init_from_env();

    let base = PathBuf::from(std::env::var("SENSOR_SETTINGS").context("SENSOR_SETTINGS missing")?);
    let identity = std::env::var("SENSOR_IDENTITY").unwrap_or_else(|_| {
        base.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Sensor".to_string())
    });

    let settings = PublisherSettings::load_default().context("publisher settings")?;
    let publisher = Publisher::connect(&settings).await;

    let store = SensorStore::new(&base);
    let state = store.load_state().await?;
    let fetcher = HttpFetcher::new(JsonRecordsParser::from_settings(&state));
    let mut sensor = RateLimitedSource::with_state(identity, store, state, fetcher);

    let mut published = 0usize;
    for record in sensor.get_all().await {
        if let PublishOutcome::Published { .. } = publisher.publish(&sensor, &record).await {
            published += 1;
        }
    }
    tracing::info!(sensor = sensor.identity(), published, "publish-once done");
    Ok(())
}
