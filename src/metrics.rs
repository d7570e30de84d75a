// src/metrics.rs
//! Counter names shared by sensors and the publisher.
//! Without an installed recorder every counter is a no-op.

use metrics::describe_counter;
use once_cell::sync::OnceCell;

pub const FETCH_LIVE: &str = "sensor_fetch_live_total";
pub const FETCH_CACHED: &str = "sensor_fetch_cached_total";
pub const FETCH_ERRORS: &str = "sensor_fetch_errors_total";
pub const POSTS_CREATED: &str = "publish_posts_created_total";
pub const DUPLICATES: &str = "publish_duplicates_total";
pub const INVALID_RECORDS: &str = "publish_invalid_total";
pub const PUBLISH_ERRORS: &str = "publish_errors_total";
pub const POSTS_DELETED: &str = "publish_posts_deleted_total";
pub const TAGS_CREATED: &str = "publish_tags_created_total";
pub const UPLOAD_FAILURES: &str = "publish_image_upload_failures_total";

/// One-time metrics registration (so series show up once a recorder scrapes them).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(FETCH_LIVE, "Sensor calls served by a fresh upstream fetch.");
        describe_counter!(
            FETCH_CACHED,
            "Sensor calls served from the persisted buffer."
        );
        describe_counter!(FETCH_ERRORS, "Upstream fetches that failed.");
        describe_counter!(POSTS_CREATED, "Posts created in the CMS.");
        describe_counter!(DUPLICATES, "Records skipped as already published.");
        describe_counter!(INVALID_RECORDS, "Records rejected before publishing.");
        describe_counter!(PUBLISH_ERRORS, "Publish attempts aborted by API errors.");
        describe_counter!(POSTS_DELETED, "Posts deleted by delete/purge.");
        describe_counter!(TAGS_CREATED, "Sensor tags created in the CMS.");
        describe_counter!(UPLOAD_FAILURES, "Image uploads that degraded to no image.");
    });
}
