// src/publish/mod.rs
//! Republishes sensor content as CMS posts, one tag per sensor.
//!
//! Every operation is best-effort: API failures are logged and turned into
//! a benign result (an outcome value, an empty id list, a zero count).
//! Nothing here serializes concurrent callers; two publishers racing on a
//! never-seen sensor can both create its tag.

pub mod api;
pub mod ghost;
pub mod pagination;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use metrics::counter;
use reqwest::Client;
use tracing::{error, info, warn};

use crate::config::publisher::PublisherSettings;
use crate::error::Result;
use crate::metrics as m;
use crate::publish::api::{CmsApi, MediaSource, NewPost, NewTag, Post, Tag};
use crate::publish::ghost::GhostClient;
use crate::publish::pagination::collect_matching;
use crate::sensor::record::{ContentRecord, ValidRecord};
use crate::sensor::Sensor;

/// Ghost accepts titles up to 255 characters.
pub const TITLE_MAX_CHARS: usize = 255;
/// Ghost accepts custom excerpts up to 300 characters.
pub const EXCERPT_MAX_CHARS: usize = 300;
pub const TAG_DESCRIPTION_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { post_id: String },
    /// Posts with the same tag, title and excerpt already exist.
    Duplicate { ids: Vec<String> },
    /// Record lacked cursor, caption or summary.
    Invalid,
    /// An API call failed; details are in the log.
    Failed,
    /// No CMS connection; nothing was attempted.
    Disconnected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub posts_deleted: usize,
    pub tag_deleted: bool,
}

/// First `max` characters of `s` (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Story falls back to the summary; an origin becomes a trailing source link.
pub fn compose_story(summary: &str, story: Option<&str>, origin: Option<&str>) -> String {
    let mut out = story.unwrap_or(summary).to_string();
    if let Some(origin) = origin {
        out.push_str(&format!("\n\n[Original Source]({origin})"));
    }
    out
}

/// Final path segment of a local path or URL, used as the uploaded media name.
pub fn media_name(src: &str) -> String {
    let trimmed = src.split(['?', '#']).next().unwrap_or(src);
    Path::new(trimmed)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| trimmed.to_string())
}

pub struct Publisher<C: ?Sized> {
    api: Option<Arc<C>>,
    http: Client,
}

impl Publisher<GhostClient> {
    /// Logs in to Ghost. On failure the publisher stays usable but inert.
    pub async fn connect(settings: &PublisherSettings) -> Self {
        match GhostClient::connect(settings).await {
            Ok(client) => Self::new(Arc::new(client)),
            Err(e) => {
                error!(server = %settings.server, error = %e, "ghost login failed, publisher is inert");
                Self::disconnected()
            }
        }
    }
}

impl<C: CmsApi + ?Sized> Publisher<C> {
    pub fn new(api: Arc<C>) -> Self {
        m::ensure_described();
        Self {
            api: Some(api),
            http: Client::new(),
        }
    }

    pub fn disconnected() -> Self {
        m::ensure_described();
        Self {
            api: None,
            http: Client::new(),
        }
    }

    /// Client used to download remote images before upload.
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.api.is_some()
    }

    fn api(&self, op: &'static str) -> Option<&C> {
        let api = self.api.as_deref();
        if api.is_none() {
            warn!(op, "no CMS connection, skipping");
        }
        api
    }

    /// Publishes one record under the sensor's tag unless it is incomplete or already published.
    pub async fn publish<S: Sensor + ?Sized>(&self, sensor: &S, record: &ContentRecord) -> PublishOutcome {
        let identity = sensor.identity();
        let rec = match record.validate() {
            Ok(rec) => rec,
            Err(e) => {
                info!(sensor = %identity, error = %e, "incomplete record, won't be published");
                counter!(m::INVALID_RECORDS).increment(1);
                return PublishOutcome::Invalid;
            }
        };
        let Some(api) = self.api("publish") else {
            return PublishOutcome::Disconnected;
        };
        match self.try_publish(api, sensor, &rec).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(sensor = %identity, caption = rec.caption, error = %e, "publish failed");
                counter!(m::PUBLISH_ERRORS).increment(1);
                PublishOutcome::Failed
            }
        }
    }

    async fn try_publish<S: Sensor + ?Sized>(
        &self,
        api: &C,
        sensor: &S,
        rec: &ValidRecord<'_>,
    ) -> Result<PublishOutcome> {
        let identity = sensor.identity();

        let ids = duplicates(api, identity, rec.caption, rec.summary).await?;
        if !ids.is_empty() {
            info!(sensor = %identity, caption = rec.caption, "duplicate record, won't be published");
            counter!(m::DUPLICATES).increment(1);
            return Ok(PublishOutcome::Duplicate { ids });
        }

        let tag = self.resolve_tag(api, sensor).await?;
        let story = compose_story(rec.summary, rec.story, rec.origin);
        let image = self.upload_image(api, identity, rec.image).await;

        let post = NewPost::published(
            truncate_chars(rec.caption, TITLE_MAX_CHARS).to_string(),
            truncate_chars(rec.summary, EXCERPT_MAX_CHARS).to_string(),
            story,
            tag,
            image,
        );
        let created = api.create_post(&post).await?;
        counter!(m::POSTS_CREATED).increment(1);
        info!(sensor = %identity, post = %created.id, cursor = %rec.cursor, "post created");
        Ok(PublishOutcome::Published { post_id: created.id })
    }

    /// Reuses the tag named after the sensor, creating it on first use.
    async fn resolve_tag<S: Sensor + ?Sized>(&self, api: &C, sensor: &S) -> Result<Tag> {
        let identity = sensor.identity();
        let existing = collect_matching(move |page| api.list_tags(page), |t: &Tag| t.name == identity).await?;
        if let Some(tag) = existing.first() {
            return api.get_tag(&tag.id).await;
        }

        let description = sensor
            .about()
            .map(|a| truncate_chars(&a, TAG_DESCRIPTION_MAX_CHARS).to_string())
            .unwrap_or_default();
        let featured = sensor.get_featured_image();
        let feature_image = self.upload_image(api, identity, featured.as_deref()).await;
        let tag = api
            .create_tag(&NewTag {
                name: identity.to_string(),
                description,
                feature_image,
            })
            .await?;
        counter!(m::TAGS_CREATED).increment(1);
        info!(sensor = %identity, tag = %tag.id, "tag created");
        Ok(tag)
    }

    /// Uploads a local file or a downloaded URL. Any failure yields an empty reference.
    async fn upload_image(&self, api: &C, identity: &str, src: Option<&str>) -> String {
        let Some(src) = src.filter(|s| !s.is_empty()) else {
            return String::new();
        };
        let media = if src.starts_with("http") {
            match self.download(src).await {
                Ok(bytes) => MediaSource::Bytes(bytes),
                Err(e) => {
                    warn!(sensor = %identity, image = src, error = %e, "image download failed");
                    counter!(m::UPLOAD_FAILURES).increment(1);
                    return String::new();
                }
            }
        } else {
            MediaSource::File(PathBuf::from(src))
        };
        match api.upload_media(&media_name(src), media).await {
            Ok(url) => url,
            Err(e) => {
                warn!(sensor = %identity, image = src, error = %e, "image upload failed");
                counter!(m::UPLOAD_FAILURES).increment(1);
                String::new()
            }
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.http.get(url).send().await?.error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }

    /// Ids of posts under `identity`'s tag whose title and excerpt equal the
    /// truncated caption and summary. Empty when none exist or the lookup failed.
    pub async fn find_dup(&self, identity: &str, caption: &str, summary: &str) -> Vec<String> {
        let Some(api) = self.api("find_dup") else {
            return Vec::new();
        };
        duplicates(api, identity, caption, summary)
            .await
            .unwrap_or_else(|e| {
                error!(sensor = %identity, error = %e, "duplicate lookup failed");
                Vec::new()
            })
    }

    /// Deletes every post whose first tag is `identity` (or every post when
    /// `all_posts`). Returns how many were deleted.
    pub async fn delete_posts(&self, identity: &str, all_posts: bool) -> usize {
        let Some(api) = self.api("delete_posts") else {
            return 0;
        };
        let posts = match collect_matching(move |page| api.list_posts(page), |p: &Post| {
            all_posts || p.primary_tag() == Some(identity)
        })
        .await
        {
            Ok(posts) => posts,
            Err(e) => {
                error!(sensor = %identity, error = %e, "listing posts failed");
                return 0;
            }
        };

        let mut deleted = 0usize;
        for post in &posts {
            match api.delete_post(&post.id).await {
                Ok(()) => deleted += 1,
                Err(e) => error!(sensor = %identity, post = %post.id, error = %e, "post delete failed"),
            }
        }
        counter!(m::POSTS_DELETED).increment(deleted as u64);
        info!(sensor = %identity, deleted, "posts deleted");
        deleted
    }

    /// Deletes the sensor's posts, then its tag (with `all_sensors`: all posts and the first tag found).
    pub async fn purge(&self, identity: &str, all_sensors: bool) -> PurgeReport {
        let mut report = PurgeReport {
            posts_deleted: self.delete_posts(identity, all_sensors).await,
            tag_deleted: false,
        };
        let Some(api) = self.api("purge") else {
            return report;
        };
        let tags = match collect_matching(move |page| api.list_tags(page), |t: &Tag| {
            all_sensors || t.name == identity
        })
        .await
        {
            Ok(tags) => tags,
            Err(e) => {
                error!(sensor = %identity, error = %e, "listing tags failed");
                return report;
            }
        };
        if let Some(tag) = tags.first() {
            match api.delete_tag(&tag.id).await {
                Ok(()) => {
                    report.tag_deleted = true;
                    info!(sensor = %identity, tag = %tag.id, "purged");
                }
                Err(e) => error!(sensor = %identity, tag = %tag.id, error = %e, "tag delete failed"),
            }
        }
        report
    }
}

/// The shared dedup primitive behind `publish` and `find_dup`.
async fn duplicates<C: CmsApi + ?Sized>(
    api: &C,
    identity: &str,
    caption: &str,
    summary: &str,
) -> Result<Vec<String>> {
    let title = truncate_chars(caption, TITLE_MAX_CHARS);
    let excerpt = truncate_chars(summary, EXCERPT_MAX_CHARS);
    let posts = collect_matching(move |page| api.list_posts(page), |p: &Post| {
        p.primary_tag() == Some(identity)
            && p.title == title
            && p.custom_excerpt.as_deref() == Some(excerpt)
    })
    .await?;
    Ok(posts.into_iter().map(|p| p.id).collect())
}
