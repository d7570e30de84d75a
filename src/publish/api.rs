// src/publish/api.rs
//! Surface of the remote CMS consumed by the publisher.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::publish::pagination::Page;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub feature_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTag {
    pub name: String,
    pub description: String,
    /// Empty when no featured image could be uploaded.
    pub feature_image: String,
}

/// Tag as embedded in a listed post (`include=tags`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub custom_excerpt: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
    #[serde(default)]
    pub feature_image: Option<String>,
}

impl Post {
    /// Posts are grouped by their first tag.
    pub fn primary_tag(&self) -> Option<&str> {
        self.tags.first().map(|t| t.name.as_str())
    }
}

/// Post submitted for creation. Status and visibility are fixed by [`NewPost::published`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPost {
    pub title: String,
    pub custom_excerpt: String,
    /// Markdown body.
    pub markdown: String,
    pub tags: Vec<Tag>,
    pub feature_image: String,
    pub status: String,
    pub featured: bool,
    pub page: bool,
    pub locale: String,
    pub visibility: String,
}

impl NewPost {
    pub fn published(title: String, custom_excerpt: String, markdown: String, tag: Tag, feature_image: String) -> Self {
        Self {
            title,
            custom_excerpt,
            markdown,
            tags: vec![tag],
            feature_image,
            status: "published".to_string(),
            featured: false,
            page: false,
            locale: "en_US".to_string(),
            visibility: "public".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// Paginated post/tag/media store. Page numbers start at 1.
#[async_trait]
pub trait CmsApi: Send + Sync {
    /// Tags with at least `id` and `name` populated.
    async fn list_tags(&self, page: u32) -> Result<Page<Tag>>;
    async fn get_tag(&self, id: &str) -> Result<Tag>;
    async fn create_tag(&self, tag: &NewTag) -> Result<Tag>;
    async fn delete_tag(&self, id: &str) -> Result<()>;

    /// All posts regardless of status, with their tags included.
    async fn list_posts(&self, page: u32) -> Result<Page<Post>>;
    async fn create_post(&self, post: &NewPost) -> Result<Post>;
    async fn delete_post(&self, id: &str) -> Result<()>;

    /// Returns a reference (URL) to the stored media.
    async fn upload_media(&self, name: &str, media: MediaSource) -> Result<String>;
}
