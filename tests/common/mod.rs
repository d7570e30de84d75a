// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use sensor_publisher::publish::api::{CmsApi, MediaSource, NewPost, NewTag, Post, Tag, TagRef};
use sensor_publisher::publish::pagination::Page;
use sensor_publisher::sensor::state::SensorState;
use sensor_publisher::{ContentRecord, Cursor, PipelineError, Result, Sensor, SourceFetcher};

// ---------------------------------------------------------------------------
// In-memory CMS
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Store {
    posts: Vec<Post>,
    bodies: Vec<(String, String)>,
    tags: Vec<Tag>,
    uploads: Vec<(String, usize)>,
    next_id: usize,
}

/// Paginated post/tag store with call counters and switchable failures.
pub struct FakeCms {
    page_size: usize,
    store: Mutex<Store>,
    pub post_list_calls: AtomicUsize,
    pub tag_creates: AtomicUsize,
    pub fail_listing: Mutex<bool>,
    pub fail_uploads: Mutex<bool>,
}

impl FakeCms {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            store: Mutex::new(Store::default()),
            post_list_calls: AtomicUsize::new(0),
            tag_creates: AtomicUsize::new(0),
            fail_listing: Mutex::new(false),
            fail_uploads: Mutex::new(false),
        }
    }

    /// Inserts a post directly, bypassing the publisher.
    pub fn seed_post(&self, tag: &str, title: &str, excerpt: &str) -> String {
        let mut s = self.store.lock().unwrap();
        s.next_id += 1;
        let id = format!("post-{}", s.next_id);
        s.posts.push(Post {
            id: id.clone(),
            title: title.to_string(),
            custom_excerpt: Some(excerpt.to_string()),
            tags: vec![TagRef {
                id: format!("tag-of-{tag}"),
                name: tag.to_string(),
            }],
            feature_image: None,
        });
        id
    }

    pub fn seed_tag(&self, name: &str) -> String {
        let mut s = self.store.lock().unwrap();
        s.next_id += 1;
        let id = format!("tag-{}", s.next_id);
        s.tags.push(Tag {
            id: id.clone(),
            name: name.to_string(),
            description: None,
            feature_image: None,
        });
        id
    }

    pub fn posts(&self) -> Vec<Post> {
        self.store.lock().unwrap().posts.clone()
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.store.lock().unwrap().tags.clone()
    }

    pub fn tags_named(&self, name: &str) -> usize {
        self.tags().iter().filter(|t| t.name == name).count()
    }

    pub fn body_of(&self, post_id: &str) -> Option<String> {
        let s = self.store.lock().unwrap();
        s.bodies.iter().find(|(id, _)| id == post_id).map(|(_, b)| b.clone())
    }

    pub fn uploads(&self) -> Vec<(String, usize)> {
        self.store.lock().unwrap().uploads.clone()
    }

    fn page<T: Clone>(&self, all: &[T], page: u32) -> Page<T> {
        let pages = all.len().div_ceil(self.page_size).max(1) as u32;
        let start = (page as usize - 1) * self.page_size;
        let items = all.iter().skip(start).take(self.page_size).cloned().collect();
        Page {
            items,
            page,
            pages,
            next: (page < pages).then_some(page + 1),
        }
    }

    fn check_listing(&self) -> Result<()> {
        if *self.fail_listing.lock().unwrap() {
            return Err(PipelineError::Transport("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CmsApi for FakeCms {
    async fn list_tags(&self, page: u32) -> Result<Page<Tag>> {
        self.check_listing()?;
        let tags = self.tags();
        Ok(self.page(&tags, page))
    }

    async fn get_tag(&self, id: &str) -> Result<Tag> {
        self.tags()
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| PipelineError::remote(404, "no such tag"))
    }

    async fn create_tag(&self, tag: &NewTag) -> Result<Tag> {
        self.tag_creates.fetch_add(1, Ordering::SeqCst);
        let mut s = self.store.lock().unwrap();
        s.next_id += 1;
        let created = Tag {
            id: format!("tag-{}", s.next_id),
            name: tag.name.clone(),
            description: Some(tag.description.clone()),
            feature_image: (!tag.feature_image.is_empty()).then(|| tag.feature_image.clone()),
        };
        s.tags.push(created.clone());
        Ok(created)
    }

    async fn delete_tag(&self, id: &str) -> Result<()> {
        let mut s = self.store.lock().unwrap();
        let before = s.tags.len();
        s.tags.retain(|t| t.id != id);
        if s.tags.len() == before {
            return Err(PipelineError::remote(404, "no such tag"));
        }
        Ok(())
    }

    async fn list_posts(&self, page: u32) -> Result<Page<Post>> {
        self.check_listing()?;
        self.post_list_calls.fetch_add(1, Ordering::SeqCst);
        let posts = self.posts();
        Ok(self.page(&posts, page))
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        let mut s = self.store.lock().unwrap();
        s.next_id += 1;
        let created = Post {
            id: format!("post-{}", s.next_id),
            title: post.title.clone(),
            custom_excerpt: Some(post.custom_excerpt.clone()),
            tags: post
                .tags
                .iter()
                .map(|t| TagRef {
                    id: t.id.clone(),
                    name: t.name.clone(),
                })
                .collect(),
            feature_image: (!post.feature_image.is_empty()).then(|| post.feature_image.clone()),
        };
        s.bodies.push((created.id.clone(), post.markdown.clone()));
        s.posts.push(created.clone());
        Ok(created)
    }

    async fn delete_post(&self, id: &str) -> Result<()> {
        let mut s = self.store.lock().unwrap();
        s.posts.retain(|p| p.id != id);
        Ok(())
    }

    async fn upload_media(&self, name: &str, media: MediaSource) -> Result<String> {
        if *self.fail_uploads.lock().unwrap() {
            return Err(PipelineError::remote(413, "too large"));
        }
        let size = match media {
            MediaSource::Bytes(b) => b.len(),
            MediaSource::File(path) => std::fs::read(&path)
                .map_err(|e| PipelineError::storage(path.display().to_string(), e))?
                .len(),
        };
        self.store.lock().unwrap().uploads.push((name.to_string(), size));
        Ok(format!("/content/images/{name}"))
    }
}

// ---------------------------------------------------------------------------
// Sensors and fetchers
// ---------------------------------------------------------------------------

/// Sensor with fixed content, used to drive the publisher.
pub struct StaticSensor {
    pub identity: String,
    pub metadata: Map<String, Value>,
    pub content: Vec<ContentRecord>,
    pub featured_image: Option<String>,
}

impl StaticSensor {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            metadata: Map::new(),
            content: Vec::new(),
            featured_image: None,
        }
    }

    pub fn with_about(mut self, about: &str) -> Self {
        self.metadata.insert("about".into(), Value::String(about.into()));
        self
    }
}

#[async_trait]
impl Sensor for StaticSensor {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    async fn has_updates(&mut self, cursor: &Cursor) -> u32 {
        u32::from(self.content.first().and_then(|r| r.cursor.as_ref()) != Some(cursor))
    }

    async fn get_content(&mut self, cursor: &Cursor) -> Option<Vec<ContentRecord>> {
        (self.has_updates(cursor).await == 1).then(|| self.content.clone())
    }

    async fn get_all(&mut self) -> Vec<ContentRecord> {
        self.content.clone()
    }

    fn get_featured_image(&self) -> Option<String> {
        self.featured_image.clone()
    }
}

/// Fetcher that replays queued results and counts how often it was called.
#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<Vec<ContentRecord>>>>,
    pub calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_ok(self, content: Vec<ContentRecord>) -> Self {
        self.script.lock().unwrap().push_back(Ok(content));
        self
    }

    pub fn then_err(self, err: PipelineError) -> Self {
        self.script.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for ScriptedFetcher {
    async fn fetch(&self, _settings: &SensorState) -> Result<Vec<ContentRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PipelineError::Transport("script exhausted".into())))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Fetcher shared with the test through an `Arc`, so calls can be observed
/// after the source took ownership.
pub struct SharedFetcher(pub std::sync::Arc<ScriptedFetcher>);

#[async_trait]
impl SourceFetcher for SharedFetcher {
    async fn fetch(&self, settings: &SensorState) -> Result<Vec<ContentRecord>> {
        self.0.fetch(settings).await
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Writes `<dir>/<name>.json` with the given state and returns the base path.
pub fn write_settings(dir: &std::path::Path, name: &str, state: &SensorState) -> std::path::PathBuf {
    let base = dir.join(name);
    std::fs::write(
        base.with_extension("json"),
        serde_json::to_string_pretty(state).unwrap(),
    )
    .unwrap();
    base
}

// ---------------------------------------------------------------------------
// Local HTTP responder
// ---------------------------------------------------------------------------

/// One canned response: status, content type, body.
pub struct Canned {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Canned {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn bytes(body: &[u8]) -> Self {
        Self {
            status: 200,
            content_type: "application/octet-stream",
            body: body.to_vec(),
        }
    }
}

/// Serves `responses` in order, one connection each, and records every raw
/// request (head and body, lossy UTF-8). Returns `http://127.0.0.1:<port>`.
pub async fn serve(responses: Vec<Canned>) -> (String, std::sync::Arc<Mutex<Vec<String>>>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();

    tokio::spawn(async move {
        for canned in responses {
            let Ok((mut sock, _)) = listener.accept().await else {
                return;
            };
            let mut raw = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = sock.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&chunk[..n]);
                if request_complete(&raw) {
                    break;
                }
            }
            log.lock().unwrap().push(String::from_utf8_lossy(&raw).into_owned());

            let head = format!(
                "HTTP/1.1 {} Canned\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                canned.status,
                canned.content_type,
                canned.body.len()
            );
            let _ = sock.write_all(head.as_bytes()).await;
            let _ = sock.write_all(&canned.body).await;
            let _ = sock.shutdown().await;
        }
    });
    (base, seen)
}

fn request_complete(raw: &[u8]) -> bool {
    let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let head = String::from_utf8_lossy(&raw[..end]).to_ascii_lowercase();
    let body = &raw[end + 4..];
    if head.contains("transfer-encoding: chunked") {
        return body.ends_with(b"0\r\n\r\n");
    }
    let len = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    body.len() >= len
}
