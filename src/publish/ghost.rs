// src/publish/ghost.rs
//! [`CmsApi`] over the Ghost v0.1 Admin API.
//!
//! Authentication is a password grant against `/authentication/token`;
//! every later call carries the bearer token. Ghost rate-limits logins
//! per IP, so one client is meant to live for the whole process.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::publisher::PublisherSettings;
use crate::error::{PipelineError, Result};
use crate::publish::api::{CmsApi, MediaSource, NewPost, NewTag, Post, Tag};
use crate::publish::media_name;
use crate::publish::pagination::Page;

const API_PATH: &str = "/ghost/api/v0.1";

pub struct GhostClient {
    http: Client,
    api_base: String,
    access_token: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct Pagination {
    page: u32,
    pages: u32,
    #[serde(default)]
    next: Option<u32>,
}

#[derive(Deserialize)]
struct Meta {
    pagination: Pagination,
}

#[derive(Deserialize)]
struct PostsEnvelope {
    posts: Vec<Post>,
    meta: Option<Meta>,
}

#[derive(Deserialize)]
struct TagsEnvelope {
    tags: Vec<Tag>,
    meta: Option<Meta>,
}

/// Post body as Ghost expects it: markdown wrapped in a single markdown card.
#[derive(Serialize)]
struct GhostPost<'a> {
    title: &'a str,
    custom_excerpt: &'a str,
    mobiledoc: String,
    tags: &'a [Tag],
    #[serde(skip_serializing_if = "str::is_empty")]
    feature_image: &'a str,
    status: &'a str,
    featured: bool,
    page: bool,
    locale: &'a str,
    visibility: &'a str,
}

impl<'a> From<&'a NewPost> for GhostPost<'a> {
    fn from(p: &'a NewPost) -> Self {
        Self {
            title: &p.title,
            custom_excerpt: &p.custom_excerpt,
            mobiledoc: markdown_mobiledoc(&p.markdown),
            tags: &p.tags,
            feature_image: &p.feature_image,
            status: &p.status,
            featured: p.featured,
            page: p.page,
            locale: &p.locale,
            visibility: &p.visibility,
        }
    }
}

fn markdown_mobiledoc(markdown: &str) -> String {
    json!({
        "version": "0.3.1",
        "markups": [],
        "atoms": [],
        "cards": [["card-markdown", {"cardName": "card-markdown", "markdown": markdown}]],
        "sections": [[10, 0]]
    })
    .to_string()
}

fn page_of<T>(items: Vec<T>, meta: Option<Meta>, requested: u32) -> Page<T> {
    match meta {
        Some(Meta { pagination: p }) => Page {
            items,
            page: p.page,
            pages: p.pages,
            next: p.next,
        },
        None => Page::last(items, requested),
    }
}

impl GhostClient {
    /// Logs in once and returns a client bound to the issued token.
    pub async fn connect(settings: &PublisherSettings) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("sensor-publisher/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Transport(format!("ghost http client: {e}")))?;
        let api_base = format!("{}{}", settings.server.trim_end_matches('/'), API_PATH);

        let form = [
            ("grant_type", "password"),
            ("username", settings.user.as_str()),
            ("password", settings.password.as_str()),
            ("client_id", settings.client_id.as_str()),
            ("client_secret", settings.client_secret.as_str()),
        ];
        let resp = http
            .post(format!("{api_base}/authentication/token"))
            .form(&form)
            .send()
            .await?;
        let token: TokenResponse = decode(resp).await?;
        info!(server = %settings.server, user = %settings.user, "logged in to ghost");

        Ok(Self {
            http,
            api_base,
            access_token: token.access_token,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_base, path))
            .bearer_auth(&self.access_token)
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let resp = check(resp).await?;
    Ok(resp.json().await?)
}

async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(PipelineError::remote(status.as_u16(), body))
}

#[async_trait]
impl CmsApi for GhostClient {
    async fn list_tags(&self, page: u32) -> Result<Page<Tag>> {
        let resp = self
            .request(reqwest::Method::GET, "/tags/")
            .query(&[("fields", "name,id")])
            .query(&[("page", page)])
            .send()
            .await?;
        let env: TagsEnvelope = decode(resp).await?;
        Ok(page_of(env.tags, env.meta, page))
    }

    async fn get_tag(&self, id: &str) -> Result<Tag> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/tags/{id}/"))
            .send()
            .await?;
        let env: TagsEnvelope = decode(resp).await?;
        env.tags
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::remote(404, format!("tag {id} not returned")))
    }

    async fn create_tag(&self, tag: &NewTag) -> Result<Tag> {
        let mut body = json!({"name": tag.name, "description": tag.description});
        if !tag.feature_image.is_empty() {
            body["feature_image"] = Value::String(tag.feature_image.clone());
        }
        let resp = self
            .request(reqwest::Method::POST, "/tags/")
            .json(&json!({ "tags": [body] }))
            .send()
            .await?;
        let env: TagsEnvelope = decode(resp).await?;
        env.tags
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::remote(500, "tag create returned nothing"))
    }

    async fn delete_tag(&self, id: &str) -> Result<()> {
        let resp = self
            .request(reqwest::Method::DELETE, &format!("/tags/{id}/"))
            .send()
            .await?;
        check(resp).await.map(drop)
    }

    async fn list_posts(&self, page: u32) -> Result<Page<Post>> {
        let resp = self
            .request(reqwest::Method::GET, "/posts/")
            .query(&[("status", "all"), ("include", "tags")])
            .query(&[("page", page)])
            .send()
            .await?;
        let env: PostsEnvelope = decode(resp).await?;
        Ok(page_of(env.posts, env.meta, page))
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        let resp = self
            .request(reqwest::Method::POST, "/posts/")
            .json(&json!({ "posts": [GhostPost::from(post)] }))
            .send()
            .await?;
        let env: PostsEnvelope = decode(resp).await?;
        env.posts
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::remote(500, "post create returned nothing"))
    }

    async fn delete_post(&self, id: &str) -> Result<()> {
        let resp = self
            .request(reqwest::Method::DELETE, &format!("/posts/{id}/"))
            .send()
            .await?;
        check(resp).await.map(drop)
    }

    async fn upload_media(&self, name: &str, media: MediaSource) -> Result<String> {
        let bytes = match media {
            MediaSource::Bytes(b) => b,
            MediaSource::File(path) => tokio::fs::read(&path)
                .await
                .map_err(|e| PipelineError::storage(path.display().to_string(), e))?,
        };
        let form = Form::new().part("uploadimage", Part::bytes(bytes).file_name(media_name(name)));
        let resp = self
            .request(reqwest::Method::POST, "/uploads/")
            .multipart(form)
            .send()
            .await?;
        // Ghost answers with the stored image URL as a bare JSON string.
        let url: Value = decode(resp).await?;
        let url = url
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| PipelineError::remote(500, format!("unexpected upload response: {url}")))?;
        debug!(name, url = %url, "media uploaded");
        Ok(url)
    }
}
