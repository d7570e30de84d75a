// src/sensor/record.rs
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};

/// Marks how new a record is. Sources use epoch seconds or opaque strings;
/// only equality is relied upon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cursor {
    Int(i64),
    Text(String),
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Int(n) => write!(f, "{n}"),
            Cursor::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Cursor {
    fn from(n: i64) -> Self {
        Cursor::Int(n)
    }
}

impl From<i32> for Cursor {
    fn from(n: i32) -> Self {
        Cursor::Int(n.into())
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Cursor::Text(s.to_string())
    }
}

/// One unit of publishable content, as produced by a sensor and stored in its buffer.
///
/// Every field is optional at the serde level so that loosely assembled
/// records (and old buffers) still load; `validate` is the gate in front of
/// the publisher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    #[serde(default, alias = "k", skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story: Option<String>,
    #[serde(default, alias = "img", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Source-specific keys (e.g. upstream ids), kept so buffers round-trip.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Borrowed view of a record that passed validation.
#[derive(Debug, Clone, Copy)]
pub struct ValidRecord<'a> {
    pub cursor: &'a Cursor,
    pub caption: &'a str,
    pub summary: &'a str,
    pub story: Option<&'a str>,
    pub image: Option<&'a str>,
    pub origin: Option<&'a str>,
}

impl ContentRecord {
    pub fn new(cursor: impl Into<Cursor>, caption: &str, summary: &str) -> Self {
        Self {
            cursor: Some(cursor.into()),
            caption: Some(caption.to_string()),
            summary: Some(summary.to_string()),
            ..Default::default()
        }
    }

    pub fn with_story(mut self, story: &str) -> Self {
        self.story = Some(story.to_string());
        self
    }

    pub fn with_image(mut self, image: &str) -> Self {
        self.image = Some(image.to_string());
        self
    }

    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_string());
        self
    }

    /// Cursor, caption and summary must be present; empty strings count as missing.
    pub fn validate(&self) -> Result<ValidRecord<'_>> {
        let cursor = match &self.cursor {
            Some(Cursor::Text(s)) if s.is_empty() => None,
            other => other.as_ref(),
        }
        .ok_or(PipelineError::Validation { field: "cursor" })?;
        let caption = non_empty(&self.caption).ok_or(PipelineError::Validation { field: "caption" })?;
        let summary = non_empty(&self.summary).ok_or(PipelineError::Validation { field: "summary" })?;
        Ok(ValidRecord {
            cursor,
            caption,
            summary,
            story: non_empty(&self.story),
            image: non_empty(&self.image),
            origin: non_empty(&self.origin),
        })
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

/// Leading cursor of a content set, i.e. the one compared against the caller's.
pub fn leading_cursor(content: &[ContentRecord]) -> Option<&Cursor> {
    content.first().and_then(|r| r.cursor.as_ref())
}
