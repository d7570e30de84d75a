// src/sensor/http.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::{PipelineError, Result};
use crate::sensor::record::ContentRecord;
use crate::sensor::state::SensorState;
use crate::sensor::SourceFetcher;

/// Turns a decoded upstream payload into records.
pub trait PayloadParser: Send + Sync {
    fn parse(&self, body: Value) -> Result<Vec<ContentRecord>>;
}

/// Reads an array of record-shaped objects at a JSON pointer (`""` = document root).
#[derive(Debug, Clone, Default)]
pub struct JsonRecordsParser {
    pointer: String,
}

impl JsonRecordsParser {
    pub fn at(pointer: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
        }
    }

    /// Uses the sensor's `records_pointer` setting, defaulting to the root.
    pub fn from_settings(settings: &SensorState) -> Self {
        Self::at(settings.setting_str("records_pointer").unwrap_or_default())
    }
}

impl PayloadParser for JsonRecordsParser {
    fn parse(&self, mut body: Value) -> Result<Vec<ContentRecord>> {
        let items = body
            .pointer_mut(&self.pointer)
            .map(Value::take)
            .ok_or_else(|| PipelineError::remote(200, format!("no records at '{}'", self.pointer)))?;
        serde_json::from_value(items)
            .map_err(|e| PipelineError::remote(200, format!("unexpected record shape: {e}")))
    }
}

/// GETs the sensor's `service_url` (with its optional `headers` map) and parses the JSON body.
pub struct HttpFetcher<P> {
    client: Client,
    parser: P,
}

impl<P: PayloadParser> HttpFetcher<P> {
    pub fn new(parser: P) -> Self {
        // Defaults of a slow third-party API; the core itself enforces no timeout.
        let client = Client::builder()
            .user_agent(concat!("sensor-publisher/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(client, parser)
    }

    pub fn with_client(client: Client, parser: P) -> Self {
        Self { client, parser }
    }
}

#[async_trait]
impl<P: PayloadParser> SourceFetcher for HttpFetcher<P> {
    async fn fetch(&self, settings: &SensorState) -> Result<Vec<ContentRecord>> {
        let url = settings
            .setting_str("service_url")
            .ok_or_else(|| PipelineError::config("sensor settings", "missing `service_url`"))?;

        let mut req = self.client.get(url);
        if let Some(Value::Object(headers)) = settings.metadata().get("headers") {
            for (name, value) in headers {
                if let Some(v) = value.as_str() {
                    req = req.header(name.as_str(), v);
                }
            }
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::remote(status.as_u16(), text));
        }
        let body: Value = resp.json().await?;
        self.parser.parse(body)
    }

    fn name(&self) -> &'static str {
        "http-json"
    }
}
