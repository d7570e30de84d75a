// src/sensor/store.rs
//! On-disk slot of one sensor: `<base>.json` holds its settings/state,
//! `<base>.buf` the last successfully fetched content.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{PipelineError, Result};
use crate::sensor::record::ContentRecord;
use crate::sensor::state::SensorState;

#[derive(Debug, Clone)]
pub struct SensorStore {
    settings_path: PathBuf,
    buffer_path: PathBuf,
}

impl SensorStore {
    /// `base` is the file name without extension, e.g. `sensors/HousingSensor`.
    pub fn new(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            settings_path: with_suffix(base, "json"),
            buffer_path: with_suffix(base, "buf"),
        }
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    pub fn buffer_path(&self) -> &Path {
        &self.buffer_path
    }

    /// Missing or unparsable settings are a config error.
    pub async fn load_state(&self) -> Result<SensorState> {
        let path = self.settings_path.display().to_string();
        let text = fs::read_to_string(&self.settings_path)
            .await
            .map_err(|e| PipelineError::config(&path, e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| PipelineError::config(&path, e.to_string()))
    }

    pub async fn save_state(&self, state: &SensorState) -> Result<()> {
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| PipelineError::corrupt(self.settings_path.display().to_string(), e))?;
        write_atomic(&self.settings_path, &json).await
    }

    pub async fn write_buffer(&self, content: &[ContentRecord]) -> Result<()> {
        let json = serde_json::to_vec(content)
            .map_err(|e| PipelineError::corrupt(self.buffer_path.display().to_string(), e))?;
        write_atomic(&self.buffer_path, &json).await
    }

    pub async fn read_buffer(&self) -> Result<Vec<ContentRecord>> {
        let path = self.buffer_path.display().to_string();
        let text = fs::read_to_string(&self.buffer_path)
            .await
            .map_err(|e| PipelineError::storage(&path, e))?;
        serde_json::from_str(&text).map_err(|e| PipelineError::corrupt(&path, e))
    }
}

fn with_suffix(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let describe = |e| PipelineError::storage(path.display().to_string(), e);
    fs::write(&tmp, bytes).await.map_err(describe)?;
    fs::rename(&tmp, path).await.map_err(describe)?;
    Ok(())
}
