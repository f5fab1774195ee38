//! Watermark persistence
//!
//! The watermark is the UTC timestamp at which the previous successful
//! run *started*. It lives in a single plain-text file so that a cron
//! or Kubernetes CronJob deployment can keep it on a mounted volume.
//! Writes go through a temp file and rename so a crash mid-write never
//! leaves a truncated watermark behind.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tracing::debug;

use crate::error::{Result, SyncError};

/// `strftime` format of stored watermarks, second precision, naive UTC
pub const WATERMARK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Current UTC time rendered in the watermark format
pub fn now_watermark() -> String {
    Utc::now().format(WATERMARK_FORMAT).to_string()
}

/// File-backed watermark store
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    path: PathBuf,
}

impl WatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored watermark
    ///
    /// A missing file or a blank file means no watermark exists yet;
    /// any other failure is a storage error.
    pub async fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => {
                let ts = content.trim();
                if ts.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(ts.to_string()))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::storage(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    /// Replace the stored watermark atomically
    pub async fn write(&self, ts: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    SyncError::storage(format!(
                        "failed to create {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, ts).await.map_err(|e| {
            SyncError::storage(format!("failed to write {}: {e}", tmp_path.display()))
        })?;
        fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            SyncError::storage(format!(
                "failed to replace {}: {e}",
                self.path.display()
            ))
        })?;

        debug!(watermark = ts, path = %self.path.display(), "watermark written");
        Ok(())
    }
}
