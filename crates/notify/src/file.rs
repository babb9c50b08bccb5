//! Append-only JSON Lines file sink.

use std::path::{Path, PathBuf};

use logwatch_core::config::FileSinkConfig;
use logwatch_core::AlertEvent;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::traits::{AlertSink, NotifyError};

/// Appends one JSON document per line to a local file.
///
/// Writes are serialized through a mutex so concurrent deliveries never
/// interleave partial lines. Parent directories are created on demand.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &FileSinkConfig) -> Self {
        Self::new(config.path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open_for_append(&self) -> Result<File, NotifyError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        Ok(file)
    }
}

#[async_trait::async_trait]
impl AlertSink for FileSink {
    async fn deliver(&self, alert: &AlertEvent) -> Result<(), NotifyError> {
        let mut line = serde_json::to_vec(alert)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = self.open_for_append().await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    /// Open the file for append without writing, so the alert log never
    /// contains probe records.
    async fn probe(&self) -> Result<(), NotifyError> {
        let _guard = self.write_lock.lock().await;
        self.open_for_append().await.map(|_| ())
    }

    fn sink_name(&self) -> &str {
        "file"
    }
}
