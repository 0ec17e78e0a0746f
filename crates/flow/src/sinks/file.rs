use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use super::Sink;
use crate::Result;

/// Writes content to a file, replacing whatever was there.
///
/// There is no temp-file rename: a crash mid-write can leave a truncated file.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Sink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    async fn send(&self, content: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, content).await?;
        info!(path = %self.path.display(), bytes = content.len(), "Artifact written");
        Ok(())
    }
}
