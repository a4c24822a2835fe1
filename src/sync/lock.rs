use std::path::Path;

use anyhow::{Context, Result};
use fs4::tokio::AsyncFileExt;
use tokio::fs::File;
use tracing::debug;

pub const LOCK_FILE_NAME: &str = "sync.lock";

/// Exclusive lock on the application directory. Two runs uploading the same worklogs at once
/// would both see them as new.
pub struct SyncLock {
    file: File,
}

impl SyncLock {
    /// Blocks until no other process holds the lock.
    pub async fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE_NAME);
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await
            .with_context(|| format!("Can't open lock file '{}'", path.display()))?;

        file.lock_exclusive()?;
        debug!("Acquired sync lock {path:?}");
        Ok(Self { file })
    }

    pub async fn release(self) -> Result<()> {
        self.file.unlock_async().await?;
        Ok(())
    }
}
