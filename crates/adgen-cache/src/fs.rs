//! Filesystem preview cache.
//!
//! One file per entry inside a single directory. File names are the SHA-256
//! of the key, so arbitrary keys map to safe names. Writes go to a temporary
//! file first and are renamed into place, so readers never see a partial
//! entry.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::{check_key, PreviewCache};

const ENTRY_EXTENSION: &str = "bin";

/// Preview cache stored in a directory.
#[derive(Debug)]
pub struct FsPreviewCache {
    dir: PathBuf,
    open: AtomicBool,
    temp_counter: AtomicU64,
}

impl FsPreviewCache {
    /// Create a cache rooted at `dir`. Nothing touches the disk until
    /// [`PreviewCache::open`].
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            open: AtomicBool::new(false),
            temp_counter: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{:x}.{}", digest, ENTRY_EXTENSION))
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(CacheError::Closed)
        }
    }

    fn temp_path(&self, entry: &Path) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        entry.with_extension(format!("tmp-{}-{}", std::process::id(), n))
    }
}

#[async_trait]
impl PreviewCache for FsPreviewCache {
    async fn open(&self) -> CacheResult<()> {
        fs::create_dir_all(&self.dir).await?;
        if !self.open.swap(true, Ordering::AcqRel) {
            debug!(dir = %self.dir.display(), "Opened preview cache");
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        check_key(key)?;
        self.ensure_open()?;

        match fs::read(self.entry_path(key)).await {
            Ok(bytes) => {
                debug!(key = %key, size = bytes.len(), "Preview cache hit");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key = %key, "Preview cache miss");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> CacheResult<()> {
        check_key(key)?;
        self.ensure_open()?;

        let entry = self.entry_path(key);
        let temp = self.temp_path(&entry);
        let size = bytes.len();

        if let Err(e) = fs::write(&temp, bytes).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp, &entry).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(key = %key, size = size, "Stored preview");
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<bool> {
        check_key(key)?;
        self.ensure_open()?;

        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn contains(&self, key: &str) -> CacheResult<bool> {
        check_key(key)?;
        self.ensure_open()?;

        Ok(fs::try_exists(self.entry_path(key)).await?)
    }

    async fn close(&self) -> CacheResult<()> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }
}
