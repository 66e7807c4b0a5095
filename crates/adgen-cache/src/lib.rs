//! Preview video cache.
//!
//! A plain key-value store for downloaded preview videos with an explicit
//! open/close lifecycle. Nothing is evicted; entries live until removed.

pub mod error;
pub mod fs;
pub mod memory;

use adgen_models::TargetKind;
use async_trait::async_trait;

pub use error::{CacheError, CacheResult};
pub use fs::FsPreviewCache;
pub use memory::MemoryPreviewCache;

/// Key-value store for preview bytes.
///
/// Every data operation fails with [`CacheError::Closed`] unless the cache
/// has been opened. Opening or closing twice is harmless.
#[async_trait]
pub trait PreviewCache: Send + Sync {
    async fn open(&self) -> CacheResult<()>;

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store bytes under `key`, replacing any previous entry.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> CacheResult<()>;

    /// Delete an entry. Returns whether it existed.
    async fn remove(&self, key: &str) -> CacheResult<bool>;

    async fn contains(&self, key: &str) -> CacheResult<bool>;

    async fn close(&self) -> CacheResult<()>;
}

/// Cache key for the preview of a target.
///
/// Format: `previews/{kind}/{id}`
pub fn preview_cache_key(kind: TargetKind, id: &str) -> String {
    format!("previews/{}/{}", kind, id.trim())
}

pub(crate) fn check_key(key: &str) -> CacheResult<()> {
    if key.trim().is_empty() {
        return Err(CacheError::invalid_key("key is empty"));
    }
    Ok(())
}
