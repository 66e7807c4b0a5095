//! In-memory preview cache.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{CacheError, CacheResult};
use crate::{check_key, PreviewCache};

#[derive(Debug, Default)]
struct State {
    open: bool,
    entries: HashMap<String, Vec<u8>>,
}

/// Preview cache held in process memory. Entries survive close and reopen.
#[derive(Debug, Default)]
pub struct MemoryPreviewCache {
    state: RwLock<State>,
}

impl MemoryPreviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, whether or not the cache is open.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PreviewCache for MemoryPreviewCache {
    async fn open(&self) -> CacheResult<()> {
        self.state.write().await.open = true;
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        check_key(key)?;
        let state = self.state.read().await;
        if !state.open {
            return Err(CacheError::Closed);
        }
        Ok(state.entries.get(key).cloned())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> CacheResult<()> {
        check_key(key)?;
        let mut state = self.state.write().await;
        if !state.open {
            return Err(CacheError::Closed);
        }
        state.entries.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<bool> {
        check_key(key)?;
        let mut state = self.state.write().await;
        if !state.open {
            return Err(CacheError::Closed);
        }
        Ok(state.entries.remove(key).is_some())
    }

    async fn contains(&self, key: &str) -> CacheResult<bool> {
        check_key(key)?;
        let state = self.state.read().await;
        if !state.open {
            return Err(CacheError::Closed);
        }
        Ok(state.entries.contains_key(key))
    }

    async fn close(&self) -> CacheResult<()> {
        self.state.write().await.open = false;
        Ok(())
    }
}
