//! Offline availability
//!
//! Consulted only to decide whether a background prefetch is worth
//! attempting.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

#[async_trait]
pub trait OfflineStatus: Send + Sync {
    fn is_online(&self) -> bool;

    /// Whether `url` is already stored for offline use
    async fn is_available_offline(&self, url: &str) -> bool;
}

/// Always online, nothing stored offline
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

#[async_trait]
impl OfflineStatus for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }

    async fn is_available_offline(&self, _url: &str) -> bool {
        false
    }
}

/// Settable offline status
#[derive(Debug)]
pub struct StaticOfflineStatus {
    online: AtomicBool,
    available: RwLock<HashSet<String>>,
}

impl StaticOfflineStatus {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            available: RwLock::new(HashSet::new()),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    pub fn mark_available(&self, url: impl Into<String>) {
        self.available
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into());
    }
}

impl Default for StaticOfflineStatus {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl OfflineStatus for StaticOfflineStatus {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    async fn is_available_offline(&self, url: &str) -> bool {
        self.available
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_status() {
        let status = StaticOfflineStatus::new(true);
        status.mark_available("https://a/vocals.mp3");
        assert!(status.is_available_offline("https://a/vocals.mp3").await);
        assert!(!status.is_available_offline("https://a/bass.mp3").await);

        status.set_online(false);
        assert!(!status.is_online());
    }
}
