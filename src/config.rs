//! Configuration for a heapdb instance.

use std::time::Duration;

/// Default size of a page in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default number of pages the buffer pool caches.
pub const DEFAULT_BUFFER_POOL_PAGES: usize = 50;

/// Settings shared by every component created through a [`crate::Database`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Size of every page on disk and in the buffer pool (in bytes).
    pub page_size: usize,

    /// Max pages cached by the buffer pool before clean pages get evicted.
    pub buffer_pool_pages: usize,

    /// How long a transaction may wait for a page lock before it is aborted.
    /// `None` waits until the lock is granted or a deadlock is detected.
    pub lock_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_pages: DEFAULT_BUFFER_POOL_PAGES,
            lock_timeout: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn page_size(mut self, bytes: usize) -> Self {
        self.config.page_size = bytes;
        self
    }

    pub fn buffer_pool_pages(mut self, pages: usize) -> Self {
        self.config.buffer_pool_pages = pages;
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.buffer_pool_pages, DEFAULT_BUFFER_POOL_PAGES);
        assert!(config.lock_timeout.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = Config::builder()
            .page_size(300)
            .buffer_pool_pages(4)
            .lock_timeout(Duration::from_millis(250))
            .build();

        assert_eq!(config.page_size, 300);
        assert_eq!(config.buffer_pool_pages, 4);
        assert_eq!(config.lock_timeout, Some(Duration::from_millis(250)));
    }
}
