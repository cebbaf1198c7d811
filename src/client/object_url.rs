//! In-memory object URLs: blobs addressable by a string until revoked.

use bytes::Bytes;
use std::collections::HashMap;

/// Scheme prefix of every URL handed out by [`ObjectUrls`].
pub const OBJECT_URL_PREFIX: &str = "blob:hueforge/";

#[derive(Debug, Default)]
pub struct ObjectUrls {
    next_id: u64,
    live: HashMap<String, Bytes>,
}

impl ObjectUrls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `blob` and return a fresh URL for it.
    pub fn create(&mut self, blob: Bytes) -> String {
        self.next_id += 1;
        let url = format!("{}{}", OBJECT_URL_PREFIX, self.next_id);
        self.live.insert(url.clone(), blob);
        url
    }

    /// Blob behind `url`, if it has not been revoked.
    pub fn resolve(&self, url: &str) -> Option<Bytes> {
        self.live.get(url).cloned()
    }

    /// Release the blob behind `url`. Returns false if it was not live.
    pub fn revoke(&mut self, url: &str) -> bool {
        self.live.remove(url).is_some()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}
