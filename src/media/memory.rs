//! In-memory object store for tests and local runs.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use crate::media::{object_name, object_path_from_url, ImageUpload, MediaError, ObjectStore};

pub struct MemoryObjectStore {
    base_url: String,
    objects: DashMap<String, Vec<u8>>,
    last_stamp: AtomicI64,
    failing: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new(base_url: &str, bucket: &str) -> Self {
        Self {
            base_url: format!("{}/{}", base_url.trim_end_matches('/'), bucket),
            objects: DashMap::new(),
            last_stamp: AtomicI64::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Make uploads and removals fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn contains(&self, url: &str) -> bool {
        object_path_from_url(url)
            .map(|path| self.objects.contains_key(&path))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Strictly increasing millisecond stamp so names never collide.
    fn stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let prev = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or(now);
        now.max(prev + 1)
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("http://objects.local", "tap-images")
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, folder: &str, image: &ImageUpload) -> Result<String, MediaError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MediaError::Upload("object store unavailable".to_string()));
        }
        let object = object_name(folder, &image.file_name, self.stamp());
        self.objects.insert(object.clone(), image.bytes.clone());
        Ok(format!("{}/{}", self.base_url, object))
    }

    async fn remove(&self, url: &str) -> Result<(), MediaError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MediaError::Remove("object store unavailable".to_string()));
        }
        let object = object_path_from_url(url)?;
        self.objects.remove(&object);
        Ok(())
    }
}
