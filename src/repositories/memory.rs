// src/repositories/memory.rs - in-process backends for local runs and tests
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use urlencoding::encode;

use crate::models::post::{NewPost, Post};
use crate::repositories::post_repository::{PostTable, TableError};
use crate::repositories::storage::{ObjectStorage, StorageError, UploadOptions};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // a panicking test must not poison the fake for everyone else
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Bucket kept in a map. Failures can be switched on to simulate an unreachable backend.
#[derive(Default)]
pub struct MemoryStorage {
    base_url: String,
    objects: Mutex<HashMap<String, StoredObject>>,
    fail_uploads: AtomicBool,
    fail_public_url: AtomicBool,
    upload_calls: AtomicUsize,
}

impl MemoryStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_public_url(&self, fail: bool) {
        self.fail_public_url.store(fail, Ordering::SeqCst);
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn object(&self, name: &str) -> Option<StoredObject> {
        lock(&self.objects).get(name).cloned()
    }

    pub fn object_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.objects).keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        object_name: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> Result<(), StorageError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Other("simulated network error".to_string()));
        }
        if object_name.is_empty() {
            return Err(StorageError::InvalidName(object_name.to_string()));
        }

        let mut objects = lock(&self.objects);
        if !options.upsert && objects.contains_key(object_name) {
            return Err(StorageError::Supabase("The resource already exists".to_string()));
        }
        objects.insert(
            object_name.to_string(),
            StoredObject {
                bytes,
                content_type: options.content_type,
            },
        );
        Ok(())
    }

    async fn public_url(&self, object_name: &str) -> Result<String, StorageError> {
        if self.fail_public_url.load(Ordering::SeqCst) {
            return Err(StorageError::Other("simulated url lookup error".to_string()));
        }
        if object_name.is_empty() {
            return Err(StorageError::InvalidName(object_name.to_string()));
        }
        Ok(format!("{}/{}", self.base_url, encode(object_name)))
    }
}

/// Append-only table kept in a vector. Each insert is stamped one second after the previous one.
pub struct MemoryPostTable {
    rows: Mutex<Vec<Post>>,
    next_created_at: Mutex<DateTime<Utc>>,
    fail_inserts: AtomicBool,
    fail_selects: AtomicBool,
    insert_calls: AtomicUsize,
    select_calls: AtomicUsize,
}

impl Default for MemoryPostTable {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

impl MemoryPostTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(first_created_at: DateTime<Utc>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_created_at: Mutex::new(first_created_at),
            fail_inserts: AtomicBool::new(false),
            fail_selects: AtomicBool::new(false),
            insert_calls: AtomicUsize::new(0),
            select_calls: AtomicUsize::new(0),
        }
    }

    /// Seeds a row with an explicit timestamp, bypassing the insert counters.
    pub fn push(&self, post: Post) {
        lock(&self.rows).push(post);
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_selects(&self, fail: bool) {
        self.fail_selects.store(fail, Ordering::SeqCst);
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    /// Rows in insertion order.
    pub fn rows(&self) -> Vec<Post> {
        lock(&self.rows).clone()
    }
}

#[async_trait]
impl PostTable for MemoryPostTable {
    async fn insert(&self, post: NewPost) -> Result<(), TableError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(TableError::Other("simulated insert error".to_string()));
        }

        let created_at = {
            let mut next = lock(&self.next_created_at);
            let stamp = *next;
            *next = stamp + Duration::seconds(1);
            stamp
        };
        lock(&self.rows).push(post.into_post(created_at));
        Ok(())
    }

    async fn list_latest(&self) -> Result<Vec<Post>, TableError> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_selects.load(Ordering::SeqCst) {
            return Err(TableError::Other("simulated select error".to_string()));
        }

        let mut rows = lock(&self.rows).clone();
        // stable sort keeps insertion order among equal stamps
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}
