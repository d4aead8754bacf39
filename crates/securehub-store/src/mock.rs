use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::{expiry_after, ObjectProbe, ObjectStoreGateway, SignedUrl, StoreError};

/// An in-memory gateway for tests that counts calls and can be told to fail.
///
/// Objects are tracked by key with an optional reported size, so a test can
/// model an upload that never happened, one with the wrong length, or one
/// whose size header is missing.
pub struct MockGateway {
    objects: Mutex<HashMap<String, Option<i64>>>,
    deleted: Mutex<Vec<String>>,
    presign_upload_calls: AtomicU64,
    presign_download_calls: AtomicU64,
    probe_calls: AtomicU64,
    delete_calls: AtomicU64,
    probe_fail: bool,
    presign_fail: bool,
    /// Deletes fail until this many attempts have been made.
    delete_failures: AtomicU64,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            deleted: Mutex::new(Vec::new()),
            presign_upload_calls: AtomicU64::new(0),
            presign_download_calls: AtomicU64::new(0),
            probe_calls: AtomicU64::new(0),
            delete_calls: AtomicU64::new(0),
            probe_fail: false,
            presign_fail: false,
            delete_failures: AtomicU64::new(0),
        }
    }

    pub fn with_probe_fail(mut self) -> Self {
        self.probe_fail = true;
        self
    }

    pub fn with_presign_fail(mut self) -> Self {
        self.presign_fail = true;
        self
    }

    /// Fail the next `n` delete calls, then succeed.
    pub fn with_delete_failures(self, n: u64) -> Self {
        self.delete_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Every delete fails.
    pub fn with_delete_always_fail(self) -> Self {
        self.with_delete_failures(u64::MAX)
    }

    /// Record an object as uploaded with the given reported size.
    pub fn put_object(&self, key: &str, size: Option<i64>) {
        self.lock_objects().insert(key.to_string(), size);
    }

    pub fn has_object(&self, key: &str) -> bool {
        self.lock_objects().contains_key(key)
    }

    pub fn object_count(&self) -> usize {
        self.lock_objects().len()
    }

    /// Keys removed by successful deletes, in call order.
    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn presign_upload_calls(&self) -> u64 {
        self.presign_upload_calls.load(Ordering::SeqCst)
    }

    pub fn presign_download_calls(&self) -> u64 {
        self.presign_download_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> u64 {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> u64 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Total calls of any kind.
    pub fn total_calls(&self) -> u64 {
        self.presign_upload_calls()
            + self.presign_download_calls()
            + self.probe_calls()
            + self.delete_calls()
    }

    fn lock_objects(&self) -> std::sync::MutexGuard<'_, HashMap<String, Option<i64>>> {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn signed(&self, verb: &str, key: &str, ttl: Duration) -> Result<SignedUrl, StoreError> {
        if self.presign_fail {
            return Err(StoreError::Internal("mock presign failure".into()));
        }
        let expires_at = expiry_after(ttl)?;
        Ok(SignedUrl {
            url: format!(
                "https://mock.invalid/{key}?verb={verb}&expires={}",
                expires_at.timestamp()
            ),
            expires_at,
        })
    }
}

#[async_trait]
impl ObjectStoreGateway for MockGateway {
    async fn presign_upload(
        &self,
        key: &str,
        _content_type: &str,
        _size: i64,
        ttl: Duration,
    ) -> Result<SignedUrl, StoreError> {
        self.presign_upload_calls.fetch_add(1, Ordering::SeqCst);
        self.signed("put", key, ttl)
    }

    async fn presign_download(
        &self,
        key: &str,
        _response_content_type: &str,
        ttl: Duration,
    ) -> Result<SignedUrl, StoreError> {
        self.presign_download_calls.fetch_add(1, Ordering::SeqCst);
        self.signed("get", key, ttl)
    }

    async fn probe(&self, key: &str) -> Result<ObjectProbe, StoreError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.probe_fail {
            return Err(StoreError::Internal("mock probe failure".into()));
        }
        Ok(match self.lock_objects().get(key) {
            Some(size) => ObjectProbe::Present { size: *size },
            None => ObjectProbe::Absent,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .delete_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                u64::MAX => Some(u64::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if failing {
            return Err(StoreError::Internal("mock delete failure".into()));
        }
        self.lock_objects().remove(key);
        self.deleted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(key.to_string());
        Ok(())
    }
}
