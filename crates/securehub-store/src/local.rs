use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{expiry_after, ObjectProbe, ObjectStoreGateway, SignedUrl, StoreConfig, StoreError};

/// Filesystem-backed gateway for development.
///
/// "Signed" URLs are plain `file://` URLs carrying the expiry as a query
/// parameter; nothing enforces them. Uploads are simulated with [`LocalStore::put`].
pub struct LocalStore {
    base_dir: PathBuf,
}

impl LocalStore {
    pub fn new(config: &StoreConfig) -> Self {
        let base_dir = config
            .local_data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    fn resolve(&self, key: &str) -> PathBuf {
        self.base_dir.join(key)
    }

    fn url_for(&self, key: &str, expires_at: chrono::DateTime<chrono::Utc>) -> String {
        format!(
            "file://{}?expires={}",
            self.resolve(key).display(),
            expires_at.timestamp()
        )
    }

    /// Write an object, standing in for a client upload.
    pub async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Internal(format!("mkdir: {e}")))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| StoreError::Internal(format!("write {}: {e}", path.display())))
    }
}

/// Same default location as `securehub_db::data_dir()`, without depending on the db crate.
fn default_data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("securehub").join("objects")
}

#[async_trait]
impl ObjectStoreGateway for LocalStore {
    async fn presign_upload(
        &self,
        key: &str,
        _content_type: &str,
        _size: i64,
        ttl: Duration,
    ) -> Result<SignedUrl, StoreError> {
        let expires_at = expiry_after(ttl)?;
        Ok(SignedUrl {
            url: self.url_for(key, expires_at),
            expires_at,
        })
    }

    async fn presign_download(
        &self,
        key: &str,
        _response_content_type: &str,
        ttl: Duration,
    ) -> Result<SignedUrl, StoreError> {
        let expires_at = expiry_after(ttl)?;
        Ok(SignedUrl {
            url: self.url_for(key, expires_at),
            expires_at,
        })
    }

    async fn probe(&self, key: &str) -> Result<ObjectProbe, StoreError> {
        let path = self.resolve(key);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(ObjectProbe::Present {
                size: i64::try_from(meta.len()).ok(),
            }),
            Ok(_) => Ok(ObjectProbe::Absent),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ObjectProbe::Absent),
            Err(e) => Err(StoreError::Internal(format!(
                "stat {}: {e}",
                path.display()
            ))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.resolve(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Internal(format!(
                "delete {}: {e}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (tempfile::TempDir, LocalStore) {
        let tmp = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            local_data_dir: Some(tmp.path().to_string_lossy().to_string()),
            ..Default::default()
        };
        let store = LocalStore::new(&config);
        (tmp, store)
    }

    #[tokio::test]
    async fn probe_reports_size_after_put() {
        let (_tmp, store) = make_store();
        let key = "requests/r1/attachments/a1/notes.txt";

        assert_eq!(store.probe(key).await.unwrap(), ObjectProbe::Absent);
        store.put(key, Bytes::from_static(b"0123456789")).await.unwrap();
        assert_eq!(
            store.probe(key).await.unwrap(),
            ObjectProbe::Present { size: Some(10) }
        );
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_tmp, store) = make_store();
        let key = "requests/r1/attachments/a1/notes.txt";
        store.put(key, Bytes::from_static(b"x")).await.unwrap();

        store.delete(key).await.unwrap();
        assert_eq!(store.probe(key).await.unwrap(), ObjectProbe::Absent);
        store.delete(key).await.unwrap();
    }

    #[tokio::test]
    async fn directory_is_not_an_object() {
        let (_tmp, store) = make_store();
        store
            .put("requests/r1/attachments/a1/x.txt", Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert_eq!(
            store.probe("requests/r1/attachments").await.unwrap(),
            ObjectProbe::Absent
        );
    }

    #[tokio::test]
    async fn presigned_urls_point_into_base_dir() {
        let (tmp, store) = make_store();
        let slot = store
            .presign_upload("requests/r1/attachments/a1/x.pdf", "application/pdf", 3, Duration::from_secs(300))
            .await
            .unwrap();
        assert!(slot.url.starts_with("file://"));
        assert!(slot.url.contains(&tmp.path().display().to_string()));
        assert!(slot.url.ends_with(&format!("?expires={}", slot.expires_at.timestamp())));

        let link = store
            .presign_download("requests/r1/attachments/a1/x.pdf", "application/pdf", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(link.expires_at < slot.expires_at);
    }

    #[test]
    fn default_dir_when_unconfigured() {
        let store = LocalStore::new(&StoreConfig::default());
        assert!(store.base_dir().ends_with("securehub/objects"));
    }
}
