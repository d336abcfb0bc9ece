use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::async_trait;
use bytes::Bytes;
use tracing::warn;

/// Placeholder picture every account starts with. Never deleted.
pub const DEFAULT_PICTURE: &str = "/uploads/default.jpg";

#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Stores a file and returns the public reference it is served under.
    async fn save(&self, filename: &str, body: Bytes) -> anyhow::Result<String>;
    async fn delete(&self, reference: &str) -> anyhow::Result<()>;
}

/// Local-disk storage under the configured upload directory. References
/// have the shape `/uploads/<filename>` and are served statically.
#[derive(Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, reference: &str) -> Option<PathBuf> {
        let name = reference.strip_prefix("/uploads/")?;
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return None;
        }
        Some(self.root.join(name))
    }
}

#[async_trait]
impl StorageClient for DiskStorage {
    async fn save(&self, filename: &str, body: Bytes) -> anyhow::Result<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .context("create upload dir")?;
        let path = self.root.join(filename);
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        Ok(format!("/uploads/{filename}"))
    }

    async fn delete(&self, reference: &str) -> anyhow::Result<()> {
        if reference == DEFAULT_PICTURE {
            return Ok(());
        }
        let path = self
            .path_for(reference)
            .with_context(|| format!("unexpected picture reference {reference}"))?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("remove {}", path.display()))?;
        Ok(())
    }
}

/// Best-effort removal of a previously uploaded picture. Runs detached so
/// the response is never delayed; failure is logged and swallowed.
pub fn cleanup_picture(storage: Arc<dyn StorageClient>, reference: String) {
    if reference == DEFAULT_PICTURE {
        return;
    }
    tokio::spawn(async move {
        if let Err(e) = storage.delete(&reference).await {
            warn!(error = %e, %reference, "picture cleanup failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path());
        let reference = storage
            .save("pic.jpg", Bytes::from_static(b"abc"))
            .await
            .unwrap();
        assert_eq!(reference, "/uploads/pic.jpg");
        assert!(dir.path().join("pic.jpg").exists());

        storage.delete(&reference).await.unwrap();
        assert!(!dir.path().join("pic.jpg").exists());
    }

    #[tokio::test]
    async fn delete_never_touches_the_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path());
        // No such file on disk; deleting the placeholder is still Ok.
        storage.delete(DEFAULT_PICTURE).await.unwrap();
    }

    #[tokio::test]
    async fn delete_rejects_out_of_tree_references() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path());
        assert!(storage.delete("/uploads/../etc/passwd").await.is_err());
        assert!(storage.delete("/elsewhere/x.jpg").await.is_err());
    }

    #[tokio::test]
    async fn cleanup_is_fire_and_forget() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path());
        let reference = storage
            .save("old.jpg", Bytes::from_static(b"x"))
            .await
            .unwrap();

        cleanup_picture(Arc::new(storage), reference);
        for _ in 0..50 {
            if !dir.path().join("old.jpg").exists() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("old picture was not cleaned up");
    }

    #[tokio::test]
    async fn cleanup_of_a_missing_file_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn StorageClient> = Arc::new(DiskStorage::new(dir.path()));
        cleanup_picture(storage, "/uploads/never-existed.jpg".into());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}
