use std::path::{Path, PathBuf};

use crate::{
    error::{AppError, AppResult},
    models::UploadedFile,
};

/// Destination for uploaded files, addressed by public URL
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait FileStorage: Send + Sync {
    /// Stores `bytes` under `folder` and returns the public URL
    async fn upload(&self, folder: &str, original_name: &str, bytes: Vec<u8>)
        -> AppResult<String>;

    /// Removes the file behind `url`. Unknown URLs are ignored.
    async fn delete(&self, url: &str) -> AppResult<()>;
}

/// Stores one uploaded file under `folder`
pub async fn store(
    storage: &dyn FileStorage,
    folder: &str,
    file: UploadedFile,
) -> AppResult<String> {
    storage.upload(folder, &file.file_name, file.bytes).await
}

/// Stores every file under `folder`, returning URLs in upload order
pub async fn store_all(
    storage: &dyn FileStorage,
    folder: &str,
    files: Vec<UploadedFile>,
) -> AppResult<Vec<String>> {
    let mut urls = Vec::with_capacity(files.len());
    for file in files {
        urls.push(store(storage, folder, file).await?);
    }
    Ok(urls)
}

/// Deletes files whose rows are already gone; failures are only logged
pub async fn discard(storage: &dyn FileStorage, urls: &[String]) {
    for url in urls {
        if let Err(e) = storage.delete(url).await {
            tracing::warn!(url = %url, error = %e, "Failed to delete stored file");
        }
    }
}

/// Stores files on the local filesystem, served back under `/uploads`
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_prefix: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_prefix: format!("{}/uploads/", public_base_url.trim_end_matches('/')),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a public URL back to a path under the storage root
    fn path_for(&self, url: &str) -> Option<PathBuf> {
        let relative = url.strip_prefix(&self.public_prefix)?;
        let mut path = self.root.clone();
        for segment in relative.split('/') {
            if !is_safe_segment(segment) {
                return None;
            }
            path.push(segment);
        }
        Some(path)
    }
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('\\')
}

/// Fresh file name keeping the original extension when it is alphanumeric
fn stored_file_name(original_name: &str) -> String {
    let id = uuid::Uuid::new_v4();
    match Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
    {
        Some(ext) => format!("{}.{}", id, ext.to_lowercase()),
        None => id.to_string(),
    }
}

#[async_trait::async_trait]
impl FileStorage for LocalStorage {
    async fn upload(
        &self,
        folder: &str,
        original_name: &str,
        bytes: Vec<u8>,
    ) -> AppResult<String> {
        if !is_safe_segment(folder) || folder.contains('/') {
            return Err(AppError::InvalidInput(format!(
                "Invalid storage folder: {}",
                folder
            )));
        }

        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = stored_file_name(original_name);
        tokio::fs::write(dir.join(&file_name), &bytes).await?;

        tracing::debug!(
            folder = folder,
            file = %file_name,
            size = bytes.len(),
            "Stored uploaded file"
        );

        Ok(format!("{}{}/{}", self.public_prefix, folder, file_name))
    }

    async fn delete(&self, url: &str) -> AppResult<()> {
        let Some(path) = self.path_for(url) else {
            tracing::debug!(url = url, "Skipping delete of file outside storage");
            return Ok(());
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_file_name_keeps_extension() {
        let name = stored_file_name("Living Room.JPG");
        assert!(name.ends_with(".jpg"));
        assert_eq!(name.len(), 36 + 4);
    }

    #[test]
    fn test_stored_file_name_drops_odd_extensions() {
        assert_eq!(stored_file_name("photo").len(), 36);
        assert_eq!(stored_file_name("photo.j p g").len(), 36);
        assert_eq!(stored_file_name(".hidden").len(), 36);
    }

    #[test]
    fn test_path_for_rejects_foreign_and_traversal_urls() {
        let storage = LocalStorage::new("/srv/uploads", "http://localhost:8000/");
        assert_eq!(
            storage.path_for("http://localhost:8000/uploads/property_photo/a.png"),
            Some(PathBuf::from("/srv/uploads/property_photo/a.png"))
        );
        assert_eq!(storage.path_for("https://cdn.example.com/a.png"), None);
        assert_eq!(
            storage.path_for("http://localhost:8000/uploads/../etc/passwd"),
            None
        );
    }

    #[tokio::test]
    async fn test_upload_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:8000");

        let url = storage
            .upload("property_photo", "front.png", b"png-bytes".to_vec())
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:8000/uploads/property_photo/"));
        assert!(url.ends_with(".png"));

        let path = storage.path_for(&url).unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"png-bytes");

        storage.delete(&url).await.unwrap();
        assert!(!path.exists());

        // Deleting twice is fine
        storage.delete(&url).await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_rejects_nested_folder() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:8000");

        let result = storage.upload("../escape", "a.png", Vec::new()).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    fn upload(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            bytes: name.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_store_all_uploads_each_file_into_folder() {
        let mut storage = MockFileStorage::new();
        storage
            .expect_upload()
            .withf(|folder, _, _| folder == "property_photo")
            .times(2)
            .returning(|folder, name, _| Ok(format!("http://files/{}/{}", folder, name)));

        let urls = store_all(&storage, "property_photo", vec![upload("a.png"), upload("b.png")])
            .await
            .unwrap();

        assert_eq!(
            urls,
            vec![
                "http://files/property_photo/a.png".to_string(),
                "http://files/property_photo/b.png".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_store_all_stops_at_first_failure() {
        let mut storage = MockFileStorage::new();
        storage
            .expect_upload()
            .times(1)
            .returning(|_, _, _| Err(AppError::Internal("disk full".into())));

        let result = store_all(&storage, "property_photo", vec![upload("a.png"), upload("b.png")]).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_discard_keeps_going_after_a_failed_delete() {
        let mut storage = MockFileStorage::new();
        storage
            .expect_delete()
            .withf(|url| url == "http://files/a.png")
            .times(1)
            .returning(|_| Err(AppError::Internal("permission denied".into())));
        storage
            .expect_delete()
            .withf(|url| url == "http://files/b.png")
            .times(1)
            .returning(|_| Ok(()));

        discard(
            &storage,
            &["http://files/a.png".to_string(), "http://files/b.png".to_string()],
        )
        .await;
    }

    #[tokio::test]
    async fn test_delete_ignores_foreign_urls() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:8000");
        storage
            .delete("https://firebasestorage.example.com/photo.png")
            .await
            .unwrap();
    }
}
