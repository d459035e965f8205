use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::core::AppError;

/// Bytes in, path out. The rest of the application only ever sees the opaque
/// storage path recorded on the document row.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write the bytes durably and return the storage path. Callers must only
    /// record document metadata after this returns: a failed metadata insert
    /// leaves orphaned bytes behind (acceptable), a metadata row pointing at
    /// missing bytes must never happen.
    pub fn store(&self, bytes: &[u8], suggested_name: &str) -> Result<String, AppError> {
        fs::create_dir_all(&self.root).map_err(AppError::storage_failure)?;

        let extension = Path::new(suggested_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("bin");
        let unique_filename = format!(
            "{}_{}.{}",
            Uuid::new_v4(),
            chrono::Utc::now().timestamp(),
            extension
        );
        let path = self.root.join(unique_filename);

        let mut file = fs::File::create(&path).map_err(AppError::storage_failure)?;
        file.write_all(bytes).map_err(AppError::storage_failure)?;
        file.sync_all().map_err(AppError::storage_failure)?;

        Ok(path.to_string_lossy().into_owned())
    }

    pub fn retrieve(&self, path: &str) -> Result<Vec<u8>, AppError> {
        fs::read(path).map_err(AppError::storage_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim::{assert_err, assert_ok};
    use rand::RngCore;

    fn scratch_storage() -> LocalStorage {
        let dir = std::env::temp_dir()
            .join("portal_desk_storage_tests")
            .join(Uuid::new_v4().to_string());
        LocalStorage::new(dir)
    }

    #[test]
    fn stored_bytes_come_back_unchanged() {
        let storage = scratch_storage();
        let mut bytes = vec![0u8; 1024];
        rand::thread_rng().fill_bytes(&mut bytes);

        let path = assert_ok!(storage.store(&bytes, "budget.xlsx"));
        let retrieved = assert_ok!(storage.retrieve(&path));
        assert_eq!(bytes, retrieved);
    }

    #[test]
    fn stored_path_keeps_the_original_extension() {
        let storage = scratch_storage();
        let path = assert_ok!(storage.store(b"hello", "notes.txt"));
        assert!(path.ends_with(".txt"));
    }

    #[test]
    fn two_stores_of_the_same_name_do_not_collide() {
        let storage = scratch_storage();
        let first = assert_ok!(storage.store(b"one", "report.pdf"));
        let second = assert_ok!(storage.store(b"two", "report.pdf"));
        assert_ne!(first, second);
    }

    #[test]
    fn retrieving_a_missing_path_fails() {
        let storage = scratch_storage();
        assert_err!(storage.retrieve("/nonexistent/blob"));
    }
}
