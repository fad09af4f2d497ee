use crate::core::Storage;
use crate::utils::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        if path.is_empty() {
            PathBuf::from(&self.base_path)
        } else {
            Path::new(&self.base_path).join(path)
        }
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(path);
        tracing::debug!("Reading {}", full_path.display());
        let data = fs::read(full_path)?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(full_path, data)?;
        Ok(())
    }

    async fn list_dirs(&self, path: &str) -> Result<Vec<String>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(self.resolve(path))? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_dirs_skips_files_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("seattle")).unwrap();
        fs::create_dir(temp_dir.path().join("boston")).unwrap();
        fs::write(temp_dir.path().join("README.txt"), b"notes").unwrap();

        let storage = LocalStorage::new(temp_dir.path().to_string_lossy());
        let dirs = storage.list_dirs("").await.unwrap();

        assert_eq!(dirs, vec!["boston", "seattle"]);
    }

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_string_lossy());

        storage.write_file("nested/out.txt", b"hello").await.unwrap();
        let data = storage.read_file("nested/out.txt").await.unwrap();

        assert_eq!(data, b"hello");
    }
}
