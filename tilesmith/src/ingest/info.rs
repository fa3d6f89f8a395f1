//! Inventory of the items an ingest run processes.

use super::IngestError;
use std::fs;
use std::path::{Path, PathBuf};

/// A unit of ingest work.
pub trait IngestItem: Send + 'static {
    /// Name used in error reports.
    fn name(&self) -> String;

    /// Size in bytes, reported to progress once the item completes.
    fn size(&self) -> u64;
}

/// A file to ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestFile {
    pub path: PathBuf,
    pub size: u64,
}

impl IngestItem for IngestFile {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// The files of a directory and their total size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestInfo {
    pub files: Vec<IngestFile>,
    pub total_bytes: u64,
}

impl IngestInfo {
    /// Collects the regular files directly inside `dir`, sorted by path.
    ///
    /// Hidden files (leading `.`) and subdirectories are skipped.
    pub fn from_dir(dir: &Path) -> Result<Self, IngestError> {
        let read_err = |source| IngestError::Read {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            let metadata = entry.metadata().map_err(read_err)?;
            if hidden || !metadata.is_file() {
                continue;
            }
            files.push(IngestFile {
                path: entry.path(),
                size: metadata.len(),
            });
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let total_bytes = files.iter().map(|f| f.size).sum();
        Ok(Self { files, total_bytes })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.csv"), "1,2\n").unwrap();
        fs::write(dir.path().join("a.csv"), "1,2\n3,4\n").unwrap();
        fs::write(dir.path().join(".hidden"), "x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let info = IngestInfo::from_dir(dir.path()).unwrap();
        let names: Vec<String> = info
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
        assert_eq!(info.total_bytes, 12);
        assert_eq!(info.files[0].size(), 8);
    }

    #[test]
    fn test_missing_dir() {
        let dir = TempDir::new().unwrap();
        let err = IngestInfo::from_dir(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, IngestError::Read { .. }));
    }

    #[test]
    fn test_empty_dir() {
        let dir = TempDir::new().unwrap();
        let info = IngestInfo::from_dir(dir.path()).unwrap();
        assert!(info.is_empty());
        assert_eq!(info.total_bytes, 0);
    }
}
