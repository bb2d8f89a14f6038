//! Scratch files for media that cannot live in memory (video and audio).
//!
//! A `ScratchFile` is a shared handle to a temporary file. The file is deleted
//! when the last handle is dropped, whichever path (success, error, cancel)
//! released it.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;

#[derive(Clone)]
pub struct ScratchFile {
    path: Arc<TempPath>,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the file on disk
    pub fn len(&self) -> std::io::Result<u64> {
        Ok(std::fs::metadata(self.path())?.len())
    }

    pub fn is_empty(&self) -> std::io::Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl PartialEq for ScratchFile {
    fn eq(&self, other: &Self) -> bool {
        self.path() == other.path()
    }
}

impl fmt::Debug for ScratchFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScratchFile").field(&self.path()).finish()
    }
}

/// Location where scratch files are created
#[derive(Debug, Clone, Default)]
pub struct ScratchSpace {
    dir: Option<PathBuf>,
}

impl ScratchSpace {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    /// Create an empty scratch file with the given extension
    pub fn create(&self, extension: &str) -> std::io::Result<ScratchFile> {
        let file = self.builder_file(extension)?;
        Ok(ScratchFile {
            path: Arc::new(file.into_temp_path()),
        })
    }

    /// Create a scratch file holding `data`
    pub fn write(&self, data: &[u8], extension: &str) -> std::io::Result<ScratchFile> {
        let mut file = self.builder_file(extension)?;
        file.write_all(data)?;
        file.flush()?;
        Ok(ScratchFile {
            path: Arc::new(file.into_temp_path()),
        })
    }

    fn builder_file(&self, extension: &str) -> std::io::Result<tempfile::NamedTempFile> {
        let suffix = format!(".{}", extension);
        let mut builder = tempfile::Builder::new();
        builder.prefix("mediakit-").suffix(&suffix);
        match &self.dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_file_has_extension_and_contents() {
        let space = ScratchSpace::default();
        let file = space.write(b"abc", "mp4").unwrap();
        assert_eq!(file.path().extension().unwrap(), "mp4");
        assert_eq!(std::fs::read(file.path()).unwrap(), b"abc");
        assert_eq!(file.len().unwrap(), 3);
    }

    #[test]
    fn test_scratch_file_removed_when_last_handle_dropped() {
        let space = ScratchSpace::default();
        let file = space.create("wav").unwrap();
        let path = file.path().to_path_buf();
        let second = file.clone();
        assert!(path.exists());

        drop(file);
        assert!(path.exists());

        drop(second);
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_space_custom_dir() {
        let dir = tempfile::tempdir().unwrap();
        let space = ScratchSpace::new(Some(dir.path().to_path_buf()));
        let file = space.create("mkv").unwrap();
        assert!(file.path().starts_with(dir.path()));
        assert!(file.is_empty().unwrap());
    }
}
