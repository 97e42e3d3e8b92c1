//! Persistence slots: where the snapshot JSON lives.

use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

/// A single key-value slot holding the serialized snapshot.
pub trait SnapshotSlot {
    /// Read the stored document. `Ok(None)` means nothing has been saved yet.
    fn read(&self) -> io::Result<Option<String>>;

    /// Replace the stored document.
    fn write(&self, contents: &str) -> io::Result<()>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;

    /// Keep a copy of an unreadable document before it gets overwritten.
    /// Returns where the copy went, if anywhere.
    fn preserve_unreadable(&self) -> io::Result<Option<String>> {
        Ok(None)
    }
}

/// JSON file on disk. Writes go to a temp file in the same directory and
/// are renamed over the target, so a crash never leaves a half-written file.
#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<file>.corrupt`, next to the data file
    pub fn corrupt_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".corrupt");
        PathBuf::from(name)
    }
}

impl SnapshotSlot for FileSlot {
    fn read(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, contents: &str) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!(path = %self.path.display(), bytes = contents.len(), "Snapshot written");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn preserve_unreadable(&self) -> io::Result<Option<String>> {
        let backup = self.corrupt_path();
        fs::copy(&self.path, &backup)?;
        Ok(Some(backup.display().to_string()))
    }
}

/// In-memory slot. Clones share the same contents, so a test can keep a
/// handle and inspect what the store wrote.
#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    contents: Rc<RefCell<Option<String>>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Rc::new(RefCell::new(Some(contents.into()))),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.borrow().clone()
    }
}

impl SnapshotSlot for MemorySlot {
    fn read(&self) -> io::Result<Option<String>> {
        Ok(self.contents.borrow().clone())
    }

    fn write(&self, contents: &str) -> io::Result<()> {
        *self.contents.borrow_mut() = Some(contents.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_slot_missing_file_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let slot = FileSlot::new(dir.path().join("absent.json"));
        assert!(slot.read().unwrap().is_none());
    }

    #[test]
    fn test_file_slot_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lab.json");
        let slot = FileSlot::new(&path);

        slot.write("{\"users\":[]}").unwrap();
        assert_eq!(slot.read().unwrap().as_deref(), Some("{\"users\":[]}"));

        slot.write("{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_file_slot_preserves_unreadable_copy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab.json");
        fs::write(&path, "{not json").unwrap();
        let slot = FileSlot::new(&path);

        let backup = slot.preserve_unreadable().unwrap().unwrap();
        assert_eq!(PathBuf::from(&backup), dir.path().join("lab.json.corrupt"));
        assert_eq!(fs::read_to_string(&backup).unwrap(), "{not json");
        assert_eq!(fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[test]
    fn test_memory_slot_clones_share_contents() {
        let slot = MemorySlot::new();
        let handle = slot.clone();
        slot.write("abc").unwrap();
        assert_eq!(handle.contents().as_deref(), Some("abc"));
    }
}
