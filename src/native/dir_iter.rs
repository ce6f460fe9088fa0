use std::fs;
use std::io;

use crate::dir::FileInfo;
use crate::engine::{EntryIterator, MetaFlags, MetadataCache};
use crate::path::PathEntry;

/// One entry produced by [`NativeDirIterator`], with whatever metadata the directory
/// read revealed for free.
#[derive(Debug, Clone)]
pub struct NativeDirEntry {
    pub entry: PathEntry,
    pub metadata: MetadataCache,
}

/// Reads one host directory, `readdir` style: `.` and `..` come first, followed by the
/// real entries in the order the OS returns them.
pub struct NativeDirIterator {
    dir: PathEntry,
    read_dir: fs::ReadDir,
    dots_left: u8,
}

impl NativeDirIterator {
    pub fn new(dir: &PathEntry) -> io::Result<Self> {
        let read_dir = fs::read_dir(dir.native_file_path())?;
        Ok(Self {
            dir: dir.clone(),
            read_dir,
            dots_left: 2,
        })
    }

    pub fn dir(&self) -> &PathEntry {
        &self.dir
    }

    fn dot_entry(&self, name: &str) -> NativeDirEntry {
        let mut metadata = MetadataCache::new();
        metadata.set(
            MetaFlags::DIR_ENTRY_TYPE,
            MetaFlags::EXISTS | MetaFlags::DIRECTORY_TYPE,
        );
        metadata.fill_hidden_from_name(name);
        NativeDirEntry {
            entry: self.dir.join(name),
            metadata,
        }
    }
}

impl Iterator for NativeDirIterator {
    type Item = NativeDirEntry;

    fn next(&mut self) -> Option<NativeDirEntry> {
        match self.dots_left {
            2 => {
                self.dots_left = 1;
                return Some(self.dot_entry("."));
            }
            1 => {
                self.dots_left = 0;
                return Some(self.dot_entry(".."));
            }
            _ => {}
        }

        loop {
            let dirent = match self.read_dir.next()? {
                Ok(dirent) => dirent,
                Err(err) => {
                    log::trace!("skipping unreadable entry in {}: {err}", self.dir);
                    continue;
                }
            };
            let entry = PathEntry::from_native(dirent.path().into_os_string());
            let mut metadata = MetadataCache::new();
            if let Ok(ft) = dirent.file_type() {
                metadata.fill_from_file_type(ft);
            }
            metadata.fill_hidden_from_name(entry.file_name());
            return Some(NativeDirEntry { entry, metadata });
        }
    }
}

/// [`NativeDirIterator`] behind the backend-neutral [`EntryIterator`] cursor.
pub struct NativeEntryIterator {
    path: String,
    inner: NativeDirIterator,
    current: Option<NativeDirEntry>,
}

impl NativeEntryIterator {
    pub fn new(dir: &PathEntry) -> io::Result<Self> {
        Ok(Self {
            path: dir.file_path().to_string(),
            inner: NativeDirIterator::new(dir)?,
            current: None,
        })
    }
}

impl EntryIterator for NativeEntryIterator {
    fn path(&self) -> &str {
        &self.path
    }

    fn advance(&mut self) -> bool {
        self.current = self.inner.next();
        self.current.is_some()
    }

    fn current_file_name(&self) -> String {
        self.current
            .as_ref()
            .map(|c| c.entry.file_name().to_string())
            .unwrap_or_default()
    }

    fn current_file_path(&self) -> String {
        self.current
            .as_ref()
            .map(|c| c.entry.file_path().to_string())
            .unwrap_or_default()
    }

    fn current_file_info(&self) -> FileInfo {
        match &self.current {
            Some(c) => FileInfo::with_metadata(c.entry.clone(), c.metadata.clone()),
            None => FileInfo::new(""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_lists_dots_then_entries() {
        let temp_dir = TempDir::new("dir_iter_test").unwrap();
        fs::write(temp_dir.path().join("a.txt"), b"").unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();
        fs::write(temp_dir.path().join(".secret"), b"").unwrap();

        let dir = PathEntry::new(temp_dir.path().to_string_lossy());
        let entries: Vec<_> = NativeDirIterator::new(&dir).unwrap().collect();
        let names: Vec<_> = entries.iter().map(|e| e.entry.file_name().to_string()).collect();
        assert_eq!(&names[..2], [".", ".."]);
        assert_eq!(names.len(), 5);

        let sub = entries.iter().find(|e| e.entry.file_name() == "sub").unwrap();
        assert!(sub.metadata.is_directory());
        assert!(!sub.metadata.has_flags(MetaFlags::SIZE));

        let secret = entries.iter().find(|e| e.entry.file_name() == ".secret").unwrap();
        assert!(secret.metadata.is_hidden());
        assert!(secret.metadata.is_file());

        let dot = &entries[0];
        assert!(!dot.metadata.is_hidden());
        assert_eq!(dot.entry.path(), dir.file_path());
    }

    #[test]
    fn test_missing_directory_fails() {
        let temp_dir = TempDir::new("dir_iter_test").unwrap();
        let dir = PathEntry::new(temp_dir.path().join("nope").to_string_lossy());
        assert!(NativeDirIterator::new(&dir).is_err());
    }

    #[test]
    fn test_entry_iterator_cursor() {
        let temp_dir = TempDir::new("dir_iter_test").unwrap();
        fs::write(temp_dir.path().join("only.txt"), b"").unwrap();

        let dir = PathEntry::new(temp_dir.path().to_string_lossy());
        let mut it = NativeEntryIterator::new(&dir).unwrap();
        assert_eq!(it.current_file_name(), "");

        let mut names = Vec::new();
        while it.advance() {
            names.push(it.current_file_name());
            assert!(it.current_file_path().starts_with(dir.file_path()));
        }
        assert_eq!(names, [".", "..", "only.txt"]);
        assert!(!it.advance());
    }
}
