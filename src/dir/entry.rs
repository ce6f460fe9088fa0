use std::cell::OnceCell;
use std::fmt;
use std::time::SystemTime;

use super::FileInfo;
use crate::engine::MetadataCache;
use crate::native::NativeDirEntry;
use crate::path::PathEntry;

/// One result of a directory listing.
///
/// Name queries are answered from the path alone. Anything that needs metadata builds a
/// [`FileInfo`] on first use and keeps it for the lifetime of the entry.
pub struct DirEntry {
    entry: PathEntry,
    seed: Option<MetadataCache>,
    info: OnceCell<FileInfo>,
}

impl DirEntry {
    pub(crate) fn from_native(native: NativeDirEntry) -> Self {
        Self {
            entry: native.entry,
            seed: Some(native.metadata),
            info: OnceCell::new(),
        }
    }

    pub(crate) fn from_info(info: FileInfo) -> Self {
        Self {
            entry: info.entry().clone(),
            seed: None,
            info: OnceCell::from(info),
        }
    }

    /// Whether the full [`FileInfo`] has been built already.
    pub fn is_promoted(&self) -> bool {
        self.info.get().is_some()
    }

    pub fn file_info(&self) -> &FileInfo {
        self.info.get_or_init(|| match &self.seed {
            Some(seed) => FileInfo::with_metadata(self.entry.clone(), seed.clone()),
            None => FileInfo::from_entry(self.entry.clone()),
        })
    }

    pub fn into_file_info(self) -> FileInfo {
        let Self { entry, seed, info } = self;
        match info.into_inner() {
            Some(info) => info,
            None => match seed {
                Some(seed) => FileInfo::with_metadata(entry, seed),
                None => FileInfo::from_entry(entry),
            },
        }
    }

    pub fn file_name(&self) -> &str {
        self.entry.file_name()
    }

    pub fn file_path(&self) -> &str {
        self.entry.file_path()
    }

    pub fn path(&self) -> &str {
        self.entry.path()
    }

    pub fn base_name(&self) -> &str {
        self.entry.base_name()
    }

    pub fn complete_base_name(&self) -> &str {
        self.entry.complete_base_name()
    }

    pub fn suffix(&self) -> &str {
        self.entry.suffix()
    }

    pub fn complete_suffix(&self) -> &str {
        self.entry.complete_suffix()
    }

    pub fn exists(&self) -> bool {
        self.file_info().exists()
    }

    pub fn is_file(&self) -> bool {
        self.file_info().is_file()
    }

    pub fn is_dir(&self) -> bool {
        self.file_info().is_dir()
    }

    pub fn is_symlink(&self) -> bool {
        self.file_info().is_symlink()
    }

    pub fn is_hidden(&self) -> bool {
        self.file_info().is_hidden()
    }

    pub fn size(&self) -> u64 {
        self.file_info().size()
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.file_info().last_modified()
    }

    pub fn absolute_file_path(&self) -> String {
        self.file_info().absolute_file_path()
    }

    pub fn canonical_file_path(&self) -> String {
        self.file_info().canonical_file_path()
    }
}

impl fmt::Debug for DirEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirEntry")
            .field("path", &self.entry.file_path())
            .field("promoted", &self.is_promoted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MetaFlags;

    fn native_entry(path: &str, values: MetaFlags) -> NativeDirEntry {
        let mut metadata = MetadataCache::new();
        metadata.set(MetaFlags::DIR_ENTRY_TYPE, values);
        NativeDirEntry {
            entry: PathEntry::new(path),
            metadata,
        }
    }

    #[test]
    fn test_names_do_not_promote() {
        let entry = DirEntry::from_native(native_entry("/data/notes.md", MetaFlags::EXISTS));
        assert_eq!(entry.file_name(), "notes.md");
        assert_eq!(entry.path(), "/data");
        assert_eq!(entry.suffix(), "md");
        assert!(!entry.is_promoted());
    }

    #[test]
    fn test_metadata_query_promotes_once() {
        let entry = DirEntry::from_native(native_entry(
            "/data/sub",
            MetaFlags::EXISTS | MetaFlags::DIRECTORY_TYPE,
        ));
        assert!(entry.is_dir());
        assert!(entry.is_promoted());
        let first: *const FileInfo = entry.file_info();
        assert!(std::ptr::eq(first, entry.file_info()));
    }

    #[test]
    fn test_from_info_is_promoted() {
        let entry = DirEntry::from_info(FileInfo::new("/data/x"));
        assert!(entry.is_promoted());
        assert_eq!(entry.into_file_info().file_name(), "x");
    }
}
