//! Full metadata view of one path, filled lazily and cached.

use std::cell::RefCell;
use std::fmt;
use std::time::SystemTime;

use crate::engine::resolver::resolve_entry;
use crate::engine::{FileEngine, FileFlags, FileName, FileOwner, FileTime, MetaFlags, MetadataCache};
use crate::native::{filesystem, fill_metadata};
use crate::path::PathEntry;

struct State {
    metadata: MetadataCache,
    engine: Option<Box<dyn FileEngine>>,
    caching: bool,
}

/// Attributes of a file or directory.
///
/// Native paths are answered from a [`MetadataCache`] that is filled on demand, one
/// category at a time; paths claimed by a custom backend are answered by its engine.
/// Type queries ([`FileInfo::is_file`], [`FileInfo::is_dir`]) follow symlinks, while
/// [`FileInfo::is_symlink`] describes the link itself.
pub struct FileInfo {
    entry: PathEntry,
    state: RefCell<State>,
}

impl FileInfo {
    /// Resolves `path` through the engine registry.
    pub fn new<S: AsRef<str>>(path: S) -> Self {
        Self::from_entry(PathEntry::new(path.as_ref()))
    }

    pub fn from_entry(mut entry: PathEntry) -> Self {
        let engine = resolve_entry(&mut entry);
        Self::build(entry, MetadataCache::new(), engine)
    }

    /// A native entry whose cache is seeded with what a directory read revealed.
    pub fn with_metadata(entry: PathEntry, metadata: MetadataCache) -> Self {
        Self::build(entry, metadata, None)
    }

    /// An entry answered by an already-created backend engine.
    pub fn with_engine(path: &str, engine: Box<dyn FileEngine>) -> Self {
        Self::build(PathEntry::new(path), MetadataCache::new(), Some(engine))
    }

    fn build(entry: PathEntry, metadata: MetadataCache, engine: Option<Box<dyn FileEngine>>) -> Self {
        Self {
            entry,
            state: RefCell::new(State {
                metadata,
                engine,
                caching: true,
            }),
        }
    }

    pub fn entry(&self) -> &PathEntry {
        &self.entry
    }

    /// Whether a custom backend answers for this path.
    pub fn is_custom(&self) -> bool {
        self.state.borrow().engine.is_some()
    }

    /// Fills the categories of `what` that are not cached yet, then reads the cache.
    fn native<R>(&self, what: MetaFlags, read: impl FnOnce(&MetadataCache) -> R) -> R {
        let mut state = self.state.borrow_mut();
        if !state.caching {
            state.metadata.clear();
        }
        let missing = state.metadata.missing_flags(what);
        if !missing.is_empty() {
            fill_metadata(&self.entry, &mut state.metadata, missing);
        }
        read(&state.metadata)
    }

    /// Runs `query` against the custom engine, or returns `None` for native paths.
    fn custom<R>(&self, query: impl FnOnce(&mut dyn FileEngine) -> R) -> Option<R> {
        let mut state = self.state.borrow_mut();
        state.engine.as_mut().map(|engine| query(engine.as_mut()))
    }

    fn custom_flags(&self, request: FileFlags) -> Option<FileFlags> {
        let caching = self.state.borrow().caching;
        let request = if caching { request } else { request | FileFlags::REFRESH };
        self.custom(|engine| engine.file_flags(request))
    }

    pub fn exists(&self) -> bool {
        match self.custom_flags(FileFlags::EXISTS_FLAG) {
            Some(flags) => flags.contains(FileFlags::EXISTS_FLAG),
            None => self.native(MetaFlags::EXISTS, MetadataCache::exists),
        }
    }

    pub fn is_file(&self) -> bool {
        match self.custom_flags(FileFlags::FILE_TYPE) {
            Some(flags) => flags.contains(FileFlags::FILE_TYPE),
            None => self.native(MetaFlags::FILE_TYPE, MetadataCache::is_file),
        }
    }

    pub fn is_dir(&self) -> bool {
        match self.custom_flags(FileFlags::DIRECTORY_TYPE) {
            Some(flags) => flags.contains(FileFlags::DIRECTORY_TYPE),
            None => self.native(MetaFlags::DIRECTORY_TYPE, MetadataCache::is_directory),
        }
    }

    pub fn is_symlink(&self) -> bool {
        match self.custom_flags(FileFlags::LINK_TYPE) {
            Some(flags) => flags.contains(FileFlags::LINK_TYPE),
            None => self.native(MetaFlags::LINK_TYPE, MetadataCache::is_link),
        }
    }

    pub fn is_hidden(&self) -> bool {
        match self.custom_flags(FileFlags::HIDDEN_FLAG) {
            Some(flags) => flags.contains(FileFlags::HIDDEN_FLAG),
            None => self.native(MetaFlags::HIDDEN, MetadataCache::is_hidden),
        }
    }

    pub fn is_root(&self) -> bool {
        match self.custom_flags(FileFlags::ROOT_FLAG) {
            Some(flags) => flags.contains(FileFlags::ROOT_FLAG),
            None => self.entry.is_root(),
        }
    }

    fn user_permission(&self, native: MetaFlags, custom: FileFlags) -> bool {
        match self.custom_flags(custom) {
            Some(flags) => flags.contains(custom),
            None => self.native(MetaFlags::USER_PERMISSIONS, |m| m.permissions().contains(native)),
        }
    }

    /// Readable by the calling user.
    pub fn is_readable(&self) -> bool {
        self.user_permission(MetaFlags::USER_READ, FileFlags::READ_USER_PERM)
    }

    pub fn is_writable(&self) -> bool {
        self.user_permission(MetaFlags::USER_WRITE, FileFlags::WRITE_USER_PERM)
    }

    pub fn is_executable(&self) -> bool {
        self.user_permission(MetaFlags::USER_EXECUTE, FileFlags::EXE_USER_PERM)
    }

    /// All permission bits: owner, user, group and other.
    pub fn permissions(&self) -> MetaFlags {
        match self.custom_flags(FileFlags::PERMS_MASK) {
            Some(flags) => flags.permissions(),
            None => self.native(MetaFlags::PERMISSIONS, MetadataCache::permissions),
        }
    }

    pub fn is_relative(&self) -> bool {
        self.custom(|engine| engine.is_relative_path())
            .unwrap_or_else(|| self.entry.is_relative())
    }

    pub fn is_absolute(&self) -> bool {
        !self.is_relative()
    }

    pub fn size(&self) -> u64 {
        self.custom(|engine| engine.size())
            .unwrap_or_else(|| self.native(MetaFlags::SIZE, MetadataCache::size))
    }

    pub fn file_time(&self, which: FileTime) -> Option<SystemTime> {
        match self.custom(|engine| engine.file_time(which)) {
            Some(time) => time,
            None => self.native(which.flag(), |m| m.file_time(which)),
        }
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.file_time(FileTime::Modification)
    }

    pub fn last_read(&self) -> Option<SystemTime> {
        self.file_time(FileTime::Access)
    }

    pub fn birth_time(&self) -> Option<SystemTime> {
        self.file_time(FileTime::Birth)
    }

    pub fn metadata_change_time(&self) -> Option<SystemTime> {
        self.file_time(FileTime::MetadataChange)
    }

    pub fn owner_id(&self) -> Option<u32> {
        match self.custom(|engine| engine.owner_id(FileOwner::User)) {
            Some(id) => id,
            None => self.native(MetaFlags::OWNER_IDS, MetadataCache::user_id),
        }
    }

    pub fn group_id(&self) -> Option<u32> {
        match self.custom(|engine| engine.owner_id(FileOwner::Group)) {
            Some(id) => id,
            None => self.native(MetaFlags::OWNER_IDS, MetadataCache::group_id),
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

    fn engine_name(&self, which: FileName) -> Option<String> {
        self.custom(|engine| engine.file_name(which))
    }

    pub fn absolute_file_path(&self) -> String {
        if self.entry.is_empty() {
            return String::new();
        }
        self.engine_name(FileName::Absolute)
            .unwrap_or_else(|| filesystem::absolute_name(&self.entry).file_path().to_string())
    }

    pub fn absolute_path(&self) -> String {
        if self.entry.is_empty() {
            return String::new();
        }
        self.engine_name(FileName::AbsolutePath)
            .unwrap_or_else(|| filesystem::absolute_name(&self.entry).path().to_string())
    }

    /// The symlink-free absolute path, or an empty string when the file does not exist.
    pub fn canonical_file_path(&self) -> String {
        self.engine_name(FileName::Canonical).unwrap_or_else(|| {
            filesystem::canonical_name(&self.entry)
                .map(|c| c.file_path().to_string())
                .unwrap_or_default()
        })
    }

    pub fn canonical_path(&self) -> String {
        self.engine_name(FileName::CanonicalPath).unwrap_or_else(|| {
            filesystem::canonical_name(&self.entry)
                .map(|c| c.path().to_string())
                .unwrap_or_default()
        })
    }

    /// Absolute path of the link target; empty for anything but a symlink.
    pub fn symlink_target(&self) -> String {
        self.engine_name(FileName::AbsoluteLinkTarget).unwrap_or_else(|| {
            filesystem::link_target(&self.entry)
                .map(|t| t.file_path().to_string())
                .unwrap_or_default()
        })
    }

    /// Drops every cached attribute.
    pub fn refresh(&self) {
        let mut state = self.state.borrow_mut();
        state.metadata.clear();
        if let Some(engine) = state.engine.as_mut() {
            engine.file_flags(FileFlags::REFRESH);
        }
    }

    /// With caching off, every query goes to the filesystem again.
    pub fn set_caching(&self, enable: bool) {
        let mut state = self.state.borrow_mut();
        state.caching = enable;
        if !enable {
            state.metadata.clear();
        }
    }

    pub fn caching(&self) -> bool {
        self.state.borrow().caching
    }
}

impl Clone for FileInfo {
    /// A custom engine is not cloneable; the copy resolves its own one.
    fn clone(&self) -> Self {
        let state = self.state.borrow();
        let mut entry = self.entry.clone();
        let engine = if state.engine.is_some() {
            resolve_entry(&mut entry)
        } else {
            None
        };
        let copy = Self::build(entry, state.metadata.clone(), engine);
        copy.state.borrow_mut().caching = state.caching;
        copy
    }
}

impl PartialEq for FileInfo {
    fn eq(&self, other: &Self) -> bool {
        if self.entry.is_empty() || other.entry.is_empty() {
            return self.entry.is_empty() && other.entry.is_empty();
        }
        self.is_custom() == other.is_custom() && self.absolute_file_path() == other.absolute_file_path()
    }
}

impl fmt::Debug for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("FileInfo");
        s.field("path", &self.entry.file_path());
        if let Ok(state) = self.state.try_borrow() {
            s.field("custom", &state.engine.is_some());
            s.field("known", &state.metadata.known());
        }
        s.finish()
    }
}
