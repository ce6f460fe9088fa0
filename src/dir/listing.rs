//! Lazy, optionally recursive directory enumeration.

use std::collections::HashSet;
use std::iter::FusedIterator;

use super::{DirEntry, DirFilters, FileInfo, IteratorFlags, NameFilter};
use crate::engine::resolver::resolve_entry;
use crate::engine::{EntryIterator, FileEngine};
use crate::native::NativeDirIterator;
use crate::path::PathEntry;

fn is_dot_or_dot_dot(name: &str) -> bool {
    name == "." || name == ".."
}

/// Describes a listing of one directory tree; [`DirListing::iter`] runs it.
///
/// Every call to [`DirListing::iter`] enumerates from scratch. Entries come in the order
/// the backend produces them; recursion is depth-first and a subdirectory is drained
/// before its parent continues.
///
/// ```no_run
/// use vfs_engine::dir::{DirListing, IteratorFlags};
///
/// let listing = DirListing::new("/var/log")
///     .name_filters(&["*.log"])
///     .flags(IteratorFlags::RECURSIVE | IteratorFlags::FILES_ONLY);
/// for entry in &listing {
///     println!("{} ({} bytes)", entry.file_path(), entry.size());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DirListing {
    path: String,
    name_filters: Vec<String>,
    flags: IteratorFlags,
    legacy: Option<DirFilters>,
}

impl DirListing {
    pub fn new<S: Into<String>>(path: S) -> Self {
        Self {
            path: path.into(),
            name_filters: Vec::new(),
            flags: IteratorFlags::empty(),
            legacy: None,
        }
    }

    /// A listing filtered by the classic [`DirFilters`] mask.
    ///
    /// Only [`IteratorFlags::RECURSIVE`] and [`IteratorFlags::FOLLOW_DIR_SYMLINKS`] are
    /// meaningful in `flags`; everything else is governed by `filters`.
    pub fn legacy<S: Into<String>>(path: S, filters: DirFilters, flags: IteratorFlags) -> Self {
        let filters = if filters.is_empty() {
            DirFilters::ALL_ENTRIES
        } else {
            filters
        };
        Self {
            path: path.into(),
            name_filters: Vec::new(),
            flags: flags & (IteratorFlags::RECURSIVE | IteratorFlags::FOLLOW_DIR_SYMLINKS),
            legacy: Some(filters),
        }
    }

    pub fn name_filters<S: AsRef<str>>(mut self, filters: &[S]) -> Self {
        self.name_filters = filters.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    pub fn flags(mut self, flags: IteratorFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn iterator_flags(&self) -> IteratorFlags {
        self.flags
    }

    /// The classic filter mask of a legacy listing.
    pub fn dir_filters(&self) -> Option<DirFilters> {
        self.legacy
    }

    pub fn iter(&self) -> DirListingIter {
        DirListingIter::begin(self)
    }
}

impl<'a> IntoIterator for &'a DirListing {
    type Item = DirEntry;
    type IntoIter = DirListingIter;

    fn into_iter(self) -> DirListingIter {
        self.iter()
    }
}

enum Level {
    Native(NativeDirIterator),
    Custom(Box<dyn EntryIterator>),
}

/// A running [`DirListing`]. Once exhausted it keeps returning `None`.
pub struct DirListingIter {
    flags: IteratorFlags,
    legacy: Option<DirFilters>,
    name_filters: Vec<String>,
    matcher: NameFilter,
    engine: Option<Box<dyn FileEngine>>,
    stack: Vec<Level>,
    visited: HashSet<String>,
}

impl DirListingIter {
    fn begin(listing: &DirListing) -> Self {
        let case_sensitive = match listing.legacy {
            Some(filters) => filters.contains(DirFilters::CASE_SENSITIVE),
            None => listing.flags.contains(IteratorFlags::CASE_SENSITIVE),
        };
        let mut root = PathEntry::new(&listing.path);
        let engine = resolve_entry(&mut root);
        let mut it = Self {
            flags: listing.flags,
            legacy: listing.legacy,
            name_filters: listing.name_filters.clone(),
            matcher: NameFilter::new(&listing.name_filters, case_sensitive),
            engine,
            stack: Vec::new(),
            visited: HashSet::new(),
        };

        if it.following() {
            let info = match &it.engine {
                Some(_) => FileInfo::from_entry(root.clone()),
                None => FileInfo::with_metadata(root.clone(), Default::default()),
            };
            let canonical = info.canonical_file_path();
            if !canonical.is_empty() {
                it.visited.insert(canonical);
            }
        }
        it.push_directory(&root);
        it
    }

    fn following(&self) -> bool {
        self.flags.contains(IteratorFlags::FOLLOW_DIR_SYMLINKS)
    }

    /// True until the traversal has run out of directories.
    pub fn is_active(&self) -> bool {
        !self.stack.is_empty()
    }

    fn push_directory(&mut self, dir: &PathEntry) {
        let path = dir.file_path();
        let level = match self.engine.as_mut() {
            Some(engine) => {
                engine.set_file_name(path);
                let filters = self.legacy.unwrap_or(DirFilters::ALL_ENTRIES);
                engine
                    .begin_entry_list(path, filters, &self.name_filters)
                    .map(Level::Custom)
            }
            None => match NativeDirIterator::new(dir) {
                Ok(it) => Some(Level::Native(it)),
                Err(err) => {
                    log::debug!("cannot list {dir}: {err}");
                    None
                }
            },
        };
        if let Some(level) = level {
            log::debug!("descending into {dir}");
            self.stack.push(level);
        }
    }

    /// Pushes `entry` for later traversal when it is a directory the flags allow
    /// descending into.
    fn check_and_push(&mut self, entry: &DirEntry) {
        if !self.flags.contains(IteratorFlags::RECURSIVE) {
            return;
        }
        if is_dot_or_dot_dot(entry.file_name()) {
            return;
        }
        let info = entry.file_info();
        if !info.is_dir() {
            return;
        }
        if !self.following() && info.is_symlink() {
            return;
        }
        let hidden_allowed = match self.legacy {
            Some(filters) => filters.intersects(DirFilters::ALL_DIRS | DirFilters::HIDDEN),
            None => self.flags.contains(IteratorFlags::INCLUDE_HIDDEN),
        };
        if !hidden_allowed && info.is_hidden() {
            return;
        }
        if self.following() && !self.visited.insert(info.canonical_file_path()) {
            log::trace!("{} already visited", entry.file_path());
            return;
        }
        let dir = info.entry().clone();
        self.push_directory(&dir);
    }

    fn matches(&self, entry: &DirEntry) -> bool {
        match self.legacy {
            Some(filters) => self.matches_legacy(entry, filters),
            None => self.matches_modern(entry),
        }
    }

    fn matches_modern(&self, entry: &DirEntry) -> bool {
        let flags = self.flags;
        let name = entry.file_name();
        if name.is_empty() {
            return false;
        }
        if is_dot_or_dot_dot(name) {
            return flags.contains(IteratorFlags::INCLUDE_DOT_AND_DOT_DOT);
        }
        if !self.matcher.matches(name) {
            return false;
        }
        let info = entry.file_info();
        if !flags.contains(IteratorFlags::INCLUDE_HIDDEN) && info.is_hidden() {
            return false;
        }
        if info.is_symlink() {
            if flags.contains(IteratorFlags::RESOLVE_SYMLINKS) {
                if !info.exists() {
                    return false;
                }
            } else if flags.intersects(IteratorFlags::FILES_ONLY | IteratorFlags::DIRS_ONLY) {
                return false;
            }
        }
        if flags.contains(IteratorFlags::EXCLUDE_OTHER) && !info.is_file() && !info.is_dir() {
            return false;
        }
        if flags.contains(IteratorFlags::EXCLUDE_DIRS) && info.is_dir() {
            return false;
        }
        if flags.contains(IteratorFlags::EXCLUDE_FILES) && info.is_file() {
            return false;
        }
        true
    }

    fn matches_legacy(&self, entry: &DirEntry, filters: DirFilters) -> bool {
        let name = entry.file_name();
        if name.is_empty() {
            return false;
        }

        let dot_or_dot_dot = is_dot_or_dot_dot(name);
        if filters.contains(DirFilters::NO_DOT) && dot_or_dot_dot && name.len() == 1 {
            return false;
        }
        if filters.contains(DirFilters::NO_DOT_DOT) && dot_or_dot_dot && name.len() == 2 {
            return false;
        }

        let info = entry.file_info();
        let all_dirs = filters.contains(DirFilters::ALL_DIRS) && info.is_dir();
        if !self.matcher.is_match_all() && !all_dirs && !self.matcher.matches(name) {
            return false;
        }

        let include_system = filters.contains(DirFilters::SYSTEM);
        if filters.contains(DirFilters::NO_SYM_LINKS) && info.is_symlink() {
            // only a broken link requested as a system entry survives
            if !include_system || info.exists() {
                return false;
            }
        }

        if !filters.contains(DirFilters::HIDDEN) && !dot_or_dot_dot && info.is_hidden() {
            return false;
        }

        if !include_system {
            let regular = info.is_file() || info.is_dir() || info.is_symlink();
            let broken_link = info.is_symlink() && !info.exists();
            if !regular || broken_link {
                return false;
            }
        }

        if !filters.intersects(DirFilters::DIRS | DirFilters::ALL_DIRS) && info.is_dir() {
            return false;
        }
        if !filters.contains(DirFilters::FILES) && info.is_file() {
            return false;
        }

        let perms = filters & DirFilters::PERMISSION_MASK;
        if !perms.is_empty() && perms != DirFilters::PERMISSION_MASK {
            if (filters.contains(DirFilters::READABLE) && !info.is_readable())
                || (filters.contains(DirFilters::WRITABLE) && !info.is_writable())
                || (filters.contains(DirFilters::EXECUTABLE) && !info.is_executable())
            {
                return false;
            }
        }
        true
    }
}

impl Iterator for DirListingIter {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        loop {
            let level = self.stack.last_mut()?;
            let next = match level {
                Level::Native(it) => it.next().map(DirEntry::from_native),
                Level::Custom(it) => it
                    .advance()
                    .then(|| DirEntry::from_info(it.current_file_info())),
            };
            let Some(entry) = next else {
                self.stack.pop();
                continue;
            };

            self.check_and_push(&entry);
            if self.matches(&entry) {
                return Some(entry);
            }
            log::trace!("filtered out {}", entry.file_path());
        }
    }
}

impl FusedIterator for DirListingIter {}
