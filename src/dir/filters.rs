//! Flag sets that configure listings and sorting, plus shell-style name filtering.

use bitflags::bitflags;
use globset::{GlobBuilder, GlobMatcher};

bitflags! {
    /// The classic filter bitmask understood by [`super::Dir`] and legacy listings.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct DirFilters: u32 {
        const DIRS = 0x0001;
        const FILES = 0x0002;
        const DRIVES = 0x0004;
        const NO_SYM_LINKS = 0x0008;
        const ALL_ENTRIES = Self::DIRS.bits() | Self::FILES.bits() | Self::DRIVES.bits();
        const TYPE_MASK = 0x000F;

        const READABLE = 0x0010;
        const WRITABLE = 0x0020;
        const EXECUTABLE = 0x0040;
        const PERMISSION_MASK = 0x0070;

        const MODIFIED = 0x0080;
        const HIDDEN = 0x0100;
        const SYSTEM = 0x0200;
        const ACCESS_MASK = 0x03F0;

        /// Directories are listed whatever the name filters say.
        const ALL_DIRS = 0x0400;
        const CASE_SENSITIVE = 0x0800;
        const NO_DOT = 0x2000;
        const NO_DOT_DOT = 0x4000;
        const NO_DOT_AND_DOT_DOT = Self::NO_DOT.bits() | Self::NO_DOT_DOT.bits();
    }
}

bitflags! {
    /// Options of a [`super::DirListing`]. The empty set lists files, directories and
    /// special entries of one directory, skipping hidden ones and `.`/`..`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct IteratorFlags: u32 {
        const EXCLUDE_FILES = 0x0004;
        const EXCLUDE_DIRS = 0x0008;
        const EXCLUDE_OTHER = 0x0010;
        /// Judge symlinks by their target; broken links are skipped.
        const RESOLVE_SYMLINKS = 0x0020;
        const FILES_ONLY = Self::EXCLUDE_DIRS.bits() | Self::EXCLUDE_OTHER.bits();
        const DIRS_ONLY = Self::EXCLUDE_FILES.bits() | Self::EXCLUDE_OTHER.bits();
        const INCLUDE_HIDDEN = 0x0040;
        const INCLUDE_DOT_AND_DOT_DOT = 0x0080;
        const CASE_SENSITIVE = 0x0100;
        const RECURSIVE = 0x0400;
        const FOLLOW_DIR_SYMLINKS = 0x0800;
    }
}

bitflags! {
    /// Ordering of materialized listings. The low two bits select the key; `TYPE`
    /// replaces it with the suffix.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SortFlags: u32 {
        const NAME = 0x0000;
        const TIME = 0x0001;
        const SIZE = 0x0002;
        const UNSORTED = 0x0003;
        const SORT_BY_MASK = 0x0003;
        const DIRS_FIRST = 0x0004;
        const REVERSED = 0x0008;
        const IGNORE_CASE = 0x0010;
        const DIRS_LAST = 0x0020;
        const LOCALE_AWARE = 0x0040;
        const TYPE = 0x0080;
    }
}

/// A compiled list of wildcard patterns (`*`, `?`, `[...]`).
///
/// An empty list, or one containing `*`, matches every name. Patterns that fail to
/// compile are skipped.
#[derive(Debug, Clone)]
pub struct NameFilter {
    matchers: Vec<GlobMatcher>,
    match_all: bool,
}

impl NameFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S], case_sensitive: bool) -> Self {
        let match_all = patterns.is_empty() || patterns.iter().any(|p| p.as_ref() == "*");
        let mut matchers = Vec::new();
        if !match_all {
            for pattern in patterns {
                let pattern = pattern.as_ref();
                let glob = GlobBuilder::new(pattern)
                    .case_insensitive(!case_sensitive)
                    .literal_separator(true)
                    .backslash_escape(false)
                    .build();
                match glob {
                    Ok(glob) => matchers.push(glob.compile_matcher()),
                    Err(err) => log::warn!("ignoring name filter {pattern:?}: {err}"),
                }
            }
        }
        Self {
            matchers,
            match_all,
        }
    }

    pub fn is_match_all(&self) -> bool {
        self.match_all
    }

    pub fn matches(&self, file_name: &str) -> bool {
        self.match_all || self.matchers.iter().any(|m| m.is_match(file_name))
    }
}

/// Whether `file_name` matches any of the wildcard `filters`, ignoring case.
pub fn match_glob<S: AsRef<str>>(filters: &[S], file_name: &str) -> bool {
    NameFilter::new(filters, false).matches(file_name)
}

/// Splits `"*.h;*.cpp"` or `"*.h *.cpp"` into separate patterns.
///
/// `;` wins as the separator when present, otherwise spaces separate.
pub fn name_filters_from_string(filters: &str) -> Vec<String> {
    let sep = if filters.contains(';') { ';' } else { ' ' };
    filters
        .split(sep)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}
