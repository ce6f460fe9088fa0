use std::ffi::{OsStr, OsString};
use std::fmt;
use std::sync::OnceLock;

use super::{PathStyle, from_native_separators, is_clean, to_native_separators};

/// A single filesystem path with lazily derived parts.
///
/// The path is held in its universal form (`/` separators) and/or its native encoded form.
/// Only one of them is set at construction; the other is computed on first access and
/// memoized. Offsets of the last separator and of the first/last dot of the file name are
/// memoized too: an unset cell means "not computed yet", `None` means "computed, absent".
#[derive(Clone)]
pub struct PathEntry {
    file_path: OnceLock<String>,
    native_path: OnceLock<OsString>,
    last_separator: OnceLock<Option<usize>>,
    dots: OnceLock<NameDots>,
    style: PathStyle,
}

/// Dot positions inside the file name (byte offsets relative to the name start).
#[derive(Debug, Copy, Clone, Default)]
struct NameDots {
    first: Option<usize>,
    last: Option<usize>,
}

impl PathEntry {
    /// Creates an entry from a user-supplied path that may mix separators.
    pub fn new<S: AsRef<str>>(path: S) -> Self {
        Self::from_internal(from_native_separators(path.as_ref()))
    }

    /// Creates an entry from a path that already uses `/` separators.
    pub fn from_internal<S: Into<String>>(path: S) -> Self {
        Self::with_style(path, PathStyle::native())
    }

    /// Creates an entry from an internal-format path interpreted with `style` rules.
    pub fn with_style<S: Into<String>>(path: S, style: PathStyle) -> Self {
        let entry = Self::empty(style);
        let _ = entry.file_path.set(path.into());
        entry
    }

    /// Creates an entry from a native encoded path (as returned by the OS).
    pub fn from_native<S: Into<OsString>>(path: S) -> Self {
        let entry = Self::empty(PathStyle::native());
        let _ = entry.native_path.set(path.into());
        entry
    }

    fn empty(style: PathStyle) -> Self {
        Self {
            file_path: OnceLock::new(),
            native_path: OnceLock::new(),
            last_separator: OnceLock::new(),
            dots: OnceLock::new(),
            style,
        }
    }

    pub fn style(&self) -> PathStyle {
        self.style
    }

    /// The universal form of the path.
    pub fn file_path(&self) -> &str {
        self.file_path.get_or_init(|| {
            let native = self.native_path.get().map(|p| p.to_string_lossy());
            from_native_separators(native.as_deref().unwrap_or_default())
        })
    }

    /// The native encoded form of the path.
    pub fn native_file_path(&self) -> &OsStr {
        self.native_path
            .get_or_init(|| OsString::from(to_native_separators(self.file_path())))
    }

    pub fn is_empty(&self) -> bool {
        match self.native_path.get() {
            Some(native) if self.file_path.get().is_none() => native.is_empty(),
            _ => self.file_path().is_empty(),
        }
    }

    fn last_separator(&self) -> Option<usize> {
        *self.last_separator.get_or_init(|| self.file_path().rfind('/'))
    }

    /// Byte offset where the file name starts.
    fn name_start(&self) -> usize {
        match self.last_separator() {
            Some(idx) => idx + 1,
            None if self.style.has_drive(self.file_path()) => 2,
            None => 0,
        }
    }

    fn dots(&self) -> NameDots {
        *self.dots.get_or_init(|| {
            // Backward scan over the file name, recording the last dot first and moving
            // the first-dot mark every time another dot shows up further left.
            let name = self.file_name().as_bytes();
            let mut dots = NameDots::default();
            for (i, &c) in name.iter().enumerate().rev() {
                if c == b'.' {
                    if dots.last.is_none() {
                        dots.last = Some(i);
                    }
                    dots.first = Some(i);
                }
            }
            dots
        })
    }

    /// The last path component (`file.tar.gz` for `/tmp/file.tar.gz`).
    pub fn file_name(&self) -> &str {
        &self.file_path()[self.name_start()..]
    }

    /// The directory part: `.` when there is no separator, `/` for top-level entries.
    pub fn path(&self) -> &str {
        let fp = self.file_path();
        match self.last_separator() {
            None if self.style.has_drive(fp) => &fp[..2],
            None => ".",
            Some(0) => "/",
            Some(2) if self.style.has_drive(fp) => &fp[..3],
            Some(idx) => &fp[..idx],
        }
    }

    /// The file name up to (not including) the first dot.
    pub fn base_name(&self) -> &str {
        let name = self.file_name();
        match self.dots().first {
            Some(first) => &name[..first],
            None => name,
        }
    }

    /// The file name up to (not including) the last dot.
    pub fn complete_base_name(&self) -> &str {
        let name = self.file_name();
        match self.dots().last {
            Some(last) => &name[..last],
            None => name,
        }
    }

    /// The part after the last dot (`gz` for `file.tar.gz`, `bashrc` for `.bashrc`).
    pub fn suffix(&self) -> &str {
        let name = self.file_name();
        match self.dots().last {
            Some(last) => &name[last + 1..],
            None => "",
        }
    }

    /// The part after the first dot (`tar.gz` for `file.tar.gz`).
    pub fn complete_suffix(&self) -> &str {
        let name = self.file_name();
        match self.dots().first {
            Some(first) => &name[first + 1..],
            None => "",
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.style.is_absolute(self.file_path())
    }

    pub fn is_relative(&self) -> bool {
        !self.is_absolute()
    }

    pub fn is_clean(&self) -> bool {
        is_clean(self.file_path())
    }

    pub fn is_root(&self) -> bool {
        self.style.is_root(self.file_path())
    }

    pub fn is_drive_root(&self) -> bool {
        self.style.is_drive_root(self.file_path())
    }

    /// Appends `name` below this entry.
    pub fn join(&self, name: &str) -> PathEntry {
        let fp = self.file_path();
        let joined = if fp.is_empty() || fp.ends_with('/') {
            format!("{fp}{name}")
        } else {
            format!("{fp}/{name}")
        };
        PathEntry::with_style(joined, self.style)
    }
}

impl Default for PathEntry {
    fn default() -> Self {
        Self::from_internal(String::new())
    }
}

impl PartialEq for PathEntry {
    fn eq(&self, other: &Self) -> bool {
        self.file_path() == other.file_path()
    }
}

impl Eq for PathEntry {}

impl fmt::Debug for PathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathEntry").field(&self.file_path()).finish()
    }
}

impl fmt::Display for PathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_path())
    }
}

impl From<&str> for PathEntry {
    fn from(path: &str) -> Self {
        PathEntry::new(path)
    }
}
