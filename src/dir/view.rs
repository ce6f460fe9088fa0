use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;

use super::{
    DirFilters, DirListing, FileInfo, IteratorFlags, SortFlags, match_glob, name_filters_from_string,
    sort_file_infos,
};
use crate::core::{Result, utils};
use crate::engine::resolver::{self, resolve_entry};
use crate::engine::{FileEngine, FileFlags, FileName, MetaFlags, MetadataCache};
use crate::native::{NativeEngine, fill_metadata, filesystem};
use crate::path::{
    PathEntry, PathStyle, clean_path, from_native_separators, normalize_segments, to_native_separators,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct DirCache {
    initialized: bool,
    files: Vec<String>,
    infos: Vec<FileInfo>,
    absolute: Option<PathEntry>,
    metadata: MetadataCache,
}

impl DirCache {
    fn clear_lists(&mut self) {
        self.initialized = false;
        self.files.clear();
        self.infos.clear();
    }
}

struct DirData {
    entry: PathEntry,
    name_filters: Vec<String>,
    filters: DirFilters,
    sort: SortFlags,
    cache: Mutex<DirCache>,
    engine: Mutex<Option<Box<dyn FileEngine>>>,
}

impl DirData {
    fn new(path: &str, name_filters: Vec<String>, sort: SortFlags, filters: DirFilters) -> Self {
        let name_filters = if name_filters.iter().all(String::is_empty) {
            vec!["*".to_string()]
        } else {
            name_filters
        };
        let mut data = DirData {
            entry: PathEntry::default(),
            name_filters,
            filters,
            sort,
            cache: Mutex::new(DirCache::default()),
            engine: Mutex::new(None),
        };
        data.set_path(if path.is_empty() { "." } else { path });
        data
    }

    fn set_path(&mut self, path: &str) {
        let mut p = from_native_separators(path);
        if p.len() > 1 && p.ends_with('/') && !PathEntry::new(&p).is_root() {
            p.pop();
        }
        self.entry = PathEntry::from_internal(p);
        *self.cache.get_mut().unwrap_or_else(PoisonError::into_inner) = DirCache::default();
        let engine = resolve_entry(&mut self.entry);
        *self.engine.get_mut().unwrap_or_else(PoisonError::into_inner) = engine;
    }

    /// Drops listings, metadata and the cached absolute path; re-resolves the engine.
    fn clear_cache(&self) {
        *lock(&self.cache) = DirCache::default();
        let mut entry = self.entry.clone();
        *lock(&self.engine) = resolve_entry(&mut entry);
    }

    fn has_engine(&self) -> bool {
        lock(&self.engine).is_some()
    }

    fn engine_flags(&self, request: FileFlags) -> Option<FileFlags> {
        lock(&self.engine)
            .as_mut()
            .map(|engine| engine.file_flags(request))
    }

    fn engine_case_sensitive(&self) -> Option<bool> {
        lock(&self.engine).as_ref().map(|engine| engine.case_sensitive())
    }

    fn engine_name(&self, which: FileName) -> Option<String> {
        lock(&self.engine).as_ref().map(|engine| engine.file_name(which))
    }

    fn absolute_entry(&self) -> PathEntry {
        let mut cache = lock(&self.cache);
        if let Some(absolute) = &cache.absolute {
            return absolute.clone();
        }
        if self.entry.is_empty() {
            return PathEntry::default();
        }
        let absolute = match self.engine_name(FileName::Absolute) {
            Some(name) => PathEntry::from_internal(clean_path(&name)),
            None if self.entry.is_absolute() && self.entry.is_clean() => self.entry.clone(),
            None => PathEntry::from_internal(clean_path(
                filesystem::absolute_name(&self.entry).file_path(),
            )),
        };
        cache.absolute = Some(absolute.clone());
        absolute
    }

    fn exists(&self) -> bool {
        if let Some(flags) =
            self.engine_flags(FileFlags::DIRECTORY_TYPE | FileFlags::EXISTS_FLAG | FileFlags::REFRESH)
        {
            return flags.contains(FileFlags::DIRECTORY_TYPE | FileFlags::EXISTS_FLAG);
        }
        let mut cache = lock(&self.cache);
        fill_metadata(
            &self.entry,
            &mut cache.metadata,
            MetaFlags::EXISTS | MetaFlags::DIRECTORY_TYPE,
        );
        cache.metadata.exists() && cache.metadata.is_directory()
    }

    fn listing(&self, name_filters: &[String], filters: DirFilters) -> DirListing {
        DirListing::legacy(self.entry.file_path(), filters, IteratorFlags::empty())
            .name_filters(name_filters)
    }

    /// Fills the name and info lists once, sorted by the stored configuration.
    fn init_file_lists(&self) -> MutexGuard<'_, DirCache> {
        let mut cache = lock(&self.cache);
        if !cache.initialized {
            let infos: Vec<FileInfo> = self
                .listing(&self.name_filters, self.filters)
                .iter()
                .map(|entry| entry.into_file_info())
                .collect();
            let infos = sort_file_infos(infos, self.sort);
            cache.files = infos.iter().map(|i| i.file_name().to_string()).collect();
            cache.infos = infos;
            cache.initialized = true;
        }
        cache
    }
}

impl Clone for DirData {
    /// Copies the configuration; the copy starts with empty caches and its own engine.
    fn clone(&self) -> Self {
        let mut entry = self.entry.clone();
        let engine = resolve_entry(&mut entry);
        DirData {
            entry: self.entry.clone(),
            name_filters: self.name_filters.clone(),
            filters: self.filters,
            sort: self.sort,
            cache: Mutex::new(DirCache::default()),
            engine: Mutex::new(engine),
        }
    }
}

/// A directory and the way its contents are listed.
///
/// `Dir` is a cheap, shared handle: clones share the listing cache until one of them is
/// reconfigured, at which point that handle gets a private copy. The cache is guarded by
/// a mutex, so handles may be used from several threads.
///
/// Listings are cached by [`Dir::entry_list`], [`Dir::entry_info_list`], [`Dir::count`]
/// and [`Dir::get`]; every setter and [`Dir::refresh`] drops the cache.
///
/// ```no_run
/// use vfs_engine::dir::{Dir, DirFilters, SortFlags};
///
/// let mut dir = Dir::new("/etc");
/// dir.set_name_filters(&["*.conf"]);
/// dir.set_filter(DirFilters::FILES | DirFilters::NO_DOT_AND_DOT_DOT);
/// dir.set_sorting(SortFlags::SIZE);
/// for name in dir.entry_list() {
///     println!("{name}");
/// }
/// ```
#[derive(Clone)]
pub struct Dir {
    d: Arc<DirData>,
}

impl Default for Dir {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Dir {
    pub const DEFAULT_FILTERS: DirFilters = DirFilters::ALL_ENTRIES.union(DirFilters::NO_DOT_AND_DOT_DOT);
    pub const DEFAULT_SORT: SortFlags = SortFlags::NAME.union(SortFlags::IGNORE_CASE);

    /// An empty `path` means the working directory (`.`).
    pub fn new(path: &str) -> Self {
        Self::with_filters(path, "", Self::DEFAULT_SORT, Self::DEFAULT_FILTERS)
    }

    /// `name_filter` is split with [`name_filters_from_string`]; an empty one matches all.
    pub fn with_filters(path: &str, name_filter: &str, sort: SortFlags, filters: DirFilters) -> Self {
        Self {
            d: Arc::new(DirData::new(
                path,
                name_filters_from_string(name_filter),
                sort,
                filters,
            )),
        }
    }

    fn data_mut(&mut self) -> &mut DirData {
        Arc::make_mut(&mut self.d)
    }

    pub fn path(&self) -> &str {
        self.d.entry.file_path()
    }

    pub fn set_path(&mut self, path: &str) {
        self.data_mut().set_path(path);
    }

    pub fn absolute_path(&self) -> String {
        self.d.absolute_entry().file_path().to_string()
    }

    /// Symlink-free absolute path; empty when the directory does not exist.
    pub fn canonical_path(&self) -> String {
        self.d.engine_name(FileName::Canonical).unwrap_or_else(|| {
            filesystem::canonical_name(&self.d.entry)
                .map(|c| c.file_path().to_string())
                .unwrap_or_default()
        })
    }

    /// The last segment of the path.
    pub fn dir_name(&self) -> &str {
        self.d.entry.file_name()
    }

    pub fn file_path(&self, file_name: &str) -> String {
        if treat_as_absolute(file_name) {
            return file_name.to_string();
        }
        let dir = self.d.entry.file_path();
        if file_name.is_empty() {
            return dir.to_string();
        }
        if dir.is_empty() || dir.ends_with('/') {
            format!("{dir}{file_name}")
        } else {
            format!("{dir}/{file_name}")
        }
    }

    pub fn absolute_file_path(&self, file_name: &str) -> String {
        if treat_as_absolute(file_name) {
            return file_name.to_string();
        }
        let dir = self.absolute_path();
        if file_name.is_empty() {
            dir
        } else if dir.ends_with('/') {
            format!("{dir}{file_name}")
        } else {
            format!("{dir}/{file_name}")
        }
    }

    /// `file_name` expressed relative to this directory, `.` for the directory itself.
    ///
    /// Relative input is returned cleaned but otherwise untouched.
    pub fn relative_file_path(&self, file_name: &str) -> String {
        let dir = clean_path(&self.absolute_path());
        let file = clean_path(file_name);
        if PathEntry::new(&file).is_relative() || PathEntry::new(&dir).is_relative() {
            return file;
        }
        let style = PathStyle::native();
        if style.has_drive(&dir) && style.has_drive(&file) && !dir[..2].eq_ignore_ascii_case(&file[..2]) {
            return file;
        }

        let mut dir_parts = dir.split('/').filter(|s| !s.is_empty()).peekable();
        let mut file_parts = file.split('/').filter(|s| !s.is_empty()).peekable();
        while let (Some(d), Some(f)) = (dir_parts.peek(), file_parts.peek()) {
            if !same_text(d, f, case_sensitive()) {
                break;
            }
            dir_parts.next();
            file_parts.next();
        }

        let mut parts: Vec<&str> = dir_parts.map(|_| "..").collect();
        parts.extend(file_parts);
        if parts.is_empty() {
            ".".to_string()
        } else {
            parts.join("/")
        }
    }

    /// Changes to `dir_name`. Returns false, leaving this `Dir` unchanged, when the
    /// target is not an existing directory or would ascend above the root.
    pub fn cd(&mut self, dir_name: &str) -> bool {
        if dir_name.is_empty() || dir_name == "." {
            return true;
        }
        let new_path = if FileInfo::new(dir_name).is_absolute() {
            clean_path(dir_name)
        } else {
            let current = self.d.entry.file_path();
            let mut path = current.to_string();
            if !path.ends_with('/') {
                path.push('/');
            }
            path.push_str(dir_name);
            if dir_name.contains('/') || dir_name == ".." || current == "." {
                let (normalized, ok) = normalize_segments(&path, PathStyle::native());
                if !ok {
                    log::debug!("cd: {path} ascends above the root");
                    return false;
                }
                path = normalized;
                // a leading ".." would let cd_up() walk forever
                if path.starts_with("..") {
                    path = FileInfo::new(&path).absolute_file_path();
                }
            }
            path
        };

        let mut data = (*self.d).clone();
        data.set_path(&new_path);
        if !data.exists() {
            return false;
        }
        self.d = Arc::new(data);
        true
    }

    pub fn cd_up(&mut self) -> bool {
        self.cd("..")
    }

    pub fn exists(&self) -> bool {
        self.d.exists()
    }

    /// Whether `name` (relative to this directory, or absolute) exists.
    pub fn exists_entry(&self, name: &str) -> bool {
        if name.is_empty() {
            log::warn!("exists_entry: empty file name");
            return false;
        }
        FileInfo::new(self.file_path(name)).exists()
    }

    pub fn is_root(&self) -> bool {
        match self.d.engine_flags(FileFlags::ROOT_FLAG) {
            Some(flags) => flags.contains(FileFlags::ROOT_FLAG),
            None => self.d.entry.is_root(),
        }
    }

    pub fn is_readable(&self) -> bool {
        if let Some(flags) = self.d.engine_flags(FileFlags::DIRECTORY_TYPE | FileFlags::PERMS_MASK) {
            return flags.contains(FileFlags::DIRECTORY_TYPE) && flags.contains(FileFlags::READ_USER_PERM);
        }
        let mut cache = lock(&self.d.cache);
        if !cache.metadata.has_flags(MetaFlags::USER_READ) {
            fill_metadata(&self.d.entry, &mut cache.metadata, MetaFlags::USER_PERMISSIONS);
        }
        cache.metadata.permissions().contains(MetaFlags::USER_READ)
    }

    pub fn is_relative(&self) -> bool {
        match lock(&self.d.engine).as_ref() {
            Some(engine) => engine.is_relative_path(),
            None => self.d.entry.is_relative(),
        }
    }

    pub fn is_absolute(&self) -> bool {
        !self.is_relative()
    }

    /// Replaces the path with its absolute form. Fails when the backend has none.
    pub fn make_absolute(&mut self) -> bool {
        let absolute = match self.d.engine_name(FileName::Absolute) {
            Some(name) => {
                if FileInfo::new(&name).is_relative() {
                    return false;
                }
                name
            }
            None => self.absolute_path(),
        };
        self.set_path(&absolute);
        true
    }

    /// True when nothing but `.` and `..` would be listed.
    pub fn is_empty(&self) -> bool {
        self.is_empty_with(Self::DEFAULT_FILTERS)
    }

    pub fn is_empty_with(&self, filters: DirFilters) -> bool {
        self.d
            .listing(&self.d.name_filters, filters)
            .iter()
            .next()
            .is_none()
    }

    fn with_engine<R>(&self, op: impl FnOnce(&mut dyn FileEngine) -> R) -> R {
        let mut guard = lock(&self.d.engine);
        match guard.as_mut() {
            Some(engine) => op(engine.as_mut()),
            None => op(&mut NativeEngine::new(self.d.entry.clone())),
        }
    }

    fn make_dir(&self, op: &str, name: &str, create_parents: bool) -> Result<()> {
        if name.is_empty() {
            log::warn!("{op}: empty or null file name");
            return Err(anyhow!("invalid path: empty"));
        }
        let path = self.file_path(name);
        self.with_engine(|engine| engine.mkdir(&path, create_parents, None))?;
        Ok(())
    }

    fn remove_dir(&self, op: &str, name: &str, remove_parents: bool) -> Result<()> {
        if name.is_empty() {
            log::warn!("{op}: empty or null file name");
            return Err(anyhow!("invalid path: empty"));
        }
        let path = self.file_path(name);
        self.with_engine(|engine| engine.rmdir(&path, remove_parents))?;
        Ok(())
    }

    /// Creates the subdirectory `dir_name`; its parent must exist.
    pub fn mkdir(&self, dir_name: &str) -> Result<()> {
        self.make_dir("mkdir", dir_name, false)
    }

    /// Creates `dir_path` together with every missing parent. An existing directory is
    /// not an error.
    pub fn mkpath(&self, dir_path: &str) -> Result<()> {
        self.make_dir("mkpath", dir_path, true)
    }

    /// Removes the empty directory `dir_name`.
    pub fn rmdir(&self, dir_name: &str) -> Result<()> {
        self.remove_dir("rmdir", dir_name, false)
    }

    /// Removes `dir_path` and then each parent that became empty.
    pub fn rmpath(&self, dir_path: &str) -> Result<()> {
        self.remove_dir("rmpath", dir_path, true)
    }

    /// Removes the file `file_name`.
    pub fn remove(&self, file_name: &str) -> Result<()> {
        if file_name.is_empty() {
            log::warn!("remove: empty or null file name");
            return Err(anyhow!("invalid path: empty"));
        }
        resolver::create(&self.file_path(file_name)).remove()?;
        Ok(())
    }

    /// Renames `old_name` to `new_name`; an existing target is not replaced.
    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<()> {
        if old_name.is_empty() || new_name.is_empty() {
            log::warn!("rename: empty or null file name(s)");
            return Err(anyhow!("invalid path: empty"));
        }
        let source = self.file_path(old_name);
        if !FileInfo::new(&source).exists() {
            return Err(anyhow!("{source} does not exist"));
        }
        resolver::create(&source).rename(&self.file_path(new_name))?;
        Ok(())
    }

    /// Deletes the directory with everything in it. Symlinks are removed, not followed.
    ///
    /// A missing directory counts as removed. Entries that cannot be deleted are skipped
    /// and reported in the returned error once the rest is gone.
    pub fn remove_recursively(&self) -> Result<()> {
        if !self.exists() {
            return Ok(());
        }
        let listing = DirListing::new(self.path()).flags(IteratorFlags::INCLUDE_HIDDEN);
        let mut failed = Vec::new();
        for entry in &listing {
            let path = entry.file_path().to_string();
            let result = if entry.is_dir() && !entry.is_symlink() {
                Dir::new(&path).remove_recursively()
            } else {
                resolver::create(&path).remove().map_err(anyhow::Error::from)
            };
            if let Err(err) = result {
                log::warn!("remove_recursively: cannot remove {path}: {err}");
                failed.push(path);
            }
        }
        if !failed.is_empty() {
            return Err(anyhow!("cannot remove: {}", failed.join(", ")));
        }
        self.rmdir(&self.absolute_path())
    }

    /// Forgets cached listings and metadata.
    pub fn refresh(&self) {
        self.d.clear_cache();
    }

    /// Number of entries in the cached listing.
    pub fn count(&self) -> usize {
        self.d.init_file_lists().files.len()
    }

    /// The name at `index` in the cached listing.
    pub fn get(&self, index: usize) -> Option<String> {
        self.d.init_file_lists().files.get(index).cloned()
    }

    pub fn name_filters(&self) -> &[String] {
        &self.d.name_filters
    }

    pub fn set_name_filters<S: AsRef<str>>(&mut self, filters: &[S]) {
        let d = self.data_mut();
        d.name_filters = filters.iter().map(|f| f.as_ref().to_string()).collect();
        lock(&d.cache).clear_lists();
    }

    pub fn filter(&self) -> DirFilters {
        self.d.filters
    }

    pub fn set_filter(&mut self, filters: DirFilters) {
        let d = self.data_mut();
        d.filters = filters;
        lock(&d.cache).clear_lists();
    }

    pub fn sorting(&self) -> SortFlags {
        self.d.sort
    }

    pub fn set_sorting(&mut self, sort: SortFlags) {
        let d = self.data_mut();
        d.sort = sort;
        lock(&d.cache).clear_lists();
    }

    /// Entry names with the stored filters and sorting.
    pub fn entry_list(&self) -> Vec<String> {
        self.entry_list_with(None, None, None)
    }

    /// Entry names, overriding any of name filters, filters and sorting.
    ///
    /// The shared cache is used (and filled) only when the effective configuration is
    /// the stored one; other combinations are listed on the fly.
    pub fn entry_list_with(
        &self,
        name_filters: Option<&[String]>,
        filters: Option<DirFilters>,
        sort: Option<SortFlags>,
    ) -> Vec<String> {
        let (name_filters, filters, sort) = self.effective(name_filters, filters, sort);
        let needs_sorting = (sort & SortFlags::SORT_BY_MASK) != SortFlags::UNSORTED;
        if self.is_stored(name_filters, filters, sort) {
            let initialized = lock(&self.d.cache).initialized;
            if needs_sorting || initialized {
                return self.d.init_file_lists().files.clone();
            }
        }

        let listing = self.d.listing(name_filters, filters);
        if needs_sorting {
            let infos = listing.iter().map(|e| e.into_file_info()).collect();
            sort_file_infos(infos, sort)
                .iter()
                .map(|i| i.file_name().to_string())
                .collect()
        } else {
            listing.iter().map(|e| e.file_name().to_string()).collect()
        }
    }

    pub fn entry_info_list(&self) -> Vec<FileInfo> {
        self.entry_info_list_with(None, None, None)
    }

    pub fn entry_info_list_with(
        &self,
        name_filters: Option<&[String]>,
        filters: Option<DirFilters>,
        sort: Option<SortFlags>,
    ) -> Vec<FileInfo> {
        let (name_filters, filters, sort) = self.effective(name_filters, filters, sort);
        if self.is_stored(name_filters, filters, sort) {
            return self.d.init_file_lists().infos.clone();
        }
        let infos = self
            .d
            .listing(name_filters, filters)
            .iter()
            .map(|e| e.into_file_info())
            .collect();
        sort_file_infos(infos, sort)
    }

    fn effective<'a>(
        &'a self,
        name_filters: Option<&'a [String]>,
        filters: Option<DirFilters>,
        sort: Option<SortFlags>,
    ) -> (&'a [String], DirFilters, SortFlags) {
        (
            name_filters.unwrap_or(self.d.name_filters.as_slice()),
            filters.unwrap_or(self.d.filters),
            sort.unwrap_or(self.d.sort),
        )
    }

    fn is_stored(&self, name_filters: &[String], filters: DirFilters, sort: SortFlags) -> bool {
        filters == self.d.filters && sort == self.d.sort && name_filters == self.d.name_filters.as_slice()
    }

    /// The working directory of the process.
    pub fn current() -> Result<Dir> {
        Ok(Dir::new(&Self::current_path()?))
    }

    pub fn current_path() -> Result<String> {
        utils::current_path()
    }

    pub fn set_current(path: &str) -> Result<()> {
        utils::set_current_path(&to_native_separators(path))
    }

    pub fn home() -> Dir {
        Dir::new(&Self::home_path())
    }

    pub fn home_path() -> String {
        utils::home_path()
    }

    pub fn temp() -> Dir {
        Dir::new(&Self::temp_path())
    }

    pub fn temp_path() -> String {
        utils::temp_path()
    }

    pub fn root() -> Dir {
        Dir::new(&Self::root_path())
    }

    pub fn root_path() -> String {
        utils::root_path()
    }

    pub fn drives() -> Vec<FileInfo> {
        utils::drives().iter().map(FileInfo::new).collect()
    }

    pub fn separator() -> char {
        crate::path::separator()
    }

    /// Whether `file_name` matches one of the wildcard `filters`, ignoring case.
    pub fn matches<S: AsRef<str>>(filters: &[S], file_name: &str) -> bool {
        match_glob(filters, file_name)
    }
}

fn case_sensitive() -> bool {
    !cfg!(any(windows, target_os = "macos"))
}

/// Absolute paths, and prefixed paths a backend declares absolute, are not joined.
fn treat_as_absolute(path: &str) -> bool {
    (path.contains(':') && FileInfo::new(path).is_absolute()) || PathEntry::new(path).is_absolute()
}

fn same_text(a: &str, b: &str, sensitive: bool) -> bool {
    if sensitive {
        a == b
    } else {
        a.to_lowercase() == b.to_lowercase()
    }
}

impl PartialEq for Dir {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.d, &other.d) {
            return true;
        }
        // one engine lock at a time
        let mine = self.d.engine_case_sensitive();
        let theirs = other.d.engine_case_sensitive();
        let sensitive = match (mine, theirs) {
            (None, None) => case_sensitive(),
            (Some(a), Some(b)) if a == b => a,
            _ => return false,
        };

        if self.d.filters != other.d.filters
            || self.d.sort != other.d.sort
            || self.d.name_filters != other.d.name_filters
        {
            return false;
        }
        if self.path() == other.path() {
            return true;
        }
        match (self.exists(), other.exists()) {
            (true, true) => same_text(&self.canonical_path(), &other.canonical_path(), sensitive),
            (false, false) => same_text(&self.absolute_path(), &other.absolute_path(), sensitive),
            _ => false,
        }
    }
}

impl fmt::Debug for Dir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dir")
            .field("path", &self.path())
            .field("name_filters", &self.d.name_filters)
            .field("filters", &self.d.filters)
            .field("sort", &self.d.sort)
            .field("custom", &self.d.has_engine())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempdir::TempDir;

    fn setup_test_env() -> TempDir {
        let tmp = TempDir::new("dir_test").unwrap();
        let root = tmp.path();
        fs::write(root.join("b.txt"), b"bb").unwrap();
        fs::write(root.join("a.txt"), b"aaaa").unwrap();
        fs::write(root.join("C.md"), b"c").unwrap();
        fs::write(root.join(".hidden"), b"").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/d.txt"), b"").unwrap();
        tmp
    }

    fn dir_of(tmp: &TempDir) -> Dir {
        Dir::new(tmp.path().to_str().unwrap())
    }

    mod paths {
        use super::*;

        #[test]
        fn test_construction_normalizes_path() {
            assert_eq!(Dir::new("").path(), ".");
            assert_eq!(Dir::new("/usr/lib/").path(), "/usr/lib");
            assert_eq!(Dir::new("/").path(), "/");
            assert_eq!(Dir::new("/usr/lib").dir_name(), "lib");
            assert_eq!(Dir::new("x").name_filters(), ["*"]);
        }

        #[test]
        fn test_file_path_joins_unless_absolute() {
            let dir = Dir::new("/srv/data");
            assert_eq!(dir.file_path("a.txt"), "/srv/data/a.txt");
            assert_eq!(dir.file_path(""), "/srv/data");
            assert_eq!(dir.file_path("/etc/hosts"), "/etc/hosts");
            assert_eq!(Dir::new("/").file_path("etc"), "/etc");
            assert_eq!(dir.absolute_file_path("x/y"), "/srv/data/x/y");
        }

        #[test]
        fn test_relative_file_path() {
            let dir = Dir::new("/home/bob");
            assert_eq!(dir.relative_file_path("/home/bob/images/a.png"), "images/a.png");
            assert_eq!(dir.relative_file_path("/home/alice/notes"), "../alice/notes");
            assert_eq!(dir.relative_file_path("/home/bob"), ".");
            assert_eq!(dir.relative_file_path("/"), "../..");
            assert_eq!(dir.relative_file_path("rel/./x"), "rel/x");
        }

        #[test]
        fn test_absolute_and_relative() {
            let dir = Dir::new("some/where");
            assert!(dir.is_relative());
            assert!(dir.absolute_path().ends_with("/some/where"));

            let mut dir = dir;
            assert!(dir.make_absolute());
            assert!(dir.is_absolute());
            assert!(dir.path().ends_with("/some/where"));
        }

        #[test]
        fn test_cd_and_cd_up() {
            let tmp = setup_test_env();
            let mut dir = dir_of(&tmp);
            assert!(dir.cd("sub"));
            assert_eq!(dir.dir_name(), "sub");
            assert!(!dir.cd("missing"));
            assert_eq!(dir.dir_name(), "sub");
            assert!(dir.cd_up());
            assert_eq!(dir.path(), tmp.path().to_str().unwrap());
            assert!(dir.cd("."));
            assert!(dir.cd("sub/../sub"));
            assert_eq!(dir.dir_name(), "sub");
        }

        #[test]
        fn test_cd_above_root_fails() {
            let mut dir = Dir::new("/");
            assert!(!dir.cd_up());
            assert!(!dir.cd("../.."));
            assert_eq!(dir.path(), "/");
            assert!(dir.is_root());
        }

        #[test]
        fn test_cd_up_from_relative_becomes_absolute() {
            let mut dir = Dir::new(".");
            assert!(dir.cd_up());
            assert!(dir.is_absolute());
        }
    }

    mod listing {
        use super::*;

        #[test]
        fn test_count_matches_visible_entries() {
            let tmp = setup_test_env();
            let dir = dir_of(&tmp);
            assert_eq!(dir.count(), 4);
            assert_eq!(dir.entry_list(), ["a.txt", "b.txt", "C.md", "sub"]);
            assert_eq!(dir.get(3).as_deref(), Some("sub"));
            assert_eq!(dir.get(4), None);
        }

        #[test]
        fn test_overrides_do_not_touch_stored_config() {
            let tmp = setup_test_env();
            let dir = dir_of(&tmp);
            let txt = ["*.txt".to_string()];
            assert_eq!(
                dir.entry_list_with(Some(&txt[..]), None, Some(SortFlags::SIZE)),
                ["a.txt", "b.txt"]
            );
            assert_eq!(
                dir.entry_list_with(None, Some(DirFilters::DIRS | DirFilters::NO_DOT_AND_DOT_DOT), None),
                ["sub"]
            );
            let with_hidden = dir.entry_list_with(None, Some(Dir::DEFAULT_FILTERS | DirFilters::HIDDEN), None);
            assert!(with_hidden.contains(&".hidden".to_string()));
            assert_eq!(dir.count(), 4);
        }

        #[test]
        fn test_setters_invalidate_cache() {
            let tmp = setup_test_env();
            let mut dir = dir_of(&tmp);
            assert_eq!(dir.count(), 4);

            dir.set_name_filters(&["*.txt"]);
            assert_eq!(dir.entry_list(), ["a.txt", "b.txt"]);

            dir.set_sorting(SortFlags::NAME | SortFlags::REVERSED);
            assert_eq!(dir.entry_list(), ["b.txt", "a.txt"]);

            dir.set_filter(DirFilters::DIRS | DirFilters::NO_DOT_AND_DOT_DOT);
            assert!(dir.entry_list().is_empty());

            dir.set_name_filters(&["*"]);
            dir.set_path(tmp.path().join("sub").to_str().unwrap());
            dir.set_filter(Dir::DEFAULT_FILTERS);
            assert_eq!(dir.entry_list(), ["d.txt"]);
        }

        #[test]
        fn test_refresh_sees_new_files() {
            let tmp = setup_test_env();
            let dir = dir_of(&tmp);
            assert_eq!(dir.count(), 4);
            fs::write(tmp.path().join("e.txt"), b"").unwrap();
            assert_eq!(dir.count(), 4);
            dir.refresh();
            assert_eq!(dir.count(), 5);
        }

        #[test]
        fn test_clones_share_until_reconfigured() {
            let tmp = setup_test_env();
            let dir = dir_of(&tmp);
            let mut copy = dir.clone();
            assert_eq!(copy, dir);
            copy.set_name_filters(&["*.md"]);
            assert_eq!(copy.entry_list(), ["C.md"]);
            assert_eq!(dir.count(), 4);
            assert_ne!(copy, dir);
        }

        #[test]
        fn test_shared_handle_across_threads() {
            let tmp = setup_test_env();
            let dir = dir_of(&tmp);
            std::thread::scope(|scope| {
                for _ in 0..2 {
                    let handle = dir.clone();
                    scope.spawn(move || {
                        for _ in 0..50 {
                            assert_eq!(handle.count(), 4);
                            handle.refresh();
                            assert_eq!(handle.entry_list().len(), 4);
                        }
                    });
                }
            });
            assert_eq!(dir.count(), 4);
        }

        #[test]
        fn test_info_list_is_sorted() {
            let tmp = setup_test_env();
            let dir = Dir::with_filters(
                tmp.path().to_str().unwrap(),
                "*.txt;*.md",
                SortFlags::SIZE,
                DirFilters::FILES,
            );
            let names: Vec<String> = dir
                .entry_info_list()
                .iter()
                .map(|i| i.file_name().to_string())
                .collect();
            assert_eq!(names, ["a.txt", "b.txt", "C.md"]);
        }

        #[test]
        fn test_is_empty() {
            let tmp = setup_test_env();
            let empty = tmp.path().join("empty");
            fs::create_dir(&empty).unwrap();
            assert!(Dir::new(empty.to_str().unwrap()).is_empty());
            assert!(!dir_of(&tmp).is_empty());
            assert!(!Dir::new(empty.to_str().unwrap()).is_empty_with(DirFilters::ALL_ENTRIES));
        }
    }

    mod operations {
        use super::*;

        #[test]
        fn test_mkdir_rmdir() -> Result<()> {
            let tmp = setup_test_env();
            let dir = dir_of(&tmp);
            dir.mkdir("new")?;
            assert!(dir.exists_entry("new"));
            assert!(dir.mkdir("new").is_err());
            assert!(dir.mkdir("x/y").is_err());
            dir.rmdir("new")?;
            assert!(!dir.exists_entry("new"));
            assert!(dir.rmdir("sub").is_err());
            Ok(())
        }

        #[test]
        fn test_mkpath_rmpath() -> Result<()> {
            let tmp = setup_test_env();
            let dir = dir_of(&tmp);
            dir.mkpath("p/q/r")?;
            dir.mkpath("p/q/r")?;
            assert!(dir.exists_entry("p/q/r"));
            dir.rmpath("p/q/r")?;
            assert!(!dir.exists_entry("p"));
            assert!(dir.exists());
            Ok(())
        }

        #[test]
        fn test_empty_names_are_rejected() {
            let dir = Dir::new("/tmp");
            assert!(dir.mkdir("").is_err());
            assert!(dir.mkpath("").is_err());
            assert!(dir.rmdir("").is_err());
            assert!(dir.rmpath("").is_err());
            assert!(dir.remove("").is_err());
            assert!(dir.rename("", "x").is_err());
            assert!(!dir.exists_entry(""));
        }

        #[test]
        fn test_remove_and_rename() -> Result<()> {
            let tmp = setup_test_env();
            let dir = dir_of(&tmp);
            dir.rename("a.txt", "z.txt")?;
            assert!(dir.exists_entry("z.txt"));
            assert!(dir.rename("z.txt", "b.txt").is_err());
            assert!(dir.rename("nope", "x").is_err());
            dir.remove("z.txt")?;
            assert!(!dir.exists_entry("z.txt"));
            assert!(dir.remove("z.txt").is_err());
            Ok(())
        }

        #[test]
        fn test_remove_recursively() -> Result<()> {
            let tmp = setup_test_env();
            let dir = dir_of(&tmp);
            dir.mkpath("sub/deep/er")?;
            fs::write(tmp.path().join("sub/deep/.dot"), b"")?;
            let sub = Dir::new(&dir.file_path("sub"));
            sub.remove_recursively()?;
            assert!(!sub.exists());
            assert!(dir.exists());
            sub.remove_recursively()?;
            Ok(())
        }

        #[test]
        fn test_equality() {
            let tmp = setup_test_env();
            let a = dir_of(&tmp);
            let b = Dir::new(&format!("{}/sub/..", tmp.path().to_str().unwrap()));
            assert_eq!(a, b);
            let mut c = a.clone();
            c.set_filter(DirFilters::FILES);
            assert_ne!(a, c);
            assert_ne!(Dir::new("/no/such/a"), Dir::new("/no/such/b"));
            assert_eq!(Dir::new("/no/such/a"), Dir::new("/no/such/./a"));
        }

        #[test]
        fn test_equality_from_both_sides_concurrently() {
            let tmp = setup_test_env();
            let a = dir_of(&tmp);
            let b = Dir::new(&format!("{}/sub/..", tmp.path().to_str().unwrap()));
            std::thread::scope(|scope| {
                let (a1, b1) = (a.clone(), b.clone());
                let forward = scope.spawn(move || (0..200).all(|_| a1 == b1));
                let (a2, b2) = (a.clone(), b.clone());
                let reverse = scope.spawn(move || (0..200).all(|_| b2 == a2));
                assert!(forward.join().unwrap());
                assert!(reverse.join().unwrap());
            });
        }
    }

    mod statics {
        use super::*;

        #[test]
        fn test_well_known_dirs() -> Result<()> {
            assert!(Dir::current()?.exists());
            assert!(Dir::root().is_root());
            assert!(Dir::temp().exists());
            assert!(!Dir::home_path().is_empty());
            assert!(!Dir::drives().is_empty());
            assert!(!Dir::current_path()?.is_empty());
            Ok(())
        }

        #[test]
        fn test_matches() {
            assert!(Dir::matches(&["*.cpp", "*.h"], "Main.CPP"));
            assert!(!Dir::matches(&["*.cpp"], "main.c"));
            assert_eq!(Dir::separator(), crate::path::separator());
        }
    }

    mod memory_backend {
        use super::*;
        use crate::vfs::MemoryFs;

        #[test]
        fn test_dir_over_mounted_tree() -> Result<()> {
            let fs = MemoryFs::new();
            fs.mkfile("/docs/b.txt", Some(b"bb"))?;
            fs.mkfile("/docs/a.txt", Some(b"a"))?;
            let _mount = fs.mount("dirmem:");

            let mut dir = Dir::new("dirmem:/docs");
            assert!(dir.exists());
            assert!(dir.is_absolute());
            assert_eq!(dir.entry_list(), ["a.txt", "b.txt"]);

            dir.mkdir("sub")?;
            assert!(fs.is_dir("/docs/sub")?);
            assert!(dir.cd("sub"));
            assert_eq!(dir.path(), "dirmem:/docs/sub");
            assert!(dir.cd_up());

            dir.refresh();
            assert_eq!(dir.count(), 3);
            dir.rename("a.txt", "c.txt")?;
            dir.remove("b.txt")?;
            dir.refresh();
            assert_eq!(dir.entry_list(), ["c.txt", "sub"]);

            Dir::new("dirmem:/docs").remove_recursively()?;
            assert!(!fs.exists("/docs"));
            Ok(())
        }
    }
}
