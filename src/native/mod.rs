//! The [`FileEngine`] for the host operating system's filesystem.

mod dir_iter;
mod fill;
pub mod filesystem;
mod mmap;

use std::collections::HashMap;
use std::fs::{self, File, FileTimes, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::mem;
use std::ptr::NonNull;
use std::time::SystemTime;

use crate::core::{EngineResult, ErrorState, FileError, FileErrorKind};
use crate::dir::DirFilters;
use crate::engine::{
    EntryIterator, Extension, ExtensionKind, ExtensionOutput, FileEngine, FileFlags, FileName,
    FileOwner, FileTime, MapFlags, MetaFlags, MetadataCache, OpenMode,
};
use crate::path::PathEntry;

pub use dir_iter::{NativeDirEntry, NativeDirIterator, NativeEntryIterator};
pub use fill::fill_metadata;

use mmap::MapRegion;

const PERMISSION_DENIED: &str = "Permission denied";
const INVALID_ARGUMENT: &str = "Invalid argument";

/// The OS handle an engine holds, if any.
enum Handle {
    Closed,
    Raw(File),
    /// Read-only stream with user-space buffering.
    Buffered(BufReader<File>),
}

impl Handle {
    fn file(&self) -> Option<&File> {
        match self {
            Handle::Closed => None,
            Handle::Raw(file) => Some(file),
            Handle::Buffered(reader) => Some(reader.get_ref()),
        }
    }

    fn is_open(&self) -> bool {
        !matches!(self, Handle::Closed)
    }
}

/// Engine for paths on the host filesystem.
///
/// Holds at most one open handle: a buffered stream for read-only opens, a raw
/// descriptor otherwise. Metadata is cached in a [`MetadataCache`] and filled on demand;
/// with an open handle the descriptor is stat-ed first and the path only for what the
/// descriptor could not answer.
///
/// ```no_run
/// use vfs_engine::{FileEngine, NativeEngine, OpenMode, PathEntry};
///
/// let mut engine = NativeEngine::new(PathEntry::new("/etc/hostname"));
/// engine.open(OpenMode::READ_ONLY, None).unwrap();
/// let mut buf = [0u8; 64];
/// let n = engine.read_line(&mut buf).unwrap();
/// println!("{}", String::from_utf8_lossy(&buf[..n]));
/// ```
pub struct NativeEngine {
    entry: PathEntry,
    metadata: MetadataCache,
    handle: Handle,
    open_mode: OpenMode,
    pos: u64,
    /// Mapped address handed out -> region parameters needed to release it.
    maps: HashMap<usize, MapRegion>,
    error: ErrorState,
}

impl NativeEngine {
    pub fn new(entry: PathEntry) -> Self {
        Self {
            entry,
            metadata: MetadataCache::new(),
            handle: Handle::Closed,
            open_mode: OpenMode::empty(),
            pos: 0,
            maps: HashMap::new(),
            error: ErrorState::default(),
        }
    }

    /// Adopts an already open file. The engine has no path; name queries return empty
    /// strings and metadata comes from the descriptor only.
    pub fn from_file(file: File, mode: OpenMode) -> Self {
        let mut engine = Self::new(PathEntry::default());
        let pos = (&file).stream_position().unwrap_or(0);
        engine.handle = Self::wrap(file, mode);
        engine.open_mode = mode;
        engine.pos = pos;
        engine
    }

    fn wrap(file: File, mode: OpenMode) -> Handle {
        if mode.is_readable() && !mode.is_writable() && !mode.contains(OpenMode::UNBUFFERED) {
            Handle::Buffered(BufReader::new(file))
        } else {
            Handle::Raw(file)
        }
    }

    pub fn entry(&self) -> &PathEntry {
        &self.entry
    }

    pub fn metadata(&self) -> &MetadataCache {
        &self.metadata
    }

    pub fn open_mode(&self) -> OpenMode {
        self.open_mode
    }

    /// Makes sure `flags` are known, preferring the open descriptor over the path.
    /// Returns whether the entry exists.
    fn do_stat(&mut self, flags: MetaFlags) -> bool {
        if self.metadata.missing_flags(flags).is_empty() {
            return self.metadata.exists();
        }

        if let Some(file) = self.handle.file() {
            match file.metadata() {
                Ok(meta) => {
                    self.metadata.fill_from_metadata(&meta);
                    if !self.entry.is_empty() {
                        self.metadata.fill_hidden_from_name(self.entry.file_name());
                    }
                }
                Err(err) => log::trace!("fstat on {} failed: {err}", self.entry),
            }
        }

        let missing = self.metadata.missing_flags(flags);
        if !missing.is_empty() && !self.entry.is_empty() {
            fill_metadata(&self.entry, &mut self.metadata, missing);
        }
        self.metadata.exists()
    }

    fn open_options(mode: OpenMode) -> OpenOptions {
        let mut options = OpenOptions::new();
        let writable = mode.is_writable();
        options.read(mode.is_readable());
        options.write(mode.contains(OpenMode::WRITE_ONLY));
        if mode.contains(OpenMode::APPEND) {
            options.append(true);
        }
        if writable {
            let implied_truncate = !mode.is_readable()
                && !mode.intersects(
                    OpenMode::APPEND | OpenMode::NEW_ONLY | OpenMode::EXISTING_ONLY,
                );
            if mode.contains(OpenMode::TRUNCATE) || implied_truncate {
                options.truncate(true);
            }
            if mode.contains(OpenMode::NEW_ONLY) {
                options.create_new(true);
            } else if !mode.contains(OpenMode::EXISTING_ONLY) {
                options.create(true);
            }
        }
        options
    }

    fn fast_read_line(&mut self, max_len: usize) -> EngineResult<Vec<u8>> {
        let Handle::Buffered(reader) = &mut self.handle else {
            return Err(self.error.set(FileErrorKind::Read, "File not open for buffered reading"));
        };
        let mut line = Vec::new();
        while line.len() < max_len {
            let available = match reader.fill_buf() {
                Ok(available) => available,
                Err(err) => return Err(self.error.set_io(FileErrorKind::Read, &err)),
            };
            if available.is_empty() {
                break;
            }
            let chunk = &available[..available.len().min(max_len - line.len())];
            let (take, done) = match chunk.iter().position(|&c| c == b'\n') {
                Some(i) => (i + 1, true),
                None => (chunk.len(), false),
            };
            line.extend_from_slice(&chunk[..take]);
            reader.consume(take);
            if done {
                break;
            }
        }
        self.pos += line.len() as u64;
        Ok(line)
    }

    fn map_region(&mut self, offset: u64, size: usize, flags: MapFlags) -> EngineResult<NonNull<u8>> {
        if !self.handle.is_open() {
            return Err(self.error.set(FileErrorKind::Permissions, PERMISSION_DENIED));
        }
        let in_range = offset
            .checked_add(size as u64)
            .is_some_and(|end| end <= i64::MAX as u64);
        if !in_range {
            return Err(self.error.set(FileErrorKind::Unspecified, INVALID_ARGUMENT));
        }

        self.metadata.clear_flags(MetaFlags::SIZE);
        if self.do_stat(MetaFlags::SIZE) && size as u64 > self.metadata.size().saturating_sub(offset) {
            log::warn!("mapping {} beyond its size is not portable", self.entry);
        }

        let Some(file) = self.handle.file() else {
            return Err(self.error.set(FileErrorKind::Permissions, PERMISSION_DENIED));
        };
        let mapped = mmap::map(
            file,
            offset,
            size,
            self.open_mode.is_readable(),
            self.open_mode.contains(OpenMode::WRITE_ONLY),
            flags.contains(MapFlags::PRIVATE),
        );
        match mapped {
            Ok((address, region)) => {
                self.maps.insert(address.as_ptr() as usize, region);
                Ok(address)
            }
            Err(err) => Err(self.error.record(&map_error(&err))),
        }
    }

    fn unmap_region(&mut self, address: NonNull<u8>) -> EngineResult<()> {
        let key = address.as_ptr() as usize;
        let Some(region) = self.maps.remove(&key) else {
            return Err(self.error.set(FileErrorKind::Permissions, PERMISSION_DENIED));
        };
        if let Err(err) = mmap::unmap(address, region) {
            self.maps.insert(key, region);
            return Err(self.error.set_io(FileErrorKind::Unspecified, &err));
        }
        Ok(())
    }

    fn unmap_all(&mut self) {
        for (key, region) in mem::take(&mut self.maps) {
            let Some(address) = NonNull::new(key as *mut u8) else {
                continue;
            };
            if let Err(err) = mmap::unmap(address, region) {
                log::warn!("failed to release mapping of {}: {err}", self.entry);
            }
        }
    }

}

fn map_error(err: &io::Error) -> FileError {
    #[cfg(unix)]
    match err.raw_os_error() {
        Some(libc::EBADF) | Some(libc::EACCES) => {
            return FileError::new(FileErrorKind::Permissions, PERMISSION_DENIED);
        }
        Some(libc::ENFILE) | Some(libc::ENOMEM) => {
            return FileError::from_io(FileErrorKind::Resource, err);
        }
        _ => {}
    }
    FileError::from_io(FileErrorKind::Unspecified, err)
}

impl Drop for NativeEngine {
    fn drop(&mut self) {
        self.unmap_all();
    }
}

impl FileEngine for NativeEngine {
    fn error_state(&self) -> &ErrorState {
        &self.error
    }

    fn error_state_mut(&mut self) -> &mut ErrorState {
        &mut self.error
    }

    fn set_file_name(&mut self, file_name: &str) {
        let _ = self.close();
        self.entry = PathEntry::new(file_name);
        self.metadata.clear();
    }

    fn file_name(&self, which: FileName) -> String {
        let entry = &self.entry;
        match which {
            FileName::Default => entry.file_path().to_string(),
            FileName::Base => entry.file_name().to_string(),
            FileName::Path => entry.path().to_string(),
            FileName::Absolute | FileName::AbsolutePath => {
                if entry.is_empty() {
                    return String::new();
                }
                let abs = if entry.is_absolute() && entry.is_clean() {
                    entry.clone()
                } else {
                    filesystem::absolute_name(entry)
                };
                if which == FileName::Absolute {
                    abs.file_path().to_string()
                } else {
                    abs.path().to_string()
                }
            }
            FileName::Canonical | FileName::CanonicalPath => {
                match filesystem::canonical_name(entry) {
                    Some(c) if which == FileName::Canonical => c.file_path().to_string(),
                    Some(c) => c.path().to_string(),
                    None => String::new(),
                }
            }
            FileName::AbsoluteLinkTarget => filesystem::link_target(entry)
                .map(|t| t.file_path().to_string())
                .unwrap_or_default(),
            FileName::RawLinkPath => filesystem::raw_link_path(entry).unwrap_or_default(),
            FileName::Bundle | FileName::Junction => String::new(),
        }
    }

    fn file_flags(&mut self, request: FileFlags) -> FileFlags {
        if request.contains(FileFlags::REFRESH) {
            self.metadata.clear();
        }

        let mut ret = FileFlags::empty();
        if request.intersects(FileFlags::FLAGS_MASK) {
            ret |= FileFlags::LOCAL_DISK_FLAG;
        }

        let mut query = request.permissions();
        if request.intersects(FileFlags::TYPES_MASK) {
            query |= MetaFlags::ALIAS_TYPE
                | MetaFlags::LINK_TYPE
                | MetaFlags::FILE_TYPE
                | MetaFlags::DIRECTORY_TYPE
                | MetaFlags::BUNDLE_TYPE
                | MetaFlags::WAS_DELETED;
        }
        if request.intersects(FileFlags::FLAGS_MASK) {
            query |= MetaFlags::HIDDEN | MetaFlags::EXISTS;
        } else if request.contains(FileFlags::EXISTS_FLAG) {
            query |= MetaFlags::WAS_DELETED;
        }
        query |= MetaFlags::LINK_TYPE;
        let exists = self.do_stat(query);

        if !exists && !self.metadata.is_link() {
            return ret;
        }

        if exists && request.intersects(FileFlags::PERMS_MASK) {
            ret |= FileFlags::from_permissions(self.metadata.permissions()) & request;
        }

        if request.intersects(FileFlags::TYPES_MASK) {
            if self.metadata.is_alias() {
                ret |= FileFlags::LINK_TYPE;
            } else {
                if request.contains(FileFlags::LINK_TYPE) && self.metadata.is_link() {
                    ret |= FileFlags::LINK_TYPE;
                }
                if exists {
                    if self.metadata.is_file() {
                        ret |= FileFlags::FILE_TYPE;
                    } else if self.metadata.is_directory() {
                        ret |= FileFlags::DIRECTORY_TYPE;
                        if request.contains(FileFlags::BUNDLE_TYPE) && self.metadata.is_bundle() {
                            ret |= FileFlags::BUNDLE_TYPE;
                        }
                    }
                }
            }
        }

        if request.intersects(FileFlags::FLAGS_MASK) {
            // a dangling link still has an inode of its own
            if !self.metadata.was_deleted() {
                ret |= FileFlags::EXISTS_FLAG;
            }
            if self.entry.is_root() {
                ret |= FileFlags::ROOT_FLAG;
            } else if self.metadata.is_hidden() {
                ret |= FileFlags::HIDDEN_FLAG;
            }
        }
        ret
    }

    #[cfg_attr(not(unix), allow(unused_variables))]
    fn open(&mut self, mode: OpenMode, permissions: Option<MetaFlags>) -> EngineResult<()> {
        if self.entry.is_empty() {
            log::warn!("open: no file name specified");
            return Err(self.error.set(FileErrorKind::Open, "No file name specified"));
        }
        if mode.contains(OpenMode::NEW_ONLY | OpenMode::EXISTING_ONLY) {
            log::warn!("open: NEW_ONLY and EXISTING_ONLY are mutually exclusive");
            return Err(self.error.set(
                FileErrorKind::Open,
                "NewOnly and ExistingOnly are mutually exclusive",
            ));
        }
        if self.handle.is_open() {
            let _ = self.close();
        }

        let mut options = Self::open_options(mode);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mode_bits = permissions.map_or(0o666, filesystem::mode_from_permissions);
            options.mode(mode_bits);
        }

        let file = match options.open(self.entry.native_file_path()) {
            Ok(file) => file,
            Err(err) => return Err(self.error.set_io(FileErrorKind::Open, &err)),
        };
        if file.metadata().is_ok_and(|m| m.is_dir()) {
            return Err(self.error.set(FileErrorKind::Open, "file to open is a directory"));
        }

        self.metadata.clear();
        self.pos = if mode.contains(OpenMode::APPEND) {
            (&file).seek(SeekFrom::End(0)).unwrap_or(0)
        } else {
            0
        };
        self.handle = Self::wrap(file, mode);
        self.open_mode = mode;
        self.error.unset();
        Ok(())
    }

    fn close(&mut self) -> EngineResult<()> {
        self.unmap_all();
        let handle = mem::replace(&mut self.handle, Handle::Closed);
        self.open_mode = OpenMode::empty();
        self.pos = 0;
        self.metadata.clear();
        if let Handle::Raw(mut file) = handle {
            if let Err(err) = file.flush() {
                return Err(self.error.set_io(FileErrorKind::Unspecified, &err));
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> EngineResult<()> {
        if let Handle::Raw(file) = &mut self.handle {
            if let Err(err) = file.flush() {
                return Err(self.error.set_io(FileErrorKind::Write, &err));
            }
        }
        Ok(())
    }

    fn sync_to_disk(&mut self) -> EngineResult<()> {
        self.flush()?;
        if let Handle::Raw(file) = &self.handle {
            if let Err(err) = file.sync_all() {
                return Err(self.error.set_io(FileErrorKind::Write, &err));
            }
        }
        Ok(())
    }

    fn size(&mut self) -> u64 {
        if self.handle.is_open() {
            self.metadata.clear_flags(MetaFlags::SIZE);
        }
        self.do_stat(MetaFlags::SIZE);
        self.metadata.size()
    }

    fn pos(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, pos: u64) -> EngineResult<()> {
        let result = match &mut self.handle {
            Handle::Raw(file) => file.seek(SeekFrom::Start(pos)),
            Handle::Buffered(reader) => reader.seek(SeekFrom::Start(pos)),
            Handle::Closed => {
                return Err(self.error.set(FileErrorKind::Position, "File not open"));
            }
        };
        match result {
            Ok(new_pos) => {
                self.pos = new_pos;
                Ok(())
            }
            Err(err) => Err(self.error.set_io(FileErrorKind::Position, &err)),
        }
    }

    fn is_sequential(&mut self) -> bool {
        self.do_stat(MetaFlags::SEQUENTIAL_TYPE);
        self.metadata.is_sequential()
    }

    fn read(&mut self, buf: &mut [u8]) -> EngineResult<usize> {
        let result = match &mut self.handle {
            Handle::Raw(file) => file.read(buf),
            Handle::Buffered(reader) => reader.read(buf),
            Handle::Closed => return Err(self.error.set(FileErrorKind::Read, "File not open")),
        };
        match result {
            Ok(n) => {
                self.pos += n as u64;
                Ok(n)
            }
            Err(err) => Err(self.error.set_io(FileErrorKind::Read, &err)),
        }
    }

    fn read_line(&mut self, buf: &mut [u8]) -> EngineResult<usize> {
        if matches!(self.handle, Handle::Buffered(_)) {
            let line = self.fast_read_line(buf.len())?;
            buf[..line.len()].copy_from_slice(&line);
            return Ok(line.len());
        }
        let mut read = 0;
        while read < buf.len() {
            if self.read(&mut buf[read..read + 1])? == 0 {
                break;
            }
            read += 1;
            if buf[read - 1] == b'\n' {
                break;
            }
        }
        Ok(read)
    }

    fn write(&mut self, buf: &[u8]) -> EngineResult<usize> {
        let Handle::Raw(file) = &mut self.handle else {
            return Err(self.error.set(FileErrorKind::Write, "File not open for writing"));
        };
        match file.write(buf) {
            Ok(n) => {
                self.pos = if self.open_mode.contains(OpenMode::APPEND) {
                    file.stream_position().unwrap_or(self.pos + n as u64)
                } else {
                    self.pos + n as u64
                };
                Ok(n)
            }
            Err(err) => Err(self.error.set_io(FileErrorKind::Write, &err)),
        }
    }

    fn set_size(&mut self, size: u64) -> EngineResult<()> {
        let result = match self.handle.file() {
            Some(file) => file.set_len(size),
            None => OpenOptions::new()
                .write(true)
                .open(self.entry.native_file_path())
                .and_then(|file| file.set_len(size)),
        };
        self.metadata.clear_flags(MetaFlags::SIZE);
        result.map_err(|err| self.error.set_io(FileErrorKind::Resize, &err))
    }

    fn set_permissions(&mut self, perms: MetaFlags) -> EngineResult<()> {
        #[cfg(unix)]
        let permissions = {
            use std::os::unix::fs::PermissionsExt;
            fs::Permissions::from_mode(filesystem::mode_from_permissions(perms))
        };
        #[cfg(not(unix))]
        let permissions = {
            let current = fs::metadata(self.entry.native_file_path())
                .map_err(|err| self.error.set_io(FileErrorKind::Permissions, &err))?;
            let mut p = current.permissions();
            p.set_readonly(!perms.intersects(MetaFlags::WRITE_PERMISSIONS));
            p
        };

        let result = match self.handle.file() {
            Some(file) => file.set_permissions(permissions),
            None => fs::set_permissions(self.entry.native_file_path(), permissions),
        };
        self.metadata.clear_flags(MetaFlags::PERMISSIONS);
        result.map_err(|err| self.error.set_io(FileErrorKind::Permissions, &err))
    }

    fn owner_id(&mut self, owner: FileOwner) -> Option<u32> {
        self.do_stat(MetaFlags::OWNER_IDS);
        match owner {
            FileOwner::User => self.metadata.user_id(),
            FileOwner::Group => self.metadata.group_id(),
        }
    }

    #[cfg_attr(not(unix), allow(unused_variables))]
    fn owner(&mut self, owner: FileOwner) -> String {
        #[cfg(unix)]
        {
            let name = match (owner, self.owner_id(owner)) {
                (FileOwner::User, Some(uid)) => filesystem::user_name(uid),
                (FileOwner::Group, Some(gid)) => filesystem::group_name(gid),
                _ => None,
            };
            name.unwrap_or_default()
        }
        #[cfg(not(unix))]
        String::new()
    }

    fn file_time(&mut self, which: FileTime) -> Option<SystemTime> {
        self.do_stat(which.flag());
        self.metadata.file_time(which)
    }

    fn set_file_time(&mut self, time: SystemTime, which: FileTime) -> EngineResult<()> {
        let Some(file) = self.handle.file() else {
            return Err(self.error.set(FileErrorKind::Permissions, PERMISSION_DENIED));
        };
        let times = match which {
            FileTime::Access => FileTimes::new().set_accessed(time),
            FileTime::Modification => FileTimes::new().set_modified(time),
            FileTime::Birth | FileTime::MetadataChange => {
                return Err(self.error.set(FileErrorKind::Permissions, INVALID_ARGUMENT));
            }
        };
        let result = file.set_times(times);
        self.metadata.clear_flags(MetaFlags::TIMES);
        result.map_err(|err| self.error.set_io(FileErrorKind::Permissions, &err))
    }

    fn case_sensitive(&self) -> bool {
        !cfg!(any(windows, target_os = "macos"))
    }

    fn is_relative_path(&self) -> bool {
        self.entry.is_relative()
    }

    fn remove(&mut self) -> EngineResult<()> {
        self.metadata.clear();
        filesystem::remove_file(&self.entry)
            .map_err(|err| self.error.set_io(FileErrorKind::Remove, &err))
    }

    fn copy(&mut self, new_name: &str) -> EngineResult<()> {
        let target = PathEntry::new(new_name);
        filesystem::copy_file(&self.entry, &target)
            .map_err(|err| self.error.set_io(FileErrorKind::Copy, &err))
    }

    fn rename(&mut self, new_name: &str) -> EngineResult<()> {
        let target = PathEntry::new(new_name);
        self.metadata.clear();
        filesystem::rename(&self.entry, &target)
            .map_err(|err| self.error.set_io(FileErrorKind::Rename, &err))
    }

    fn rename_overwrite(&mut self, new_name: &str) -> EngineResult<()> {
        let target = PathEntry::new(new_name);
        self.metadata.clear();
        filesystem::rename_overwrite(&self.entry, &target)
            .map_err(|err| self.error.set_io(FileErrorKind::Rename, &err))
    }

    fn link(&mut self, new_name: &str) -> EngineResult<()> {
        let link = PathEntry::new(new_name);
        filesystem::create_link(&self.entry, &link)
            .map_err(|err| self.error.set_io(FileErrorKind::Rename, &err))
    }

    fn mkdir(
        &self,
        dir_name: &str,
        create_parents: bool,
        permissions: Option<MetaFlags>,
    ) -> EngineResult<()> {
        filesystem::create_directory(&PathEntry::new(dir_name), create_parents, permissions)
            .map_err(|err| FileError::from_io(FileErrorKind::Unspecified, &err))
    }

    fn rmdir(&self, dir_name: &str, remove_empty_parents: bool) -> EngineResult<()> {
        filesystem::remove_directory(&PathEntry::new(dir_name), remove_empty_parents)
            .map_err(|err| FileError::from_io(FileErrorKind::Unspecified, &err))
    }

    fn begin_entry_list(
        &mut self,
        path: &str,
        _filters: DirFilters,
        _name_filters: &[String],
    ) -> Option<Box<dyn EntryIterator>> {
        match NativeEntryIterator::new(&PathEntry::new(path)) {
            Ok(it) => Some(Box::new(it)),
            Err(err) => {
                log::debug!("cannot list {path}: {err}");
                None
            }
        }
    }

    fn supports_extension(&self, kind: ExtensionKind) -> bool {
        match kind {
            ExtensionKind::AtEnd | ExtensionKind::FastReadLine => {
                matches!(self.handle, Handle::Buffered(_))
            }
            ExtensionKind::Map | ExtensionKind::Unmap => cfg!(unix),
        }
    }

    fn extension(&mut self, ext: Extension) -> Option<ExtensionOutput> {
        if !self.supports_extension(ext.kind()) {
            return None;
        }
        match ext {
            Extension::AtEnd => match &mut self.handle {
                Handle::Buffered(reader) => match reader.fill_buf() {
                    Ok(available) => Some(ExtensionOutput::AtEnd(available.is_empty())),
                    Err(err) => {
                        self.error.set_io(FileErrorKind::Read, &err);
                        None
                    }
                },
                _ => None,
            },
            Extension::FastReadLine { max_len } => {
                self.fast_read_line(max_len).ok().map(ExtensionOutput::Line)
            }
            Extension::Map {
                offset,
                size,
                flags,
            } => self
                .map_region(offset, size, flags)
                .ok()
                .map(ExtensionOutput::Mapped),
            Extension::Unmap { address } => self
                .unmap_region(address)
                .ok()
                .map(|_| ExtensionOutput::Unmapped),
        }
    }

    fn handle(&self) -> Option<&File> {
        self.handle.file()
    }
}
