//! The file-engine contract every filesystem backend implements.
//!
//! A [`FileEngine`] represents one addressable filesystem object, which may or may not be
//! open yet. The native backend lives in [`crate::native`]; custom backends (such as the
//! in-memory [`crate::vfs::MemoryFs`]) are plugged in through [`resolver`].

mod iterator;
pub mod metadata;
pub mod resolver;

use std::fs::File;
use std::ptr::NonNull;
use std::time::SystemTime;

use bitflags::bitflags;

use crate::core::{EngineResult, ErrorState, FileError, FileErrorKind};
use crate::dir::DirFilters;

pub use iterator::EntryIterator;
pub use metadata::{FileTime, MetaFlags, MetadataCache};

bitflags! {
    /// Combined type/permission/attribute query for [`FileEngine::file_flags`].
    ///
    /// The value packs three independent sub-masks: [`FileFlags::PERMS_MASK`],
    /// [`FileFlags::TYPES_MASK`] and [`FileFlags::FLAGS_MASK`]. `REFRESH` is not an
    /// attribute and belongs to none of them; it asks the engine to drop cached metadata
    /// before answering.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct FileFlags: u32 {
        const EXE_OTHER_PERM = 0x0001;
        const WRITE_OTHER_PERM = 0x0002;
        const READ_OTHER_PERM = 0x0004;
        const EXE_GROUP_PERM = 0x0010;
        const WRITE_GROUP_PERM = 0x0020;
        const READ_GROUP_PERM = 0x0040;
        const EXE_USER_PERM = 0x0100;
        const WRITE_USER_PERM = 0x0200;
        const READ_USER_PERM = 0x0400;
        const EXE_OWNER_PERM = 0x1000;
        const WRITE_OWNER_PERM = 0x2000;
        const READ_OWNER_PERM = 0x4000;

        const LINK_TYPE = 0x0001_0000;
        const FILE_TYPE = 0x0002_0000;
        const DIRECTORY_TYPE = 0x0004_0000;
        const BUNDLE_TYPE = 0x0008_0000;

        const HIDDEN_FLAG = 0x0010_0000;
        const LOCAL_DISK_FLAG = 0x0020_0000;
        const EXISTS_FLAG = 0x0040_0000;
        const ROOT_FLAG = 0x0080_0000;
        const REFRESH = 0x0100_0000;

        const PERMS_MASK = 0x0000_FFFF;
        const TYPES_MASK = 0x000F_0000;
        const FLAGS_MASK = 0x00F0_0000;
        const FILE_INFO_ALL = Self::FLAGS_MASK.bits() | Self::PERMS_MASK.bits() | Self::TYPES_MASK.bits();
    }
}

impl FileFlags {
    /// Permission bits share their layout with [`MetaFlags`].
    pub fn from_permissions(perms: MetaFlags) -> Self {
        FileFlags::from_bits_truncate(perms.bits() & FileFlags::PERMS_MASK.bits())
    }

    pub fn permissions(self) -> MetaFlags {
        MetaFlags::from_bits_truncate(self.bits() & MetaFlags::PERMISSIONS.bits())
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct OpenMode: u32 {
        const READ_ONLY = 0x0001;
        const WRITE_ONLY = 0x0002;
        const READ_WRITE = Self::READ_ONLY.bits() | Self::WRITE_ONLY.bits();
        const APPEND = 0x0004;
        const TRUNCATE = 0x0008;
        const TEXT = 0x0010;
        const UNBUFFERED = 0x0020;
        const NEW_ONLY = 0x0040;
        const EXISTING_ONLY = 0x0080;
    }
}

impl OpenMode {
    pub fn is_readable(self) -> bool {
        self.contains(OpenMode::READ_ONLY)
    }

    pub fn is_writable(self) -> bool {
        self.contains(OpenMode::WRITE_ONLY) || self.contains(OpenMode::APPEND)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MapFlags: u32 {
        /// Copy-on-write mapping; writes never reach the file.
        const PRIVATE = 0x0001;
    }
}

/// Which representation [`FileEngine::file_name`] returns.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FileName {
    Default,
    Base,
    Path,
    Absolute,
    AbsolutePath,
    AbsoluteLinkTarget,
    Canonical,
    CanonicalPath,
    Bundle,
    Junction,
    RawLinkPath,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FileOwner {
    User,
    Group,
}

/// Backend-specific operations that do not warrant dedicated trait methods.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Extension {
    /// Is the read position at the end of the stream?
    AtEnd,
    /// Read one line (including the terminating `\n`) using the engine's own buffering.
    FastReadLine { max_len: usize },
    Map {
        offset: u64,
        size: usize,
        flags: MapFlags,
    },
    Unmap { address: NonNull<u8> },
}

impl Extension {
    pub fn kind(&self) -> ExtensionKind {
        match self {
            Extension::AtEnd => ExtensionKind::AtEnd,
            Extension::FastReadLine { .. } => ExtensionKind::FastReadLine,
            Extension::Map { .. } => ExtensionKind::Map,
            Extension::Unmap { .. } => ExtensionKind::Unmap,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ExtensionKind {
    AtEnd,
    FastReadLine,
    Map,
    Unmap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionOutput {
    AtEnd(bool),
    Line(Vec<u8>),
    Mapped(NonNull<u8>),
    Unmapped,
}

fn unsupported<T>(state: &mut ErrorState) -> EngineResult<T> {
    Err(state.record(&FileError::unsupported()))
}

/// The polymorphic contract of a filesystem backend.
///
/// Fallible operations record `(kind, message)` in the engine's [`ErrorState`] and return
/// `Err` with the same pair. Default implementations report "Not supported", so a backend
/// implements only the capabilities it has.
pub trait FileEngine: Send {
    fn error_state(&self) -> &ErrorState;
    fn error_state_mut(&mut self) -> &mut ErrorState;

    /// The last recorded failure.
    fn error(&self) -> FileErrorKind {
        self.error_state().kind()
    }

    fn error_string(&self) -> &str {
        self.error_state().message()
    }

    /// Re-targets the engine at `file_name`. An open file is closed first.
    fn set_file_name(&mut self, file_name: &str);

    fn file_name(&self, which: FileName) -> String;

    /// Answers the requested subset of `request`. Bits that are not set in the result are
    /// either false or could not be determined.
    fn file_flags(&mut self, request: FileFlags) -> FileFlags;

    fn open(&mut self, _mode: OpenMode, _permissions: Option<MetaFlags>) -> EngineResult<()> {
        unsupported(self.error_state_mut())
    }

    fn close(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn flush(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn sync_to_disk(&mut self) -> EngineResult<()> {
        self.flush()
    }

    fn size(&mut self) -> u64 {
        0
    }

    fn pos(&self) -> u64 {
        0
    }

    fn seek(&mut self, _pos: u64) -> EngineResult<()> {
        unsupported(self.error_state_mut())
    }

    fn is_sequential(&mut self) -> bool {
        false
    }

    fn read(&mut self, _buf: &mut [u8]) -> EngineResult<usize> {
        unsupported(self.error_state_mut())
    }

    /// Reads up to `buf.len()` bytes, stopping after the first `\n`.
    fn read_line(&mut self, buf: &mut [u8]) -> EngineResult<usize> {
        let mut read = 0;
        while read < buf.len() {
            let n = self.read(&mut buf[read..read + 1])?;
            if n == 0 {
                break;
            }
            read += 1;
            if buf[read - 1] == b'\n' {
                break;
            }
        }
        Ok(read)
    }

    fn write(&mut self, _buf: &[u8]) -> EngineResult<usize> {
        unsupported(self.error_state_mut())
    }

    fn set_size(&mut self, _size: u64) -> EngineResult<()> {
        unsupported(self.error_state_mut())
    }

    fn set_permissions(&mut self, _perms: MetaFlags) -> EngineResult<()> {
        unsupported(self.error_state_mut())
    }

    fn owner_id(&mut self, _owner: FileOwner) -> Option<u32> {
        None
    }

    fn owner(&mut self, _owner: FileOwner) -> String {
        String::new()
    }

    fn file_time(&mut self, _which: FileTime) -> Option<SystemTime> {
        None
    }

    fn set_file_time(&mut self, _time: SystemTime, _which: FileTime) -> EngineResult<()> {
        unsupported(self.error_state_mut())
    }

    fn case_sensitive(&self) -> bool {
        true
    }

    fn is_relative_path(&self) -> bool {
        false
    }

    fn remove(&mut self) -> EngineResult<()> {
        unsupported(self.error_state_mut())
    }

    fn copy(&mut self, _new_name: &str) -> EngineResult<()> {
        unsupported(self.error_state_mut())
    }

    /// Renames without replacing an existing target.
    fn rename(&mut self, _new_name: &str) -> EngineResult<()> {
        unsupported(self.error_state_mut())
    }

    fn rename_overwrite(&mut self, _new_name: &str) -> EngineResult<()> {
        unsupported(self.error_state_mut())
    }

    /// Creates a symbolic link named `new_name` pointing at this engine's path.
    fn link(&mut self, _new_name: &str) -> EngineResult<()> {
        unsupported(self.error_state_mut())
    }

    fn mkdir(
        &self,
        _dir_name: &str,
        _create_parents: bool,
        _permissions: Option<MetaFlags>,
    ) -> EngineResult<()> {
        Err(FileError::unsupported())
    }

    fn rmdir(&self, _dir_name: &str, _remove_empty_parents: bool) -> EngineResult<()> {
        Err(FileError::unsupported())
    }

    /// Starts listing the directory at `path`; `None` when the backend cannot list it.
    fn begin_entry_list(
        &mut self,
        _path: &str,
        _filters: DirFilters,
        _name_filters: &[String],
    ) -> Option<Box<dyn EntryIterator>> {
        None
    }

    fn supports_extension(&self, _kind: ExtensionKind) -> bool {
        false
    }

    /// Runs a backend-specific operation. Unsupported extensions are a no-op that
    /// returns `None` without touching the error state.
    fn extension(&mut self, _ext: Extension) -> Option<ExtensionOutput> {
        None
    }

    /// Maps `size` bytes starting at `offset` into memory.
    fn map(&mut self, offset: u64, size: usize, flags: MapFlags) -> Option<NonNull<u8>> {
        match self.extension(Extension::Map {
            offset,
            size,
            flags,
        }) {
            Some(ExtensionOutput::Mapped(ptr)) => Some(ptr),
            _ => None,
        }
    }

    /// Releases a mapping returned by [`FileEngine::map`].
    fn unmap(&mut self, address: NonNull<u8>) -> bool {
        matches!(
            self.extension(Extension::Unmap { address }),
            Some(ExtensionOutput::Unmapped)
        )
    }

    /// The host file behind an open engine, if the backend has one.
    fn handle(&self) -> Option<&File> {
        None
    }

    /// `None` when the backend cannot tell.
    fn at_end(&mut self) -> Option<bool> {
        if !self.supports_extension(ExtensionKind::AtEnd) {
            return None;
        }
        match self.extension(Extension::AtEnd) {
            Some(ExtensionOutput::AtEnd(at_end)) => Some(at_end),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BareEngine {
        name: String,
        error: ErrorState,
    }

    impl FileEngine for BareEngine {
        fn error_state(&self) -> &ErrorState {
            &self.error
        }

        fn error_state_mut(&mut self) -> &mut ErrorState {
            &mut self.error
        }

        fn set_file_name(&mut self, file_name: &str) {
            self.name = file_name.to_string();
        }

        fn file_name(&self, _which: FileName) -> String {
            self.name.clone()
        }

        fn file_flags(&mut self, _request: FileFlags) -> FileFlags {
            FileFlags::empty()
        }
    }

    #[test]
    fn test_defaults_report_not_supported() {
        let mut engine = BareEngine {
            name: "x".into(),
            error: ErrorState::default(),
        };
        let err = engine.open(OpenMode::READ_ONLY, None).unwrap_err();
        assert_eq!(err.kind(), FileErrorKind::Unspecified);
        assert_eq!(engine.error(), FileErrorKind::Unspecified);
        assert_eq!(engine.error_string(), "Not supported");
        assert!(engine.rename("y").is_err());
    }

    #[test]
    fn test_unsupported_extension_is_a_no_op() {
        let mut engine = BareEngine {
            name: "x".into(),
            error: ErrorState::default(),
        };
        assert!(!engine.supports_extension(ExtensionKind::Map));
        assert!(engine.extension(Extension::AtEnd).is_none());
        assert!(engine.map(0, 16, MapFlags::empty()).is_none());
        assert_eq!(engine.at_end(), None);
        assert_eq!(engine.error(), FileErrorKind::NoError);
    }

    #[test]
    fn test_flag_layouts_line_up() {
        assert_eq!(FileFlags::READ_OWNER_PERM.bits(), MetaFlags::OWNER_READ.bits());
        assert_eq!(FileFlags::EXE_OTHER_PERM.bits(), MetaFlags::OTHER_EXECUTE.bits());
        assert_eq!(
            FileFlags::from_permissions(MetaFlags::USER_READ | MetaFlags::HIDDEN),
            FileFlags::READ_USER_PERM
        );
        assert!(OpenMode::READ_WRITE.is_readable());
        assert!(OpenMode::APPEND.is_writable());
    }

    #[test]
    fn test_query_masks_do_not_refresh() {
        assert!(!FileFlags::FLAGS_MASK.contains(FileFlags::REFRESH));
        assert!(!FileFlags::FILE_INFO_ALL.intersects(FileFlags::REFRESH));
        assert!(FileFlags::FLAGS_MASK.contains(
            FileFlags::HIDDEN_FLAG | FileFlags::LOCAL_DISK_FLAG | FileFlags::EXISTS_FLAG | FileFlags::ROOT_FLAG
        ));
    }
}
