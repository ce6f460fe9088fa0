use std::fmt;
use std::io;

use thiserror::Error;

/// Kind of the last failure recorded by a file engine.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum FileErrorKind {
    #[default]
    NoError,
    Read,
    Write,
    Fatal,
    Resource,
    Open,
    Abort,
    Timeout,
    Unspecified,
    Remove,
    Rename,
    Position,
    Resize,
    Permissions,
    Copy,
}

impl fmt::Display for FileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileErrorKind::NoError => "no error",
            FileErrorKind::Read => "read error",
            FileErrorKind::Write => "write error",
            FileErrorKind::Fatal => "fatal error",
            FileErrorKind::Resource => "resource error",
            FileErrorKind::Open => "open error",
            FileErrorKind::Abort => "aborted",
            FileErrorKind::Timeout => "timeout",
            FileErrorKind::Unspecified => "unspecified error",
            FileErrorKind::Remove => "remove error",
            FileErrorKind::Rename => "rename error",
            FileErrorKind::Position => "position error",
            FileErrorKind::Resize => "resize error",
            FileErrorKind::Permissions => "permissions error",
            FileErrorKind::Copy => "copy error",
        };
        f.write_str(name)
    }
}

/// A failure reported by a file engine: the kind plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FileError {
    kind: FileErrorKind,
    message: String,
}

impl FileError {
    pub fn new<S: Into<String>>(kind: FileErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Builds an error of `kind` carrying the OS description of `err`.
    pub fn from_io(kind: FileErrorKind, err: &io::Error) -> Self {
        // `ErrorKind::OutOfMemory`/too many open files map onto resource exhaustion.
        let kind = match err.raw_os_error() {
            #[cfg(unix)]
            Some(code) if code == libc::EMFILE || code == libc::ENFILE || code == libc::ENOMEM => {
                FileErrorKind::Resource
            }
            _ if err.kind() == io::ErrorKind::OutOfMemory => FileErrorKind::Resource,
            _ => kind,
        };
        Self::new(kind, err.to_string())
    }

    pub fn unsupported() -> Self {
        Self::new(FileErrorKind::Unspecified, "Not supported")
    }

    pub fn kind(&self) -> FileErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type EngineResult<T> = std::result::Result<T, FileError>;

/// The `(kind, message)` pair every engine keeps about its last failure.
///
/// Failing engine operations record here *and* return `Err`, so callers that
/// only got a falsy answer (e.g. from `file_flags`) can still ask why.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorState {
    kind: FileErrorKind,
    message: String,
}

impl ErrorState {
    pub fn kind(&self) -> FileErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_set(&self) -> bool {
        self.kind != FileErrorKind::NoError
    }

    /// Records the failure and hands it back for `Err(..)`.
    pub fn set<S: Into<String>>(&mut self, kind: FileErrorKind, message: S) -> FileError {
        let err = FileError::new(kind, message);
        self.record(&err)
    }

    pub fn set_io(&mut self, kind: FileErrorKind, err: &io::Error) -> FileError {
        let err = FileError::from_io(kind, err);
        self.record(&err)
    }

    pub fn record(&mut self, err: &FileError) -> FileError {
        self.kind = err.kind;
        self.message = err.message.clone();
        err.clone()
    }

    pub fn unset(&mut self) {
        self.kind = FileErrorKind::NoError;
        self.message.clear();
    }
}
