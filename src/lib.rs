//! A virtual file system engine for Rust.
//! Puts real and pseudo file systems behind one pluggable file-engine contract and builds
//! path handling, metadata and directory listing on top of it.
//!
//! ### Overview
//!
//! Every path is served by a [`FileEngine`]. Host paths go to the [`NativeEngine`];
//! custom backends register an [`engine::resolver::EngineHandler`] and claim the paths
//! they understand, such as the in-memory [`vfs::MemoryFs`] mounted under a prefix.
//!
//! **Key ideas**:
//! - **Pluggable backends**: the resolver consults registered handlers before falling back
//!   to the host filesystem; registrations are dropped with their guard.
//! - **Lexical paths**: [`clean_path`] and [`path::PathEntry`] work on `/`-separated
//!   strings and never touch the disk.
//! - **Lazy metadata**: [`dir::FileInfo`] stats only what it is asked for and caches it.
//! - **Lazy listing**: [`dir::DirListing`] walks a tree on demand, optionally recursing
//!   and following symlinks without looping.
//! - **Cached views**: [`dir::Dir`] keeps a sorted, filtered listing shared between
//!   cheap clones.

pub mod core;
pub mod dir;
pub mod engine;
pub mod native;
pub mod path;
pub mod vfs;

pub use crate::core::{EngineResult, FileError, FileErrorKind, Result};
pub use dir::{Dir, DirListing, FileInfo};
pub use engine::{FileEngine, FileFlags, FileName, OpenMode};
pub use native::NativeEngine;
pub use path::{PathEntry, clean_path};
