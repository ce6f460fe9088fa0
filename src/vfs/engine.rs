use std::time::SystemTime;

use super::MemoryFs;
use super::memory_fs::{children, create_dirs, is_within, move_subtree, name_of, parent_of, remove_subtree};
use super::node::{Node, NodeType};
use crate::core::{EngineResult, ErrorState, FileError, FileErrorKind};
use crate::dir::{DirFilters, FileInfo};
use crate::engine::resolver::EngineHandler;
use crate::engine::{
    EntryIterator, Extension, ExtensionKind, ExtensionOutput, FileEngine, FileFlags, FileName,
    FileTime, MetaFlags, OpenMode,
};

const NO_SUCH_FILE: &str = "No such file or directory";
const FILE_EXISTS: &str = "Destination file exists";

const FILE_PERMS: FileFlags = FileFlags::READ_OWNER_PERM
    .union(FileFlags::WRITE_OWNER_PERM)
    .union(FileFlags::READ_USER_PERM)
    .union(FileFlags::WRITE_USER_PERM)
    .union(FileFlags::READ_GROUP_PERM)
    .union(FileFlags::READ_OTHER_PERM);

const DIR_PERMS: FileFlags = FILE_PERMS
    .union(FileFlags::EXE_OWNER_PERM)
    .union(FileFlags::EXE_USER_PERM)
    .union(FileFlags::EXE_GROUP_PERM)
    .union(FileFlags::EXE_OTHER_PERM);

/// Claims every name that starts with a mount prefix and serves it from a [`MemoryFs`].
pub struct MemoryHandler {
    fs: MemoryFs,
    prefix: String,
}

impl MemoryHandler {
    pub fn new(fs: MemoryFs, prefix: &str) -> Self {
        Self {
            fs,
            prefix: prefix.to_string(),
        }
    }
}

impl EngineHandler for MemoryHandler {
    fn create(&self, file_name: &str) -> Option<Box<dyn FileEngine>> {
        if !file_name.starts_with(&self.prefix) {
            return None;
        }
        Some(Box::new(MemoryEngine::new(
            self.fs.clone(),
            &self.prefix,
            file_name,
        )))
    }
}

/// Engine for one node of a mounted [`MemoryFs`].
///
/// Names look like `<prefix><inner path>`; the inner part is cleaned against the virtual
/// root, so `mem:docs/../a` and `mem:/a` address the same node. Reads and writes go
/// straight to the shared tree, without buffering.
pub struct MemoryEngine {
    fs: MemoryFs,
    prefix: String,
    file_name: String,
    inner: String,
    open_mode: Option<OpenMode>,
    pos: u64,
    error: ErrorState,
}

impl MemoryEngine {
    pub fn new(fs: MemoryFs, prefix: &str, file_name: &str) -> Self {
        let mut engine = Self {
            fs,
            prefix: prefix.to_string(),
            file_name: String::new(),
            inner: String::new(),
            open_mode: None,
            pos: 0,
            error: ErrorState::default(),
        };
        engine.set_file_name(file_name);
        engine
    }

    /// The node path inside the tree.
    pub fn inner_path(&self) -> &str {
        &self.inner
    }

    fn inner_of(&self, name: &str) -> Option<String> {
        name.strip_prefix(self.prefix.as_str()).map(MemoryFs::to_inner)
    }

    fn outer(&self, inner: &str) -> String {
        format!("{}{inner}", self.prefix)
    }

    fn node(&self) -> Option<Node> {
        self.fs.read_nodes().get(&self.inner).cloned()
    }

    fn is_open(&self) -> bool {
        self.open_mode.is_some()
    }

    /// Target of a copy or rename: must live in the same tree.
    fn target(&mut self, new_name: &str, kind: FileErrorKind) -> EngineResult<String> {
        match self.inner_of(new_name) {
            Some(inner) => Ok(inner),
            None => {
                log::warn!("{new_name} is outside the memory filesystem at {}", self.prefix);
                Err(self.error.set(kind, "Cannot move between filesystems"))
            }
        }
    }

    fn move_to(&mut self, new_name: &str, overwrite: bool) -> EngineResult<()> {
        let to = self.target(new_name, FileErrorKind::Rename)?;
        let from = self.inner.clone();
        let mut nodes = self.fs.write_nodes();

        let Some(source) = nodes.get(&from) else {
            return Err(self.error.set(FileErrorKind::Rename, NO_SUCH_FILE));
        };
        if from == "/" || (to != from && is_within(&to, &from)) {
            return Err(self.error.set(FileErrorKind::Rename, "Invalid argument"));
        }
        if !nodes.get(parent_of(&to)).is_some_and(Node::is_dir) {
            return Err(self.error.set(FileErrorKind::Rename, NO_SUCH_FILE));
        }
        if to == from {
            return Ok(());
        }
        if let Some(existing) = nodes.get(&to) {
            if !overwrite {
                return Err(self.error.set(FileErrorKind::Rename, FILE_EXISTS));
            }
            if existing.node_type() != source.node_type() {
                return Err(self.error.set(FileErrorKind::Rename, "Destination has a different type"));
            }
            remove_subtree(&mut nodes, &to);
        }
        move_subtree(&mut nodes, &from, &to);
        Ok(())
    }
}

impl FileEngine for MemoryEngine {
    fn error_state(&self) -> &ErrorState {
        &self.error
    }

    fn error_state_mut(&mut self) -> &mut ErrorState {
        &mut self.error
    }

    fn set_file_name(&mut self, file_name: &str) {
        let _ = self.close();
        self.file_name = file_name.to_string();
        self.inner = self
            .inner_of(file_name)
            .unwrap_or_else(|| MemoryFs::to_inner(file_name));
    }

    fn file_name(&self, which: FileName) -> String {
        match which {
            FileName::Default => self.file_name.clone(),
            FileName::Base => name_of(&self.inner).to_string(),
            FileName::Absolute | FileName::Canonical => self.outer(&self.inner),
            FileName::Path | FileName::AbsolutePath | FileName::CanonicalPath => {
                self.outer(parent_of(&self.inner))
            }
            FileName::AbsoluteLinkTarget
            | FileName::RawLinkPath
            | FileName::Bundle
            | FileName::Junction => String::new(),
        }
    }

    fn file_flags(&mut self, request: FileFlags) -> FileFlags {
        let Some(node) = self.node() else {
            return FileFlags::empty();
        };
        let mut ret = FileFlags::empty();
        if request.intersects(FileFlags::PERMS_MASK) {
            ret |= if node.is_dir() { DIR_PERMS } else { FILE_PERMS };
        }
        if request.intersects(FileFlags::TYPES_MASK) {
            ret |= match node.node_type() {
                NodeType::File => FileFlags::FILE_TYPE,
                NodeType::Directory => FileFlags::DIRECTORY_TYPE,
            };
        }
        if request.intersects(FileFlags::FLAGS_MASK) {
            ret |= FileFlags::EXISTS_FLAG;
            if self.inner == "/" {
                ret |= FileFlags::ROOT_FLAG;
            } else if name_of(&self.inner).starts_with('.') {
                ret |= FileFlags::HIDDEN_FLAG;
            }
        }
        ret & request
    }

    fn open(&mut self, mode: OpenMode, _permissions: Option<MetaFlags>) -> EngineResult<()> {
        if self.file_name.is_empty() {
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
        let _ = self.close();

        let writable = mode.is_writable();
        let mut nodes = self.fs.write_nodes();
        match nodes.get_mut(&self.inner) {
            Some(node) if node.is_dir() => {
                return Err(self.error.set(FileErrorKind::Open, "file to open is a directory"));
            }
            Some(_) if writable && mode.contains(OpenMode::NEW_ONLY) => {
                return Err(self.error.set(FileErrorKind::Open, "File exists"));
            }
            Some(node) => {
                let implied_truncate = writable
                    && !mode.is_readable()
                    && !mode.intersects(
                        OpenMode::APPEND | OpenMode::NEW_ONLY | OpenMode::EXISTING_ONLY,
                    );
                if writable && (mode.contains(OpenMode::TRUNCATE) || implied_truncate) {
                    node.resize(0);
                }
            }
            None => {
                if !writable || mode.contains(OpenMode::EXISTING_ONLY) {
                    return Err(self.error.set(FileErrorKind::Open, NO_SUCH_FILE));
                }
                if !nodes.get(parent_of(&self.inner)).is_some_and(Node::is_dir) {
                    return Err(self.error.set(FileErrorKind::Open, NO_SUCH_FILE));
                }
                nodes.insert(self.inner.clone(), Node::new(NodeType::File));
            }
        }
        let len = nodes.get(&self.inner).map_or(0, Node::len);
        drop(nodes);

        self.pos = if mode.contains(OpenMode::APPEND) { len } else { 0 };
        self.open_mode = Some(mode);
        self.error.unset();
        Ok(())
    }

    fn close(&mut self) -> EngineResult<()> {
        self.open_mode = None;
        self.pos = 0;
        Ok(())
    }

    fn size(&mut self) -> u64 {
        self.node().filter(Node::is_file).map_or(0, |n| n.len())
    }

    fn pos(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, pos: u64) -> EngineResult<()> {
        if !self.is_open() {
            return Err(self.error.set(FileErrorKind::Position, "File not open"));
        }
        self.pos = pos;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> EngineResult<usize> {
        if !self.open_mode.is_some_and(OpenMode::is_readable) {
            return Err(self.error.set(FileErrorKind::Read, "File not open"));
        }
        let nodes = self.fs.read_nodes();
        let Some(node) = nodes.get(&self.inner) else {
            drop(nodes);
            return Err(self.error.set(FileErrorKind::Read, NO_SUCH_FILE));
        };
        let n = usize::try_from(self.pos).map_or(0, |pos| node.read_at(pos, buf));
        drop(nodes);
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> EngineResult<usize> {
        let Some(mode) = self.open_mode.filter(|m| m.is_writable()) else {
            return Err(self.error.set(FileErrorKind::Write, "File not open for writing"));
        };
        let mut nodes = self.fs.write_nodes();
        let Some(node) = nodes.get_mut(&self.inner) else {
            drop(nodes);
            return Err(self.error.set(FileErrorKind::Write, NO_SUCH_FILE));
        };
        if mode.contains(OpenMode::APPEND) {
            self.pos = node.len();
        }
        let Ok(offset) = usize::try_from(self.pos) else {
            drop(nodes);
            return Err(self.error.set(FileErrorKind::Write, "File too large"));
        };
        node.write_at(offset, buf);
        drop(nodes);
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn set_size(&mut self, size: u64) -> EngineResult<()> {
        let Ok(len) = usize::try_from(size) else {
            return Err(self.error.set(FileErrorKind::Resize, "File too large"));
        };
        let mut nodes = self.fs.write_nodes();
        match nodes.get_mut(&self.inner) {
            Some(node) if node.is_file() => {
                node.resize(len);
                Ok(())
            }
            Some(_) => {
                drop(nodes);
                Err(self.error.set(FileErrorKind::Resize, "Is a directory"))
            }
            None => {
                drop(nodes);
                Err(self.error.set(FileErrorKind::Resize, NO_SUCH_FILE))
            }
        }
    }

    fn file_time(&mut self, which: FileTime) -> Option<SystemTime> {
        match which {
            FileTime::Modification => self.node().map(|n| n.modified()),
            _ => None,
        }
    }

    fn set_file_time(&mut self, time: SystemTime, which: FileTime) -> EngineResult<()> {
        if which != FileTime::Modification {
            return Err(self.error.set(FileErrorKind::Permissions, "Invalid argument"));
        }
        let mut nodes = self.fs.write_nodes();
        match nodes.get_mut(&self.inner) {
            Some(node) => {
                node.set_modified(time);
                Ok(())
            }
            None => {
                drop(nodes);
                Err(self.error.set(FileErrorKind::Permissions, NO_SUCH_FILE))
            }
        }
    }

    fn remove(&mut self) -> EngineResult<()> {
        let mut nodes = self.fs.write_nodes();
        match nodes.get(&self.inner) {
            Some(node) if node.is_file() => {
                nodes.remove(&self.inner);
                Ok(())
            }
            Some(_) => {
                drop(nodes);
                Err(self.error.set(FileErrorKind::Remove, "Is a directory"))
            }
            None => {
                drop(nodes);
                Err(self.error.set(FileErrorKind::Remove, NO_SUCH_FILE))
            }
        }
    }

    fn copy(&mut self, new_name: &str) -> EngineResult<()> {
        let to = self.target(new_name, FileErrorKind::Copy)?;
        let mut nodes = self.fs.write_nodes();
        let source = match nodes.get(&self.inner) {
            Some(node) if node.is_file() => node.clone(),
            _ => {
                drop(nodes);
                return Err(self.error.set(FileErrorKind::Copy, NO_SUCH_FILE));
            }
        };
        if nodes.contains_key(&to) {
            drop(nodes);
            return Err(self.error.set(FileErrorKind::Copy, FILE_EXISTS));
        }
        if !nodes.get(parent_of(&to)).is_some_and(Node::is_dir) {
            drop(nodes);
            return Err(self.error.set(FileErrorKind::Copy, NO_SUCH_FILE));
        }
        nodes.insert(to, source);
        Ok(())
    }

    fn rename(&mut self, new_name: &str) -> EngineResult<()> {
        self.move_to(new_name, false)
    }

    fn rename_overwrite(&mut self, new_name: &str) -> EngineResult<()> {
        self.move_to(new_name, true)
    }

    fn mkdir(
        &self,
        dir_name: &str,
        create_parents: bool,
        _permissions: Option<MetaFlags>,
    ) -> EngineResult<()> {
        let inner = self
            .inner_of(dir_name)
            .ok_or_else(|| FileError::new(FileErrorKind::Unspecified, "Invalid argument"))?;
        let mut nodes = self.fs.write_nodes();
        if let Some(existing) = nodes.get(&inner) {
            if create_parents && existing.is_dir() {
                return Ok(());
            }
            return Err(FileError::new(FileErrorKind::Unspecified, "File exists"));
        }
        let parent_is_dir = nodes.get(parent_of(&inner)).is_some_and(Node::is_dir);
        if !create_parents && !parent_is_dir {
            return Err(FileError::new(FileErrorKind::Unspecified, NO_SUCH_FILE));
        }
        create_dirs(&mut nodes, &inner)
            .map_err(|err| FileError::new(FileErrorKind::Unspecified, err.to_string()))
    }

    fn rmdir(&self, dir_name: &str, remove_empty_parents: bool) -> EngineResult<()> {
        let inner = self
            .inner_of(dir_name)
            .ok_or_else(|| FileError::new(FileErrorKind::Unspecified, "Invalid argument"))?;
        let mut nodes = self.fs.write_nodes();
        if !nodes.get(&inner).is_some_and(Node::is_dir) {
            return Err(FileError::new(FileErrorKind::Unspecified, NO_SUCH_FILE));
        }
        if inner == "/" || children(&nodes, &inner).next().is_some() {
            return Err(FileError::new(FileErrorKind::Unspecified, "Directory not empty"));
        }
        nodes.remove(&inner);

        if remove_empty_parents {
            let mut dir = parent_of(&inner).to_string();
            while dir != "/" && children(&nodes, &dir).next().is_none() {
                nodes.remove(&dir);
                dir = parent_of(&dir).to_string();
            }
        }
        Ok(())
    }

    fn begin_entry_list(
        &mut self,
        path: &str,
        _filters: DirFilters,
        _name_filters: &[String],
    ) -> Option<Box<dyn EntryIterator>> {
        let inner = self.inner_of(path)?;
        let nodes = self.fs.read_nodes();
        if !nodes.get(&inner).is_some_and(Node::is_dir) {
            return None;
        }
        let names = children(&nodes, &inner)
            .map(|key| name_of(key).to_string())
            .collect();
        drop(nodes);
        Some(Box::new(MemoryIterator {
            fs: self.fs.clone(),
            prefix: self.prefix.clone(),
            path: path.to_string(),
            names,
            current: None,
        }))
    }

    fn supports_extension(&self, kind: ExtensionKind) -> bool {
        kind == ExtensionKind::AtEnd
    }

    fn extension(&mut self, ext: Extension) -> Option<ExtensionOutput> {
        match ext {
            Extension::AtEnd if self.is_open() => {
                let len = self.size();
                Some(ExtensionOutput::AtEnd(self.pos >= len))
            }
            _ => None,
        }
    }
}

/// Lists a snapshot of one directory's children, in name order.
pub struct MemoryIterator {
    fs: MemoryFs,
    prefix: String,
    path: String,
    names: Vec<String>,
    current: Option<usize>,
}

impl EntryIterator for MemoryIterator {
    fn path(&self) -> &str {
        &self.path
    }

    fn advance(&mut self) -> bool {
        let next = self.current.map_or(0, |i| i + 1);
        self.current = Some(next);
        next < self.names.len()
    }

    fn current_file_name(&self) -> String {
        self.current
            .and_then(|i| self.names.get(i))
            .cloned()
            .unwrap_or_default()
    }

    fn current_file_info(&self) -> FileInfo {
        let path = self.current_file_path();
        let engine = MemoryEngine::new(self.fs.clone(), &self.prefix, &path);
        FileInfo::with_engine(&path, Box::new(engine))
    }
}
