//! An in-process directory tree that can be mounted into the engine resolver.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::anyhow;

use super::node::{Node, NodeType};
use super::MemoryHandler;
use crate::core::Result;
use crate::engine::resolver::{self, HandlerRegistration};
use crate::path::{PathStyle, clean_path_with};

pub(crate) type NodeMap = BTreeMap<String, Node>;

/// A virtual filesystem that keeps files and directories in memory.
///
/// `MemoryFs` is a cheap handle: clones share the same tree. Every path it accepts is an
/// *inner path*, resolved against the virtual root `/` and cleaned with POSIX rules, so
/// `docs/../notes/` and `/notes` name the same node.
///
/// ### Invariants
///
/// 1. **Root existence**: `/` is always present and is a directory.
/// 2. **Parent consistency**: for any node at `/a/b/c` there is a directory `/a/b`.
/// 3. **Normalization**: keys never contain `.`, `..`, `//` or a trailing `/`.
///
/// ### Mounting
///
/// [`MemoryFs::mount`] registers a handler claiming every name that starts with a prefix
/// such as `mem:`; `mem:/docs/a.txt` then resolves to the node `/docs/a.txt`, and
/// [`crate::dir::Dir`] / [`crate::dir::FileInfo`] work on it like on host paths.
///
/// ```no_run
/// use vfs_engine::vfs::MemoryFs;
///
/// let fs = MemoryFs::new();
/// fs.mkdir("/docs").unwrap();
/// fs.mkfile("/docs/note.txt", Some(b"Hello")).unwrap();
/// assert!(fs.exists("/docs/note.txt"));
///
/// let _mount = fs.mount("mem:");
/// assert!(vfs_engine::dir::FileInfo::new("mem:/docs/note.txt").is_file());
/// ```
#[derive(Clone)]
pub struct MemoryFs {
    nodes: Arc<RwLock<NodeMap>>,
}

impl MemoryFs {
    /// Creates a tree holding only the root directory.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::new(NodeType::Directory));
        Self {
            nodes: Arc::new(RwLock::new(nodes)),
        }
    }

    /// Mounts the tree under `prefix`. The mount lasts as long as the registration.
    pub fn mount(&self, prefix: &str) -> HandlerRegistration {
        log::debug!("mounting memory filesystem at {prefix:?}");
        resolver::register_handler(Arc::new(MemoryHandler::new(self.clone(), prefix)))
    }

    pub(crate) fn read_nodes(&self) -> RwLockReadGuard<'_, NodeMap> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_nodes(&self) -> RwLockWriteGuard<'_, NodeMap> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the normalized inner form of `path`.
    pub fn to_inner(path: &str) -> String {
        let mut inner = clean_path_with(&format!("/{path}"), PathStyle::Posix);
        // `..` above the virtual root stays at the root
        while let Some(rest) = inner.strip_prefix("/..") {
            if rest.is_empty() {
                inner = "/".to_string();
            } else if rest.starts_with('/') {
                inner = rest.to_string();
            } else {
                break;
            }
        }
        inner
    }

    pub fn exists(&self, path: &str) -> bool {
        self.read_nodes().contains_key(&Self::to_inner(path))
    }

    /// A snapshot of the node at `path`.
    pub fn node(&self, path: &str) -> Option<Node> {
        self.read_nodes().get(&Self::to_inner(path)).cloned()
    }

    pub fn is_dir(&self, path: &str) -> Result<bool> {
        match self.read_nodes().get(&Self::to_inner(path)) {
            Some(node) => Ok(node.is_dir()),
            None => Err(anyhow!("{path} does not exist")),
        }
    }

    pub fn is_file(&self, path: &str) -> Result<bool> {
        match self.read_nodes().get(&Self::to_inner(path)) {
            Some(node) => Ok(node.is_file()),
            None => Err(anyhow!("{path} does not exist")),
        }
    }

    /// Lists the immediate children of a directory as inner paths, in name order.
    ///
    /// Listing a file yields the file itself.
    pub fn ls(&self, path: &str) -> Result<Vec<String>> {
        let inner = Self::to_inner(path);
        let nodes = self.read_nodes();
        match nodes.get(&inner) {
            None => Err(anyhow!("{inner} does not exist")),
            Some(node) if node.is_file() => Ok(vec![inner]),
            Some(_) => Ok(children(&nodes, &inner)
                .map(|key| key.to_string())
                .collect()),
        }
    }

    /// Creates a directory and all its missing parents.
    pub fn mkdir(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(anyhow!("invalid path: empty"));
        }
        let inner = Self::to_inner(path);
        let mut nodes = self.write_nodes();
        if nodes.contains_key(&inner) {
            return Err(anyhow!("path already exists: {inner}"));
        }
        create_dirs(&mut nodes, &inner)
    }

    /// Creates a file, creating missing parent directories on the way.
    pub fn mkfile(&self, path: &str, content: Option<&[u8]>) -> Result<()> {
        if path.is_empty() {
            return Err(anyhow!("invalid path: empty"));
        }
        let inner = Self::to_inner(path);
        let mut nodes = self.write_nodes();
        if nodes.contains_key(&inner) {
            return Err(anyhow!("{inner} already exist"));
        }
        let parent = parent_of(&inner);
        if !nodes.contains_key(parent) {
            create_dirs(&mut nodes, parent)?;
        } else if nodes.get(parent).is_some_and(Node::is_file) {
            return Err(anyhow!("{parent} is not a directory"));
        }

        let mut node = Node::new(NodeType::File);
        if let Some(content) = content {
            node.set_content(content);
        }
        nodes.insert(inner, node);
        Ok(())
    }

    /// Reads the entire contents of a file.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let inner = Self::to_inner(path);
        match self.read_nodes().get(&inner) {
            None => Err(anyhow!("{path} does not exist")),
            Some(node) if node.is_dir() => Err(anyhow!("{path} is a directory")),
            Some(node) => Ok(node.content().to_vec()),
        }
    }

    /// Replaces the contents of an existing file.
    pub fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        self.with_file(path, |node| node.set_content(content))
    }

    /// Appends to an existing file.
    pub fn append(&self, path: &str, content: &[u8]) -> Result<()> {
        self.with_file(path, |node| node.append_content(content))
    }

    fn with_file<F: FnOnce(&mut Node)>(&self, path: &str, f: F) -> Result<()> {
        let inner = Self::to_inner(path);
        match self.write_nodes().get_mut(&inner) {
            None => Err(anyhow!("{path} does not exist")),
            Some(node) if node.is_dir() => Err(anyhow!("{path} is a directory")),
            Some(node) => {
                f(node);
                Ok(())
            }
        }
    }

    /// Removes a file, or a directory together with everything below it.
    pub fn rm(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(anyhow!("invalid path: empty"));
        }
        let inner = Self::to_inner(path);
        if inner == "/" {
            return Err(anyhow!("invalid path: the root cannot be removed"));
        }
        let mut nodes = self.write_nodes();
        if !nodes.contains_key(&inner) {
            return Err(anyhow!("{inner} does not exist"));
        }
        remove_subtree(&mut nodes, &inner);
        Ok(())
    }

    /// Removes everything but the root.
    pub fn cleanup(&self) {
        self.write_nodes().retain(|key, _| key == "/");
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

/// The parent of an inner path; the root is its own parent.
pub(crate) fn parent_of(inner: &str) -> &str {
    match inner.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &inner[..idx],
    }
}

pub(crate) fn name_of(inner: &str) -> &str {
    inner.rfind('/').map_or(inner, |idx| &inner[idx + 1..])
}

/// True if `key` is `dir` itself or lies below it.
pub(crate) fn is_within(key: &str, dir: &str) -> bool {
    if dir == "/" {
        return true;
    }
    key.strip_prefix(dir)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

pub(crate) fn children<'a>(nodes: &'a NodeMap, dir: &'a str) -> impl Iterator<Item = &'a str> {
    nodes
        .keys()
        .map(String::as_str)
        .filter(move |key| *key != "/" && parent_of(key) == dir)
}

/// Creates `inner` and its missing ancestors, starting from the closest existing one.
pub(crate) fn create_dirs(nodes: &mut NodeMap, inner: &str) -> Result<()> {
    let mut existing = inner;
    while !nodes.contains_key(existing) {
        existing = parent_of(existing);
    }
    if nodes.get(existing).is_some_and(Node::is_file) {
        return Err(anyhow!("{existing} is not a directory"));
    }

    let rest = inner[existing.len()..].trim_start_matches('/');
    let mut built = existing.to_string();
    for component in rest.split('/').filter(|c| !c.is_empty()) {
        if !built.ends_with('/') {
            built.push('/');
        }
        built.push_str(component);
        nodes
            .entry(built.clone())
            .or_insert_with(|| Node::new(NodeType::Directory));
    }
    Ok(())
}

pub(crate) fn remove_subtree(nodes: &mut NodeMap, inner: &str) {
    nodes.retain(|key, _| !is_within(key, inner));
}

/// Moves `from` and everything below it to `to`. The caller checks that `to` is free.
pub(crate) fn move_subtree(nodes: &mut NodeMap, from: &str, to: &str) {
    let moved: Vec<String> = nodes
        .keys()
        .filter(|key| is_within(key, from))
        .cloned()
        .collect();
    for key in moved {
        if let Some(node) = nodes.remove(&key) {
            let new_key = format!("{to}{}", &key[from.len()..]);
            nodes.insert(new_key, node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_tree() -> MemoryFs {
        let mem = MemoryFs::new();
        mem.mkdir("/etc").unwrap();
        mem.mkdir("/srv/web").unwrap();
        mem.mkdir("/srv/db").unwrap();
        mem.mkfile("/srv/web/file1.txt", Some(b"Content 1")).unwrap();
        mem.mkfile("/srv/web/file2.txt", Some(b"Content 2")).unwrap();
        mem.mkfile("/srv/db/dump.sql", Some(b"rows")).unwrap();
        mem.mkfile("/notes.md", Some(b"todo")).unwrap();
        mem
    }

    mod paths {
        use super::*;

        #[test]
        fn test_to_inner_normalizes() {
            assert_eq!(MemoryFs::to_inner(""), "/");
            assert_eq!(MemoryFs::to_inner("docs/"), "/docs");
            assert_eq!(MemoryFs::to_inner("/a/./b/../c"), "/a/c");
            assert_eq!(MemoryFs::to_inner("../../x"), "/x");
        }

        #[test]
        fn test_parent_and_within() {
            assert_eq!(parent_of("/a/b"), "/a");
            assert_eq!(parent_of("/a"), "/");
            assert_eq!(parent_of("/"), "/");
            assert_eq!(name_of("/a/b.txt"), "b.txt");
            assert!(is_within("/a/b", "/a"));
            assert!(is_within("/a", "/a"));
            assert!(!is_within("/ab", "/a"));
            assert!(is_within("/anything", "/"));
        }
    }

    mod exists {
        use super::*;

        #[test]
        fn test_exists_files_and_dirs() {
            let mem = setup_test_tree();
            assert!(mem.exists("/"));
            assert!(mem.exists(""));
            assert!(mem.exists("/srv/web/file1.txt"));
            assert!(mem.exists("srv/web/"));
            assert!(!mem.exists("/srv/we"));
            assert!(!mem.exists("/Srv"));
        }

        #[test]
        fn test_is_dir_is_file() -> Result<()> {
            let mem = setup_test_tree();
            assert!(mem.is_dir("/srv")?);
            assert!(!mem.is_file("/srv")?);
            assert!(mem.is_file("/notes.md/")?);
            let err = mem.is_dir("/nonexistent").unwrap_err();
            assert!(err.to_string().contains("does not exist"));
            Ok(())
        }
    }

    mod ls {
        use super::*;

        #[test]
        fn test_ls_top_level() -> Result<()> {
            let mem = setup_test_tree();
            assert_eq!(mem.ls("/")?, ["/etc", "/notes.md", "/srv"]);
            Ok(())
        }

        #[test]
        fn test_ls_nested_and_file() -> Result<()> {
            let mem = setup_test_tree();
            assert_eq!(mem.ls("/srv")?, ["/srv/db", "/srv/web"]);
            assert_eq!(mem.ls("/srv/web/file1.txt")?, ["/srv/web/file1.txt"]);
            assert!(mem.ls("/etc")?.is_empty());
            assert!(mem.ls("/missing").is_err());
            Ok(())
        }
    }

    mod mkdir_mkfile {
        use super::*;

        #[test]
        fn test_mkdir_creates_every_level() -> Result<()> {
            let mem = MemoryFs::new();
            mem.mkdir("/a/b/c/d")?;
            for p in ["/a", "/a/b", "/a/b/c", "/a/b/c/d"] {
                assert!(mem.is_dir(p)?);
            }
            Ok(())
        }

        #[test]
        fn test_mkdir_errors() {
            let mem = MemoryFs::new();
            let err = mem.mkdir("").unwrap_err();
            assert!(err.to_string().contains("invalid path: empty"));
            let err = mem.mkdir("/").unwrap_err();
            assert!(err.to_string().contains("path already exists"));

            mem.mkfile("/file", None).unwrap();
            let err = mem.mkdir("/file/sub").unwrap_err();
            assert!(err.to_string().contains("not a directory"));
        }

        #[test]
        fn test_mkfile_creates_parents() -> Result<()> {
            let mem = MemoryFs::new();
            mem.mkfile("/a/b/file.txt", Some(b"Content"))?;
            assert!(mem.is_dir("/a/b")?);
            assert_eq!(mem.read("/a/b/file.txt")?, b"Content");

            assert!(mem.mkfile("/a/b/file.txt", Some(b"New")).is_err());
            assert!(mem.mkfile("/a", None).is_err());
            Ok(())
        }
    }

    mod read_write_append {
        use super::*;

        #[test]
        fn test_write_then_append() -> Result<()> {
            let mem = setup_test_tree();
            mem.mkfile("/events.log", None)?;
            mem.write("/events.log", b"boot\n")?;
            mem.append("/events.log", b"ready\n")?;
            assert_eq!(mem.read("/events.log")?, b"boot\nready\n");

            mem.write("/events.log", b"Overwritten\n")?;
            assert_eq!(mem.read("/events.log")?, b"Overwritten\n");
            Ok(())
        }

        #[test]
        fn test_directory_and_missing_targets() {
            let mem = setup_test_tree();
            let err = mem.read("/etc").unwrap_err();
            assert!(err.to_string().contains("is a directory"));
            let err = mem.write("/new.txt", b"x").unwrap_err();
            assert!(err.to_string().contains("does not exist"));
            let err = mem.append("/etc", b"x").unwrap_err();
            assert!(err.to_string().contains("is a directory"));
        }
    }

    mod rm {
        use super::*;

        #[test]
        fn test_rm_removes_subtree_only() -> Result<()> {
            let mem = setup_test_tree();
            mem.mkdir("/srvdata")?;
            mem.rm("/srv")?;
            assert!(!mem.exists("/srv/web/file1.txt"));
            assert!(!mem.exists("/srv"));
            assert!(mem.exists("/srvdata"));
            Ok(())
        }

        #[test]
        fn test_rm_rejects_root_and_missing() {
            let mem = setup_test_tree();
            assert!(mem.rm("/").is_err());
            assert!(mem.rm("").is_err());
            assert!(mem.rm("/nope").is_err());
        }

        #[test]
        fn test_cleanup_keeps_root() {
            let mem = setup_test_tree();
            mem.cleanup();
            assert!(mem.exists("/"));
            assert_eq!(mem.read_nodes().len(), 1);
        }
    }

    #[test]
    fn test_move_subtree() {
        let mem = setup_test_tree();
        {
            let mut nodes = mem.write_nodes();
            move_subtree(&mut nodes, "/srv/web", "/etc/web");
        }
        assert!(mem.exists("/etc/web/file2.txt"));
        assert!(!mem.exists("/srv/web"));
        assert!(mem.exists("/srv/db/dump.sql"));
    }

    #[test]
    fn test_clones_share_tree() {
        let mem = MemoryFs::new();
        let other = mem.clone();
        other.mkfile("/shared", Some(b"x")).unwrap();
        assert!(mem.exists("/shared"));
    }
}
