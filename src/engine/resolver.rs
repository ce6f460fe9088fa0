//! Picks the engine responsible for a path.
//!
//! Two process-wide registries take part in resolution:
//!
//! * the **handler chain**: custom [`EngineHandler`]s, consulted most recently registered
//!   first. The first handler that returns an engine for a path owns it.
//! * the **search-path table**: a path `prefix:rest` is looked up in every directory
//!   registered for `prefix` until one of the candidates exists.
//!
//! Anything nobody claims is served by the native engine.

use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use anyhow::anyhow;

use super::{FileEngine, FileFlags};
use crate::core::Result;
use crate::native::NativeEngine;
use crate::path::{PathEntry, clean_path, from_native_separators};

/// A hook that may claim paths and supply a non-native engine for them.
pub trait EngineHandler: Send + Sync {
    /// Returns an engine for `file_name`, or `None` to let the next handler try.
    fn create(&self, file_name: &str) -> Option<Box<dyn FileEngine>>;
}

type HandlerChain = Vec<(u64, Arc<dyn EngineHandler>)>;

static HANDLERS: OnceLock<Mutex<HandlerChain>> = OnceLock::new();
static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);
static SEARCH_PATHS: OnceLock<Mutex<HashMap<String, Vec<String>>>> = OnceLock::new();

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn handlers() -> &'static Mutex<HandlerChain> {
    HANDLERS.get_or_init(|| Mutex::new(Vec::new()))
}

fn search_path_table() -> &'static Mutex<HashMap<String, Vec<String>>> {
    SEARCH_PATHS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Keeps a handler in the chain. Dropping the registration removes the handler.
#[must_use = "the handler is unregistered as soon as the registration is dropped"]
#[derive(Debug)]
pub struct HandlerRegistration {
    id: u64,
}

impl HandlerRegistration {
    /// Explicitly removes the handler from the chain.
    pub fn unregister(self) {}
}

impl Drop for HandlerRegistration {
    fn drop(&mut self) {
        let mut chain = lock(handlers());
        chain.retain(|(id, _)| *id != self.id);
        log::debug!("engine handler {} unregistered", self.id);
    }
}

/// Adds `handler` at the front of the chain.
pub fn register_handler(handler: Arc<dyn EngineHandler>) -> HandlerRegistration {
    let id = NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed);
    lock(handlers()).push((id, handler));
    log::debug!("engine handler {id} registered");
    HandlerRegistration { id }
}

pub fn handlers_in_use() -> bool {
    !lock(handlers()).is_empty()
}

/// Asks the registered handlers, newest first, for an engine serving `file_name`.
pub fn custom_engine(file_name: &str) -> Option<Box<dyn FileEngine>> {
    // Snapshot so that handlers run without holding the lock.
    let chain: Vec<Arc<dyn EngineHandler>> = {
        let guard = lock(handlers());
        if guard.is_empty() {
            return None;
        }
        guard.iter().rev().map(|(_, h)| Arc::clone(h)).collect()
    };
    chain.iter().find_map(|h| h.create(file_name))
}

fn check_prefix(prefix: &str) -> Result<()> {
    if prefix.chars().count() < 2 {
        log::warn!("search path prefix must be longer than 1 character: {prefix:?}");
        return Err(anyhow!("search path prefix must be longer than 1 character"));
    }
    if !prefix.chars().all(char::is_alphanumeric) {
        log::warn!("search path prefix can only contain letters or numbers: {prefix:?}");
        return Err(anyhow!("search path prefix can only contain letters or numbers"));
    }
    Ok(())
}

/// Replaces the directories searched for paths starting with `prefix:`.
/// An empty list removes the prefix.
pub fn set_search_paths<S: AsRef<str>>(prefix: &str, paths: &[S]) -> Result<()> {
    check_prefix(prefix)?;
    let mut table = lock(search_path_table());
    if paths.is_empty() {
        table.remove(prefix);
    } else {
        let paths = paths
            .iter()
            .map(|p| from_native_separators(p.as_ref()))
            .collect();
        table.insert(prefix.to_string(), paths);
    }
    Ok(())
}

/// Appends `path` to the directories searched for `prefix:`.
pub fn add_search_path(prefix: &str, path: &str) -> Result<()> {
    check_prefix(prefix)?;
    if path.is_empty() {
        return Ok(());
    }
    lock(search_path_table())
        .entry(prefix.to_string())
        .or_default()
        .push(from_native_separators(path));
    Ok(())
}

pub fn search_paths(prefix: &str) -> Vec<String> {
    lock(search_path_table())
        .get(prefix)
        .cloned()
        .unwrap_or_default()
}

fn entry_exists(entry: &PathEntry) -> bool {
    fs::metadata(entry.native_file_path()).is_ok()
}

/// With `resolving` set, an unclaimed candidate only counts if it exists.
fn resolve_recursive(
    entry: &mut PathEntry,
    engine: &mut Option<Box<dyn FileEngine>>,
    resolving: bool,
) -> bool {
    let file_path = entry.file_path().to_string();

    if let Some(mut custom) = custom_engine(&file_path) {
        let found = !resolving || custom.file_flags(FileFlags::FLAGS_MASK).contains(FileFlags::EXISTS_FLAG);
        if found {
            *engine = Some(custom);
        }
        return found;
    }

    for (idx, ch) in file_path.char_indices() {
        if ch == '/' {
            break;
        }
        if ch == ':' {
            if idx <= 1 {
                // drive letter or a bare leading colon
                break;
            }
            let rest = &file_path[idx + 1..];
            for dir in search_paths(&file_path[..idx]) {
                *entry = PathEntry::from_internal(clean_path(&format!("{dir}/{rest}")));
                if resolve_recursive(entry, engine, true) {
                    return true;
                }
            }
            // The last candidate stays in `entry`.
            return false;
        }
    }

    !resolving || entry_exists(entry)
}

/// Resolves `entry` in place through the search-path table and returns the custom engine
/// claiming it, if any. `None` means the (possibly rewritten) entry is native.
pub fn resolve_entry(entry: &mut PathEntry) -> Option<Box<dyn FileEngine>> {
    let mut engine = None;
    resolve_recursive(entry, &mut engine, false);
    if engine.is_some() {
        log::debug!("custom engine resolved for {entry}");
    }
    engine
}

/// Returns the engine for `path`, falling back to a [`NativeEngine`].
pub fn create(path: &str) -> Box<dyn FileEngine> {
    let mut entry = PathEntry::new(path);
    match resolve_entry(&mut entry) {
        Some(engine) => engine,
        None => Box::new(NativeEngine::new(entry)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorState;
    use crate::engine::FileName;
    use tempdir::TempDir;

    fn setup_test_env() -> TempDir {
        TempDir::new("resolver_test").unwrap()
    }

    struct TagEngine {
        tag: &'static str,
        name: String,
        error: ErrorState,
    }

    impl FileEngine for TagEngine {
        fn error_state(&self) -> &ErrorState {
            &self.error
        }

        fn error_state_mut(&mut self) -> &mut ErrorState {
            &mut self.error
        }

        fn set_file_name(&mut self, file_name: &str) {
            self.name = file_name.to_string();
        }

        fn file_name(&self, which: FileName) -> String {
            match which {
                FileName::Bundle => self.tag.to_string(),
                _ => self.name.clone(),
            }
        }

        fn file_flags(&mut self, _request: FileFlags) -> FileFlags {
            FileFlags::EXISTS_FLAG
        }
    }

    struct TagHandler {
        prefix: &'static str,
        tag: &'static str,
    }

    impl EngineHandler for TagHandler {
        fn create(&self, file_name: &str) -> Option<Box<dyn FileEngine>> {
            file_name.starts_with(self.prefix).then(|| {
                Box::new(TagEngine {
                    tag: self.tag,
                    name: file_name.to_string(),
                    error: ErrorState::default(),
                }) as Box<dyn FileEngine>
            })
        }
    }

    mod handlers {
        use super::*;

        #[test]
        fn test_most_recent_handler_wins() {
            let _first = register_handler(Arc::new(TagHandler {
                prefix: "order:",
                tag: "first",
            }));
            let second = register_handler(Arc::new(TagHandler {
                prefix: "order:",
                tag: "second",
            }));

            let engine = create("order:/x");
            assert_eq!(engine.file_name(FileName::Bundle), "second");

            second.unregister();
            let engine = create("order:/x");
            assert_eq!(engine.file_name(FileName::Bundle), "first");
        }

        #[test]
        fn test_dropping_registration_restores_native() {
            {
                let _reg = register_handler(Arc::new(TagHandler {
                    prefix: "scoped:",
                    tag: "scoped",
                }));
                assert!(custom_engine("scoped:/a").is_some());
            }
            assert!(custom_engine("scoped:/a").is_none());

            let mut entry = PathEntry::new("scoped:/a");
            assert!(resolve_entry(&mut entry).is_none());
        }
    }

    mod search {
        use super::*;

        #[test]
        fn test_prefix_validation() {
            assert!(set_search_paths("x", &["/tmp"]).is_err());
            assert!(set_search_paths("a-b", &["/tmp"]).is_err());
            assert!(add_search_path("q", "/tmp").is_err());
        }

        #[test]
        fn test_first_existing_candidate_wins() -> Result<()> {
            let temp_dir = setup_test_env();
            let first = temp_dir.path().join("first");
            let second = temp_dir.path().join("second");
            fs::create_dir_all(&first)?;
            fs::create_dir_all(&second)?;
            fs::write(second.join("icon.png"), b"png")?;

            let first = first.to_string_lossy().to_string();
            let second = second.to_string_lossy().to_string();
            set_search_paths("icons", &[first.as_str(), second.as_str()])?;
            assert_eq!(search_paths("icons").len(), 2);

            let mut entry = PathEntry::new("icons:icon.png");
            assert!(resolve_entry(&mut entry).is_none());
            assert_eq!(
                entry.file_path(),
                clean_path(&format!("{}/icon.png", from_native_separators(&second)))
            );

            // nothing exists: the last candidate stands
            let mut entry = PathEntry::new("icons:missing.png");
            assert!(resolve_entry(&mut entry).is_none());
            assert!(entry.file_path().ends_with("second/missing.png"));

            set_search_paths::<&str>("icons", &[])?;
            assert!(search_paths("icons").is_empty());
            Ok(())
        }

        #[test]
        fn test_add_search_path_appends() -> Result<()> {
            add_search_path("appended", "/one")?;
            add_search_path("appended", "/two")?;
            assert_eq!(search_paths("appended"), vec!["/one", "/two"]);
            Ok(())
        }

        #[test]
        fn test_drive_letter_is_not_a_prefix() {
            let mut entry = PathEntry::new("c:/file");
            assert!(resolve_entry(&mut entry).is_none());
            assert_eq!(entry.file_path(), "c:/file");
        }

        #[test]
        fn test_create_falls_back_to_native() {
            let engine = create("/definitely/not/claimed");
            assert_eq!(engine.file_name(FileName::Default), "/definitely/not/claimed");
        }
    }
}
