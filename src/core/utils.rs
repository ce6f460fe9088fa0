//! Host environment discovery: working directory, home, temp and root paths.
//!
//! All returned paths use `/` separators.

use std::env;

use anyhow::anyhow;

use crate::core::Result;
use crate::path::{clean_path, from_native_separators};

/// The process working directory.
pub fn current_path() -> Result<String> {
    let cwd = env::current_dir()?;
    Ok(from_native_separators(&cwd.to_string_lossy()))
}

/// Changes the process working directory.
pub fn set_current_path(path: &str) -> Result<()> {
    if path.is_empty() {
        log::warn!("set_current_path: empty path");
        return Err(anyhow!("empty path"));
    }
    env::set_current_dir(path).map_err(|e| anyhow!("cannot change directory to {path}: {e}"))
}

/// The user's home directory, falling back to the root path.
pub fn home_path() -> String {
    match home_from_env() {
        Some(home) if !home.is_empty() => clean_path(&from_native_separators(&home)),
        _ => root_path(),
    }
}

#[cfg(not(windows))]
fn home_from_env() -> Option<String> {
    env::var("HOME").ok()
}

#[cfg(windows)]
fn home_from_env() -> Option<String> {
    if let Ok(profile) = env::var("USERPROFILE") {
        return Some(profile);
    }
    match (env::var("HOMEDRIVE"), env::var("HOMEPATH")) {
        (Ok(drive), Ok(path)) => Some(format!("{drive}{path}")),
        _ => None,
    }
}

/// The system temp directory (`TMPDIR`, `TEMP` or `TMP` as the platform dictates).
pub fn temp_path() -> String {
    let tmp = env::temp_dir();
    let tmp = from_native_separators(&tmp.to_string_lossy());
    if tmp.is_empty() {
        return root_path();
    }
    clean_path(&tmp)
}

#[cfg(not(windows))]
pub fn root_path() -> String {
    "/".to_string()
}

#[cfg(windows)]
pub fn root_path() -> String {
    let drive = env::var("SystemDrive").unwrap_or_else(|_| "c:".to_string());
    format!("{drive}/")
}

/// Root directories of the mounted drives; just `/` on POSIX hosts.
#[cfg(not(windows))]
pub fn drives() -> Vec<String> {
    vec![root_path()]
}

#[cfg(windows)]
pub fn drives() -> Vec<String> {
    ('A'..='Z')
        .map(|letter| format!("{letter}:/"))
        .filter(|drive| std::path::Path::new(drive).exists())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_path_is_absolute() {
        let cwd = current_path().unwrap();
        assert!(crate::path::is_absolute_path(&cwd));
    }

    #[test]
    fn test_temp_and_root_paths() {
        let tmp = temp_path();
        assert!(!tmp.is_empty());
        assert!(!tmp.ends_with('/') || tmp == root_path());
        #[cfg(unix)]
        assert_eq!(root_path(), "/");
        #[cfg(unix)]
        assert_eq!(drives(), vec!["/".to_string()]);
    }

    #[test]
    fn test_home_path_is_clean() {
        let home = home_path();
        assert!(!home.is_empty());
        assert_eq!(clean_path(&home), home);
    }

    #[test]
    fn test_set_current_path_rejects_empty() {
        assert!(set_current_path("").is_err());
    }
}
