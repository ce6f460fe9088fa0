//! Path strings: syntax rules, cleaning and the lazily-derived [`PathEntry`].

mod clean;
mod entry;
mod style;

pub use clean::{clean_path, clean_path_with, is_clean, normalize_segments};
pub use entry::PathEntry;
pub use style::PathStyle;

/// The native separator of the host (`/` or `\`).
pub const fn separator() -> char {
    PathStyle::native().separator()
}

/// Converts `/` to the host separator. Identity on POSIX hosts.
pub fn to_native_separators(path: &str) -> String {
    if cfg!(windows) {
        path.replace('/', "\\")
    } else {
        path.to_string()
    }
}

/// Converts host separators to `/`. Identity on POSIX hosts.
pub fn from_native_separators(path: &str) -> String {
    if cfg!(windows) {
        path.replace('\\', "/")
    } else {
        path.to_string()
    }
}

pub fn is_absolute_path(path: &str) -> bool {
    PathEntry::new(path).is_absolute()
}

pub fn is_relative_path(path: &str) -> bool {
    !is_absolute_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator_round_trip() {
        for p in ["", "/", "/usr/local/bin", "a/b/c/", "//server/share", "c:/x"] {
            assert_eq!(from_native_separators(&to_native_separators(p)), p);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_native_separators_are_identity_on_unix() {
        assert_eq!(to_native_separators("/a/b"), "/a/b");
        assert_eq!(from_native_separators("a\\b"), "a\\b");
        assert_eq!(separator(), '/');
    }

    #[cfg(windows)]
    #[test]
    fn test_native_separators_on_windows() {
        assert_eq!(to_native_separators("c:/a/b"), "c:\\a\\b");
        assert_eq!(from_native_separators("c:\\a\\b"), "c:/a/b");
    }

    #[test]
    fn test_absolute_and_relative() {
        assert!(is_relative_path("a/b"));
        assert!(is_relative_path(""));
        #[cfg(unix)]
        assert!(is_absolute_path("/a/b"));
    }
}
