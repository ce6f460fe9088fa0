/// Path syntax rules.
///
/// All functions here work on the universal form (`/` separators). `Windows` adds drive
/// letters (`C:`) and UNC shares (`//server/share`) as root prefixes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PathStyle {
    Posix,
    Windows,
}

impl PathStyle {
    /// The style of the host operating system.
    pub const fn native() -> Self {
        if cfg!(windows) {
            PathStyle::Windows
        } else {
            PathStyle::Posix
        }
    }

    /// The native separator of this style.
    pub const fn separator(self) -> char {
        match self {
            PathStyle::Posix => '/',
            PathStyle::Windows => '\\',
        }
    }

    pub const fn supports_unc(self) -> bool {
        matches!(self, PathStyle::Windows)
    }

    /// Returns true if `path` starts with `X:`.
    pub fn has_drive(self, path: &str) -> bool {
        let b = path.as_bytes();
        self == PathStyle::Windows && b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':'
    }

    /// `//x...`: a double separator followed by a non-empty server name.
    fn has_unc_server(self, path: &str) -> bool {
        self.supports_unc()
            && path.starts_with("//")
            && path.as_bytes().get(2).is_some_and(|&c| c != b'/')
    }

    /// Length of the fixed prefix that `..` segments never cancel.
    ///
    /// * UNC `//server/` (up to and including the separator after the server name,
    ///   or the whole string when there is none); `//` and `///` are plain roots
    /// * drive `X:` (2) or `X:/` (3)
    /// * `/` (1)
    pub fn root_length(self, path: &str) -> usize {
        let b = path.as_bytes();
        if self.has_unc_server(path) {
            return match path[2..].find('/') {
                Some(idx) => idx + 3,
                None => b.len(),
            };
        }
        if self.has_drive(path) {
            return if b.len() > 2 && b[2] == b'/' { 3 } else { 2 };
        }
        if b.first() == Some(&b'/') {
            return 1;
        }
        0
    }

    pub fn is_absolute(self, path: &str) -> bool {
        match self {
            PathStyle::Posix => path.starts_with('/'),
            PathStyle::Windows => {
                let b = path.as_bytes();
                (b.len() >= 3 && b[0].is_ascii_alphabetic() && b[1] == b':' && b[2] == b'/')
                    || path.starts_with("//")
            }
        }
    }

    pub fn is_relative(self, path: &str) -> bool {
        !self.is_absolute(path)
    }

    /// `C:/`
    pub fn is_drive_root(self, path: &str) -> bool {
        path.len() == 3 && self.has_drive(path) && path.as_bytes()[2] == b'/'
    }

    /// `//server`, `//server/share`, each with an optional trailing separator.
    pub fn is_unc_root(self, path: &str) -> bool {
        if !self.supports_unc() || !path.starts_with("//") {
            return false;
        }
        let rest = path[2..].trim_end_matches('/');
        !rest.is_empty() && rest.split('/').count() <= 2 && !rest.contains("//")
    }

    pub fn is_root(self, path: &str) -> bool {
        path == "/" || self.is_drive_root(path) || self.is_unc_root(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_length() {
        assert_eq!(PathStyle::Posix.root_length(""), 0);
        assert_eq!(PathStyle::Posix.root_length("a/b"), 0);
        assert_eq!(PathStyle::Posix.root_length("/a/b"), 1);
        assert_eq!(PathStyle::Posix.root_length("//server/share"), 1);
        assert_eq!(PathStyle::Posix.root_length("c:/x"), 0);

        assert_eq!(PathStyle::Windows.root_length("c:"), 2);
        assert_eq!(PathStyle::Windows.root_length("c:x"), 2);
        assert_eq!(PathStyle::Windows.root_length("c:/x"), 3);
        assert_eq!(PathStyle::Windows.root_length("//server/share"), 9);
        assert_eq!(PathStyle::Windows.root_length("//server"), 8);
        assert_eq!(PathStyle::Windows.root_length("/x"), 1);
        assert_eq!(PathStyle::Windows.root_length("//"), 1);
        assert_eq!(PathStyle::Windows.root_length("///x"), 1);
    }

    #[test]
    fn test_is_absolute() {
        assert!(PathStyle::Posix.is_absolute("/usr"));
        assert!(!PathStyle::Posix.is_absolute("usr"));
        assert!(!PathStyle::Posix.is_absolute(""));

        assert!(PathStyle::Windows.is_absolute("C:/Windows"));
        assert!(PathStyle::Windows.is_absolute("//server/share"));
        assert!(!PathStyle::Windows.is_absolute("C:Windows"));
        assert!(!PathStyle::Windows.is_absolute("Windows"));
        assert!(PathStyle::Windows.is_relative("c:"));
    }

    #[test]
    fn test_is_root() {
        assert!(PathStyle::Posix.is_root("/"));
        assert!(!PathStyle::Posix.is_root("/usr"));
        assert!(!PathStyle::Posix.is_root("C:/"));

        assert!(PathStyle::Windows.is_root("/"));
        assert!(PathStyle::Windows.is_root("C:/"));
        assert!(!PathStyle::Windows.is_root("C:/x"));
        assert!(PathStyle::Windows.is_root("//server"));
        assert!(PathStyle::Windows.is_root("//server/share"));
        assert!(PathStyle::Windows.is_root("//server/share/"));
        assert!(!PathStyle::Windows.is_root("//server/share/dir"));
        assert!(!PathStyle::Windows.is_root("//"));
    }
}
