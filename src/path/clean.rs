//! Lexical path cleaning.
//!
//! Nothing here touches the filesystem: `..` is resolved against the preceding textual
//! segment, so `a/link/..` becomes `a` even when `link` is a symlink.

use super::PathStyle;
use super::from_native_separators;

/// Resolves `.` and `..` segments and collapses repeated separators in `path`.
///
/// `path` must already use `/` separators. The scan runs right to left, counting pending
/// `..` segments and dropping that many real segments on its way to the root prefix.
///
/// Returns the normalized path and whether it stayed within its root: `false` means a
/// rooted path had `..` segments left over (e.g. `/..`). Those segments are kept in the
/// output either way; relative paths re-emit them as a leading `../` run, and a relative
/// path that cancels out entirely becomes `.`.
///
/// A single trailing separator is preserved; [`clean_path`] strips it.
pub fn normalize_segments(path: &str, style: PathStyle) -> (String, bool) {
    if path.is_empty() {
        return (String::new(), true);
    }

    let prefix_len = style.root_length(path);
    let prefix = &path.as_bytes()[..prefix_len];
    let p = &path.as_bytes()[prefix_len..];

    // Filled back to front, reversed at the end.
    let mut out: Vec<u8> = Vec::with_capacity(path.len() + 2);
    let mut up = 0usize;
    let mut i = p.len() as isize - 1;

    if i > 0 && p[i as usize] == b'/' {
        out.push(b'/');
        i -= 1;
    }

    while i >= 0 {
        let at = |k: isize| p[k as usize];

        if at(i) == b'/' {
            i -= 1;
            continue;
        }

        // "."
        if at(i) == b'.' && (i == 0 || at(i - 1) == b'/') {
            i -= 1;
            continue;
        }

        // ".."
        if i >= 1 && at(i) == b'.' && at(i - 1) == b'.' && (i < 2 || at(i - 2) == b'/') {
            up += 1;
            i -= if i >= 2 { 3 } else { 2 };
            continue;
        }

        if up == 0 && out.last().is_some_and(|&c| c != b'/') {
            out.push(b'/');
        }

        // copy the segment, or skip it when a ".." consumes it
        while i >= 0 {
            if at(i) == b'/' {
                i -= 1;
                break;
            }
            if up == 0 {
                out.push(at(i));
            }
            i -= 1;
        }

        up = up.saturating_sub(1);
    }

    let within_root = prefix_len == 0 || up == 0;

    while up > 0 {
        if out.last().is_some_and(|&c| c != b'/') {
            out.push(b'/');
        }
        out.extend_from_slice(b"..");
        up -= 1;
    }

    if prefix_len > 0 {
        // prefix followed only by separators
        if out.last() == Some(&b'/') {
            out.pop();
        }
        out.extend(prefix.iter().rev());
    } else if out.is_empty() || out.last() == Some(&b'/') {
        // everything cancelled ("foo/..", "./")
        out.push(b'.');
    }

    out.reverse();
    // Only whole ASCII segments were dropped, so the bytes are still valid UTF-8.
    (String::from_utf8_lossy(&out).into_owned(), within_root)
}

/// Returns the lexically simplified form of `path` for the host path style.
///
/// Native separators are converted to `/` first. A trailing separator is removed unless
/// the result is a bare root (`/`, `C:/`).
///
/// ```
/// use vfs_engine::clean_path;
///
/// assert_eq!(clean_path("./local"), "local");
/// assert_eq!(clean_path("/local/usr/../bin"), "/local/bin");
/// assert_eq!(clean_path("foo/.."), ".");
/// ```
pub fn clean_path(path: &str) -> String {
    clean_path_with(path, PathStyle::native())
}

pub fn clean_path_with(path: &str, style: PathStyle) -> String {
    if path.is_empty() {
        return String::new();
    }
    let name = if style == PathStyle::native() {
        from_native_separators(path)
    } else if style == PathStyle::Windows {
        path.replace('\\', "/")
    } else {
        path.to_string()
    };
    let (mut ret, _) = normalize_segments(&name, style);

    if ret.len() > 1 && ret.ends_with('/') && !style.is_drive_root(&ret) {
        ret.pop();
    }
    ret
}

/// Returns true if `path` has no doubled separators, no `.`/`..` segments and does not
/// end in `.` or `..`.
///
/// `clean_path(p) == p` implies `is_clean(p)` except for paths whose cleaned form keeps
/// `..` segments (`../a`, `/..`). `is_clean(p)` implies `clean_path(p) == p` except for a
/// trailing separator (`a/b/`), which is clean here but stripped by [`clean_path`].
pub fn is_clean(path: &str) -> bool {
    let mut dots = 0usize;
    let mut dot_ok = true; // still only seen dots in this segment
    let mut slash_ok = true;

    for c in path.chars() {
        if c == '/' {
            if dots == 1 || dots == 2 {
                return false;
            }
            if !slash_ok {
                return false;
            }
            slash_ok = false;
            dot_ok = true;
            dots = 0;
        } else if dot_ok {
            slash_ok = true;
            if c == '.' {
                dots += 1;
                if dots > 2 {
                    dot_ok = false;
                    dots = 0;
                }
            } else {
                dot_ok = false;
                dots = 0;
            }
        } else {
            slash_ok = true;
        }
    }
    dots != 1 && dots != 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posix(p: &str) -> String {
        clean_path_with(p, PathStyle::Posix)
    }

    fn windows(p: &str) -> String {
        clean_path_with(p, PathStyle::Windows)
    }

    mod clean {
        use super::*;

        #[test]
        fn test_clean_path_examples() {
            assert_eq!(posix("./local"), "local");
            assert_eq!(posix("local/../bin"), "bin");
            assert_eq!(posix("/local/usr/../bin"), "/local/bin");
            assert_eq!(posix(""), "");
            assert_eq!(posix("foo/.."), ".");
        }

        #[test]
        fn test_clean_path_separators_and_dots() {
            assert_eq!(posix("/"), "/");
            assert_eq!(posix("//"), "/");
            assert_eq!(posix("/a//b///c"), "/a/b/c");
            assert_eq!(posix("/a/./b/."), "/a/b");
            assert_eq!(posix("a/b/"), "a/b");
            assert_eq!(posix("./"), ".");
            assert_eq!(posix("."), ".");
            assert_eq!(posix(".."), "..");
            assert_eq!(posix("../.."), "../..");
            assert_eq!(posix("../foo/../../bar"), "../../bar");
            assert_eq!(posix("a/b/c/../../d"), "a/d");
            assert_eq!(posix(".hidden/./x"), ".hidden/x");
            assert_eq!(posix("a/...b/c"), "a/...b/c");
        }

        #[test]
        fn test_clean_path_above_root_is_kept_and_flagged() {
            assert_eq!(posix("/.."), "/..");
            assert_eq!(posix("/a/../.."), "/..");

            let (out, ok) = normalize_segments("/a/../..", PathStyle::Posix);
            assert_eq!(out, "/..");
            assert!(!ok);

            let (out, ok) = normalize_segments("a/../..", PathStyle::Posix);
            assert_eq!(out, "..");
            assert!(ok, "relative paths never fail");

            let (out, ok) = normalize_segments("/a/b/../c", PathStyle::Posix);
            assert_eq!(out, "/a/c");
            assert!(ok);
        }

        #[test]
        fn test_normalize_segments_keeps_trailing_separator() {
            let (out, ok) = normalize_segments("/a/b/", PathStyle::Posix);
            assert_eq!(out, "/a/b/");
            assert!(ok);
        }

        #[test]
        fn test_clean_path_windows_prefixes() {
            assert_eq!(windows("c:/"), "c:/");
            assert_eq!(windows("c:/.."), "c:/..");
            assert_eq!(windows("c:/a/../b"), "c:/b");
            assert_eq!(windows("c:\\a\\.\\b\\"), "c:/a/b");
            assert_eq!(windows("c:a/../b"), "c:b");
            assert_eq!(windows("//server/share/../x"), "//server/x");
            assert_eq!(windows("//server/share/dir/../file"), "//server/share/file");
            assert_eq!(windows("//server"), "//server");

            let (_, ok) = normalize_segments("//server/share/../..", PathStyle::Windows);
            assert!(!ok);
        }

        #[test]
        fn test_clean_path_non_ascii() {
            assert_eq!(posix("/проект/./документ/../файл.txt"), "/проект/файл.txt");
        }

        #[test]
        fn test_clean_path_is_idempotent() {
            let samples = [
                "", "/", ".", "..", "./local", "local/../bin", "/local/usr/../bin", "foo/..",
                "a//b/", "/..", "../../x/./y/..", "/a/b/c/../../../..", "x/.y/..z/...",
                "//srv/share/a/..", "c:/a/../..", "//", "///", "////.", "///./",
            ];
            for p in samples {
                let once = posix(p);
                assert_eq!(posix(&once), once, "posix: {p}");
                let once = windows(p);
                assert_eq!(windows(&once), once, "windows: {p}");
            }
        }
    }

    mod clean_check {
        use super::*;

        #[test]
        fn test_is_clean() {
            assert!(is_clean(""));
            assert!(is_clean("/"));
            assert!(is_clean("/a/b"));
            assert!(is_clean("a/.b/c..d"));
            assert!(is_clean("/a/..."));
            assert!(!is_clean("."));
            assert!(!is_clean(".."));
            assert!(!is_clean("./a"));
            assert!(!is_clean("a/./b"));
            assert!(!is_clean("a/../b"));
            assert!(!is_clean("a/.."));
            assert!(!is_clean("a//b"));
            assert!(!is_clean("//a"));
        }

        #[test]
        fn test_dot_count_resets_per_segment() {
            assert!(!is_clean(".../."));
            assert!(!is_clean("x.../.."));
        }

        #[test]
        fn test_dotfiles_are_clean() {
            for p in [".bashrc", "a/.b", "/.a", "..a", "a/..b/c", ".../x", "/a/.b."] {
                assert!(is_clean(p), "{p}");
                assert_eq!(posix(p), p, "{p}");
            }
        }

        #[test]
        fn test_is_clean_agrees_on_all_short_paths() {
            let alphabet = ['a', '.', '/'];
            let mut paths = vec![String::new()];
            let mut frontier = vec![String::new()];
            for _ in 0..6 {
                let mut next = Vec::new();
                for p in &frontier {
                    for c in alphabet {
                        next.push(format!("{p}{c}"));
                    }
                }
                paths.extend(next.iter().cloned());
                frontier = next;
            }

            for p in &paths {
                let cleaned = posix(p);
                // the documented exceptions
                if (p.len() > 1 && p.ends_with('/'))
                    || cleaned == "."
                    || cleaned.split('/').any(|s| s == "..")
                {
                    continue;
                }
                assert_eq!(is_clean(p), cleaned == *p, "{p:?} cleans to {cleaned:?}");
            }
        }

        #[test]
        fn test_is_clean_agrees_with_clean_path() {
            let samples = [
                "/", "/a/b", "a/b", "./a", "a/./b", "a/../b", "a//b", "a/.b", "/usr/lib/..",
                ".config", "x/...", "a/b/c", "//a/b",
            ];
            for p in samples {
                assert_eq!(is_clean(p), posix(p) == p, "{p}");
            }
        }

        #[test]
        fn test_known_exceptions() {
            // trailing separator: clean, but clean_path strips it
            assert!(is_clean("a/b/"));
            assert_ne!(posix("a/b/"), "a/b/");

            // leftover "..": clean_path keeps it, is_clean rejects it
            assert_eq!(posix("../a"), "../a");
            assert!(!is_clean("../a"));
            assert_eq!(posix("/.."), "/..");
            assert!(!is_clean("/.."));
        }
    }
}
