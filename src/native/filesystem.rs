//! Path-level operations on the host filesystem that need no open handle.

use std::fs;
use std::io;

use crate::core::utils;
use crate::engine::MetaFlags;
use crate::path::{PathEntry, clean_path, from_native_separators};

/// Makes `entry` absolute against the working directory and cleans it.
/// A trailing separator survives cleaning.
pub fn absolute_name(entry: &PathEntry) -> PathEntry {
    let orig = entry.file_path();
    let mut result = String::new();

    if orig.is_empty() || !entry.is_absolute() {
        result = utils::current_path().unwrap_or_else(|_| utils::root_path());
    }
    if !orig.is_empty() && orig != "." {
        if !result.is_empty() && !result.ends_with('/') {
            result.push('/');
        }
        result.push_str(orig);
    }
    if result == "/" {
        return PathEntry::from_internal(result);
    }

    let is_dir = result.ends_with('/');
    let mut result = clean_path(&result);
    if is_dir && !result.ends_with('/') {
        result.push('/');
    }
    PathEntry::from_internal(result)
}

/// Resolves every symlink in `entry`. `None` when the path does not exist.
pub fn canonical_name(entry: &PathEntry) -> Option<PathEntry> {
    if entry.is_empty() {
        return None;
    }
    let resolved = fs::canonicalize(entry.native_file_path()).ok()?;
    let mut path = from_native_separators(&resolved.to_string_lossy());
    // verbatim prefix produced on windows
    if let Some(stripped) = path.strip_prefix("//?/") {
        path = stripped.to_string();
    }
    Some(PathEntry::from_internal(path))
}

/// The target of the symlink at `entry`, made absolute against the link's directory.
pub fn link_target(entry: &PathEntry) -> Option<PathEntry> {
    let target = fs::read_link(entry.native_file_path()).ok()?;
    let target = from_native_separators(&target.to_string_lossy());
    let target = PathEntry::from_internal(target);
    if target.is_absolute() {
        return Some(PathEntry::from_internal(clean_path(target.file_path())));
    }
    let base = absolute_name(entry);
    Some(PathEntry::from_internal(clean_path(&format!(
        "{}/{}",
        base.path(),
        target.file_path()
    ))))
}

/// The raw, unresolved symlink target.
pub fn raw_link_path(entry: &PathEntry) -> Option<String> {
    let target = fs::read_link(entry.native_file_path()).ok()?;
    Some(from_native_separators(&target.to_string_lossy()))
}

#[cfg(unix)]
pub(crate) fn mode_from_permissions(perms: MetaFlags) -> u32 {
    let mut mode = 0u32;
    let table = [
        (MetaFlags::OWNER_READ | MetaFlags::USER_READ, libc::S_IRUSR),
        (MetaFlags::OWNER_WRITE | MetaFlags::USER_WRITE, libc::S_IWUSR),
        (MetaFlags::OWNER_EXECUTE | MetaFlags::USER_EXECUTE, libc::S_IXUSR),
        (MetaFlags::GROUP_READ, libc::S_IRGRP),
        (MetaFlags::GROUP_WRITE, libc::S_IWGRP),
        (MetaFlags::GROUP_EXECUTE, libc::S_IXGRP),
        (MetaFlags::OTHER_READ, libc::S_IROTH),
        (MetaFlags::OTHER_WRITE, libc::S_IWOTH),
        (MetaFlags::OTHER_EXECUTE, libc::S_IXOTH),
    ];
    for (flags, bit) in table {
        if perms.intersects(flags) {
            mode |= bit as u32;
        }
    }
    mode
}

/// Creates the directory at `entry`. With `create_parents`, missing parents are created
/// too and an existing directory is not an error.
#[cfg_attr(not(unix), allow(unused_variables))]
pub fn create_directory(
    entry: &PathEntry,
    create_parents: bool,
    permissions: Option<MetaFlags>,
) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(create_parents);
    #[cfg(unix)]
    if let Some(perms) = permissions {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode_from_permissions(perms));
    }
    builder.create(entry.native_file_path())
}

/// Removes the directory at `entry`. With `remove_empty_parents`, walks up removing each
/// parent until one is not empty; that stop is still a success once the leaf is gone.
pub fn remove_directory(entry: &PathEntry, remove_empty_parents: bool) -> io::Result<()> {
    if !remove_empty_parents {
        return fs::remove_dir(entry.native_file_path());
    }

    let dir_name = clean_path(entry.file_path());
    let mut slash = Some(dir_name.len());
    let mut removed_any = false;
    while let Some(end) = slash.filter(|&end| end > 0) {
        let chunk = PathEntry::from_internal(&dir_name[..end]);
        let meta = fs::metadata(chunk.native_file_path())?;
        if !meta.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{chunk} is not a directory"),
            ));
        }
        if let Err(err) = fs::remove_dir(chunk.native_file_path()) {
            return if removed_any { Ok(()) } else { Err(err) };
        }
        removed_any = true;
        slash = dir_name[..end].rfind('/');
    }
    Ok(())
}

pub fn remove_file(entry: &PathEntry) -> io::Result<()> {
    fs::remove_file(entry.native_file_path())
}

/// Renames `source` to `target`, failing if `target` already exists.
pub fn rename(source: &PathEntry, target: &PathEntry) -> io::Result<()> {
    if fs::symlink_metadata(target.native_file_path()).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "Destination file exists",
        ));
    }
    fs::rename(source.native_file_path(), target.native_file_path())
}

pub fn rename_overwrite(source: &PathEntry, target: &PathEntry) -> io::Result<()> {
    fs::rename(source.native_file_path(), target.native_file_path())
}

pub fn copy_file(source: &PathEntry, target: &PathEntry) -> io::Result<()> {
    fs::copy(source.native_file_path(), target.native_file_path()).map(|_| ())
}

/// Creates a symbolic link `link` pointing at `target`.
#[cfg(unix)]
pub fn create_link(target: &PathEntry, link: &PathEntry) -> io::Result<()> {
    std::os::unix::fs::symlink(target.native_file_path(), link.native_file_path())
}

#[cfg(windows)]
pub fn create_link(target: &PathEntry, link: &PathEntry) -> io::Result<()> {
    if fs::metadata(target.native_file_path()).is_ok_and(|m| m.is_dir()) {
        std::os::windows::fs::symlink_dir(target.native_file_path(), link.native_file_path())
    } else {
        std::os::windows::fs::symlink_file(target.native_file_path(), link.native_file_path())
    }
}

/// Looks up the login name of `uid`.
#[cfg(unix)]
pub fn user_name(uid: u32) -> Option<String> {
    use std::ffi::CStr;

    let mut buf = vec![0 as libc::c_char; 1024];
    // SAFETY: zeroed passwd is a valid out-parameter for getpwuid_r.
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut result: *mut libc::passwd = std::ptr::null_mut();
    loop {
        // SAFETY: all pointers reference live buffers of the given length.
        let rc = unsafe {
            libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result)
        };
        if rc == libc::ERANGE && buf.len() < 1 << 20 {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        break;
    }
    if result.is_null() || pwd.pw_name.is_null() {
        return None;
    }
    // SAFETY: getpwuid_r succeeded, so pw_name points to a NUL-terminated string in `buf`.
    let name = unsafe { CStr::from_ptr(pwd.pw_name) };
    Some(name.to_string_lossy().into_owned())
}

/// Looks up the name of group `gid`.
#[cfg(unix)]
pub fn group_name(gid: u32) -> Option<String> {
    use std::ffi::CStr;

    let mut buf = vec![0 as libc::c_char; 1024];
    // SAFETY: zeroed group is a valid out-parameter for getgrgid_r.
    let mut grp: libc::group = unsafe { std::mem::zeroed() };
    let mut result: *mut libc::group = std::ptr::null_mut();
    loop {
        // SAFETY: all pointers reference live buffers of the given length.
        let rc = unsafe {
            libc::getgrgid_r(gid, &mut grp, buf.as_mut_ptr(), buf.len(), &mut result)
        };
        if rc == libc::ERANGE && buf.len() < 1 << 20 {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        break;
    }
    if result.is_null() || grp.gr_name.is_null() {
        return None;
    }
    // SAFETY: getgrgid_r succeeded, so gr_name points to a NUL-terminated string in `buf`.
    let name = unsafe { CStr::from_ptr(grp.gr_name) };
    Some(name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn setup_test_env() -> TempDir {
        TempDir::new("native_fs_test").unwrap()
    }

    fn entry(path: &std::path::Path) -> PathEntry {
        PathEntry::new(path.to_string_lossy())
    }

    mod names {
        use super::*;

        #[test]
        fn test_absolute_name() {
            let cwd = utils::current_path().unwrap();
            assert_eq!(absolute_name(&PathEntry::new(".")).file_path(), cwd);
            assert_eq!(
                absolute_name(&PathEntry::new("a/../b")).file_path(),
                clean_path(&format!("{cwd}/b"))
            );
            assert!(absolute_name(&PathEntry::new("sub/")).file_path().ends_with("sub/"));
            #[cfg(unix)]
            {
                assert_eq!(absolute_name(&PathEntry::new("/")).file_path(), "/");
                assert_eq!(absolute_name(&PathEntry::new("/x/./y")).file_path(), "/x/y");
            }
        }

        #[test]
        fn test_canonical_name() {
            let temp_dir = setup_test_env();
            let dir = temp_dir.path().join("d");
            fs::create_dir(&dir).unwrap();
            let dotted = PathEntry::new(format!("{}/./d/../d", temp_dir.path().to_string_lossy()));
            let canonical = canonical_name(&dotted).unwrap();
            assert_eq!(canonical, canonical_name(&entry(&dir)).unwrap());
            assert!(canonical_name(&entry(&temp_dir.path().join("missing"))).is_none());
        }

        #[cfg(unix)]
        #[test]
        fn test_link_target() {
            let temp_dir = setup_test_env();
            fs::write(temp_dir.path().join("real"), b"").unwrap();
            let link = temp_dir.path().join("alias");
            std::os::unix::fs::symlink("real", &link).unwrap();

            assert_eq!(raw_link_path(&entry(&link)).as_deref(), Some("real"));
            let target = link_target(&entry(&link)).unwrap();
            assert!(target.file_path().ends_with("/real"));
            assert!(target.is_absolute());
        }
    }

    mod directories {
        use super::*;

        #[test]
        fn test_create_and_remove_with_parents() {
            let temp_dir = setup_test_env();
            fs::write(temp_dir.path().join("keep"), b"").unwrap();
            let nested = temp_dir.path().join("a/b/c");
            create_directory(&entry(&nested), true, None).unwrap();
            assert!(nested.is_dir());
            // existing directory is fine with parents
            create_directory(&entry(&nested), true, None).unwrap();
            assert!(create_directory(&entry(&nested), false, None).is_err());

            remove_directory(&entry(&nested), true).unwrap();
            assert!(!temp_dir.path().join("a").exists());
            assert!(temp_dir.path().exists(), "non-empty parent stops the walk");
        }

        #[test]
        fn test_remove_stops_at_non_empty_parent() {
            let temp_dir = setup_test_env();
            let nested = temp_dir.path().join("a/b");
            fs::create_dir_all(&nested).unwrap();
            fs::write(temp_dir.path().join("a/keep.txt"), b"x").unwrap();

            remove_directory(&entry(&nested), true).unwrap();
            assert!(!nested.exists());
            assert!(temp_dir.path().join("a").exists());
        }

        #[test]
        fn test_remove_non_empty_fails() {
            let temp_dir = setup_test_env();
            let dir = temp_dir.path().join("full");
            fs::create_dir(&dir).unwrap();
            fs::write(dir.join("f"), b"x").unwrap();
            assert!(remove_directory(&entry(&dir), false).is_err());
            assert!(remove_directory(&entry(&dir), true).is_err());
        }

        #[cfg(unix)]
        #[test]
        fn test_create_with_permissions() {
            use std::os::unix::fs::PermissionsExt;
            let temp_dir = setup_test_env();
            let dir = temp_dir.path().join("private");
            create_directory(&entry(&dir), false, Some(MetaFlags::OWNER_PERMISSIONS)).unwrap();
            let mode = fs::metadata(&dir).unwrap().permissions().mode();
            assert_eq!(mode & 0o077, 0);
        }
    }

    mod files {
        use super::*;

        #[test]
        fn test_rename_refuses_to_overwrite() {
            let temp_dir = setup_test_env();
            let a = temp_dir.path().join("a");
            let b = temp_dir.path().join("b");
            fs::write(&a, b"a").unwrap();
            fs::write(&b, b"b").unwrap();

            let err = rename(&entry(&a), &entry(&b)).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

            rename_overwrite(&entry(&a), &entry(&b)).unwrap();
            assert!(!a.exists());
            assert_eq!(fs::read(&b).unwrap(), b"a");
        }

        #[test]
        fn test_copy_and_remove() {
            let temp_dir = setup_test_env();
            let a = temp_dir.path().join("a");
            let b = temp_dir.path().join("b");
            fs::write(&a, b"data").unwrap();
            copy_file(&entry(&a), &entry(&b)).unwrap();
            assert_eq!(fs::read(&b).unwrap(), b"data");
            remove_file(&entry(&b)).unwrap();
            assert!(!b.exists());
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_owner_names() {
        assert_eq!(user_name(0).as_deref(), Some("root"));
        assert!(group_name(0).is_some());
    }
}
