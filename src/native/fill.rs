//! Fills a [`MetadataCache`] from the host filesystem.

use std::fs;

use crate::engine::{MetaFlags, MetadataCache};
use crate::path::PathEntry;

/// Queries the host for the categories in `what` and stores them in `data`.
///
/// Link information comes from `lstat`; everything else follows symlinks. When the entry
/// is not a link, the `lstat` result is reused instead of stat-ing twice. A dangling link
/// ends up as a link that does not exist. Returns whether the entry (or link target)
/// exists.
pub fn fill_metadata(entry: &PathEntry, data: &mut MetadataCache, what: MetaFlags) -> bool {
    let native = entry.native_file_path();
    if native.is_empty() {
        data.set_missing();
        data.set(MetaFlags::LINK_TYPE | MetaFlags::ALIAS_TYPE, MetaFlags::empty());
        return false;
    }

    if what.contains(MetaFlags::HIDDEN) {
        data.fill_hidden_from_name(entry.file_name());
    }

    let want_link = what.intersects(MetaFlags::LINK_TYPE | MetaFlags::ALIAS_TYPE);
    let want_stat = what.intersects(
        MetaFlags::POSIX_STAT
            | MetaFlags::USER_PERMISSIONS
            | MetaFlags::EXISTS
            | MetaFlags::WAS_DELETED
            | MetaFlags::BUNDLE_TYPE,
    );

    let mut lstat = None;
    if want_link {
        match fs::symlink_metadata(native) {
            Ok(meta) => {
                let is_link = meta.file_type().is_symlink();
                data.set(
                    MetaFlags::LINK_TYPE | MetaFlags::ALIAS_TYPE,
                    if is_link { MetaFlags::LINK_TYPE } else { MetaFlags::empty() },
                );
                if !is_link {
                    lstat = Some(meta);
                }
            }
            Err(err) => {
                log::trace!("lstat {entry} failed: {err}");
                data.set(MetaFlags::LINK_TYPE | MetaFlags::ALIAS_TYPE, MetaFlags::empty());
                data.set_missing();
                return false;
            }
        }
    }

    if !want_stat {
        return data.exists();
    }

    let meta = match lstat {
        Some(meta) => Ok(meta),
        None => fs::metadata(native),
    };
    match meta {
        Ok(meta) => {
            data.fill_from_metadata(&meta);
            // Bundles are a packaging convention of other platforms.
            data.set(MetaFlags::BUNDLE_TYPE, MetaFlags::empty());
            true
        }
        Err(err) => {
            log::trace!("stat {entry} failed: {err}");
            data.set_missing();
            false
        }
    }
}
