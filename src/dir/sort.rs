use std::cmp::Ordering;
use std::time::SystemTime;

use super::{FileInfo, SortFlags};

#[derive(Default)]
struct SortKey {
    is_dir: bool,
    modified: Option<SystemTime>,
    size: u64,
    suffix: String,
    name: String,
}

impl SortKey {
    fn new(info: &FileInfo, sort: SortFlags) -> Self {
        let fold = |s: &str| {
            if sort.contains(SortFlags::IGNORE_CASE) {
                s.to_lowercase()
            } else {
                s.to_string()
            }
        };
        let mut key = SortKey {
            name: fold(info.file_name()),
            ..Default::default()
        };
        if sort.intersects(SortFlags::DIRS_FIRST | SortFlags::DIRS_LAST) {
            key.is_dir = info.is_dir();
        }
        match sort_by(sort) {
            k if k == SortFlags::TIME => key.modified = info.last_modified(),
            k if k == SortFlags::SIZE => key.size = info.size(),
            k if k == SortFlags::TYPE => key.suffix = fold(info.suffix()),
            _ => {}
        }
        key
    }
}

fn sort_by(sort: SortFlags) -> SortFlags {
    sort & (SortFlags::SORT_BY_MASK | SortFlags::TYPE)
}

fn compare_text(a: &str, b: &str, sort: SortFlags) -> Ordering {
    if sort.contains(SortFlags::LOCALE_AWARE) {
        a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
    } else {
        a.cmp(b)
    }
}

fn compare(a: &SortKey, b: &SortKey, sort: SortFlags) -> Ordering {
    // the directory grouping is not affected by REVERSED
    if a.is_dir != b.is_dir {
        if sort.contains(SortFlags::DIRS_FIRST) {
            return if a.is_dir { Ordering::Less } else { Ordering::Greater };
        }
        if sort.contains(SortFlags::DIRS_LAST) {
            return if a.is_dir { Ordering::Greater } else { Ordering::Less };
        }
    }

    let by = sort_by(sort);
    let mut order = match by {
        // newest and largest first
        k if k == SortFlags::TIME => b.modified.cmp(&a.modified),
        k if k == SortFlags::SIZE => b.size.cmp(&a.size),
        k if k == SortFlags::TYPE => compare_text(&a.suffix, &b.suffix, sort),
        _ => Ordering::Equal,
    };
    if order == Ordering::Equal && by != SortFlags::UNSORTED {
        order = compare_text(&a.name, &b.name, sort);
    }

    if sort.contains(SortFlags::REVERSED) {
        order.reverse()
    } else {
        order
    }
}

/// Orders `infos` as directory listings are ordered.
///
/// The sort is stable. Entries whose key compares equal fall back to their names. A
/// list with an `UNSORTED` key is returned as is.
pub fn sort_file_infos(infos: Vec<FileInfo>, sort: SortFlags) -> Vec<FileInfo> {
    if infos.len() <= 1 || (sort & SortFlags::SORT_BY_MASK) == SortFlags::UNSORTED {
        return infos;
    }
    let mut keyed: Vec<(SortKey, FileInfo)> = infos
        .into_iter()
        .map(|info| (SortKey::new(&info, sort), info))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| compare(a, b, sort));
    keyed.into_iter().map(|(_, info)| info).collect()
}
