//! Lazily-filled filesystem attributes for a single path.

use std::fs;
use std::time::SystemTime;

use bitflags::bitflags;

bitflags! {
    /// Metadata categories. A bit set in [`MetadataCache::known`] means the matching
    /// value has been fetched and may be read.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MetaFlags: u32 {
        const OTHER_EXECUTE = 0x0000_0001;
        const OTHER_WRITE = 0x0000_0002;
        const OTHER_READ = 0x0000_0004;
        const GROUP_EXECUTE = 0x0000_0010;
        const GROUP_WRITE = 0x0000_0020;
        const GROUP_READ = 0x0000_0040;
        /// Effective permissions of the current user.
        const USER_EXECUTE = 0x0000_0100;
        const USER_WRITE = 0x0000_0200;
        const USER_READ = 0x0000_0400;
        const OWNER_EXECUTE = 0x0000_1000;
        const OWNER_WRITE = 0x0000_2000;
        const OWNER_READ = 0x0000_4000;

        const OTHER_PERMISSIONS = 0x0000_0007;
        const GROUP_PERMISSIONS = 0x0000_0070;
        const USER_PERMISSIONS = 0x0000_0700;
        const OWNER_PERMISSIONS = 0x0000_7000;
        const READ_PERMISSIONS = 0x0000_4444;
        const WRITE_PERMISSIONS = 0x0000_2222;
        const EXECUTE_PERMISSIONS = 0x0000_1111;
        const PERMISSIONS = 0x0000_7777;

        const LINK_TYPE = 0x0001_0000;
        const FILE_TYPE = 0x0002_0000;
        const DIRECTORY_TYPE = 0x0004_0000;
        const BUNDLE_TYPE = 0x0008_0000;
        const SEQUENTIAL_TYPE = 0x0080_0000;
        const ALIAS_TYPE = 0x2000_0000;
        const TYPES = Self::LINK_TYPE.bits()
            | Self::FILE_TYPE.bits()
            | Self::DIRECTORY_TYPE.bits()
            | Self::BUNDLE_TYPE.bits()
            | Self::SEQUENTIAL_TYPE.bits()
            | Self::ALIAS_TYPE.bits();

        const HIDDEN = 0x0010_0000;
        const SIZE = 0x0020_0000;
        const EXISTS = 0x0040_0000;
        const WAS_DELETED = 0x4000_0000;
        const ATTRIBUTES = Self::HIDDEN.bits()
            | Self::SIZE.bits()
            | Self::EXISTS.bits()
            | Self::WAS_DELETED.bits();

        const BIRTH_TIME = 0x0100_0000;
        const METADATA_CHANGE_TIME = 0x0200_0000;
        const MODIFICATION_TIME = 0x0400_0000;
        const ACCESS_TIME = 0x0800_0000;
        const TIMES = 0x0F00_0000;

        const OWNER_IDS = 0x1000_0000;

        /// Everything a single stat call answers.
        const POSIX_STAT = Self::OWNER_PERMISSIONS.bits()
            | Self::GROUP_PERMISSIONS.bits()
            | Self::OTHER_PERMISSIONS.bits()
            | Self::FILE_TYPE.bits()
            | Self::DIRECTORY_TYPE.bits()
            | Self::SEQUENTIAL_TYPE.bits()
            | Self::SIZE.bits()
            | Self::TIMES.bits()
            | Self::OWNER_IDS.bits();

        /// What a directory entry type reveals without a stat.
        const DIR_ENTRY_TYPE = Self::LINK_TYPE.bits()
            | Self::FILE_TYPE.bits()
            | Self::DIRECTORY_TYPE.bits()
            | Self::SEQUENTIAL_TYPE.bits()
            | Self::EXISTS.bits();

        const ALL = 0xFFFF_FFFF;
    }
}

/// Which timestamp of a file.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FileTime {
    Access,
    Birth,
    MetadataChange,
    Modification,
}

impl FileTime {
    pub fn flag(self) -> MetaFlags {
        match self {
            FileTime::Access => MetaFlags::ACCESS_TIME,
            FileTime::Birth => MetaFlags::BIRTH_TIME,
            FileTime::MetadataChange => MetaFlags::METADATA_CHANGE_TIME,
            FileTime::Modification => MetaFlags::MODIFICATION_TIME,
        }
    }

    fn slot(self) -> usize {
        match self {
            FileTime::Access => 0,
            FileTime::Birth => 1,
            FileTime::MetadataChange => 2,
            FileTime::Modification => 3,
        }
    }
}

/// Cached attributes of one path.
///
/// `known` says which categories hold real values; getters return a neutral value
/// (`false`, `0`, `None`) for anything not known, so stale or unfetched fields are never
/// surfaced. [`MetadataCache::clear`] only resets the mask.
#[derive(Debug, Clone, Default)]
pub struct MetadataCache {
    known: MetaFlags,
    entry_flags: MetaFlags,
    size: u64,
    times: [Option<SystemTime>; 4],
    user_id: u32,
    group_id: u32,
    /// Raw `st_mode`, kept for the permission and type derivations.
    #[cfg(unix)]
    raw_mode: u32,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn known(&self) -> MetaFlags {
        self.known
    }

    pub fn has_flags(&self, flags: MetaFlags) -> bool {
        self.known.contains(flags)
    }

    /// The part of `flags` not yet known.
    pub fn missing_flags(&self, flags: MetaFlags) -> MetaFlags {
        flags - self.known
    }

    pub fn clear(&mut self) {
        self.known = MetaFlags::empty();
    }

    /// Invalidates selected categories only.
    pub fn clear_flags(&mut self, flags: MetaFlags) {
        self.known -= flags;
    }

    /// Marks `known` as fetched with the given values; other known bits are untouched.
    pub fn set(&mut self, known: MetaFlags, values: MetaFlags) {
        self.entry_flags = (self.entry_flags - known) | (values & known);
        self.known |= known;
    }

    fn flag(&self, flag: MetaFlags) -> bool {
        self.known.contains(flag) && self.entry_flags.contains(flag)
    }

    pub fn exists(&self) -> bool {
        self.flag(MetaFlags::EXISTS)
    }

    pub fn is_link(&self) -> bool {
        self.flag(MetaFlags::LINK_TYPE)
    }

    pub fn is_file(&self) -> bool {
        self.flag(MetaFlags::FILE_TYPE)
    }

    pub fn is_directory(&self) -> bool {
        self.flag(MetaFlags::DIRECTORY_TYPE)
    }

    pub fn is_bundle(&self) -> bool {
        self.flag(MetaFlags::BUNDLE_TYPE)
    }

    pub fn is_alias(&self) -> bool {
        self.flag(MetaFlags::ALIAS_TYPE)
    }

    pub fn is_sequential(&self) -> bool {
        self.flag(MetaFlags::SEQUENTIAL_TYPE)
    }

    pub fn is_hidden(&self) -> bool {
        self.flag(MetaFlags::HIDDEN)
    }

    pub fn was_deleted(&self) -> bool {
        self.flag(MetaFlags::WAS_DELETED)
    }

    /// Permission bits that are both known and granted.
    pub fn permissions(&self) -> MetaFlags {
        self.entry_flags & self.known & MetaFlags::PERMISSIONS
    }

    pub fn size(&self) -> u64 {
        if self.known.contains(MetaFlags::SIZE) { self.size } else { 0 }
    }

    pub fn file_time(&self, which: FileTime) -> Option<SystemTime> {
        if self.known.contains(which.flag()) {
            self.times[which.slot()]
        } else {
            None
        }
    }

    pub fn modification_time(&self) -> Option<SystemTime> {
        self.file_time(FileTime::Modification)
    }

    pub fn user_id(&self) -> Option<u32> {
        self.known.contains(MetaFlags::OWNER_IDS).then_some(self.user_id)
    }

    pub fn group_id(&self) -> Option<u32> {
        self.known.contains(MetaFlags::OWNER_IDS).then_some(self.group_id)
    }

    #[cfg(unix)]
    pub fn raw_mode(&self) -> Option<u32> {
        self.known
            .intersects(MetaFlags::POSIX_STAT)
            .then_some(self.raw_mode)
    }

    pub fn set_size(&mut self, size: u64) {
        self.size = size;
        self.known |= MetaFlags::SIZE;
    }

    pub fn set_file_time(&mut self, which: FileTime, time: Option<SystemTime>) {
        self.times[which.slot()] = time;
        self.known |= which.flag();
    }

    /// Marks the entry as missing: exists/type/size known and all false.
    ///
    /// The link bits are left alone; a dangling symlink is a link whose target is missing.
    pub fn set_missing(&mut self) {
        let was_there = self.exists();
        let link_bits = MetaFlags::LINK_TYPE | MetaFlags::ALIAS_TYPE;
        self.set(
            MetaFlags::EXISTS | (MetaFlags::TYPES - link_bits) | MetaFlags::SIZE,
            MetaFlags::empty(),
        );
        self.size = 0;
        if was_there {
            self.set(MetaFlags::WAS_DELETED, MetaFlags::WAS_DELETED);
        }
    }

    /// Hidden-ness on POSIX systems is purely a naming convention.
    pub fn fill_hidden_from_name(&mut self, file_name: &str) {
        let hidden = file_name.starts_with('.') && file_name != "." && file_name != "..";
        self.set(
            MetaFlags::HIDDEN,
            if hidden { MetaFlags::HIDDEN } else { MetaFlags::empty() },
        );
    }

    /// Fills the stat categories from a (possibly symlink-followed) metadata record.
    pub fn fill_from_metadata(&mut self, meta: &fs::Metadata) {
        let ft = meta.file_type();
        let mut values = MetaFlags::EXISTS;
        if ft.is_file() {
            values |= MetaFlags::FILE_TYPE;
        } else if ft.is_dir() {
            values |= MetaFlags::DIRECTORY_TYPE;
        } else if !ft.is_symlink() {
            values |= MetaFlags::SEQUENTIAL_TYPE;
        }
        values |= permissions_of(meta);

        let known = MetaFlags::EXISTS
            | MetaFlags::FILE_TYPE
            | MetaFlags::DIRECTORY_TYPE
            | MetaFlags::SEQUENTIAL_TYPE
            | MetaFlags::OWNER_PERMISSIONS
            | MetaFlags::GROUP_PERMISSIONS
            | MetaFlags::OTHER_PERMISSIONS
            | MetaFlags::USER_PERMISSIONS
            | MetaFlags::WAS_DELETED;
        self.set(known, values);

        self.size = meta.len();
        self.known |= MetaFlags::SIZE;

        self.set_file_time(FileTime::Modification, meta.modified().ok());
        self.set_file_time(FileTime::Access, meta.accessed().ok());
        self.set_file_time(FileTime::Birth, meta.created().ok());
        self.fill_platform(meta);
    }

    #[cfg(unix)]
    fn fill_platform(&mut self, meta: &fs::Metadata) {
        use std::os::unix::fs::MetadataExt;
        use std::time::{Duration, UNIX_EPOCH};

        self.raw_mode = meta.mode();
        self.user_id = meta.uid();
        self.group_id = meta.gid();
        self.known |= MetaFlags::OWNER_IDS;

        let ctime = if meta.ctime() >= 0 {
            UNIX_EPOCH.checked_add(Duration::new(meta.ctime() as u64, meta.ctime_nsec() as u32))
        } else {
            None
        };
        self.set_file_time(FileTime::MetadataChange, ctime);
    }

    #[cfg(not(unix))]
    fn fill_platform(&mut self, meta: &fs::Metadata) {
        // No separate inode-change time; report the last write instead.
        self.set_file_time(FileTime::MetadataChange, meta.modified().ok());
    }

    /// Fills type information from a directory entry without touching the file.
    ///
    /// A symlink only reveals that it is a link; the target type stays unknown.
    pub fn fill_from_file_type(&mut self, ft: fs::FileType) {
        if ft.is_symlink() {
            self.set(MetaFlags::LINK_TYPE, MetaFlags::LINK_TYPE);
            return;
        }
        let mut values = MetaFlags::EXISTS;
        if ft.is_file() {
            values |= MetaFlags::FILE_TYPE;
        } else if ft.is_dir() {
            values |= MetaFlags::DIRECTORY_TYPE;
        } else {
            values |= MetaFlags::SEQUENTIAL_TYPE;
        }
        self.set(MetaFlags::DIR_ENTRY_TYPE, values);
    }
}

#[cfg(unix)]
fn permissions_of(meta: &fs::Metadata) -> MetaFlags {
    use std::os::unix::fs::MetadataExt;

    let mode = meta.mode();
    let mut perms = MetaFlags::empty();
    let table = [
        (libc::S_IRUSR, MetaFlags::OWNER_READ),
        (libc::S_IWUSR, MetaFlags::OWNER_WRITE),
        (libc::S_IXUSR, MetaFlags::OWNER_EXECUTE),
        (libc::S_IRGRP, MetaFlags::GROUP_READ),
        (libc::S_IWGRP, MetaFlags::GROUP_WRITE),
        (libc::S_IXGRP, MetaFlags::GROUP_EXECUTE),
        (libc::S_IROTH, MetaFlags::OTHER_READ),
        (libc::S_IWOTH, MetaFlags::OTHER_WRITE),
        (libc::S_IXOTH, MetaFlags::OTHER_EXECUTE),
    ];
    for (bit, flag) in table {
        if mode & (bit as u32) != 0 {
            perms |= flag;
        }
    }

    // Effective permissions of the calling user: owner, group or other class.
    // SAFETY: geteuid/getegid have no preconditions and cannot fail.
    let (euid, egid) = unsafe { (libc::geteuid(), libc::getegid()) };
    let class = if euid == 0 {
        // root reads and writes everything, executes if anyone may
        let exec = perms.intersects(MetaFlags::EXECUTE_PERMISSIONS) || meta.is_dir();
        MetaFlags::USER_READ
            | MetaFlags::USER_WRITE
            | if exec { MetaFlags::USER_EXECUTE } else { MetaFlags::empty() }
    } else if meta.uid() == euid {
        MetaFlags::from_bits_truncate((perms & MetaFlags::OWNER_PERMISSIONS).bits() >> 4)
    } else if meta.gid() == egid {
        MetaFlags::from_bits_truncate((perms & MetaFlags::GROUP_PERMISSIONS).bits() << 4)
    } else {
        MetaFlags::from_bits_truncate((perms & MetaFlags::OTHER_PERMISSIONS).bits() << 8)
    };
    perms | class
}

#[cfg(not(unix))]
fn permissions_of(meta: &fs::Metadata) -> MetaFlags {
    let mut perms = MetaFlags::READ_PERMISSIONS;
    if !meta.permissions().readonly() {
        perms |= MetaFlags::WRITE_PERMISSIONS;
    }
    if meta.is_dir() {
        perms |= MetaFlags::EXECUTE_PERMISSIONS;
    }
    perms
}
