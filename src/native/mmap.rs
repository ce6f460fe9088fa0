//! Thin wrappers over `mmap`/`munmap`.

use std::fs::File;
use std::io;
use std::ptr::NonNull;

/// One live mapping: the address handed to the caller sits `extra` bytes past the
/// page-aligned base the OS returned.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct MapRegion {
    pub extra: usize,
    pub len: usize,
}

#[cfg(unix)]
pub(crate) fn page_size() -> usize {
    // SAFETY: sysconf has no memory-safety preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as usize } else { 4096 }
}

/// Maps `size` bytes of `file` at `offset`, aligning the offset down to a page boundary.
///
/// Overflowing `offset + size` combinations are rejected with `InvalidInput` before the
/// OS is asked.
#[cfg(unix)]
pub(crate) fn map(
    file: &File,
    offset: u64,
    size: usize,
    readable: bool,
    writable: bool,
    private: bool,
) -> io::Result<(NonNull<u8>, MapRegion)> {
    use std::os::fd::AsRawFd;

    let invalid = || io::Error::from_raw_os_error(libc::EINVAL);
    let os_offset = libc::off_t::try_from(offset).map_err(|_| invalid())?;

    let page = page_size();
    let extra = (offset % page as u64) as usize;
    let len = size.checked_add(extra).ok_or_else(invalid)?;
    let aligned = os_offset - extra as libc::off_t;

    let mut prot = 0;
    if readable {
        prot |= libc::PROT_READ;
    }
    if writable {
        prot |= libc::PROT_WRITE;
    }
    let share = if private {
        prot |= libc::PROT_WRITE;
        libc::MAP_PRIVATE
    } else {
        libc::MAP_SHARED
    };

    // SAFETY: a null hint lets the kernel pick the address; the descriptor is valid for
    // the duration of the call and the arguments were range-checked above.
    let base = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            prot,
            share,
            file.as_raw_fd(),
            aligned,
        )
    };
    if base == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `extra < page <= len`, so the result stays inside the mapping.
    let address = unsafe { (base as *mut u8).add(extra) };
    let address = NonNull::new(address).ok_or_else(invalid)?;
    Ok((address, MapRegion { extra, len }))
}

#[cfg(unix)]
pub(crate) fn unmap(address: NonNull<u8>, region: MapRegion) -> io::Result<()> {
    // SAFETY: `address - extra` is the base returned by mmap for a mapping of `len`
    // bytes that has not been released yet (the caller removes it from its table).
    let rc = unsafe {
        let base = address.as_ptr().sub(region.extra);
        libc::munmap(base as *mut libc::c_void, region.len)
    };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn map(
    _file: &File,
    _offset: u64,
    _size: usize,
    _readable: bool,
    _writable: bool,
    _private: bool,
) -> io::Result<(NonNull<u8>, MapRegion)> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

#[cfg(not(unix))]
pub(crate) fn unmap(_address: NonNull<u8>, _region: MapRegion) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}
