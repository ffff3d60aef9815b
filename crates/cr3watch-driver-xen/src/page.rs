use std::ptr::NonNull;

use cr3watch_core::RingPage;

/// The vm_event ring page mapped by `xc_monitor_enable`.
///
/// Unmapped on drop.
pub struct MappedRingPage {
    ptr: NonNull<u8>,
    len: usize,
}

impl MappedRingPage {
    /// Takes ownership of a mapping of `len` bytes at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be a page-aligned mapping of `len` bytes created with
    /// `mmap`, not owned by anybody else.
    pub(crate) unsafe fn from_raw(ptr: NonNull<u8>, len: usize) -> Self {
        Self { ptr, len }
    }
}

unsafe impl RingPage for MappedRingPage {
    fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn len(&self) -> usize {
        self.len
    }
}

impl Drop for MappedRingPage {
    fn drop(&mut self) {
        // SAFETY: The mapping is exclusively owned by `self`.
        let rc = unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.len) };
        if rc != 0 {
            tracing::warn!(
                err = %std::io::Error::last_os_error(),
                "failed to unmap ring page"
            );
        }
    }
}

/// Returns the size of a page on this host.
pub(crate) fn page_size() -> usize {
    // SAFETY: `sysconf` has no preconditions.
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        size if size > 0 => size as usize,
        _ => 4096,
    }
}
