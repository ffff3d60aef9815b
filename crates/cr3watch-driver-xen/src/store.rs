use std::{ffi::CString, ptr::NonNull};

use cr3watch_core::{DomainStore, Error};
use xen::sys::{XS_OPEN_READONLY, xs_close, xs_handle, xs_open, xs_read};

/// `XBT_NULL`: reads outside of any transaction.
const NO_TRANSACTION: u32 = 0;

/// A read-only handle to `libxenstore`.
///
/// Closed on drop.
pub struct XenStore {
    xsh: NonNull<xs_handle>,
}

impl XenStore {
    /// Opens the store read-only.
    pub fn new() -> Result<Self, Error> {
        let xsh = unsafe { xs_open(XS_OPEN_READONLY as _) };

        match NonNull::new(xsh) {
            Some(xsh) => Ok(Self { xsh }),
            None => Err(Error::hypervisor("xs_open")),
        }
    }
}

impl DomainStore for XenStore {
    fn read(&self, path: &str) -> Option<String> {
        let path = CString::new(path).ok()?;
        let mut len = 0;

        let value = unsafe {
            xs_read(
                self.xsh.as_ptr(),
                NO_TRANSACTION as _,
                path.as_ptr(),
                &mut len,
            )
        };

        if value.is_null() {
            return None;
        }

        // SAFETY: `xs_read` returns a `malloc`ed buffer of `len` bytes that
        // the caller frees.
        let result = unsafe {
            let bytes = std::slice::from_raw_parts(value.cast::<u8>(), len as usize);
            let result = String::from_utf8_lossy(bytes).into_owned();
            libc::free(value.cast());
            result
        };

        Some(result)
    }
}

impl Drop for XenStore {
    fn drop(&mut self) {
        unsafe { xs_close(self.xsh.as_ptr()) };
    }
}
