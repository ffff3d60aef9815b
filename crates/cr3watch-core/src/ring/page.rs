/// Exclusive owner of the memory shared with the hypervisor.
///
/// A ring page is neither `Clone` nor `Copy`; the ring channel holds the
/// only handle to it for as long as the session lives.
///
/// # Safety
///
/// `as_mut_ptr` must return a pointer to `len` bytes that stay valid,
/// writable and 8-byte aligned until the page is dropped.
pub unsafe trait RingPage {
    /// Returns the base address of the page.
    fn as_mut_ptr(&mut self) -> *mut u8;

    /// Returns the length of the page in bytes.
    fn len(&self) -> usize;

    /// Returns `true` if the page has no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A heap-allocated ring page.
///
/// Stands in for the hypervisor mapping when the ring is simulated.
pub struct HeapRingPage {
    data: Box<[u64]>,
}

impl HeapRingPage {
    /// Allocates a zeroed page of `len` bytes, rounded up to a multiple of
    /// eight.
    pub fn new(len: usize) -> Self {
        Self {
            data: vec![0u64; len.div_ceil(size_of::<u64>())].into_boxed_slice(),
        }
    }

    /// Allocates a zeroed 4 KiB page.
    pub fn page() -> Self {
        Self::new(4096)
    }
}

unsafe impl RingPage for HeapRingPage {
    fn as_mut_ptr(&mut self) -> *mut u8 {
        self.data.as_mut_ptr().cast()
    }

    fn len(&self) -> usize {
        self.data.len() * size_of::<u64>()
    }
}

impl std::fmt::Debug for HeapRingPage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("HeapRingPage")
            .field("len", &self.len())
            .finish()
    }
}
