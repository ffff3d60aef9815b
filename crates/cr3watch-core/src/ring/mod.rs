//! The vm_event shared ring, seen from the consumer (back) side.
//!
//! The hypervisor produces requests and consumes responses; this process
//! does the opposite. Both directions share the same slots, so a request
//! slot is reused for its response once the request has been copied out.

mod abi;
mod page;
#[cfg(test)]
pub(crate) mod front;

use std::{
    ptr::NonNull,
    sync::atomic::{Ordering, fence},
};

pub use self::{
    abi::{
        SharedRingHeader, VM_EVENT_INTERFACE_VERSION, VM_EVENT_REASON_WRITE_CTRLREG, VmEvent,
        VmEventFlags, VmEventRegsX86, VmEventWriteCtrlReg,
    },
    page::{HeapRingPage, RingPage},
};
use crate::Error;

/// Size of the shared header in front of the first slot.
pub const RING_HEADER_SIZE: usize = size_of::<SharedRingHeader>();

/// Maps a free-running ring index to a slot index.
pub const fn slot_index(index: u32, capacity: u32) -> u32 {
    index % capacity
}

/// Returns the number of slots a page of `len` bytes holds.
///
/// The slot count is rounded down to a power of two, so that free-running
/// indices wrap around consistently.
pub const fn ring_capacity(len: usize) -> u32 {
    let slots = len.saturating_sub(RING_HEADER_SIZE) / size_of::<VmEvent>();
    if slots == 0 {
        return 0;
    }

    1u32 << slots.ilog2()
}

/// The consumer side of a vm_event ring.
///
/// Owns the page the ring lives on. Requests are copied out of the ring by
/// value; responses become visible to the hypervisor only after
/// [`flush`](Self::flush).
pub struct RingChannel<P>
where
    P: RingPage,
{
    base: NonNull<u8>,
    capacity: u32,
    req_cons: u32,
    rsp_prod_pvt: u32,

    // Keeps the mapping alive; `base` points into it.
    _page: P,
}

impl<P> RingChannel<P>
where
    P: RingPage,
{
    /// Initializes a fresh ring on `page`.
    ///
    /// Zeroes the page, stamps the shared header the way a new front ring
    /// expects it and attaches the consumer view to it.
    pub fn new(mut page: P) -> Result<Self, Error> {
        let (base, capacity) = Self::layout(&mut page)?;
        let len = page.len();

        // SAFETY: The page contract guarantees `len` writable bytes.
        unsafe { base.as_ptr().write_bytes(0, len) };

        let ring = Self {
            base,
            capacity,
            req_cons: 0,
            rsp_prod_pvt: 0,
            _page: page,
        };

        let header = ring.header();
        header.req_event.store(1, Ordering::Relaxed);
        header.rsp_event.store(1, Ordering::Relaxed);
        fence(Ordering::Release);

        tracing::trace!(len, capacity, "ring initialized");
        Ok(ring)
    }

    /// Verifies that `page` can carry a ring, without touching it.
    ///
    /// [`new`](Self::new) fails exactly when this does.
    pub fn check(page: &mut P) -> Result<(), Error> {
        Self::layout(page).map(|_| ())
    }

    fn layout(page: &mut P) -> Result<(NonNull<u8>, u32), Error> {
        let len = page.len();
        let capacity = ring_capacity(len);
        if capacity == 0 {
            return Err(Error::RingTooSmall(len));
        }

        let base = NonNull::new(page.as_mut_ptr()).ok_or(Error::NullRingPage)?;
        Ok((base, capacity))
    }

    /// Returns the number of slots in the ring.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns the number of requests that can be popped right now.
    ///
    /// This is never more than the number of free response slots, so
    /// every popped request can be answered.
    pub fn unconsumed_requests(&self) -> u32 {
        let req_prod = self.header().req_prod.load(Ordering::Acquire);
        let requests = req_prod.wrapping_sub(self.req_cons);
        let free = self
            .capacity
            .saturating_sub(self.req_cons.wrapping_sub(self.rsp_prod_pvt));

        requests.min(free)
    }

    /// Copies the next request out of the ring.
    ///
    /// Returns `None` when every published request has been consumed.
    pub fn pop_request(&mut self) -> Option<VmEvent> {
        if self.unconsumed_requests() == 0 {
            return None;
        }

        fence(Ordering::Acquire);

        // SAFETY: The slot lies within the page and the hypervisor has
        // published it.
        let request = unsafe { self.slot(self.req_cons).as_ptr().read_volatile() };

        self.req_cons = self.req_cons.wrapping_add(1);
        self.header()
            .req_event
            .store(self.req_cons.wrapping_add(1), Ordering::Release);

        Some(request)
    }

    /// Queues a response.
    ///
    /// The response is not visible to the hypervisor until the ring is
    /// flushed. Fails with [`Error::RingOverrun`] if every consumed request
    /// has already been answered.
    pub fn push_response(&mut self, response: &VmEvent) -> Result<(), Error> {
        if self.req_cons == self.rsp_prod_pvt {
            return Err(Error::RingOverrun);
        }

        // SAFETY: The slot lies within the page and its request has been
        // copied out already.
        unsafe { self.slot(self.rsp_prod_pvt).as_ptr().write_volatile(*response) };

        self.rsp_prod_pvt = self.rsp_prod_pvt.wrapping_add(1);
        Ok(())
    }

    /// Publishes all queued responses at once.
    pub fn flush(&mut self) {
        fence(Ordering::Release);
        self.header()
            .rsp_prod
            .store(self.rsp_prod_pvt, Ordering::Release);
    }

    /// Returns the number of responses queued but not yet flushed.
    pub fn unflushed_responses(&self) -> u32 {
        let rsp_prod = self.header().rsp_prod.load(Ordering::Relaxed);
        self.rsp_prod_pvt.wrapping_sub(rsp_prod)
    }

    /// Returns the published response producer index.
    pub fn response_producer(&self) -> u32 {
        self.header().rsp_prod.load(Ordering::Acquire)
    }

    /// Returns the private request consumer index.
    pub fn request_consumer(&self) -> u32 {
        self.req_cons
    }

    fn header(&self) -> &SharedRingHeader {
        // SAFETY: The page starts with the header and outlives `self`.
        unsafe { self.base.cast::<SharedRingHeader>().as_ref() }
    }

    fn slot(&self, index: u32) -> NonNull<VmEvent> {
        let slot = slot_index(index, self.capacity) as usize;

        // SAFETY: `slot < capacity` and `capacity` slots fit in the page.
        unsafe {
            self.base
                .add(RING_HEADER_SIZE)
                .cast::<VmEvent>()
                .add(slot)
        }
    }
}

impl<P> std::fmt::Debug for RingChannel<P>
where
    P: RingPage,
{
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("RingChannel")
            .field("capacity", &self.capacity)
            .field("req_cons", &self.req_cons)
            .field("rsp_prod_pvt", &self.rsp_prod_pvt)
            .finish()
    }
}
