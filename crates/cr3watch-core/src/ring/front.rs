//! The hypervisor side of the ring, for driving the consumer in tests.

use std::sync::atomic::Ordering;

use super::{RING_HEADER_SIZE, SharedRingHeader, VmEvent, ring_capacity, slot_index};

/// Produces requests into and consumes responses from a shared ring page.
pub(crate) struct FrontRing {
    base: *mut u8,
    capacity: u32,
    req_prod_pvt: u32,
    rsp_cons: u32,
}

impl FrontRing {
    /// Attaches to a ring page that the consumer side has initialized.
    ///
    /// # Safety
    ///
    /// `base` must point to `len` bytes that outlive the front ring.
    pub unsafe fn attach(base: *mut u8, len: usize) -> Self {
        Self {
            base,
            capacity: ring_capacity(len),
            req_prod_pvt: 0,
            rsp_cons: 0,
        }
    }

    pub fn header(&self) -> &SharedRingHeader {
        unsafe { &*self.base.cast::<SharedRingHeader>() }
    }

    fn slot(&self, index: u32) -> *mut VmEvent {
        let slot = slot_index(index, self.capacity) as usize;
        unsafe { self.base.add(RING_HEADER_SIZE).cast::<VmEvent>().add(slot) }
    }

    /// Writes a request into the next free slot, without publishing it.
    ///
    /// Returns `false` if the ring is full.
    pub fn push_request(&mut self, request: &VmEvent) -> bool {
        if self.req_prod_pvt.wrapping_sub(self.rsp_cons) >= self.capacity {
            return false;
        }

        unsafe { self.slot(self.req_prod_pvt).write_volatile(*request) };
        self.req_prod_pvt = self.req_prod_pvt.wrapping_add(1);
        true
    }

    /// Makes all written requests visible to the consumer.
    pub fn publish(&mut self) {
        self.header()
            .req_prod
            .store(self.req_prod_pvt, Ordering::Release);
    }

    /// Pushes and publishes a batch of requests.
    pub fn send(&mut self, requests: &[VmEvent]) -> usize {
        let sent = requests
            .iter()
            .take_while(|request| self.push_request(request))
            .count();

        self.publish();
        sent
    }

    /// Consumes the next published response.
    pub fn pop_response(&mut self) -> Option<VmEvent> {
        let rsp_prod = self.header().rsp_prod.load(Ordering::Acquire);
        if rsp_prod == self.rsp_cons {
            return None;
        }

        let response = unsafe { self.slot(self.rsp_cons).read_volatile() };
        self.rsp_cons = self.rsp_cons.wrapping_add(1);
        Some(response)
    }

    /// Consumes every published response.
    pub fn drain_responses(&mut self) -> Vec<VmEvent> {
        std::iter::from_fn(|| self.pop_response()).collect()
    }

    /// Returns the request index at which the consumer wants to be notified.
    pub fn req_event(&self) -> u32 {
        self.header().req_event.load(Ordering::Acquire)
    }
}
