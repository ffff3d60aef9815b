use crate::{Cr3, DomainId, VcpuId, ring::VmEvent};

/// A write to CR3 intercepted in a guest.
///
/// The event borrows from the session that produced it and lives only for
/// the duration of a [`Cr3Handler::handle_cr3`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cr3Event<'a> {
    /// The domain the write happened in.
    domain_id: DomainId,

    /// The UUID the session was opened with, for display.
    uuid: Option<&'a str>,

    /// The virtual CPU that performed the write.
    vcpu_id: VcpuId,

    /// The register value before the write.
    old_value: Cr3,

    /// The register value being written.
    new_value: Cr3,

    /// The instruction pointer at the trap point.
    rip: u64,
}

impl<'a> Cr3Event<'a> {
    /// Creates a new CR3 event.
    pub fn new(
        domain_id: DomainId,
        uuid: Option<&'a str>,
        vcpu_id: VcpuId,
        old_value: Cr3,
        new_value: Cr3,
        rip: u64,
    ) -> Self {
        Self {
            domain_id,
            uuid,
            vcpu_id,
            old_value,
            new_value,
            rip,
        }
    }

    /// Decodes a ring request.
    ///
    /// Returns `None` unless the request reports a write to CR3.
    pub fn decode(domain_id: DomainId, uuid: Option<&'a str>, request: &VmEvent) -> Option<Self> {
        let ctrlreg = request.as_write_ctrlreg()?;
        if !ctrlreg.is_cr3() {
            return None;
        }

        Some(Self::new(
            domain_id,
            uuid,
            request.vcpu(),
            ctrlreg.old_cr3(),
            ctrlreg.new_cr3(),
            request.regs().rip(),
        ))
    }

    /// Returns the domain the write happened in.
    pub fn domain_id(&self) -> DomainId {
        self.domain_id
    }

    /// Returns the UUID hint of the session, if any.
    ///
    /// The hint is whatever the session was opened with and is not
    /// re-validated against the domain store.
    pub fn uuid(&self) -> Option<&'a str> {
        self.uuid
    }

    /// Returns the virtual CPU that performed the write.
    pub fn vcpu_id(&self) -> VcpuId {
        self.vcpu_id
    }

    /// Returns the register value before the write.
    pub fn old_value(&self) -> Cr3 {
        self.old_value
    }

    /// Returns the register value being written.
    pub fn new_value(&self) -> Cr3 {
        self.new_value
    }

    /// Returns the instruction pointer at the trap point.
    pub fn rip(&self) -> u64 {
        self.rip
    }
}

/// A trait for handling CR3 events.
///
/// Handlers are observation-only: the guest is always resumed with the
/// values it requested, whatever the handler does. The vCPU stays paused
/// while the handler runs, so it must not block.
///
/// Any `FnMut(&Cr3Event)` closure is a handler.
pub trait Cr3Handler {
    /// Handles a CR3 write.
    fn handle_cr3(&mut self, event: &Cr3Event<'_>);

    /// Handles a wait that elapsed without a notification.
    fn handle_timeout(&mut self) {}
}

impl<F> Cr3Handler for F
where
    F: FnMut(&Cr3Event<'_>),
{
    fn handle_cr3(&mut self, event: &Cr3Event<'_>) {
        self(event)
    }
}
