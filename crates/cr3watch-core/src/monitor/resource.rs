use crate::{ControlRegister, EventChannelPort};

/// A resource a monitor session has acquired and must release.
///
/// Sessions record resources in acquisition order and release them in
/// reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resource {
    /// The mapped ring page; released by unmapping it.
    Ring,

    /// The monitoring subsystem of the domain; released by disengaging it.
    Monitor,

    /// The event channel handle; released by closing it.
    Channel,

    /// A bound local port; released by unbinding it.
    Port(EventChannelPort),

    /// Write interception of a control register; released by disabling it
    /// and answering whatever is left on the ring.
    Interception(ControlRegister),
}
