//! Traits implemented by hypervisor backends.
//!
//! The monitor session and the domain directory never talk to the
//! hypervisor directly. They go through the services below, which the Xen
//! driver implements on top of `libxenctrl`, `libxenstore` and
//! `/dev/xen/evtchn`.

use std::{io, os::fd::RawFd, time::Duration};

use crate::{ControlRegister, DomainId, DomainInfo, Error, EventChannelPort, RingPage};

/// Options for control register write interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtrlRegMonitor {
    /// Whether the interception is being enabled or disabled.
    pub enable: bool,

    /// Pause the vCPU until a response is written back.
    pub sync: bool,

    /// Bits of the register whose changes are ignored.
    pub bitmask: u64,

    /// Only report writes that actually change the register value.
    pub onchange_only: bool,
}

impl CtrlRegMonitor {
    /// Synchronous, changed-only interception.
    pub const fn enabled() -> Self {
        Self {
            enable: true,
            sync: true,
            bitmask: 0,
            onchange_only: true,
        }
    }

    /// The same options with interception turned off.
    pub const fn disabled(self) -> Self {
        Self {
            enable: false,
            ..self
        }
    }
}

impl Default for CtrlRegMonitor {
    fn default() -> Self {
        Self::enabled()
    }
}

/// The hypervisor control interface.
pub trait HypervisorControl {
    /// The shared ring page handed out by [`monitor_enable`].
    ///
    /// [`monitor_enable`]: Self::monitor_enable
    type Page: RingPage;

    /// Lists up to `max` domains, starting at `first`, in ascending order.
    fn domain_info_list(&self, first: DomainId, max: usize) -> Result<Vec<DomainInfo>, Error>;

    /// Retrieves the status of a single domain.
    fn domain_info(&self, domain: DomainId) -> Result<DomainInfo, Error>;

    /// Engages the monitoring subsystem for a domain.
    ///
    /// Returns the mapped ring page and the remote event channel port the
    /// hypervisor signals when it places requests on the ring.
    fn monitor_enable(&self, domain: DomainId) -> Result<(Self::Page, EventChannelPort), Error>;

    /// Disengages the monitoring subsystem for a domain.
    fn monitor_disable(&self, domain: DomainId) -> Result<(), Error>;

    /// Toggles interception of writes to a control register.
    fn monitor_write_ctrlreg(
        &self,
        domain: DomainId,
        register: ControlRegister,
        options: CtrlRegMonitor,
    ) -> Result<(), Error>;
}

/// Read-only access to the hierarchical domain store.
pub trait DomainStore {
    /// Reads the value at `path`.
    ///
    /// Absent keys (and keys that cannot be read) yield `None`.
    fn read(&self, path: &str) -> Option<String>;
}

/// Outcome of a bounded wait on an event channel descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The descriptor is readable; a port has fired.
    Ready,

    /// The timeout elapsed without a notification.
    Timeout,
}

/// A bidirectional event channel handle.
///
/// Closing the handle is done by dropping it.
pub trait EventChannel {
    /// Binds a local port to `remote_port` of `domain`.
    fn bind_interdomain(
        &mut self,
        domain: DomainId,
        remote_port: EventChannelPort,
    ) -> Result<EventChannelPort, Error>;

    /// Returns the descriptor that becomes readable when a port fires.
    fn fd(&self) -> Result<RawFd, Error>;

    /// Waits up to `timeout` for `fd` to become readable.
    fn wait(&self, fd: RawFd, timeout: Duration) -> io::Result<Readiness> {
        poll_readable(fd, timeout)
    }

    /// Returns the port that fired and masks it.
    ///
    /// Must only be called after [`wait`] reported [`Readiness::Ready`].
    ///
    /// [`wait`]: Self::wait
    fn pending(&mut self) -> Result<EventChannelPort, Error>;

    /// Signals the remote end of `port`.
    fn notify(&self, port: EventChannelPort) -> Result<(), Error>;

    /// Re-arms `port` after [`pending`] masked it.
    ///
    /// [`pending`]: Self::pending
    fn unmask(&self, port: EventChannelPort) -> Result<(), Error>;

    /// Unbinds a local port.
    fn unbind(&mut self, port: EventChannelPort) -> Result<(), Error>;
}

/// A hypervisor, as a source of the services above.
///
/// Each call opens a fresh handle; the caller owns it.
pub trait Hypervisor {
    /// The control interface.
    type Control: HypervisorControl;

    /// The domain store.
    type Store: DomainStore;

    /// The event channel service.
    type Channel: EventChannel;

    /// Opens a handle to the control interface.
    fn control(&self) -> Result<Self::Control, Error>;

    /// Opens a read-only handle to the domain store.
    fn store(&self) -> Result<Self::Store, Error>;

    /// Opens an event channel handle.
    fn event_channel(&self) -> Result<Self::Channel, Error>;
}

/// Polls `fd` for `POLLIN | POLLERR` with a millisecond timeout.
pub fn poll_readable(fd: RawFd, timeout: Duration) -> io::Result<Readiness> {
    let mut fds = [libc::pollfd {
        fd,
        events: libc::POLLIN | libc::POLLERR,
        revents: 0,
    }];

    let timeout = timeout
        .as_millis()
        .try_into()
        .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;

    #[rustfmt::skip]
    let poll_result = unsafe {
        libc::poll(
            fds.as_mut_ptr(),
            fds.len() as _,
            timeout
        )
    };

    match poll_result {
        0 => Ok(Readiness::Timeout),
        -1 => Err(io::Error::last_os_error()),
        _ => Ok(Readiness::Ready),
    }
}
