use std::{
    os::fd::RawFd,
    ptr::{self, NonNull},
};

use cr3watch_core::{DomainId, Error, EventChannel, EventChannelPort};
use xen::sys::{
    xenevtchn_bind_interdomain, xenevtchn_close, xenevtchn_fd, xenevtchn_handle,
    xenevtchn_notify, xenevtchn_open, xenevtchn_pending, xenevtchn_unbind, xenevtchn_unmask,
};

/// A `libxenevtchn` handle.
///
/// Unlike the port wrapper of the `xen` crate, fetching the pending port
/// and unmasking it are separate calls here, so that the port is only
/// re-armed once the ring has been drained.
pub struct XenEventChannel {
    xce: NonNull<xenevtchn_handle>,
}

impl XenEventChannel {
    /// Opens an event channel handle.
    pub fn new() -> Result<Self, Error> {
        let xce = unsafe { xenevtchn_open(ptr::null_mut(), 0) };

        match NonNull::new(xce) {
            Some(xce) => Ok(Self { xce }),
            None => Err(Error::hypervisor("xenevtchn_open")),
        }
    }
}

impl EventChannel for XenEventChannel {
    fn bind_interdomain(
        &mut self,
        domain: DomainId,
        remote_port: EventChannelPort,
    ) -> Result<EventChannelPort, Error> {
        let local_port =
            unsafe { xenevtchn_bind_interdomain(self.xce.as_ptr(), domain.0, remote_port.0) };

        if local_port < 0 {
            return Err(Error::hypervisor("xenevtchn_bind_interdomain"));
        }

        tracing::trace!(%domain, %remote_port, local_port, "bound event channel");
        Ok(EventChannelPort(local_port as u32))
    }

    fn fd(&self) -> Result<RawFd, Error> {
        let fd = unsafe { xenevtchn_fd(self.xce.as_ptr()) };
        if fd < 0 {
            return Err(Error::hypervisor("xenevtchn_fd"));
        }

        Ok(fd)
    }

    fn pending(&mut self) -> Result<EventChannelPort, Error> {
        let port = unsafe { xenevtchn_pending(self.xce.as_ptr()) };
        if port < 0 {
            return Err(Error::hypervisor("xenevtchn_pending"));
        }

        Ok(EventChannelPort(port as u32))
    }

    fn notify(&self, port: EventChannelPort) -> Result<(), Error> {
        let rc = unsafe { xenevtchn_notify(self.xce.as_ptr(), port.0) };
        if rc < 0 {
            return Err(Error::hypervisor("xenevtchn_notify"));
        }

        Ok(())
    }

    fn unmask(&self, port: EventChannelPort) -> Result<(), Error> {
        let rc = unsafe { xenevtchn_unmask(self.xce.as_ptr(), port.0) };
        if rc < 0 {
            return Err(Error::hypervisor("xenevtchn_unmask"));
        }

        Ok(())
    }

    fn unbind(&mut self, port: EventChannelPort) -> Result<(), Error> {
        let rc = unsafe { xenevtchn_unbind(self.xce.as_ptr(), port.0) };
        if rc < 0 {
            return Err(Error::hypervisor("xenevtchn_unbind"));
        }

        Ok(())
    }
}

impl Drop for XenEventChannel {
    fn drop(&mut self) {
        unsafe { xenevtchn_close(self.xce.as_ptr()) };
    }
}
