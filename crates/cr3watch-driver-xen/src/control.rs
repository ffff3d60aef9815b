use std::{
    mem,
    ptr::{self, NonNull},
};

use cr3watch_core::{
    ControlRegister, CtrlRegMonitor, DomainFlags, DomainId, DomainInfo, Error, EventChannelPort,
    HypervisorControl,
};
use xen::sys::{
    VM_EVENT_X86_CR0, VM_EVENT_X86_CR3, VM_EVENT_X86_CR4, VM_EVENT_X86_XCR0,
    xc_domain_getinfolist, xc_domaininfo_t, xc_interface, xc_interface_close, xc_interface_open,
    xc_monitor_disable, xc_monitor_enable, xc_monitor_write_ctrlreg,
};

use crate::page::{MappedRingPage, page_size};

/// A handle to `libxenctrl`.
///
/// Closed on drop.
pub struct XenControl {
    xch: NonNull<xc_interface>,
}

impl XenControl {
    /// Opens the control interface.
    pub fn new() -> Result<Self, Error> {
        // Null loggers select the library defaults.
        let xch = unsafe { xc_interface_open(ptr::null_mut(), ptr::null_mut(), 0) };

        match NonNull::new(xch) {
            Some(xch) => Ok(Self { xch }),
            None => Err(Error::hypervisor("xc_interface_open")),
        }
    }

    fn domain_info_raw(&self, first: DomainId, max: usize) -> Result<Vec<xc_domaininfo_t>, Error> {
        // SAFETY: `xc_domaininfo_t` is plain old data.
        let mut infos = vec![unsafe { mem::zeroed::<xc_domaininfo_t>() }; max];

        let rc = unsafe {
            xc_domain_getinfolist(
                self.xch.as_ptr(),
                first.0,
                infos.len() as _,
                infos.as_mut_ptr(),
            )
        };

        if rc < 0 {
            return Err(Error::hypervisor("xc_domain_getinfolist"));
        }

        infos.truncate(rc as usize);
        Ok(infos)
    }
}

fn domain_info_from(info: &xc_domaininfo_t) -> DomainInfo {
    DomainInfo {
        id: DomainId(u32::from(info.domain)),
        flags: DomainFlags::from_bits_retain(info.flags),
    }
}

fn ctrlreg_index(register: ControlRegister) -> u16 {
    let index = match register {
        ControlRegister::Cr0 => VM_EVENT_X86_CR0,
        ControlRegister::Cr3 => VM_EVENT_X86_CR3,
        ControlRegister::Cr4 => VM_EVENT_X86_CR4,
        ControlRegister::Xcr0 => VM_EVENT_X86_XCR0,
    };

    index as u16
}

impl HypervisorControl for XenControl {
    type Page = MappedRingPage;

    fn domain_info_list(&self, first: DomainId, max: usize) -> Result<Vec<DomainInfo>, Error> {
        let guests = DomainId::FIRST_RESERVED.0.saturating_sub(first.0) as usize;
        let max = max.min(guests);
        if max == 0 {
            return Ok(Vec::new());
        }

        let infos = self.domain_info_raw(first, max)?;
        Ok(infos.iter().map(domain_info_from).collect())
    }

    fn domain_info(&self, domain: DomainId) -> Result<DomainInfo, Error> {
        if domain.is_reserved() {
            return Err(Error::DomainNotFound(domain));
        }

        // The hypervisor answers with the first domain at or above the
        // requested ID.
        match self.domain_info_raw(domain, 1)?.first() {
            Some(info) if u32::from(info.domain) == domain.0 => Ok(domain_info_from(info)),
            _ => Err(Error::DomainNotFound(domain)),
        }
    }

    fn monitor_enable(
        &self,
        domain: DomainId,
    ) -> Result<(MappedRingPage, EventChannelPort), Error> {
        let mut port = 0u32;

        let ring = unsafe { xc_monitor_enable(self.xch.as_ptr(), domain.0, &mut port) };
        let ring = NonNull::new(ring.cast()).ok_or_else(|| Error::hypervisor("xc_monitor_enable"))?;

        // SAFETY: libxenctrl hands over a fresh mapping of one page.
        let page = unsafe { MappedRingPage::from_raw(ring, page_size()) };

        tracing::trace!(%domain, port, "xc_monitor_enable");
        Ok((page, EventChannelPort(port)))
    }

    fn monitor_disable(&self, domain: DomainId) -> Result<(), Error> {
        let rc = unsafe { xc_monitor_disable(self.xch.as_ptr(), domain.0) };
        if rc != 0 {
            return Err(Error::hypervisor("xc_monitor_disable"));
        }

        Ok(())
    }

    fn monitor_write_ctrlreg(
        &self,
        domain: DomainId,
        register: ControlRegister,
        options: CtrlRegMonitor,
    ) -> Result<(), Error> {
        let rc = unsafe {
            xc_monitor_write_ctrlreg(
                self.xch.as_ptr(),
                domain.0,
                ctrlreg_index(register),
                options.enable,
                options.sync,
                options.bitmask,
                options.onchange_only,
            )
        };

        if rc != 0 {
            return Err(Error::hypervisor("xc_monitor_write_ctrlreg"));
        }

        Ok(())
    }
}

impl Drop for XenControl {
    fn drop(&mut self) {
        unsafe { xc_interface_close(self.xch.as_ptr()) };
    }
}
