//! Xen backend for cr3watch.
//!
//! Implements the [`Hypervisor`] services on top of `libxenctrl`,
//! `libxenstore` and `libxenevtchn`, through the bindings of the `xen`
//! crate.

mod control;
mod evtchn;
mod page;
mod store;

use cr3watch_core::{Error, Hypervisor};

pub use self::{
    control::XenControl, evtchn::XenEventChannel, page::MappedRingPage, store::XenStore,
};

/// The local Xen hypervisor.
#[derive(Debug, Default, Clone, Copy)]
pub struct Xen;

impl Xen {
    /// Creates a new handle factory.
    pub fn new() -> Self {
        Self
    }
}

impl Hypervisor for Xen {
    type Control = XenControl;
    type Store = XenStore;
    type Channel = XenEventChannel;

    fn control(&self) -> Result<XenControl, Error> {
        XenControl::new()
    }

    fn store(&self) -> Result<XenStore, Error> {
        XenStore::new()
    }

    fn event_channel(&self) -> Result<XenEventChannel, Error> {
        XenEventChannel::new()
    }
}
