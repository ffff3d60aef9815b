//! Core CR3 monitoring functionality.
//!
//! This crate contains everything that does not need to talk to a real
//! hypervisor: the vm_event ring protocol, the monitor session lifecycle,
//! the event dispatch loop and the domain directory. The hypervisor itself
//! is reached through the traits in [`driver`], which are implemented by
//! the `cr3watch-driver-xen` crate (and by in-memory fakes in tests).

pub mod arch;
mod core;
mod domain;
pub mod driver;
mod error;
mod event;
pub mod monitor;
pub mod ring;

pub use self::{
    arch::{ControlRegister, Cr3},
    core::{DomainId, EventChannelPort, VcpuId},
    domain::{Domain, DomainDirectory, DomainFlags, DomainInfo},
    driver::{
        CtrlRegMonitor, DomainStore, EventChannel, Hypervisor, HypervisorControl, Readiness,
    },
    error::Error,
    event::{Cr3Event, Cr3Handler},
    monitor::{MonitorConfig, MonitorSession, MonitorStats, SessionState},
    ring::{HeapRingPage, RingChannel, RingPage},
};
