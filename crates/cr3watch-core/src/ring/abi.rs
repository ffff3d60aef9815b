//! Binary layout of the vm_event shared ring (interface version 7, x86).
//!
//! Everything here mirrors `xen/include/public/vm_event.h` and
//! `xen/include/public/io/ring.h` byte for byte.

#![allow(non_camel_case_types)]

use std::sync::atomic::AtomicU32;

use zerocopy::{FromBytes, FromZeros as _, Immutable, IntoBytes, KnownLayout};

use crate::{ControlRegister, Cr3, VcpuId};

/// Version of the vm_event interface this layout describes.
pub const VM_EVENT_INTERFACE_VERSION: u32 = 0x0000_0007;

/// Reason code of a control register write event.
pub const VM_EVENT_REASON_WRITE_CTRLREG: u32 = 4;

bitflags::bitflags! {
    /// `VM_EVENT_FLAG_*` bits of a request or response.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VmEventFlags: u32 {
        /// The vCPU is paused until a response arrives.
        const VCPU_PAUSED = 1 << 0;

        const _ = !0;
    }
}

/// Shared ring header (`struct vm_event_sring` without the slots).
///
/// The four cursors are shared with the hypervisor and are only accessed
/// atomically.
#[repr(C)]
#[derive(Debug)]
pub struct SharedRingHeader {
    /// Request producer index, advanced by the hypervisor.
    pub req_prod: AtomicU32,

    /// Request index at which the hypervisor notifies us next.
    pub req_event: AtomicU32,

    /// Response producer index, advanced by us.
    pub rsp_prod: AtomicU32,

    /// Response index at which we want to be notified next.
    pub rsp_event: AtomicU32,

    _pvt: [u8; 4],
    _pad: [u8; 44],
}

/// A single request or response slot (`vm_event_request_t`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct VmEvent {
    /// `VM_EVENT_INTERFACE_VERSION`.
    pub version: u32,

    /// `VM_EVENT_FLAG_*`.
    pub flags: u32,

    /// `VM_EVENT_REASON_*`.
    pub reason: u32,

    /// The vCPU that triggered the event.
    pub vcpu_id: u32,

    /// The alternate p2m view active at the time of the event.
    pub altp2m_idx: u16,

    _pad: [u16; 3],

    /// Reason-specific payload.
    pub u: [u8; 32],

    /// Register snapshot.
    pub data: [u8; 344],
}

impl Default for VmEvent {
    fn default() -> Self {
        Self::new_zeroed()
    }
}

impl VmEvent {
    /// Builds a control register write request, the way the hypervisor
    /// fills one in.
    pub fn write_ctrlreg(
        vcpu_id: VcpuId,
        register: ControlRegister,
        old_value: u64,
        new_value: u64,
        regs: &VmEventRegsX86,
    ) -> Self {
        let ctrlreg = vm_event_write_ctrlreg {
            index: register.index(),
            _pad: 0,
            new_value,
            old_value,
        };

        let mut event = Self {
            version: VM_EVENT_INTERFACE_VERSION,
            flags: VmEventFlags::VCPU_PAUSED.bits(),
            reason: VM_EVENT_REASON_WRITE_CTRLREG,
            vcpu_id: u32::from(vcpu_id.0),
            ..Self::default()
        };

        event.u[..size_of::<vm_event_write_ctrlreg>()].copy_from_slice(ctrlreg.as_bytes());
        event.data.copy_from_slice(regs.as_bytes());
        event
    }

    /// Returns the request flags.
    pub fn flags(&self) -> VmEventFlags {
        VmEventFlags::from_bits_retain(self.flags)
    }

    /// Returns the vCPU index.
    ///
    /// vCPU indices never exceed 16 bits in practice; larger values are
    /// truncated.
    pub fn vcpu(&self) -> VcpuId {
        VcpuId(self.vcpu_id as u16)
    }

    /// Interprets the payload as a control register write, if this is one.
    pub fn as_write_ctrlreg(&self) -> Option<VmEventWriteCtrlReg> {
        if self.reason != VM_EVENT_REASON_WRITE_CTRLREG {
            return None;
        }

        let (raw, _) = vm_event_write_ctrlreg::read_from_prefix(&self.u).ok()?;
        Some(VmEventWriteCtrlReg {
            register: ControlRegister::try_from(raw.index).ok(),
            index: raw.index,
            old_value: raw.old_value,
            new_value: raw.new_value,
        })
    }

    /// Returns the x86 register snapshot.
    pub fn regs(&self) -> VmEventRegsX86 {
        zerocopy::transmute!(self.data)
    }
}

/// Decoded payload of a control register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmEventWriteCtrlReg {
    /// The register, if the index is a known one.
    pub register: Option<ControlRegister>,

    /// The raw `VM_EVENT_X86_*` index.
    pub index: u32,

    /// Value before the write.
    pub old_value: u64,

    /// Value being written.
    pub new_value: u64,
}

impl VmEventWriteCtrlReg {
    /// Returns `true` for writes to CR3.
    pub fn is_cr3(&self) -> bool {
        self.register == Some(ControlRegister::Cr3)
    }

    /// Returns the previous value as a [`Cr3`].
    pub fn old_cr3(&self) -> Cr3 {
        Cr3(self.old_value)
    }

    /// Returns the written value as a [`Cr3`].
    pub fn new_cr3(&self) -> Cr3 {
        Cr3(self.new_value)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub(crate) struct vm_event_write_ctrlreg {
    pub index: u32,
    pub _pad: u32,
    pub new_value: u64,
    pub old_value: u64,
}

/// Segment limit and attributes packed into 32 bits.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct VmEventSelectorReg(u32);

/// Register snapshot taken at the trap point (`struct vm_event_regs_x86`).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct VmEventRegsX86 {
    rax: u64,
    rcx: u64,
    rdx: u64,
    rbx: u64,
    rsp: u64,
    rbp: u64,
    rsi: u64,
    rdi: u64,
    r8: u64,
    r9: u64,
    r10: u64,
    r11: u64,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
    rflags: u64,
    dr6: u64,
    dr7: u64,
    rip: u64,
    cr0: u64,
    cr2: u64,
    cr3: u64,
    cr4: u64,
    sysenter_cs: u64,
    sysenter_esp: u64,
    sysenter_eip: u64,
    msr_efer: u64,
    msr_star: u64,
    msr_lstar: u64,
    gdtr_base: u64,
    npt_base: u64,
    vmtrace_pos: u64,
    cs_base: u32,
    ss_base: u32,
    ds_base: u32,
    es_base: u32,
    fs_base: u64,
    gs_base: u64,
    cs: VmEventSelectorReg,
    ss: VmEventSelectorReg,
    ds: VmEventSelectorReg,
    es: VmEventSelectorReg,
    fs: VmEventSelectorReg,
    gs: VmEventSelectorReg,
    shadow_gs: u64,
    gdtr_limit: u16,
    cs_sel: u16,
    ss_sel: u16,
    ds_sel: u16,
    es_sel: u16,
    fs_sel: u16,
    gs_sel: u16,
    _pad: u16,
}

impl VmEventRegsX86 {
    /// Instruction pointer.
    pub fn rip(&self) -> u64 {
        self.rip
    }

    /// Sets the instruction pointer.
    pub fn set_rip(&mut self, rip: u64) {
        self.rip = rip;
    }

    /// Control register 3 at the time of the snapshot.
    pub fn cr3(&self) -> Cr3 {
        Cr3(self.cr3)
    }

    /// Sets control register 3.
    pub fn set_cr3(&mut self, cr3: Cr3) {
        self.cr3 = cr3.0;
    }
}
