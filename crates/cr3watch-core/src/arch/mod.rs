//! x86 control register types.

mod cr3;

pub use self::cr3::Cr3;

/// Control register, as numbered by the vm_event interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ControlRegister {
    /// Control Register 0.
    Cr0 = 0,

    /// Control Register 3 ([`Cr3`]).
    Cr3 = 1,

    /// Control Register 4.
    Cr4 = 2,

    /// Extended Control Register 0.
    Xcr0 = 3,
}

impl ControlRegister {
    /// Returns the `VM_EVENT_X86_*` index of the register.
    pub const fn index(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for ControlRegister {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Cr0),
            1 => Ok(Self::Cr3),
            2 => Ok(Self::Cr4),
            3 => Ok(Self::Xcr0),
            _ => Err(value),
        }
    }
}

impl std::fmt::Display for ControlRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Self::Cr0 => "cr0",
            Self::Cr3 => "cr3",
            Self::Cr4 => "cr4",
            Self::Xcr0 => "xcr0",
        };

        f.write_str(name)
    }
}
