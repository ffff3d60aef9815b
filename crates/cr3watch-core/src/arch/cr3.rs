use serde::{Deserialize, Serialize};

/// `CR3` control register.
///
/// Holds the physical address of the top-level page table of the active
/// address space. A write to it is a context switch inside the guest.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cr3(pub u64);

impl Cr3 {
    /// Returns the Process Context Identifier (PCID).
    pub fn pcid(self) -> u16 {
        (self.0 & 0xfff) as _
    }

    /// Returns the page frame number of the top-level page table.
    ///
    /// Bits 12 to 51 of the register (52-bit physical address width).
    pub fn page_frame_number(self) -> u64 {
        (self.0 >> 12) & 0x00ff_ffff_ffff
    }

    /// Returns the physical address of the top-level page table.
    pub fn page_table_base(self) -> u64 {
        self.page_frame_number() << 12
    }

    /// Returns true if the PCID should be invalidated.
    pub fn pcid_invalidate(self) -> bool {
        self.0 >> 63 & 1 != 0
    }
}

impl std::fmt::Debug for Cr3 {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Cr3")
            .field("pcid", &self.pcid())
            .field("page_frame_number", &self.page_frame_number())
            .field("pcid_invalidate", &self.pcid_invalidate())
            .finish()
    }
}

impl std::fmt::LowerHex for Cr3 {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::LowerHex::fmt(&self.0, f)
    }
}

impl From<u64> for Cr3 {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Cr3> for u64 {
    fn from(value: Cr3) -> Self {
        value.0
    }
}
