mod directory;

use serde::{Deserialize, Serialize};

pub use self::directory::DomainDirectory;
use crate::DomainId;

bitflags::bitflags! {
    /// Domain status flags, as reported by the hypervisor (`XEN_DOMINF_*`).
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DomainFlags: u32 {
        /// The domain is being destroyed.
        const DYING = 1 << 0;

        /// The domain is a hardware-virtualized guest.
        const HVM_GUEST = 1 << 1;

        /// The domain has shut down.
        const SHUTDOWN = 1 << 2;

        /// The domain is paused.
        const PAUSED = 1 << 3;

        /// The domain is blocked.
        const BLOCKED = 1 << 4;

        /// The domain is running.
        const RUNNING = 1 << 5;

        /// The domain is being debugged.
        const DEBUGGED = 1 << 6;

        /// The domain is a xenstore domain.
        const XS_DOMAIN = 1 << 7;

        /// The domain uses hardware-assisted paging.
        const HAP = 1 << 8;

        // The shutdown code lives in bits 16 and up.
        const _ = !0;
    }
}

impl DomainFlags {
    /// Returns `true` for hardware-virtualized guests.
    pub fn is_hvm(self) -> bool {
        self.contains(Self::HVM_GUEST)
    }

    /// Returns `true` if the domain is being destroyed.
    pub fn is_dying(self) -> bool {
        self.contains(Self::DYING)
    }

    /// Returns `true` if the domain has shut down.
    pub fn is_shutdown(self) -> bool {
        self.contains(Self::SHUTDOWN)
    }
}

/// Domain status as returned by the hypervisor control interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainInfo {
    /// The domain identifier.
    pub id: DomainId,

    /// The domain status flags.
    pub flags: DomainFlags,
}

/// A snapshot of one domain, augmented with store data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// The domain identifier. Volatile across reboots.
    pub id: DomainId,

    /// The domain status flags.
    pub flags: DomainFlags,

    /// The stable UUID, if the store has one.
    pub uuid: Option<String>,

    /// The display name, if the store has one.
    pub name: Option<String>,
}

impl Domain {
    /// Returns `true` if the domain is an HVM guest that is neither dying
    /// nor shut down.
    ///
    /// This is a snapshot-level check; the hypervisor has the final word
    /// when monitoring is engaged.
    pub fn is_monitorable(&self) -> bool {
        self.flags.is_hvm() && !self.flags.is_dying() && !self.flags.is_shutdown()
    }
}
