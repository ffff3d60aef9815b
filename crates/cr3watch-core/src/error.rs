use std::io;

use crate::DomainId;

/// An error that can occur while enumerating or monitoring domains.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A required argument was missing or empty.
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// No domain in the store carries the requested UUID.
    #[error("UUID not found in the domain store: {0}")]
    UuidNotFound(String),

    /// No domain in the store carries the requested name.
    #[error("Name not found in the domain store: {0}")]
    NameNotFound(String),

    /// The hypervisor does not know the domain.
    #[error("Domain {0} not found")]
    DomainNotFound(DomainId),

    /// The domain is not a hardware-virtualized guest.
    #[error("Domain {0} is not an HVM guest")]
    NotHvm(DomainId),

    /// The domain is being destroyed.
    #[error("Domain {0} is dying")]
    Dying(DomainId),

    /// The domain has shut down.
    #[error("Domain {0} is shut down")]
    Shutdown(DomainId),

    /// A hypervisor or event channel call failed.
    #[error("{call} failed: {source}")]
    Hypervisor {
        /// Name of the failed call.
        call: &'static str,

        /// The underlying system error.
        #[source]
        source: io::Error,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The shared page cannot hold a single ring slot.
    #[error("Ring page of {0} bytes cannot hold a single slot")]
    RingTooSmall(usize),

    /// The shared page has no address.
    #[error("Ring page is not mapped")]
    NullRingPage,

    /// More responses were pushed than requests were consumed.
    #[error("Response ring overrun")]
    RingOverrun,

    /// The session has no ring or event channel attached.
    #[error("Session is not attached")]
    NotAttached,
}

impl Error {
    /// Creates a hypervisor error from the calling thread's `errno`.
    pub fn hypervisor(call: &'static str) -> Self {
        Self::Hypervisor {
            call,
            source: io::Error::last_os_error(),
        }
    }

    /// Creates a hypervisor error from an explicit I/O error.
    pub fn hypervisor_with(call: &'static str, source: io::Error) -> Self {
        Self::Hypervisor { call, source }
    }

    /// Returns `true` if the error reports a failed lookup rather than a
    /// failed hypervisor call.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UuidNotFound(_) | Self::NameNotFound(_) | Self::DomainNotFound(_)
        )
    }
}
