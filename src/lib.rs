//! Observe CR3 writes of Xen HVM guests.
//!
//! The crate re-exports [`cr3watch_core`], which holds the ring protocol,
//! the monitor session and the domain directory, together with the Xen
//! backend when the `driver-xen` feature is enabled.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "driver-xen")]
//! # fn main() -> Result<(), cr3watch::Error> {
//! use std::sync::atomic::AtomicBool;
//!
//! use cr3watch::{Cr3Event, DomainDirectory, MonitorSession, xen::Xen};
//!
//! let xen = Xen::new();
//! let domain_id = DomainDirectory::new(&xen).find_by_name("win10")?;
//!
//! let mut session = MonitorSession::open(&xen, domain_id, None)?;
//! session.enable()?;
//!
//! let stop = AtomicBool::new(false);
//! session.run(
//!     &mut |event: &Cr3Event<'_>| println!("{:#x}", event.new_value()),
//!     &stop,
//! )?;
//!
//! session.close();
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "driver-xen"))]
//! # fn main() {}
//! ```

pub use cr3watch_core::*;
#[cfg(feature = "driver-xen")]
pub use cr3watch_driver_xen as xen;
