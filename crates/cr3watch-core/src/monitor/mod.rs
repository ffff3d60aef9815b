//! Monitor sessions.
//!
//! A [`MonitorSession`] attaches to one domain, turns on CR3 write
//! interception and runs the dispatch loop that answers every intercepted
//! write. Sessions move through [`SessionState`]s:
//!
//! ```text
//! open() ──> Opened ──enable()──> Enabled ──run()──> Running ──┐
//!              │                     │  ^                      │
//!              │                     │  └──────────────────────┘
//!              └─────────────────────┴────── close() / drop ──> Closed
//! ```
//!
//! Running the loop on a session that was never enabled is allowed; the
//! ring simply stays empty.

mod config;
mod dispatch;
mod resource;
mod stats;

use std::os::fd::RawFd;

pub use self::{config::MonitorConfig, stats::MonitorStats};
use self::{dispatch::drain_ring, resource::Resource};
use crate::{
    ControlRegister, Cr3Event, DomainId, Error, EventChannel as _, EventChannelPort, Hypervisor,
    HypervisorControl, RingChannel,
};

/// Lifecycle state of a [`MonitorSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Attached to the domain; CR3 interception is off.
    Opened,

    /// CR3 interception is on.
    Enabled,

    /// The dispatch loop is running.
    Running,

    /// Every acquired resource has been released.
    Closed,
}

type PageOf<H> = <<H as Hypervisor>::Control as HypervisorControl>::Page;

/// A CR3 monitoring session on one domain.
///
/// The session exclusively owns the ring page and the event channel for
/// its whole lifetime. It is torn down by [`close`](Self::close) or when
/// dropped; teardown releases exactly the resources that were acquired,
/// in reverse order, and never fails.
pub struct MonitorSession<H>
where
    H: Hypervisor,
{
    domain_id: DomainId,
    uuid: Option<String>,
    config: MonitorConfig,

    ring: Option<RingChannel<PageOf<H>>>,
    channel: Option<H::Channel>,
    remote_port: EventChannelPort,
    local_port: Option<EventChannelPort>,
    fd: Option<RawFd>,

    resources: Vec<Resource>,
    state: SessionState,
    stats: MonitorStats,

    control: H::Control,
}

impl<H> MonitorSession<H>
where
    H: Hypervisor,
{
    /// Attaches to a domain with the default configuration.
    ///
    /// See [`open_with_config`](Self::open_with_config).
    pub fn open(
        hypervisor: &H,
        domain_id: DomainId,
        uuid_hint: Option<&str>,
    ) -> Result<Self, Error> {
        Self::open_with_config(hypervisor, domain_id, uuid_hint, MonitorConfig::default())
    }

    /// Attaches to a domain.
    ///
    /// Verifies that the domain is a live HVM guest, engages the monitoring
    /// subsystem, binds an event channel to the port it hands out and
    /// initializes the shared ring. If any step fails, whatever was
    /// acquired up to that point is released before the error is returned.
    ///
    /// The UUID hint is only carried along for display in events.
    pub fn open_with_config(
        hypervisor: &H,
        domain_id: DomainId,
        uuid_hint: Option<&str>,
        config: MonitorConfig,
    ) -> Result<Self, Error> {
        let control = hypervisor.control()?;

        let info = control.domain_info(domain_id)?;
        if !info.flags.is_hvm() {
            return Err(Error::NotHvm(domain_id));
        }
        if info.flags.is_dying() {
            return Err(Error::Dying(domain_id));
        }
        if info.flags.is_shutdown() {
            return Err(Error::Shutdown(domain_id));
        }

        let (mut page, remote_port) = control.monitor_enable(domain_id)?;

        // From here on, an early return drops the session, which unwinds
        // the resources recorded so far.
        let mut session = Self {
            domain_id,
            uuid: uuid_hint.filter(|uuid| !uuid.is_empty()).map(String::from),
            config,
            ring: None,
            channel: None,
            remote_port,
            local_port: None,
            fd: None,
            resources: Vec::new(),
            state: SessionState::Opened,
            stats: MonitorStats::default(),
            control,
        };

        // Disengage the monitor before its page is unmapped.
        if let Err(err) = RingChannel::check(&mut page) {
            session.acquired(Resource::Monitor);
            session.teardown();
            drop(page);
            return Err(err);
        }

        session.ring = Some(RingChannel::new(page)?);
        session.acquired(Resource::Ring);
        session.acquired(Resource::Monitor);

        tracing::debug!(%domain_id, %remote_port, "monitor engaged");

        session.channel = Some(hypervisor.event_channel()?);
        session.acquired(Resource::Channel);

        let channel = session.channel.as_mut().ok_or(Error::NotAttached)?;
        let local_port = channel.bind_interdomain(domain_id, remote_port)?;
        session.local_port = Some(local_port);
        session.acquired(Resource::Port(local_port));

        let channel = session.channel.as_ref().ok_or(Error::NotAttached)?;
        let fd = channel.fd()?;
        session.fd = Some(fd);

        tracing::debug!(%domain_id, %local_port, fd, "event channel bound");
        Ok(session)
    }

    /// Turns on CR3 write interception.
    ///
    /// Calling this on an enabled session does nothing.
    pub fn enable(&mut self) -> Result<(), Error> {
        let interception = Resource::Interception(ControlRegister::Cr3);
        if self.resources.contains(&interception) {
            return Ok(());
        }

        self.control.monitor_write_ctrlreg(
            self.domain_id,
            ControlRegister::Cr3,
            self.config.ctrlreg(),
        )?;

        self.acquired(interception);
        self.state = SessionState::Enabled;

        tracing::debug!(
            domain_id = %self.domain_id,
            sync = self.config.sync(),
            onchange_only = self.config.onchange_only(),
            "cr3 interception enabled"
        );

        Ok(())
    }

    /// Tears the session down.
    ///
    /// Release failures are logged and otherwise ignored.
    pub fn close(mut self) {
        self.teardown();
    }

    /// Returns the monitored domain.
    pub fn domain_id(&self) -> DomainId {
        self.domain_id
    }

    /// Returns the UUID hint the session was opened with.
    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns `true` if CR3 interception is on.
    pub fn is_enabled(&self) -> bool {
        self.resources
            .contains(&Resource::Interception(ControlRegister::Cr3))
    }

    /// Returns the port the hypervisor signals on.
    pub fn remote_port(&self) -> EventChannelPort {
        self.remote_port
    }

    /// Returns the bound local port.
    pub fn local_port(&self) -> Option<EventChannelPort> {
        self.local_port
    }

    /// Returns the number of requests waiting on the ring.
    pub fn events_pending(&self) -> u32 {
        self.ring
            .as_ref()
            .map(RingChannel::unconsumed_requests)
            .unwrap_or(0)
    }

    /// Returns the dispatch loop counters.
    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    fn acquired(&mut self, resource: Resource) {
        tracing::trace!(?resource, "acquired");
        self.resources.push(resource);
    }

    fn teardown(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        while let Some(resource) = self.resources.pop() {
            tracing::trace!(?resource, "releasing");

            if let Err(err) = self.release(resource) {
                tracing::warn!(
                    domain_id = %self.domain_id,
                    ?resource,
                    %err,
                    "failed to release resource"
                );
            }
        }

        self.state = SessionState::Closed;
        tracing::debug!(domain_id = %self.domain_id, stats = ?self.stats, "session closed");
    }

    fn release(&mut self, resource: Resource) -> Result<(), Error> {
        match resource {
            Resource::Interception(register) => {
                let disabled = self.control.monitor_write_ctrlreg(
                    self.domain_id,
                    register,
                    self.config.ctrlreg().disabled(),
                );

                disabled.and(self.answer_remaining())
            }
            Resource::Port(port) => {
                self.local_port = None;
                self.fd = None;

                match &mut self.channel {
                    Some(channel) => channel.unbind(port),
                    None => Ok(()),
                }
            }
            Resource::Channel => {
                self.channel = None;
                Ok(())
            }
            Resource::Monitor => self.control.monitor_disable(self.domain_id),
            Resource::Ring => {
                self.ring = None;
                Ok(())
            }
        }
    }

    /// Answers requests that arrived before interception was turned off,
    /// so that no vCPU stays paused after the session is gone.
    fn answer_remaining(&mut self) -> Result<(), Error> {
        let (Some(ring), Some(channel), Some(local_port)) =
            (&mut self.ring, &self.channel, self.local_port)
        else {
            return Ok(());
        };

        tracing::trace!(pending_events = ring.unconsumed_requests());

        let drained = drain_ring(ring, self.domain_id, None, &mut |_: &Cr3Event<'_>| {})?;
        if drained.requests > 0 {
            ring.flush();
            channel.notify(local_port)?;
        }

        Ok(())
    }
}

impl<H> Drop for MonitorSession<H>
where
    H: Hypervisor,
{
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<H> std::fmt::Debug for MonitorSession<H>
where
    H: Hypervisor,
{
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MonitorSession")
            .field("domain_id", &self.domain_id)
            .field("uuid", &self.uuid)
            .field("state", &self.state)
            .field("remote_port", &self.remote_port)
            .field("local_port", &self.local_port)
            .field("resources", &self.resources)
            .finish_non_exhaustive()
    }
}
