//! The event dispatch loop.

use std::{
    io::ErrorKind,
    sync::atomic::{AtomicBool, Ordering},
};

use super::{MonitorSession, SessionState, stats::OverheadGuard};
use crate::{
    Cr3Event, Cr3Handler, DomainId, Error, EventChannel as _, Hypervisor, Readiness,
    ring::{RingChannel, RingPage},
};

/// Outcome of draining the ring once.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Drained {
    /// Requests popped and answered.
    pub requests: u64,

    /// Requests that were CR3 writes.
    pub cr3_events: u64,
}

/// Pops every pending request, hands CR3 writes to `handler` and queues a
/// pass-through response for each request.
///
/// The response is an exact copy of the request, so the guest resumes
/// with the values it asked for. Responses are not flushed.
pub(crate) fn drain_ring<P, Handler>(
    ring: &mut RingChannel<P>,
    domain_id: DomainId,
    uuid: Option<&str>,
    handler: &mut Handler,
) -> Result<Drained, Error>
where
    P: RingPage,
    Handler: Cr3Handler + ?Sized,
{
    let mut drained = Drained::default();

    while let Some(request) = ring.pop_request() {
        if let Some(event) = Cr3Event::decode(domain_id, uuid, &request) {
            tracing::trace!(
                vcpu = %event.vcpu_id(),
                old = %format_args!("{:#x}", event.old_value()),
                new = %format_args!("{:#x}", event.new_value()),
                rip = %format_args!("{:#x}", event.rip()),
                "cr3 write"
            );

            handler.handle_cr3(&event);
            drained.cr3_events += 1;
        } else {
            tracing::trace!(
                reason = request.reason,
                vcpu = request.vcpu_id,
                "unhandled request"
            );
        }

        ring.push_response(&request)?;
        drained.requests += 1;
    }

    Ok(drained)
}

impl<H> MonitorSession<H>
where
    H: Hypervisor,
{
    /// Runs the dispatch loop until `stop` is set.
    ///
    /// Each iteration waits up to the configured poll timeout for a
    /// notification, drains the ring, answers every request pass-through,
    /// notifies the hypervisor and re-arms the port. `stop` is checked once
    /// per iteration, so the loop returns within one poll timeout of it
    /// being set. The loop only ever loads `stop`.
    ///
    /// A wait interrupted by a signal is retried. Any other failure of the
    /// event channel aborts the loop; the session stays usable and can
    /// still be closed.
    ///
    /// Running a session that was never [`enable`]d is not an error; no
    /// CR3 events will arrive.
    ///
    /// [`enable`]: Self::enable
    pub fn run<Handler>(&mut self, handler: &mut Handler, stop: &AtomicBool) -> Result<(), Error>
    where
        Handler: Cr3Handler + ?Sized,
    {
        let previous = self.state;
        self.state = SessionState::Running;

        let result = self.dispatch(handler, stop);

        self.state = previous;
        result
    }

    fn dispatch<Handler>(&mut self, handler: &mut Handler, stop: &AtomicBool) -> Result<(), Error>
    where
        Handler: Cr3Handler + ?Sized,
    {
        let fd = self.fd.ok_or(Error::NotAttached)?;
        let local_port = self.local_port.ok_or(Error::NotAttached)?;
        let timeout = self.config.poll_timeout();

        let (Some(ring), Some(channel)) = (&mut self.ring, &mut self.channel) else {
            return Err(Error::NotAttached);
        };

        tracing::debug!(domain_id = %self.domain_id, ?timeout, "dispatch loop started");

        while !stop.load(Ordering::Relaxed) {
            match channel.wait(fd, timeout) {
                Ok(Readiness::Ready) => {}
                Ok(Readiness::Timeout) => {
                    self.stats.timeouts += 1;
                    handler.handle_timeout();
                    continue;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {
                    tracing::trace!("interrupted");
                    continue;
                }
                Err(err) => return Err(Error::hypervisor_with("poll", err)),
            }

            self.stats.wakeups += 1;
            let port = channel.pending()?;

            let drained = {
                let _overhead_guard = OverheadGuard::new(&mut self.stats.processing_overhead);
                drain_ring(ring, self.domain_id, self.uuid.as_deref(), handler)?
            };

            self.stats.requests += drained.requests;
            self.stats.cr3_events += drained.cr3_events;

            tracing::trace!(%port, requests = drained.requests, "wakeup");

            if drained.requests > 0 {
                ring.flush();
                channel.notify(local_port)?;
            }

            channel.unmask(port)?;
        }

        tracing::debug!(domain_id = %self.domain_id, stats = ?self.stats, "dispatch loop stopped");
        Ok(())
    }
}
