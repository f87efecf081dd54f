//! Readiness polling for `poll_oneoff`-style requests.
//!
//! Descriptors are first checked without blocking. If nothing is ready, the
//! helper waits on the monotonic clock in slices of at most
//! [`VfsConfig::poll_period`](crate::context::VfsConfig), using a
//! [`PollWaiter`] for each slice (native multiplexing where the backend has
//! it, a plain sleep otherwise) and re-checking the pending descriptors after
//! every slice.

use crate::errno::FileSystemErrno;
use crate::error::{ErrorKind, FsError, VfsResult};
use crate::ids::Fd;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClockId {
    Realtime,
    Monotonic,
    ProcessCputime,
    ThreadCputime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClockSubscription {
    pub clock: ClockId,
    pub timeout_ns: u64,
    pub precision_ns: u64,
    /// `timeout_ns` is an absolute time of `clock` rather than a delay.
    pub absolute: bool,
}

impl ClockSubscription {
    pub fn relative(clock: ClockId, timeout: Duration) -> Self {
        Self {
            clock,
            timeout_ns: u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX),
            precision_ns: 0,
            absolute: false,
        }
    }

    fn is_supported(&self) -> bool {
        matches!(self.clock, ClockId::Realtime | ClockId::Monotonic) && !self.absolute
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Interest {
    Read,
    Write,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
    Clock(ClockSubscription),
    Fd { fd: Fd, interest: Interest },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub userdata: u64,
    pub kind: SubscriptionKind,
}

impl Subscription {
    pub fn clock(userdata: u64, clock: ClockSubscription) -> Self {
        Self {
            userdata,
            kind: SubscriptionKind::Clock(clock),
        }
    }

    pub fn fd_read(userdata: u64, fd: Fd) -> Self {
        Self {
            userdata,
            kind: SubscriptionKind::Fd {
                fd,
                interest: Interest::Read,
            },
        }
    }

    pub fn fd_write(userdata: u64, fd: Fd) -> Self {
        Self {
            userdata,
            kind: SubscriptionKind::Fd {
                fd,
                interest: Interest::Write,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    Clock,
    FdRead,
    FdWrite,
}

impl From<Interest> for EventType {
    fn from(interest: Interest) -> Self {
        match interest {
            Interest::Read => Self::FdRead,
            Interest::Write => Self::FdWrite,
        }
    }
}

/// Readiness details of a descriptor event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct FdReadiness {
    pub bytes_available: u64,
    pub hangup: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Event {
    pub userdata: u64,
    pub errno: FileSystemErrno,
    pub event_type: EventType,
    /// Always default for clock events.
    pub fd_readwrite: FdReadiness,
}

impl Event {
    pub fn clock(userdata: u64, errno: FileSystemErrno) -> Self {
        Self {
            userdata,
            errno,
            event_type: EventType::Clock,
            fd_readwrite: FdReadiness::default(),
        }
    }

    pub fn fd(
        userdata: u64,
        interest: Interest,
        errno: FileSystemErrno,
        readiness: FdReadiness,
    ) -> Self {
        Self {
            userdata,
            errno,
            event_type: interest.into(),
            fd_readwrite: readiness,
        }
    }
}

/// A resource that can report readiness without blocking.
pub trait Pollable {
    /// Returns readiness for `interest`, or an `Again` error when the
    /// resource is not ready yet.
    fn poll_nonblocking(&self, interest: Interest) -> VfsResult<FdReadiness>;
}

impl<T: Pollable + ?Sized> Pollable for std::sync::Arc<T> {
    fn poll_nonblocking(&self, interest: Interest) -> VfsResult<FdReadiness> {
        (**self).poll_nonblocking(interest)
    }
}

/// A descriptor subscription that was not ready on the first check.
#[derive(Debug)]
pub struct PendingFd<R> {
    pub userdata: u64,
    pub fd: Fd,
    pub interest: Interest,
    pub resource: R,
}

/// Readiness reported by a native multiplexed wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitReadiness {
    /// Index into the pending slice passed to [`PollWaiter::wait`].
    pub index: usize,
    pub hangup: bool,
}

/// Blocks for one slice of the wait loop.
pub trait PollWaiter<R> {
    /// Waits at most `timeout`, or until one of `pending` becomes ready.
    ///
    /// Returns the descriptors a native wait found ready; an empty result
    /// makes the helper re-check every pending descriptor itself.
    fn wait(
        &mut self,
        pending: &[PendingFd<R>],
        timeout: Duration,
    ) -> VfsResult<Vec<WaitReadiness>>;
}

/// Waiter for backends without multiplexed readiness: sleeps the slice.
#[derive(Clone, Copy, Debug, Default)]
pub struct SleepWaiter;

impl<R> PollWaiter<R> for SleepWaiter {
    fn wait(
        &mut self,
        _pending: &[PendingFd<R>],
        timeout: Duration,
    ) -> VfsResult<Vec<WaitReadiness>> {
        std::thread::sleep(timeout);
        Ok(Vec::new())
    }
}

pub trait MonotonicClock {
    fn now(&self) -> Duration;
}

/// [`MonotonicClock`] backed by [`Instant`].
#[derive(Clone, Copy, Debug)]
pub struct StdMonotonicClock {
    origin: Instant,
}

impl StdMonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdMonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for StdMonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Converts a wait slice to a millisecond timeout for `poll(2)`-like calls.
///
/// Rounds up, so a non-zero slice never turns into a non-blocking call.
pub fn slice_timeout_ms(slice: Duration) -> i32 {
    let nanos = slice.as_nanos();
    let millis = (nanos + 1_000_001) / 1_000_000;
    i32::try_from(millis).unwrap_or(i32::MAX)
}

pub struct PollHelper<'a, C, W> {
    clock: &'a C,
    waiter: &'a mut W,
    period: Duration,
}

impl<'a, C, W> PollHelper<'a, C, W>
where
    C: MonotonicClock,
{
    pub fn new(clock: &'a C, waiter: &'a mut W, period: Duration) -> Self {
        Self {
            clock,
            waiter,
            period,
        }
    }

    /// Returns a non-empty list of events, or `Interrupted` when the wait
    /// ended without any event to report.
    pub fn poll<R, F>(&mut self, subscriptions: &[Subscription], lookup: F) -> VfsResult<Vec<Event>>
    where
        R: Pollable,
        W: PollWaiter<R>,
        F: Fn(Fd) -> Option<R>,
    {
        if subscriptions.is_empty() {
            return Err(FsError::invalid_argument("No subscriptions"));
        }
        let started = self.clock.now();
        let mut groups = group_subscriptions(subscriptions, lookup);
        if !groups.events.is_empty() {
            return Ok(groups.events);
        }

        let deadline = groups
            .min_timeout
            .map(|(_, timeout)| started.saturating_add(timeout));
        loop {
            let now = self.clock.now();
            let slice = match deadline {
                Some(deadline) if now >= deadline => break,
                Some(deadline) => (deadline - now).min(self.period),
                None => self.period,
            };
            let ready = self.waiter.wait(&groups.pending, slice)?;
            let events = if ready.is_empty() {
                collect_ready(&mut groups.pending)
            } else {
                native_events(&groups.pending, &ready)
            };
            if !events.is_empty() {
                return Ok(events);
            }
        }

        match groups.min_timeout {
            Some((userdata, _)) => Ok(vec![Event::clock(userdata, FileSystemErrno::Success)]),
            None => Err(FsError::interrupted("Timeout")),
        }
    }
}

struct Groups<R> {
    events: Vec<Event>,
    pending: Vec<PendingFd<R>>,
    /// Userdata and timeout of the earliest valid clock subscription.
    min_timeout: Option<(u64, Duration)>,
}

fn group_subscriptions<R, F>(subscriptions: &[Subscription], lookup: F) -> Groups<R>
where
    R: Pollable,
    F: Fn(Fd) -> Option<R>,
{
    let mut groups = Groups {
        events: Vec::new(),
        pending: Vec::new(),
        min_timeout: None,
    };
    for subscription in subscriptions {
        match subscription.kind {
            SubscriptionKind::Clock(clock) => {
                if !clock.is_supported() {
                    groups
                        .events
                        .push(Event::clock(subscription.userdata, FileSystemErrno::Inval));
                    continue;
                }
                let timeout = Duration::from_nanos(clock.timeout_ns);
                if groups.min_timeout.is_none_or(|(_, min)| timeout < min) {
                    groups.min_timeout = Some((subscription.userdata, timeout));
                }
            }
            SubscriptionKind::Fd { fd, interest } => {
                let Some(resource) = lookup(fd) else {
                    groups.events.push(Event::fd(
                        subscription.userdata,
                        interest,
                        FileSystemErrno::Badf,
                        FdReadiness::default(),
                    ));
                    continue;
                };
                match resource.poll_nonblocking(interest) {
                    Ok(readiness) => groups.events.push(Event::fd(
                        subscription.userdata,
                        interest,
                        FileSystemErrno::Success,
                        readiness,
                    )),
                    Err(err) if err.kind() == ErrorKind::Again => groups.pending.push(PendingFd {
                        userdata: subscription.userdata,
                        fd,
                        interest,
                        resource,
                    }),
                    Err(err) => groups.events.push(Event::fd(
                        subscription.userdata,
                        interest,
                        err.errno(),
                        FdReadiness::default(),
                    )),
                }
            }
        }
    }
    groups
}

fn collect_ready<R: Pollable>(pending: &mut Vec<PendingFd<R>>) -> Vec<Event> {
    let mut events = Vec::new();
    pending.retain(|entry| match entry.resource.poll_nonblocking(entry.interest) {
        Ok(readiness) => {
            events.push(Event::fd(
                entry.userdata,
                entry.interest,
                FileSystemErrno::Success,
                readiness,
            ));
            false
        }
        Err(err) if err.kind() == ErrorKind::Again => true,
        Err(err) => {
            events.push(Event::fd(
                entry.userdata,
                entry.interest,
                err.errno(),
                FdReadiness::default(),
            ));
            false
        }
    });
    events
}

fn native_events<R: Pollable>(pending: &[PendingFd<R>], ready: &[WaitReadiness]) -> Vec<Event> {
    ready
        .iter()
        .filter_map(|readiness| {
            let entry = pending.get(readiness.index)?;
            let bytes_available = entry
                .resource
                .poll_nonblocking(entry.interest)
                .map_or(0, |state| state.bytes_available);
            Some(Event::fd(
                entry.userdata,
                entry.interest,
                FileSystemErrno::Success,
                FdReadiness {
                    bytes_available,
                    hangup: readiness.hangup,
                },
            ))
        })
        .collect()
}
