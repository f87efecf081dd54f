use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use vfs_core::poll::{
    ClockId, ClockSubscription, Event, EventType, FdReadiness, Interest, MonotonicClock,
    PendingFd, PollHelper, PollWaiter, Pollable, Subscription, WaitReadiness,
};
use vfs_core::{ErrorKind, Fd, FileSystemErrno, FsError, VfsResult};

const PERIOD: Duration = Duration::from_millis(100);

#[derive(Clone, Default)]
struct FakeClock(Rc<Cell<Duration>>);

impl FakeClock {
    fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

impl MonotonicClock for FakeClock {
    fn now(&self) -> Duration {
        self.0.get()
    }
}

/// Sleeps by advancing the fake clock and records every slice.
struct FakeWaiter {
    clock: FakeClock,
    slices: Vec<Duration>,
    native: Option<WaitReadiness>,
    fail: Option<FsError>,
}

impl FakeWaiter {
    fn new(clock: &FakeClock) -> Self {
        Self {
            clock: clock.clone(),
            slices: Vec::new(),
            native: None,
            fail: None,
        }
    }
}

impl<R> PollWaiter<R> for FakeWaiter {
    fn wait(
        &mut self,
        _pending: &[PendingFd<R>],
        timeout: Duration,
    ) -> VfsResult<Vec<WaitReadiness>> {
        if let Some(err) = self.fail.take() {
            return Err(err);
        }
        self.slices.push(timeout);
        self.clock.advance(timeout);
        Ok(self.native.take().into_iter().collect())
    }
}

#[derive(Clone)]
struct FakeFd {
    clock: FakeClock,
    ready_at: Option<Duration>,
    error: Option<ErrorKind>,
    polls: Rc<RefCell<u32>>,
}

impl FakeFd {
    fn ready_at(clock: &FakeClock, at: Duration) -> Self {
        Self {
            clock: clock.clone(),
            ready_at: Some(at),
            error: None,
            polls: Rc::default(),
        }
    }

    fn never(clock: &FakeClock) -> Self {
        Self {
            ready_at: None,
            ..Self::ready_at(clock, Duration::ZERO)
        }
    }
}

impl Pollable for FakeFd {
    fn poll_nonblocking(&self, _interest: Interest) -> VfsResult<FdReadiness> {
        *self.polls.borrow_mut() += 1;
        if let Some(kind) = self.error {
            return Err(FsError::new(kind, "broken"));
        }
        match self.ready_at {
            Some(at) if self.clock.now() >= at => Ok(FdReadiness {
                bytes_available: 7,
                hangup: false,
            }),
            _ => Err(FsError::again("not ready")),
        }
    }
}

fn clock_sub(userdata: u64, timeout: Duration) -> Subscription {
    Subscription::clock(userdata, ClockSubscription::relative(ClockId::Monotonic, timeout))
}

fn run(
    clock: &FakeClock,
    waiter: &mut FakeWaiter,
    subscriptions: &[Subscription],
    fds: &[(Fd, FakeFd)],
) -> VfsResult<Vec<Event>> {
    PollHelper::new(clock, waiter, PERIOD).poll(subscriptions, |fd| {
        fds.iter()
            .find(|(candidate, _)| *candidate == fd)
            .map(|(_, resource)| resource.clone())
    })
}

#[test]
fn empty_subscription_list_is_invalid() {
    let clock = FakeClock::default();
    let mut waiter = FakeWaiter::new(&clock);
    let err = run(&clock, &mut waiter, &[], &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn single_clock_subscription_times_out_with_success() {
    let clock = FakeClock::default();
    let mut waiter = FakeWaiter::new(&clock);

    let subscriptions = [clock_sub(42, Duration::from_millis(250))];
    let events = run(&clock, &mut waiter, &subscriptions, &[]).unwrap();

    assert_eq!(events, vec![Event::clock(42, FileSystemErrno::Success)]);
    assert!(clock.now() >= Duration::from_millis(250));
    assert_eq!(
        waiter.slices,
        vec![PERIOD, PERIOD, Duration::from_millis(50)]
    );
}

#[test]
fn earliest_clock_wins() {
    let clock = FakeClock::default();
    let mut waiter = FakeWaiter::new(&clock);
    let subscriptions = [
        clock_sub(1, Duration::from_millis(50)),
        clock_sub(2, Duration::from_millis(20)),
    ];

    let events = run(&clock, &mut waiter, &subscriptions, &[]).unwrap();

    assert_eq!(events, vec![Event::clock(2, FileSystemErrno::Success)]);
    assert_eq!(clock.now(), Duration::from_millis(20));
}

#[test]
fn unsupported_clocks_report_inval_immediately() {
    let clock = FakeClock::default();
    let mut waiter = FakeWaiter::new(&clock);
    let absolute = ClockSubscription {
        absolute: true,
        ..ClockSubscription::relative(ClockId::Realtime, Duration::from_secs(1))
    };
    let subscriptions = [
        Subscription::clock(1, ClockSubscription::relative(ClockId::ProcessCputime, PERIOD)),
        Subscription::clock(2, absolute),
    ];

    let events = run(&clock, &mut waiter, &subscriptions, &[]).unwrap();

    assert_eq!(
        events,
        vec![
            Event::clock(1, FileSystemErrno::Inval),
            Event::clock(2, FileSystemErrno::Inval),
        ]
    );
    assert!(waiter.slices.is_empty());
}

#[test]
fn unknown_descriptor_reports_badf() {
    let clock = FakeClock::default();
    let mut waiter = FakeWaiter::new(&clock);

    let events = run(&clock, &mut waiter, &[Subscription::fd_read(5, Fd(9))], &[]).unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].userdata, 5);
    assert_eq!(events[0].errno, FileSystemErrno::Badf);
    assert_eq!(events[0].event_type, EventType::FdRead);
}

#[test]
fn ready_descriptor_returns_without_waiting() {
    let clock = FakeClock::default();
    let mut waiter = FakeWaiter::new(&clock);
    let fds = [(Fd(3), FakeFd::ready_at(&clock, Duration::ZERO))];
    let subscriptions = [
        Subscription::fd_write(1, Fd(3)),
        clock_sub(2, Duration::from_secs(1)),
    ];

    let events = run(&clock, &mut waiter, &subscriptions, &fds).unwrap();

    assert_eq!(
        events,
        vec![Event::fd(
            1,
            Interest::Write,
            FileSystemErrno::Success,
            FdReadiness {
                bytes_available: 7,
                hangup: false
            }
        )]
    );
    assert!(waiter.slices.is_empty());
}

#[test]
fn descriptor_errors_become_events() {
    let clock = FakeClock::default();
    let mut waiter = FakeWaiter::new(&clock);
    let broken = FakeFd {
        error: Some(ErrorKind::Pipe),
        ..FakeFd::never(&clock)
    };

    let subscriptions = [Subscription::fd_read(1, Fd(3))];
    let events = run(&clock, &mut waiter, &subscriptions, &[(Fd(3), broken)]).unwrap();

    assert_eq!(events[0].errno, FileSystemErrno::Pipe);
}

#[test]
fn descriptor_becoming_ready_ends_the_wait() {
    let clock = FakeClock::default();
    let mut waiter = FakeWaiter::new(&clock);
    let fd = FakeFd::ready_at(&clock, Duration::from_millis(150));
    let fds = [(Fd(4), fd.clone())];
    let subscriptions = [
        clock_sub(1, Duration::from_secs(10)),
        Subscription::fd_read(2, Fd(4)),
    ];

    let events = run(&clock, &mut waiter, &subscriptions, &fds).unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].userdata, 2);
    assert_eq!(waiter.slices, vec![PERIOD, PERIOD]);
    // pre-check plus one re-check per slice
    assert_eq!(*fd.polls.borrow(), 3);
}

#[test]
fn descriptor_wins_over_simultaneous_timeout() {
    let clock = FakeClock::default();
    let mut waiter = FakeWaiter::new(&clock);
    let fds = [(Fd(4), FakeFd::ready_at(&clock, Duration::from_millis(100)))];
    let subscriptions = [
        clock_sub(1, Duration::from_millis(100)),
        Subscription::fd_read(2, Fd(4)),
    ];

    let events = run(&clock, &mut waiter, &subscriptions, &fds).unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::FdRead);
}

#[test]
fn descriptor_without_clock_waits_until_ready() {
    let clock = FakeClock::default();
    let mut waiter = FakeWaiter::new(&clock);
    let fds = [(Fd(4), FakeFd::ready_at(&clock, Duration::from_millis(450)))];

    let events = run(&clock, &mut waiter, &[Subscription::fd_read(2, Fd(4))], &fds).unwrap();

    assert_eq!(events[0].errno, FileSystemErrno::Success);
    assert_eq!(waiter.slices.len(), 5);
}

#[test]
fn native_readiness_reports_hangup() {
    let clock = FakeClock::default();
    let mut waiter = FakeWaiter::new(&clock);
    waiter.native = Some(WaitReadiness {
        index: 0,
        hangup: true,
    });
    let fds = [(Fd(4), FakeFd::never(&clock))];

    let events = run(&clock, &mut waiter, &[Subscription::fd_read(2, Fd(4))], &fds).unwrap();

    assert_eq!(
        events,
        vec![Event::fd(
            2,
            Interest::Read,
            FileSystemErrno::Success,
            FdReadiness {
                bytes_available: 0,
                hangup: true
            }
        )]
    );
}

#[test]
fn interrupted_wait_is_reported() {
    let clock = FakeClock::default();
    let mut waiter = FakeWaiter::new(&clock);
    waiter.fail = Some(FsError::interrupted("signal"));
    let fds = [(Fd(4), FakeFd::never(&clock))];

    let err = run(&clock, &mut waiter, &[Subscription::fd_read(2, Fd(4))], &fds).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Interrupted);
}
