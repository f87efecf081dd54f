//! `poll(2)` wait slices for the poll helper.

use std::sync::Arc;
use std::time::Duration;

use vfs_core::VfsResult;
use vfs_core::poll::{PendingFd, PollWaiter, SleepWaiter, WaitReadiness, slice_timeout_ms};

use crate::platform::Platform;
use crate::platform::unix::{poll_fds, pollfd_for, readiness_of};
use crate::resource::FdResource;

/// Waits natively when every pending descriptor has a native handle, and
/// sleeps the slice otherwise.
#[derive(Debug, Default)]
pub(crate) struct NativePollWaiter {
    fallback: SleepWaiter,
}

impl<P: Platform> PollWaiter<Arc<FdResource<P>>> for NativePollWaiter {
    fn wait(
        &mut self,
        pending: &[PendingFd<Arc<FdResource<P>>>],
        timeout: Duration,
    ) -> VfsResult<Vec<WaitReadiness>> {
        let native: Option<Vec<libc::pollfd>> = pending
            .iter()
            .map(|entry| {
                entry
                    .resource
                    .native_fd(entry.interest)
                    .map(|fd| pollfd_for(fd, entry.interest))
            })
            .collect();
        let Some(mut fds) = native.filter(|fds| !fds.is_empty()) else {
            return PollWaiter::<Arc<FdResource<P>>>::wait(&mut self.fallback, pending, timeout);
        };

        if poll_fds(&mut fds, slice_timeout_ms(timeout))? == 0 {
            return Ok(Vec::new());
        }
        Ok(fds
            .iter()
            .zip(pending)
            .enumerate()
            .filter(|(_, (pollfd, _))| pollfd.revents != 0)
            .map(|(index, (pollfd, entry))| WaitReadiness {
                index,
                hangup: readiness_of(pollfd, entry.interest).1,
            })
            .collect())
    }
}
