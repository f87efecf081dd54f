//! `vfs-core` open/descriptor flags → native `libc` masks.
//!
//! [`OpenFlags`] carries Linux values; other targets use different bits, so
//! every flag is translated one by one. This module is the only place that
//! should do it.

use vfs_core::flags::{AccessMode, FdFlags, OpenFlags};

const SIMPLE_OPEN_FLAGS: &[(OpenFlags, libc::c_int)] = &[
    (OpenFlags::O_CREAT, libc::O_CREAT),
    (OpenFlags::O_EXCL, libc::O_EXCL),
    (OpenFlags::O_NOCTTY, libc::O_NOCTTY),
    (OpenFlags::O_TRUNC, libc::O_TRUNC),
    (OpenFlags::O_APPEND, libc::O_APPEND),
    (OpenFlags::O_NONBLOCK, libc::O_NONBLOCK),
    (OpenFlags::O_DSYNC, libc::O_DSYNC),
    (OpenFlags::O_ASYNC, libc::O_ASYNC),
    (OpenFlags::O_DIRECTORY, libc::O_DIRECTORY),
    (OpenFlags::O_NOFOLLOW, libc::O_NOFOLLOW),
    (OpenFlags::O_CLOEXEC, libc::O_CLOEXEC),
    (OpenFlags::O_SYNC, libc::O_SYNC),
];

/// Convert open flags to the native `open(2)` mask.
///
/// Returns `None` for an invalid access mode. Flags without a native
/// counterpart on the target (`O_NOATIME`, `O_PATH` outside Linux) are
/// dropped.
pub fn open_flags_to_native(flags: OpenFlags) -> Option<libc::c_int> {
    let mut native = match flags.access_mode()? {
        AccessMode::ReadOnly => libc::O_RDONLY,
        AccessMode::WriteOnly => libc::O_WRONLY,
        AccessMode::ReadWrite => libc::O_RDWR,
    };
    for (flag, bits) in SIMPLE_OPEN_FLAGS {
        if flags.contains(*flag) {
            native |= *bits;
        }
    }
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        if flags.contains(OpenFlags::O_NOATIME) {
            native |= libc::O_NOATIME;
        }
        if flags.contains(OpenFlags::O_PATH) {
            native |= libc::O_PATH;
        }
    }
    Some(native)
}

/// Convert descriptor flags to the native `fcntl(F_SETFL)` / `open(2)` bits.
pub fn fd_flags_to_native(flags: FdFlags) -> libc::c_int {
    let mut native = 0;
    if flags.contains(FdFlags::APPEND) {
        native |= libc::O_APPEND;
    }
    if flags.contains(FdFlags::NONBLOCK) {
        native |= libc::O_NONBLOCK;
    }
    if flags.contains(FdFlags::DSYNC) {
        native |= libc::O_DSYNC;
    }
    if flags.contains(FdFlags::SYNC) || flags.contains(FdFlags::RSYNC) {
        native |= libc::O_SYNC;
    }
    native
}

/// Convert native `fcntl(F_GETFL)` bits to descriptor flags.
pub fn fd_flags_from_native(native: libc::c_int) -> FdFlags {
    let mut flags = FdFlags::empty();
    if native & libc::O_APPEND != 0 {
        flags |= FdFlags::APPEND;
    }
    if native & libc::O_NONBLOCK != 0 {
        flags |= FdFlags::NONBLOCK;
    }
    if native & libc::O_SYNC == libc::O_SYNC {
        flags |= FdFlags::SYNC;
    } else if native & libc::O_DSYNC != 0 {
        flags |= FdFlags::DSYNC;
    }
    flags
}
