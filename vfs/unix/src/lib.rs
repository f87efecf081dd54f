//! POSIX glue for `vfs-core`: native errno and open-flag translation.
#![cfg(unix)]

mod errno;
mod open_flags;

pub use errno::{errno_to_error_kind, io_error_kind, last_errno_error_kind};
pub use open_flags::{fd_flags_from_native, fd_flags_to_native, open_flags_to_native};
