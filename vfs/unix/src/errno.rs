//! POSIX errno → `vfs-core` error kind translation.
//!
//! This is the single source of truth for mapping native errno values to
//! [`ErrorKind`]. Backends must not duplicate this mapping elsewhere.

use std::io;
use vfs_core::ErrorKind;

/// Convert a native errno value to an error kind (single source of truth).
pub fn errno_to_error_kind(errno: i32) -> ErrorKind {
    match errno {
        libc::EACCES => ErrorKind::AccessDenied,
        libc::EAGAIN => ErrorKind::Again,
        libc::EBADF => ErrorKind::BadFileDescriptor,
        libc::EBUSY => ErrorKind::Busy,
        libc::EDQUOT => ErrorKind::DiskQuota,
        libc::EEXIST => ErrorKind::Exists,
        libc::EFBIG => ErrorKind::FileTooBig,
        libc::EINTR => ErrorKind::Interrupted,
        libc::EINVAL => ErrorKind::InvalidArgument,
        libc::EIO => ErrorKind::IoError,
        libc::EISDIR => ErrorKind::IsDirectory,
        libc::ELOOP => ErrorKind::TooManySymbolicLinks,
        libc::EMFILE => ErrorKind::Mfile,
        libc::EMLINK => ErrorKind::Mlink,
        libc::ENAMETOOLONG => ErrorKind::NameTooLong,
        libc::ENFILE => ErrorKind::Nfile,
        libc::ENOBUFS => ErrorKind::NoBufferSpace,
        libc::ENOENT => ErrorKind::NoEntry,
        libc::ENOLCK => ErrorKind::NoLock,
        libc::ENOSPC => ErrorKind::NoSpace,
        libc::ENOTDIR => ErrorKind::NotDirectory,
        libc::ENOTEMPTY => ErrorKind::DirectoryNotEmpty,
        libc::ENOTSUP => ErrorKind::NotSupported,
        libc::ENOTTY => ErrorKind::NotTty,
        libc::ENXIO => ErrorKind::Nxio,
        libc::EOVERFLOW => ErrorKind::Overflow,
        libc::EPERM => ErrorKind::PermissionDenied,
        libc::EPIPE => ErrorKind::Pipe,
        libc::EROFS => ErrorKind::ReadOnlyFileSystem,
        libc::ESPIPE => ErrorKind::NotSeekable,
        libc::ETXTBSY => ErrorKind::TextFileBusy,
        libc::EXDEV => ErrorKind::CrossDevice,
        // aliases of EAGAIN / ENOTSUP on some targets
        other if other == libc::EWOULDBLOCK => ErrorKind::Again,
        other if other == libc::EOPNOTSUPP => ErrorKind::NotSupported,
        _ => ErrorKind::IoError,
    }
}

/// Convert a `std::io::Error` to an error kind.
///
/// The raw OS error wins when present; synthetic errors fall back to the
/// portable `io::ErrorKind`.
pub fn io_error_kind(err: &io::Error) -> ErrorKind {
    if let Some(errno) = err.raw_os_error() {
        return errno_to_error_kind(errno);
    }
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NoEntry,
        io::ErrorKind::PermissionDenied => ErrorKind::AccessDenied,
        io::ErrorKind::AlreadyExists => ErrorKind::Exists,
        io::ErrorKind::WouldBlock => ErrorKind::Again,
        io::ErrorKind::InvalidInput => ErrorKind::InvalidArgument,
        io::ErrorKind::Interrupted => ErrorKind::Interrupted,
        io::ErrorKind::BrokenPipe => ErrorKind::Pipe,
        io::ErrorKind::Unsupported => ErrorKind::NotSupported,
        _ => ErrorKind::IoError,
    }
}

/// Error kind of the calling thread's last OS error.
pub fn last_errno_error_kind() -> ErrorKind {
    io_error_kind(&io::Error::last_os_error())
}
