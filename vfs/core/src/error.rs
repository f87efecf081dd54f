//! Operation error taxonomy.
//!
//! Every operation reports failures as an [`FsError`]: one [`ErrorKind`] from
//! a closed set plus a diagnostic message. Each kind maps to exactly one
//! [`FileSystemErrno`]. Which kinds an operation may produce is declared by
//! the operation itself as an [`ErrorKindSet`].

use crate::errno::FileSystemErrno;
use std::borrow::Cow;
use std::fmt;

pub type VfsResult<T> = Result<T, FsError>;

/// Closed set of error kinds produced by filesystem operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    AccessDenied,
    Again,
    BadFileDescriptor,
    Busy,
    CrossDevice,
    DirectoryNotEmpty,
    DiskQuota,
    Exists,
    FileTooBig,
    Interrupted,
    InvalidArgument,
    IoError,
    IsDirectory,
    /// Too many open files in the process.
    Mfile,
    /// Too many hard links.
    Mlink,
    NameTooLong,
    /// Too many open files in the system.
    Nfile,
    NoBufferSpace,
    NoEntry,
    NoLock,
    NoSpace,
    /// The path leaves the sandbox, or the fd lacks the required rights.
    NotCapable,
    NotDirectory,
    NotSeekable,
    NotSupported,
    NotTty,
    Nxio,
    Overflow,
    PermissionDenied,
    Pipe,
    ReadOnlyFileSystem,
    TextFileBusy,
    TooManySymbolicLinks,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 33] = [
        Self::AccessDenied,
        Self::Again,
        Self::BadFileDescriptor,
        Self::Busy,
        Self::CrossDevice,
        Self::DirectoryNotEmpty,
        Self::DiskQuota,
        Self::Exists,
        Self::FileTooBig,
        Self::Interrupted,
        Self::InvalidArgument,
        Self::IoError,
        Self::IsDirectory,
        Self::Mfile,
        Self::Mlink,
        Self::NameTooLong,
        Self::Nfile,
        Self::NoBufferSpace,
        Self::NoEntry,
        Self::NoLock,
        Self::NoSpace,
        Self::NotCapable,
        Self::NotDirectory,
        Self::NotSeekable,
        Self::NotSupported,
        Self::NotTty,
        Self::Nxio,
        Self::Overflow,
        Self::PermissionDenied,
        Self::Pipe,
        Self::ReadOnlyFileSystem,
        Self::TextFileBusy,
        Self::TooManySymbolicLinks,
    ];

    /// The errno reported to the guest for this kind.
    pub const fn errno(self) -> FileSystemErrno {
        match self {
            Self::AccessDenied => FileSystemErrno::Acces,
            Self::Again => FileSystemErrno::Again,
            Self::BadFileDescriptor => FileSystemErrno::Badf,
            Self::Busy => FileSystemErrno::Busy,
            Self::CrossDevice => FileSystemErrno::Xdev,
            Self::DirectoryNotEmpty => FileSystemErrno::NotEmpty,
            Self::DiskQuota => FileSystemErrno::Dquot,
            Self::Exists => FileSystemErrno::Exist,
            Self::FileTooBig => FileSystemErrno::Fbig,
            Self::Interrupted => FileSystemErrno::Intr,
            Self::InvalidArgument => FileSystemErrno::Inval,
            Self::IoError => FileSystemErrno::Io,
            Self::IsDirectory => FileSystemErrno::IsDir,
            Self::Mfile => FileSystemErrno::Mfile,
            Self::Mlink => FileSystemErrno::Mlink,
            Self::NameTooLong => FileSystemErrno::NameTooLong,
            Self::Nfile => FileSystemErrno::Nfile,
            Self::NoBufferSpace => FileSystemErrno::NoBufs,
            Self::NoEntry => FileSystemErrno::NoEnt,
            Self::NoLock => FileSystemErrno::NoLck,
            Self::NoSpace => FileSystemErrno::NoSpc,
            Self::NotCapable => FileSystemErrno::NotCapable,
            Self::NotDirectory => FileSystemErrno::NotDir,
            Self::NotSeekable => FileSystemErrno::Spipe,
            Self::NotSupported => FileSystemErrno::NotSup,
            Self::NotTty => FileSystemErrno::NoTty,
            Self::Nxio => FileSystemErrno::Nxio,
            Self::Overflow => FileSystemErrno::Overflow,
            Self::PermissionDenied => FileSystemErrno::Perm,
            Self::Pipe => FileSystemErrno::Pipe,
            Self::ReadOnlyFileSystem => FileSystemErrno::Rofs,
            Self::TextFileBusy => FileSystemErrno::TxtBsy,
            Self::TooManySymbolicLinks => FileSystemErrno::Loop,
        }
    }

    /// Stable snake-case name (logging only).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessDenied => "access_denied",
            Self::Again => "again",
            Self::BadFileDescriptor => "bad_file_descriptor",
            Self::Busy => "busy",
            Self::CrossDevice => "cross_device",
            Self::DirectoryNotEmpty => "directory_not_empty",
            Self::DiskQuota => "disk_quota",
            Self::Exists => "exists",
            Self::FileTooBig => "file_too_big",
            Self::Interrupted => "interrupted",
            Self::InvalidArgument => "invalid_argument",
            Self::IoError => "io_error",
            Self::IsDirectory => "is_directory",
            Self::Mfile => "mfile",
            Self::Mlink => "mlink",
            Self::NameTooLong => "name_too_long",
            Self::Nfile => "nfile",
            Self::NoBufferSpace => "no_buffer_space",
            Self::NoEntry => "no_entry",
            Self::NoLock => "no_lock",
            Self::NoSpace => "no_space",
            Self::NotCapable => "not_capable",
            Self::NotDirectory => "not_directory",
            Self::NotSeekable => "not_seekable",
            Self::NotSupported => "not_supported",
            Self::NotTty => "not_tty",
            Self::Nxio => "nxio",
            Self::Overflow => "overflow",
            Self::PermissionDenied => "permission_denied",
            Self::Pipe => "pipe",
            Self::ReadOnlyFileSystem => "read_only_file_system",
            Self::TextFileBusy => "text_file_busy",
            Self::TooManySymbolicLinks => "too_many_symbolic_links",
        }
    }

    const fn bit(self) -> u64 {
        1u64 << (self as u8)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of [`ErrorKind`]s, usable in `const` position.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ErrorKindSet(u64);

impl ErrorKindSet {
    pub const EMPTY: Self = Self(0);

    pub const fn of(kinds: &[ErrorKind]) -> Self {
        let mut bits = 0u64;
        let mut i = 0;
        while i < kinds.len() {
            bits |= kinds[i].bit();
            i += 1;
        }
        Self(bits)
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn with(self, kind: ErrorKind) -> Self {
        Self(self.0 | kind.bit())
    }

    pub const fn contains(self, kind: ErrorKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = ErrorKind> {
        ErrorKind::ALL.into_iter().filter(move |kind| self.contains(*kind))
    }
}

impl fmt::Debug for ErrorKindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Error returned by every filesystem operation.
///
/// The message is meant for host-side diagnostics and is not stable.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FsError {
    kind: ErrorKind,
    message: Cow<'static, str>,
}

impl FsError {
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    pub fn errno(&self) -> FileSystemErrno {
        self.kind.errno()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Keeps the message and replaces the kind.
    pub fn with_kind(self, kind: ErrorKind) -> Self {
        Self { kind, ..self }
    }

    pub fn access_denied(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::AccessDenied, message)
    }

    pub fn again(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Again, message)
    }

    pub fn bad_fd(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::BadFileDescriptor, message)
    }

    pub fn exists(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Exists, message)
    }

    pub fn interrupted(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Interrupted, message)
    }

    pub fn invalid_argument(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn io(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::IoError, message)
    }

    pub fn is_directory(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::IsDirectory, message)
    }

    pub fn name_too_long(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NameTooLong, message)
    }

    pub fn no_entry(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NoEntry, message)
    }

    pub fn not_capable(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NotCapable, message)
    }

    pub fn not_directory(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NotDirectory, message)
    }

    pub fn not_supported(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NotSupported, message)
    }

    pub fn too_many_symlinks(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::TooManySymbolicLinks, message)
    }
}

/// Error sets shared by groups of operations.
pub mod sets {
    use super::ErrorKind::*;
    use super::ErrorKindSet;

    /// Errors any operation taking a `(base directory, path)` pair may report
    /// while resolving the path.
    pub const RESOLVE_PATH: ErrorKindSet = ErrorKindSet::of(&[
        AccessDenied,
        BadFileDescriptor,
        InvalidArgument,
        IoError,
        NameTooLong,
        NoEntry,
        NotCapable,
        NotDirectory,
        TooManySymbolicLinks,
    ]);

    /// Errors any operation on an open descriptor may report.
    pub const FD: ErrorKindSet = ErrorKindSet::of(&[BadFileDescriptor, IoError, NotCapable]);
}
