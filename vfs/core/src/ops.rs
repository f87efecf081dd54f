//! The operation catalogue.
//!
//! Every request the engine accepts is a plain input struct implementing
//! [`FileSystemOperation`]. The struct type is the dispatch key: it fixes the
//! output type, the stable operation name used in logs, and the allow-list of
//! error kinds the operation may report.

use crate::dirent::{DirEntrySequence, DirSequenceStartPosition};
use crate::error::ErrorKind::*;
use crate::error::{ErrorKindSet, sets};
use crate::flags::{
    Advice, AdvisoryLock, FdFlags, FileAccessibilityCheck, OpenFlags, ReadWriteStrategy,
    TimestampUpdate, Whence,
};
use crate::ids::{BaseDirectory, Fd};
use crate::path::VirtualPath;
use crate::poll::{Event, Subscription};
use crate::rights::FdRightsBlock;
use crate::stat::{FileType, StructStat};
use std::fmt;

pub trait FileSystemOperation: fmt::Debug + Send + 'static {
    type Output: fmt::Debug + Send + 'static;

    /// Stable name, used by interceptors.
    const NAME: &'static str;

    /// Error kinds this operation may report. `IoError` is always allowed.
    const ERRORS: ErrorKindSet;
}

macro_rules! operation {
    ($input:ty => $output:ty, $name:literal, $errors:expr $(, [$($kind:ident),* $(,)?])?) => {
        impl FileSystemOperation for $input {
            type Output = $output;
            const NAME: &'static str = $name;
            const ERRORS: ErrorKindSet = $errors
                $(.union(ErrorKindSet::of(&[$($kind),*])))?
                .with(IoError);
        }
    };
}

#[derive(Clone, Debug)]
pub struct Open {
    pub base: BaseDirectory,
    pub path: VirtualPath,
    pub flags: OpenFlags,
    pub fd_flags: FdFlags,
    /// Permission bits for a newly created file; `0o640` when unset.
    pub mode: Option<u32>,
    /// Rights requested for the new descriptor; inherited from the base when unset.
    pub rights: Option<FdRightsBlock>,
}

operation!(Open => Fd, "open", sets::RESOLVE_PATH, [
    Again, Busy, DiskQuota, Exists, FileTooBig, Interrupted, IsDirectory, Mfile, Nfile,
    NoSpace, NotSupported, Nxio, Overflow, PermissionDenied, ReadOnlyFileSystem, TextFileBusy,
]);

#[derive(Clone, Copy, Debug)]
pub struct CloseFd {
    pub fd: Fd,
}

operation!(CloseFd => (), "close", sets::FD, [DiskQuota, Interrupted, NoSpace]);

#[derive(Clone, Copy, Debug)]
pub struct ReadFd {
    pub fd: Fd,
    pub length: usize,
    pub strategy: ReadWriteStrategy,
}

operation!(ReadFd => Vec<u8>, "read", sets::FD, [
    Again, Interrupted, InvalidArgument, IsDirectory, NotSeekable, Nxio, Overflow,
]);

#[derive(Clone)]
pub struct WriteFd {
    pub fd: Fd,
    pub chunks: Vec<Vec<u8>>,
    pub strategy: ReadWriteStrategy,
}

impl fmt::Debug for WriteFd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total: usize = self.chunks.iter().map(Vec::len).sum();
        f.debug_struct("WriteFd")
            .field("fd", &self.fd)
            .field("chunks", &self.chunks.len())
            .field("bytes", &total)
            .field("strategy", &self.strategy)
            .finish()
    }
}

operation!(WriteFd => u64, "write", sets::FD, [
    Again, DiskQuota, FileTooBig, Interrupted, InvalidArgument, NoBufferSpace, NoSpace,
    NotSeekable, Nxio, PermissionDenied, Pipe,
]);

#[derive(Clone, Copy, Debug)]
pub struct SeekFd {
    pub fd: Fd,
    pub offset: i64,
    pub whence: Whence,
}

operation!(SeekFd => u64, "seek", sets::FD, [InvalidArgument, NotSeekable, Overflow]);

#[derive(Clone, Debug)]
pub struct Stat {
    pub base: BaseDirectory,
    pub path: VirtualPath,
    pub follow_symlinks: bool,
}

operation!(Stat => StructStat, "stat", sets::RESOLVE_PATH, [Overflow]);

#[derive(Clone, Copy, Debug)]
pub struct StatFd {
    pub fd: Fd,
}

operation!(StatFd => StructStat, "statFd", sets::FD, [InvalidArgument, Overflow]);

#[derive(Clone, Copy, Debug)]
pub struct ReadDirFd {
    pub fd: Fd,
    pub start: DirSequenceStartPosition,
}

operation!(ReadDirFd => DirEntrySequence, "readdir", sets::FD, [
    AccessDenied, InvalidArgument, Mfile, Nfile, NoEntry, NotDirectory,
]);

#[derive(Clone, Debug)]
pub struct Mkdir {
    pub base: BaseDirectory,
    pub path: VirtualPath,
    pub mode: Option<u32>,
    /// Report `Exists` for an existing directory instead of succeeding.
    pub fail_if_exists: bool,
}

operation!(Mkdir => (), "mkdir", sets::RESOLVE_PATH, [
    DiskQuota, Exists, Mlink, NoSpace, PermissionDenied, ReadOnlyFileSystem,
]);

#[derive(Clone, Debug)]
pub struct UnlinkFile {
    pub base: BaseDirectory,
    pub path: VirtualPath,
}

operation!(UnlinkFile => (), "unlinkFile", sets::RESOLVE_PATH, [
    Busy, IsDirectory, PermissionDenied, ReadOnlyFileSystem, TextFileBusy,
]);

#[derive(Clone, Debug)]
pub struct UnlinkDirectory {
    pub base: BaseDirectory,
    pub path: VirtualPath,
}

operation!(UnlinkDirectory => (), "unlinkDirectory", sets::RESOLVE_PATH, [
    Busy, DirectoryNotEmpty, Exists, PermissionDenied, ReadOnlyFileSystem,
]);

#[derive(Clone, Debug)]
pub struct Rename {
    pub old_base: BaseDirectory,
    pub old_path: VirtualPath,
    pub new_base: BaseDirectory,
    pub new_path: VirtualPath,
}

operation!(Rename => (), "rename", sets::RESOLVE_PATH, [
    Busy, CrossDevice, DirectoryNotEmpty, DiskQuota, Exists, IsDirectory, Mlink, NoSpace,
    PermissionDenied, ReadOnlyFileSystem, TextFileBusy,
]);

#[derive(Clone, Debug)]
pub struct Hardlink {
    pub old_base: BaseDirectory,
    pub old_path: VirtualPath,
    pub new_base: BaseDirectory,
    pub new_path: VirtualPath,
    pub follow_symlinks: bool,
}

operation!(Hardlink => (), "hardlink", sets::RESOLVE_PATH, [
    CrossDevice, DiskQuota, Exists, Mlink, NoSpace, NotSupported, PermissionDenied,
    ReadOnlyFileSystem,
]);

#[derive(Clone, Debug)]
pub struct Symlink {
    /// Target text stored in the link. Never resolved at creation time.
    pub old_path: String,
    pub new_base: BaseDirectory,
    pub new_path: VirtualPath,
    pub allow_absolute_old_path: bool,
}

operation!(Symlink => (), "symlink", sets::RESOLVE_PATH, [
    DiskQuota, Exists, NoSpace, PermissionDenied, ReadOnlyFileSystem,
]);

#[derive(Clone, Debug)]
pub struct ReadLink {
    pub base: BaseDirectory,
    pub path: VirtualPath,
}

operation!(ReadLink => String, "readlink", sets::RESOLVE_PATH);

#[derive(Clone, Debug)]
pub struct SetTimestamp {
    pub base: BaseDirectory,
    pub path: VirtualPath,
    pub follow_symlinks: bool,
    pub atime: TimestampUpdate,
    pub mtime: TimestampUpdate,
}

operation!(SetTimestamp => (), "setTimestamp", sets::RESOLVE_PATH, [
    PermissionDenied, ReadOnlyFileSystem,
]);

#[derive(Clone, Copy, Debug)]
pub struct SetTimestampFd {
    pub fd: Fd,
    pub atime: TimestampUpdate,
    pub mtime: TimestampUpdate,
}

operation!(SetTimestampFd => (), "setTimestampFd", sets::FD, [
    AccessDenied, InvalidArgument, PermissionDenied, ReadOnlyFileSystem,
]);

#[derive(Clone, Debug)]
pub struct CheckAccess {
    pub base: BaseDirectory,
    /// `None` checks the base directory itself; requires `allow_empty_path`.
    pub path: Option<VirtualPath>,
    /// Empty checks existence only.
    pub mode: FileAccessibilityCheck,
    pub use_effective_ids: bool,
    pub allow_empty_path: bool,
    pub follow_symlinks: bool,
}

operation!(CheckAccess => (), "checkAccess", sets::RESOLVE_PATH, [
    ReadOnlyFileSystem, TextFileBusy,
]);

#[derive(Clone, Copy, Debug)]
pub struct FallocateFd {
    pub fd: Fd,
    pub offset: u64,
    pub length: u64,
}

operation!(FallocateFd => (), "fallocate", sets::FD, [
    FileTooBig, Interrupted, InvalidArgument, IsDirectory, NoSpace, NotSeekable, NotSupported,
    PermissionDenied, TextFileBusy,
]);

#[derive(Clone, Copy, Debug)]
pub struct TruncateFd {
    pub fd: Fd,
    pub length: u64,
}

operation!(TruncateFd => (), "truncate", sets::FD, [
    FileTooBig, Interrupted, InvalidArgument, IsDirectory, PermissionDenied, ReadOnlyFileSystem,
    TextFileBusy,
]);

#[derive(Clone, Copy, Debug)]
pub struct SyncFd {
    pub fd: Fd,
    /// Flush file data only, not metadata.
    pub data_only: bool,
}

operation!(SyncFd => (), "sync", sets::FD, [
    DiskQuota, Interrupted, InvalidArgument, NoSpace, ReadOnlyFileSystem,
]);

#[derive(Clone, Copy, Debug)]
pub struct FadviseFd {
    pub fd: Fd,
    pub offset: u64,
    pub length: u64,
    pub advice: Advice,
}

operation!(FadviseFd => (), "fadvise", sets::FD, [InvalidArgument, NotSeekable]);

#[derive(Clone, Debug)]
pub struct Poll {
    pub subscriptions: Vec<Subscription>,
}

operation!(Poll => Vec<Event>, "poll", ErrorKindSet::EMPTY, [
    Interrupted, InvalidArgument, NotSupported,
]);

#[derive(Clone, Copy, Debug)]
pub struct AddAdvisoryLockFd {
    pub fd: Fd,
    pub lock: AdvisoryLock,
}

operation!(AddAdvisoryLockFd => (), "addAdvisoryLock", sets::FD, [
    Again, Interrupted, InvalidArgument, NoLock, NotSupported, Overflow,
]);

#[derive(Clone, Copy, Debug)]
pub struct RemoveAdvisoryLockFd {
    pub fd: Fd,
    pub lock: AdvisoryLock,
}

operation!(RemoveAdvisoryLockFd => (), "removeAdvisoryLock", sets::FD, [
    Interrupted, InvalidArgument, NoLock, NotSupported,
]);

#[derive(Clone, Copy, Debug)]
pub struct GetFdAttributes {
    pub fd: Fd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FdAttributes {
    pub file_type: FileType,
    pub flags: FdFlags,
    pub rights: FdRightsBlock,
}

operation!(GetFdAttributes => FdAttributes, "fdAttributes", sets::FD);

#[derive(Clone, Copy, Debug)]
pub struct SetFdFlags {
    pub fd: Fd,
    pub flags: FdFlags,
}

operation!(SetFdFlags => (), "setFdFlags", sets::FD, [InvalidArgument, NotSupported]);

/// Describes a preopened directory.
#[derive(Clone, Copy, Debug)]
pub struct PrestatFd {
    pub fd: Fd,
}

operation!(PrestatFd => VirtualPath, "prestat", sets::FD);

#[derive(Clone, Copy, Debug)]
pub struct Fdrenumber {
    pub from: Fd,
    pub to: Fd,
}

operation!(Fdrenumber => (), "renumber", sets::FD);

#[derive(Clone, Debug)]
pub struct Chmod {
    pub base: BaseDirectory,
    pub path: VirtualPath,
    pub mode: u32,
    pub follow_symlinks: bool,
}

operation!(Chmod => (), "chmod", sets::RESOLVE_PATH, [
    NotSupported, PermissionDenied, ReadOnlyFileSystem,
]);

#[derive(Clone, Copy, Debug)]
pub struct ChmodFd {
    pub fd: Fd,
    pub mode: u32,
}

operation!(ChmodFd => (), "chmodFd", sets::FD, [
    InvalidArgument, NotSupported, PermissionDenied, ReadOnlyFileSystem,
]);

#[derive(Clone, Debug)]
pub struct Chown {
    pub base: BaseDirectory,
    pub path: VirtualPath,
    /// `None` leaves the owner unchanged.
    pub owner: Option<u32>,
    pub group: Option<u32>,
    pub follow_symlinks: bool,
}

operation!(Chown => (), "chown", sets::RESOLVE_PATH, [
    NotSupported, PermissionDenied, ReadOnlyFileSystem,
]);

#[derive(Clone, Copy, Debug)]
pub struct ChownFd {
    pub fd: Fd,
    pub owner: Option<u32>,
    pub group: Option<u32>,
}

operation!(ChownFd => (), "chownFd", sets::FD, [
    InvalidArgument, NotSupported, PermissionDenied, ReadOnlyFileSystem,
]);

#[derive(Clone, Copy, Debug, Default)]
pub struct GetCurrentWorkingDirectory;

operation!(GetCurrentWorkingDirectory => VirtualPath, "getCwd", ErrorKindSet::EMPTY, [
    AccessDenied, NoEntry, NotSupported,
]);
