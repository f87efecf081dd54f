//! Native filesystem primitives behind one capability trait.
//!
//! Directories are addressed by handle and entries by name relative to a
//! directory handle, never by an absolute host path. Symlinks are never
//! followed implicitly: every `follow` decision is made by the caller.

use std::borrow::Borrow;
use std::fmt;
use std::fs::File;
use std::path::Path;

use vfs_core::flags::{
    Advice, AdvisoryLock, FdFlags, FileAccessibilityCheck, OpenFlags, ReadWriteStrategy,
    TimestampUpdate,
};
use vfs_core::{DirEntry, StructStat, VfsResult};

pub mod portable;
#[cfg(unix)]
pub mod unix;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        pub type NativePlatform = unix::UnixPlatform;
    } else {
        pub type NativePlatform = portable::PortablePlatform;
    }
}

/// Lazy listing of a directory, without `.` and `..` guarantees.
pub type RawDirEntries = Box<dyn Iterator<Item = VfsResult<DirEntry>> + Send>;

/// Primitives one host platform provides.
pub trait Platform: fmt::Debug + Send + Sync + 'static {
    type Dir: fmt::Debug + Send + Sync + 'static;
    /// An open non-directory node.
    type File: Borrow<File> + fmt::Debug + Send + Sync + 'static;

    /// Opens a host directory by path. Used for preopens and the cwd only.
    fn open_directory(path: &Path) -> VfsResult<Self::Dir>;

    /// Opens the host root directory.
    fn root_directory() -> VfsResult<Self::Dir>;

    /// Opens the directory `name` in `dir` without following a symlink.
    fn open_dir_at(dir: &Self::Dir, name: &str) -> VfsResult<Self::Dir>;

    fn open_file_at(
        dir: &Self::Dir,
        name: &str,
        flags: OpenFlags,
        fd_flags: FdFlags,
        mode: u32,
    ) -> VfsResult<Self::File>;

    fn stat_dir(dir: &Self::Dir) -> VfsResult<StructStat>;

    fn stat_at(dir: &Self::Dir, name: &str, follow: bool) -> VfsResult<StructStat>;

    fn read_dir(dir: &Self::Dir) -> VfsResult<RawDirEntries>;

    fn mkdir_at(dir: &Self::Dir, name: &str, mode: u32) -> VfsResult<()>;

    fn unlink_at(dir: &Self::Dir, name: &str) -> VfsResult<()>;

    fn rmdir_at(dir: &Self::Dir, name: &str) -> VfsResult<()>;

    fn rename_at(
        old_dir: &Self::Dir,
        old_name: &str,
        new_dir: &Self::Dir,
        new_name: &str,
    ) -> VfsResult<()>;

    fn link_at(
        old_dir: &Self::Dir,
        old_name: &str,
        new_dir: &Self::Dir,
        new_name: &str,
        follow: bool,
    ) -> VfsResult<()>;

    fn symlink_at(target: &str, dir: &Self::Dir, name: &str) -> VfsResult<()>;

    fn readlink_at(dir: &Self::Dir, name: &str) -> VfsResult<String>;

    fn set_times_at(
        dir: &Self::Dir,
        name: &str,
        follow: bool,
        atime: TimestampUpdate,
        mtime: TimestampUpdate,
    ) -> VfsResult<()>;

    fn chmod_at(dir: &Self::Dir, name: &str, mode: u32, follow: bool) -> VfsResult<()>;

    fn chown_at(
        dir: &Self::Dir,
        name: &str,
        owner: Option<u32>,
        group: Option<u32>,
        follow: bool,
    ) -> VfsResult<()>;

    fn access_at(
        dir: &Self::Dir,
        name: &str,
        mode: FileAccessibilityCheck,
        effective_ids: bool,
        follow: bool,
    ) -> VfsResult<()>;

    fn read(file: &Self::File, buf: &mut [u8], strategy: ReadWriteStrategy) -> VfsResult<usize>;

    /// Writes `buf`. `append` is the descriptor's current `APPEND` flag.
    fn write(
        file: &Self::File,
        buf: &[u8],
        strategy: ReadWriteStrategy,
        append: bool,
    ) -> VfsResult<usize>;

    fn stat_file(file: &Self::File) -> VfsResult<StructStat>;

    fn allocate(file: &Self::File, offset: u64, length: u64) -> VfsResult<()>;

    fn advise(file: &Self::File, offset: u64, length: u64, advice: Advice) -> VfsResult<()>;

    /// Adds (`add`) or removes a record lock without blocking.
    fn lock(file: &Self::File, lock: AdvisoryLock, add: bool) -> VfsResult<()>;

    fn set_file_times(
        file: &Self::File,
        atime: TimestampUpdate,
        mtime: TimestampUpdate,
    ) -> VfsResult<()>;

    fn chmod_file(file: &Self::File, mode: u32) -> VfsResult<()>;

    fn chown_file(file: &Self::File, owner: Option<u32>, group: Option<u32>) -> VfsResult<()>;

    fn set_fd_flags(file: &Self::File, flags: FdFlags) -> VfsResult<()>;

    /// Closes the native handle and reports what the host reports.
    fn close_file(file: Self::File) -> VfsResult<()>;

    fn close_dir(dir: Self::Dir) -> VfsResult<()>;
}
