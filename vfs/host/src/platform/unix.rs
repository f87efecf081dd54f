//! POSIX backend: `*at` syscalls relative to directory file descriptors.

use std::ffi::{CStr, CString};
use std::fs::File;
use std::io::{self, Read, Write};
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileExt;
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::path::Path;
use std::ptr::NonNull;

use vfs_core::flags::{
    Advice, AdvisoryLock, AdvisoryLockType, FdFlags, FileAccessibilityCheck, OpenFlags,
    ReadWriteStrategy, TimestampUpdate, Whence,
};
use vfs_core::poll::Interest;
use vfs_core::stat::file_mode;
use vfs_core::{DirEntry, ErrorKind, FileType, FsError, StructStat, StructTimespec, VfsResult};
use vfs_unix::{fd_flags_from_native, fd_flags_to_native, open_flags_to_native};

use super::{Platform, RawDirEntries};
use crate::last_os_error;

#[derive(Debug)]
pub struct DirHandle {
    fd: OwnedFd,
}

impl DirHandle {
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UnixPlatform;

fn name_cstr(name: &str) -> VfsResult<CString> {
    CString::new(name).map_err(|_| FsError::invalid_argument("Name contains NUL"))
}

fn check(res: libc::c_int, context: &'static str) -> VfsResult<libc::c_int> {
    if res < 0 {
        return Err(last_os_error(context));
    }
    Ok(res)
}

fn nofollow_flag(follow: bool) -> libc::c_int {
    if follow { 0 } else { libc::AT_SYMLINK_NOFOLLOW }
}

fn open_dir_raw(dirfd: RawFd, path: &CStr, flags: libc::c_int) -> VfsResult<DirHandle> {
    let flags = flags | libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC;
    let fd = check(unsafe { libc::openat(dirfd, path.as_ptr(), flags) }, "openat")?;
    Ok(DirHandle {
        fd: unsafe { OwnedFd::from_raw_fd(fd) },
    })
}

impl Platform for UnixPlatform {
    type Dir = DirHandle;
    type File = File;

    fn open_directory(path: &Path) -> VfsResult<DirHandle> {
        let cstr = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| FsError::invalid_argument("Path contains NUL"))?;
        open_dir_raw(libc::AT_FDCWD, &cstr, 0)
    }

    fn root_directory() -> VfsResult<DirHandle> {
        open_dir_raw(libc::AT_FDCWD, c"/", 0)
    }

    fn open_dir_at(dir: &DirHandle, name: &str) -> VfsResult<DirHandle> {
        open_dir_raw(dir.as_raw_fd(), &name_cstr(name)?, libc::O_NOFOLLOW)
    }

    fn open_file_at(
        dir: &DirHandle,
        name: &str,
        flags: OpenFlags,
        fd_flags: FdFlags,
        mode: u32,
    ) -> VfsResult<File> {
        let cstr = name_cstr(name)?;
        let native = open_flags_to_native(flags)
            .ok_or_else(|| FsError::invalid_argument("Invalid access mode"))?
            | fd_flags_to_native(fd_flags)
            | libc::O_CLOEXEC;
        let fd = check(
            unsafe { libc::openat(dir.as_raw_fd(), cstr.as_ptr(), native, mode as libc::c_uint) },
            "openat",
        )?;
        Ok(unsafe { File::from_raw_fd(fd) })
    }

    fn stat_dir(dir: &DirHandle) -> VfsResult<StructStat> {
        fstat(dir.as_raw_fd())
    }

    fn stat_at(dir: &DirHandle, name: &str, follow: bool) -> VfsResult<StructStat> {
        let cstr = name_cstr(name)?;
        let mut st = unsafe { mem::zeroed::<libc::stat>() };
        let flags = nofollow_flag(follow);
        check(
            unsafe { libc::fstatat(dir.as_raw_fd(), cstr.as_ptr(), &mut st, flags) },
            "fstatat",
        )?;
        Ok(stat_from_libc(&st))
    }

    fn read_dir(dir: &DirHandle) -> VfsResult<RawDirEntries> {
        let dup_fd = check(unsafe { libc::dup(dir.as_raw_fd()) }, "dup")?;
        let Some(dirp) = NonNull::new(unsafe { libc::fdopendir(dup_fd) }) else {
            let err = last_os_error("fdopendir");
            unsafe { libc::close(dup_fd) };
            return Err(err);
        };
        // the duplicate shares its offset with `dir`
        unsafe { libc::rewinddir(dirp.as_ptr()) };
        Ok(Box::new(DirStream { dirp, done: false }))
    }

    fn mkdir_at(dir: &DirHandle, name: &str, mode: u32) -> VfsResult<()> {
        let cstr = name_cstr(name)?;
        check(
            unsafe { libc::mkdirat(dir.as_raw_fd(), cstr.as_ptr(), mode as libc::mode_t) },
            "mkdirat",
        )?;
        Ok(())
    }

    fn unlink_at(dir: &DirHandle, name: &str) -> VfsResult<()> {
        let cstr = name_cstr(name)?;
        check(unsafe { libc::unlinkat(dir.as_raw_fd(), cstr.as_ptr(), 0) }, "unlinkat")?;
        Ok(())
    }

    fn rmdir_at(dir: &DirHandle, name: &str) -> VfsResult<()> {
        let cstr = name_cstr(name)?;
        check(
            unsafe { libc::unlinkat(dir.as_raw_fd(), cstr.as_ptr(), libc::AT_REMOVEDIR) },
            "unlinkat",
        )?;
        Ok(())
    }

    fn rename_at(
        old_dir: &DirHandle,
        old_name: &str,
        new_dir: &DirHandle,
        new_name: &str,
    ) -> VfsResult<()> {
        let old_cstr = name_cstr(old_name)?;
        let new_cstr = name_cstr(new_name)?;
        check(
            unsafe {
                libc::renameat(
                    old_dir.as_raw_fd(),
                    old_cstr.as_ptr(),
                    new_dir.as_raw_fd(),
                    new_cstr.as_ptr(),
                )
            },
            "renameat",
        )?;
        Ok(())
    }

    fn link_at(
        old_dir: &DirHandle,
        old_name: &str,
        new_dir: &DirHandle,
        new_name: &str,
        follow: bool,
    ) -> VfsResult<()> {
        let old_cstr = name_cstr(old_name)?;
        let new_cstr = name_cstr(new_name)?;
        let flags = if follow { libc::AT_SYMLINK_FOLLOW } else { 0 };
        check(
            unsafe {
                libc::linkat(
                    old_dir.as_raw_fd(),
                    old_cstr.as_ptr(),
                    new_dir.as_raw_fd(),
                    new_cstr.as_ptr(),
                    flags,
                )
            },
            "linkat",
        )?;
        Ok(())
    }

    fn symlink_at(target: &str, dir: &DirHandle, name: &str) -> VfsResult<()> {
        let target_cstr = name_cstr(target)?;
        let cstr = name_cstr(name)?;
        check(
            unsafe { libc::symlinkat(target_cstr.as_ptr(), dir.as_raw_fd(), cstr.as_ptr()) },
            "symlinkat",
        )?;
        Ok(())
    }

    fn readlink_at(dir: &DirHandle, name: &str) -> VfsResult<String> {
        let cstr = name_cstr(name)?;
        let mut buf = vec![0u8; 1024];
        loop {
            let res = unsafe {
                libc::readlinkat(
                    dir.as_raw_fd(),
                    cstr.as_ptr(),
                    buf.as_mut_ptr().cast(),
                    buf.len(),
                )
            };
            if res < 0 {
                return Err(last_os_error("readlinkat"));
            }
            let len = res as usize;
            if len < buf.len() {
                buf.truncate(len);
                return String::from_utf8(buf).map_err(|_| {
                    FsError::invalid_argument("Link target is not a valid Unicode string")
                });
            }
            buf.resize(buf.len() * 2, 0);
        }
    }

    fn set_times_at(
        dir: &DirHandle,
        name: &str,
        follow: bool,
        atime: TimestampUpdate,
        mtime: TimestampUpdate,
    ) -> VfsResult<()> {
        let cstr = name_cstr(name)?;
        let times = [to_timespec(atime), to_timespec(mtime)];
        let flags = nofollow_flag(follow);
        check(
            unsafe { libc::utimensat(dir.as_raw_fd(), cstr.as_ptr(), times.as_ptr(), flags) },
            "utimensat",
        )?;
        Ok(())
    }

    fn chmod_at(dir: &DirHandle, name: &str, mode: u32, follow: bool) -> VfsResult<()> {
        let cstr = name_cstr(name)?;
        let mode = (mode & file_mode::PERMISSIONS_MASK) as libc::mode_t;
        check(
            unsafe { libc::fchmodat(dir.as_raw_fd(), cstr.as_ptr(), mode, nofollow_flag(follow)) },
            "fchmodat",
        )?;
        Ok(())
    }

    fn chown_at(
        dir: &DirHandle,
        name: &str,
        owner: Option<u32>,
        group: Option<u32>,
        follow: bool,
    ) -> VfsResult<()> {
        let cstr = name_cstr(name)?;
        let (uid, gid) = owner_ids(owner, group);
        let flags = nofollow_flag(follow);
        check(
            unsafe { libc::fchownat(dir.as_raw_fd(), cstr.as_ptr(), uid, gid, flags) },
            "fchownat",
        )?;
        Ok(())
    }

    fn access_at(
        dir: &DirHandle,
        name: &str,
        mode: FileAccessibilityCheck,
        effective_ids: bool,
        follow: bool,
    ) -> VfsResult<()> {
        let cstr = name_cstr(name)?;
        let mut amode = libc::F_OK;
        if mode.contains(FileAccessibilityCheck::READABLE) {
            amode |= libc::R_OK;
        }
        if mode.contains(FileAccessibilityCheck::WRITEABLE) {
            amode |= libc::W_OK;
        }
        if mode.contains(FileAccessibilityCheck::EXECUTABLE) {
            amode |= libc::X_OK;
        }
        let mut flags = nofollow_flag(follow);
        if effective_ids {
            flags |= libc::AT_EACCESS;
        }
        check(
            unsafe { libc::faccessat(dir.as_raw_fd(), cstr.as_ptr(), amode, flags) },
            "faccessat",
        )?;
        Ok(())
    }

    fn read(file: &File, buf: &mut [u8], strategy: ReadWriteStrategy) -> VfsResult<usize> {
        let result = match strategy {
            ReadWriteStrategy::CurrentPosition => (&*file).read(buf),
            ReadWriteStrategy::Position(offset) => file.read_at(buf, offset),
        };
        crate::io_result("read", result)
    }

    fn write(
        file: &File,
        buf: &[u8],
        strategy: ReadWriteStrategy,
        _append: bool,
    ) -> VfsResult<usize> {
        // O_APPEND is applied natively
        let result = match strategy {
            ReadWriteStrategy::CurrentPosition => (&*file).write(buf),
            ReadWriteStrategy::Position(offset) => file.write_at(buf, offset),
        };
        crate::io_result("write", result)
    }

    fn stat_file(file: &File) -> VfsResult<StructStat> {
        fstat(file.as_raw_fd())
    }

    fn allocate(file: &File, offset: u64, length: u64) -> VfsResult<()> {
        let offset = i64::try_from(offset)
            .map_err(|_| FsError::new(ErrorKind::FileTooBig, "Offset is too big"))?;
        let length = i64::try_from(length)
            .map_err(|_| FsError::new(ErrorKind::FileTooBig, "Length is too big"))?;
        cfg_if::cfg_if! {
            if #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))] {
                let res = unsafe { libc::posix_fallocate(file.as_raw_fd(), offset, length) };
                if res != 0 {
                    let err = io::Error::from_raw_os_error(res);
                    return Err(crate::map_io_error("posix_fallocate", err));
                }
                Ok(())
            } else {
                let end = offset
                    .checked_add(length)
                    .ok_or_else(|| {
                        FsError::new(ErrorKind::FileTooBig, "Allocation end overflows")
                    })?;
                let size = crate::io_result("metadata", file.metadata())?.len();
                if (end as u64) > size {
                    crate::io_result("set_len", file.set_len(end as u64))?;
                }
                Ok(())
            }
        }
    }

    fn advise(file: &File, offset: u64, length: u64, advice: Advice) -> VfsResult<()> {
        cfg_if::cfg_if! {
            if #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))] {
                let advice = match advice {
                    Advice::Normal => libc::POSIX_FADV_NORMAL,
                    Advice::Sequential => libc::POSIX_FADV_SEQUENTIAL,
                    Advice::Random => libc::POSIX_FADV_RANDOM,
                    Advice::WillNeed => libc::POSIX_FADV_WILLNEED,
                    Advice::DontNeed => libc::POSIX_FADV_DONTNEED,
                    Advice::NoReuse => libc::POSIX_FADV_NOREUSE,
                };
                let offset = i64::try_from(offset)
                    .map_err(|_| FsError::invalid_argument("Offset is too big"))?;
                let length = i64::try_from(length)
                    .map_err(|_| FsError::invalid_argument("Length is too big"))?;
                let res = unsafe { libc::posix_fadvise(file.as_raw_fd(), offset, length, advice) };
                if res != 0 {
                    let err = io::Error::from_raw_os_error(res);
                    return Err(crate::map_io_error("posix_fadvise", err));
                }
                Ok(())
            } else {
                let _ = (file, offset, length, advice);
                Ok(())
            }
        }
    }

    fn lock(file: &File, lock: AdvisoryLock, add: bool) -> VfsResult<()> {
        let mut flock = unsafe { mem::zeroed::<libc::flock>() };
        let lock_type = match (add, lock.lock_type) {
            (false, _) => libc::F_UNLCK,
            (true, AdvisoryLockType::Read) => libc::F_RDLCK,
            (true, AdvisoryLockType::Write) => libc::F_WRLCK,
        };
        flock.l_type = lock_type as _;
        flock.l_whence = match lock.whence {
            Whence::Set => libc::SEEK_SET,
            Whence::Cur => libc::SEEK_CUR,
            Whence::End => libc::SEEK_END,
        } as _;
        flock.l_start = lock.start as _;
        flock.l_len = lock.length as _;
        check(
            unsafe { libc::fcntl(file.as_raw_fd(), libc::F_SETLK, &flock as *const libc::flock) },
            "fcntl(F_SETLK)",
        )?;
        Ok(())
    }

    fn set_file_times(
        file: &File,
        atime: TimestampUpdate,
        mtime: TimestampUpdate,
    ) -> VfsResult<()> {
        let times = [to_timespec(atime), to_timespec(mtime)];
        check(unsafe { libc::futimens(file.as_raw_fd(), times.as_ptr()) }, "futimens")?;
        Ok(())
    }

    fn chmod_file(file: &File, mode: u32) -> VfsResult<()> {
        let mode = (mode & file_mode::PERMISSIONS_MASK) as libc::mode_t;
        check(unsafe { libc::fchmod(file.as_raw_fd(), mode) }, "fchmod")?;
        Ok(())
    }

    fn chown_file(file: &File, owner: Option<u32>, group: Option<u32>) -> VfsResult<()> {
        let (uid, gid) = owner_ids(owner, group);
        check(unsafe { libc::fchown(file.as_raw_fd(), uid, gid) }, "fchown")?;
        Ok(())
    }

    fn set_fd_flags(file: &File, flags: FdFlags) -> VfsResult<()> {
        const MUTABLE: libc::c_int = libc::O_APPEND | libc::O_NONBLOCK;
        let sync_flags = FdFlags::DSYNC | FdFlags::RSYNC | FdFlags::SYNC;

        let fd = file.as_raw_fd();
        let current = check(unsafe { libc::fcntl(fd, libc::F_GETFL) }, "fcntl(F_GETFL)")?;
        let requested_sync = flags & sync_flags;
        let current_sync = fd_flags_from_native(current) & sync_flags;
        if requested_sync.difference(FdFlags::RSYNC) != current_sync {
            return Err(FsError::not_supported("Sync flags can not be changed after open"));
        }
        let updated = (current & !MUTABLE) | (fd_flags_to_native(flags) & MUTABLE);
        check(unsafe { libc::fcntl(fd, libc::F_SETFL, updated) }, "fcntl(F_SETFL)")?;
        Ok(())
    }

    fn close_file(file: File) -> VfsResult<()> {
        close_fd(file.into_raw_fd())
    }

    fn close_dir(dir: DirHandle) -> VfsResult<()> {
        close_fd(dir.fd.into_raw_fd())
    }
}

/// Closes a descriptor this process owns. The descriptor is gone even when
/// `close(2)` fails.
fn close_fd(fd: RawFd) -> VfsResult<()> {
    check(unsafe { libc::close(fd) }, "close")?;
    Ok(())
}

/// One-shot `readdir(3)` cursor over a duplicated directory descriptor.
struct DirStream {
    dirp: NonNull<libc::DIR>,
    done: bool,
}

// SAFETY: the stream is only ever used by its single owner.
unsafe impl Send for DirStream {}

impl Iterator for DirStream {
    type Item = VfsResult<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        set_errno(0);
        let ent = unsafe { libc::readdir(self.dirp.as_ptr()) };
        if ent.is_null() {
            self.done = true;
            let err = io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(0) | None => None,
                Some(_) => Some(Err(crate::map_io_error("readdir", err))),
            };
        }
        let ent = unsafe { &*ent };
        let name = unsafe { CStr::from_ptr(ent.d_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        Some(Ok(DirEntry::new(name, dirent_type(ent), dirent_inode(ent))))
    }
}

impl Drop for DirStream {
    fn drop(&mut self) {
        unsafe { libc::closedir(self.dirp.as_ptr()) };
    }
}

#[cfg(target_os = "freebsd")]
fn dirent_inode(ent: &libc::dirent) -> u64 {
    ent.d_fileno as u64
}

#[cfg(not(target_os = "freebsd"))]
fn dirent_inode(ent: &libc::dirent) -> u64 {
    ent.d_ino as u64
}

#[cfg(not(any(target_os = "solaris", target_os = "illumos")))]
fn dirent_type(ent: &libc::dirent) -> FileType {
    match ent.d_type {
        libc::DT_BLK => FileType::BlockDevice,
        libc::DT_CHR => FileType::CharacterDevice,
        libc::DT_DIR => FileType::Directory,
        libc::DT_REG => FileType::RegularFile,
        libc::DT_SOCK => FileType::SocketStream,
        libc::DT_LNK => FileType::SymbolicLink,
        _ => FileType::Unknown,
    }
}

#[cfg(any(target_os = "solaris", target_os = "illumos"))]
fn dirent_type(_ent: &libc::dirent) -> FileType {
    FileType::Unknown
}

fn fstat(fd: RawFd) -> VfsResult<StructStat> {
    let mut st = unsafe { mem::zeroed::<libc::stat>() };
    check(unsafe { libc::fstat(fd, &mut st) }, "fstat")?;
    Ok(stat_from_libc(&st))
}

fn stat_from_libc(st: &libc::stat) -> StructStat {
    let mode = st.st_mode as u32;
    StructStat {
        device_id: st.st_dev as u64,
        inode: st.st_ino as u64,
        mode: mode & file_mode::PERMISSIONS_MASK,
        file_type: FileType::from_posix_mode(mode),
        links: st.st_nlink as u64,
        uid: st.st_uid as u64,
        gid: st.st_gid as u64,
        special_file_device_id: st.st_rdev as u64,
        size: st.st_size as u64,
        block_size: st.st_blksize as u64,
        blocks: st.st_blocks as u64,
        access_time: StructTimespec::new(st.st_atime as i64, st.st_atime_nsec as i64),
        modification_time: StructTimespec::new(st.st_mtime as i64, st.st_mtime_nsec as i64),
        change_status_time: StructTimespec::new(st.st_ctime as i64, st.st_ctime_nsec as i64),
    }
}

fn to_timespec(update: TimestampUpdate) -> libc::timespec {
    let mut ts = unsafe { mem::zeroed::<libc::timespec>() };
    match update {
        TimestampUpdate::Omit => ts.tv_nsec = libc::UTIME_OMIT,
        TimestampUpdate::Now => ts.tv_nsec = libc::UTIME_NOW,
        TimestampUpdate::Set(nanos) => {
            let time = StructTimespec::from_nanos(nanos);
            ts.tv_sec = time.seconds as libc::time_t;
            ts.tv_nsec = time.nanoseconds as _;
        }
    }
    ts
}

fn owner_ids(owner: Option<u32>, group: Option<u32>) -> (libc::uid_t, libc::gid_t) {
    // -1 leaves the id unchanged
    let uid = owner.map_or(libc::uid_t::MAX, |id| id as libc::uid_t);
    let gid = group.map_or(libc::gid_t::MAX, |id| id as libc::gid_t);
    (uid, gid)
}

/// Checks one descriptor with `poll(2)`, without blocking.
///
/// Returns `None` when the descriptor is not ready.
pub(crate) fn poll_fd_now(fd: RawFd, interest: Interest) -> VfsResult<Option<(u64, bool)>> {
    let mut pollfd = [pollfd_for(fd, interest)];
    if poll_fds(&mut pollfd, 0)? == 0 {
        return Ok(None);
    }
    Ok(Some(readiness_of(&pollfd[0], interest)))
}

pub(crate) fn pollfd_for(fd: RawFd, interest: Interest) -> libc::pollfd {
    libc::pollfd {
        fd,
        events: interest_events(interest),
        revents: 0,
    }
}

fn interest_events(interest: Interest) -> libc::c_short {
    match interest {
        Interest::Read => libc::POLLIN,
        Interest::Write => libc::POLLOUT,
    }
}

/// Blocks in `poll(2)` for at most `timeout_ms`.
pub(crate) fn poll_fds(fds: &mut [libc::pollfd], timeout_ms: i32) -> VfsResult<usize> {
    let res = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
    if res < 0 {
        return Err(last_os_error("poll"));
    }
    Ok(res as usize)
}

/// Bytes available and hangup state of a descriptor reported ready by `poll(2)`.
///
/// A wakeup without the expected event bits is reported as hangup.
pub(crate) fn readiness_of(pollfd: &libc::pollfd, interest: Interest) -> (u64, bool) {
    let expected = interest_events(interest);
    let hangup = pollfd.revents & expected == 0;
    let available = match interest {
        Interest::Read if !hangup => bytes_available(pollfd.fd),
        _ => 0,
    };
    (available, hangup)
}

fn bytes_available(fd: RawFd) -> u64 {
    let mut available: libc::c_int = 0;
    let res = unsafe { libc::ioctl(fd, libc::FIONREAD as _, &mut available) };
    if res < 0 { 0 } else { available.max(0) as u64 }
}

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        fn set_errno(value: i32) {
            unsafe { *libc::__errno_location() = value };
        }
    } else if #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))] {
        fn set_errno(value: i32) {
            unsafe { *libc::__error() = value };
        }
    } else if #[cfg(any(target_os = "netbsd", target_os = "openbsd"))] {
        fn set_errno(value: i32) {
            unsafe { *libc::__errno() = value };
        }
    } else {
        fn set_errno(_value: i32) {}
    }
}
