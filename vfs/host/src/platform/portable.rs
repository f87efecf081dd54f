//! `std::fs` backend for targets without `*at` syscalls.
//!
//! Directory handles are host paths. Symlink expansion is still performed by
//! the resolver, one component at a time, so the sandbox rules hold; the
//! handles are just not immune to concurrent renames on the host.

use std::borrow::Borrow;
use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File, Metadata, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use filetime::FileTime;
use vfs_core::flags::{
    AccessMode, Advice, AdvisoryLock, FdFlags, FileAccessibilityCheck, OpenFlags,
    ReadWriteStrategy, TimestampUpdate,
};
use vfs_core::stat::file_mode;
use vfs_core::{DirEntry, FileType, FsError, StructStat, StructTimespec, VfsResult};

use super::{Platform, RawDirEntries};
use crate::io_result;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathHandle {
    path: PathBuf,
}

impl PathHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn child(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

/// A file together with the path it was opened under, which stands in for
/// an inode number where the host has none.
#[derive(Debug)]
pub struct PathFile {
    file: File,
    path: PathBuf,
}

impl Borrow<File> for PathFile {
    fn borrow(&self) -> &File {
        &self.file
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PortablePlatform;

fn metadata(path: &Path, follow: bool) -> io::Result<Metadata> {
    if follow {
        fs::metadata(path)
    } else {
        fs::symlink_metadata(path)
    }
}

impl Platform for PortablePlatform {
    type Dir = PathHandle;
    type File = PathFile;

    fn open_directory(path: &Path) -> VfsResult<PathHandle> {
        let meta = io_result("metadata", fs::metadata(path))?;
        if !meta.is_dir() {
            return Err(FsError::not_directory(format!(
                "`{}` is not a directory",
                path.display()
            )));
        }
        Ok(PathHandle {
            path: path.to_path_buf(),
        })
    }

    fn root_directory() -> VfsResult<PathHandle> {
        Self::open_directory(Path::new(std::path::MAIN_SEPARATOR_STR))
    }

    fn open_dir_at(dir: &PathHandle, name: &str) -> VfsResult<PathHandle> {
        let path = dir.child(name);
        let meta = io_result("symlink_metadata", fs::symlink_metadata(&path))?;
        if meta.file_type().is_symlink() {
            return Err(FsError::too_many_symlinks(format!("`{name}` is a symlink")));
        }
        if !meta.is_dir() {
            return Err(FsError::not_directory(format!("`{name}` is not a directory")));
        }
        Ok(PathHandle { path })
    }

    fn open_file_at(
        dir: &PathHandle,
        name: &str,
        flags: OpenFlags,
        fd_flags: FdFlags,
        mode: u32,
    ) -> VfsResult<PathFile> {
        let path = dir.child(name);
        if flags.contains(OpenFlags::O_NOFOLLOW)
            && fs::symlink_metadata(&path).is_ok_and(|meta| meta.file_type().is_symlink())
        {
            return Err(FsError::too_many_symlinks(format!("`{name}` is a symlink")));
        }
        let access = flags
            .access_mode()
            .ok_or_else(|| FsError::invalid_argument("Invalid access mode"))?;
        let mut options = OpenOptions::new();
        options
            .read(matches!(access, AccessMode::ReadOnly | AccessMode::ReadWrite))
            .write(matches!(access, AccessMode::WriteOnly | AccessMode::ReadWrite))
            .truncate(flags.contains(OpenFlags::O_TRUNC));
        if flags.contains(OpenFlags::O_APPEND) || fd_flags.contains(FdFlags::APPEND) {
            options.append(true);
        }
        if flags.contains(OpenFlags::O_CREAT) {
            if flags.contains(OpenFlags::O_EXCL) {
                options.create_new(true);
            } else {
                options.create(true);
            }
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;
        let file = io_result("open", options.open(&path))?;
        Ok(PathFile { file, path })
    }

    fn stat_dir(dir: &PathHandle) -> VfsResult<StructStat> {
        let meta = io_result("metadata", fs::metadata(&dir.path))?;
        Ok(stat_from_metadata(&dir.path, &meta))
    }

    fn stat_at(dir: &PathHandle, name: &str, follow: bool) -> VfsResult<StructStat> {
        let path = dir.child(name);
        let meta = io_result("metadata", metadata(&path, follow))?;
        Ok(stat_from_metadata(&path, &meta))
    }

    fn read_dir(dir: &PathHandle) -> VfsResult<RawDirEntries> {
        let entries = io_result("read_dir", fs::read_dir(&dir.path))?;
        Ok(Box::new(entries.map(|entry| {
            let entry = io_result("read_dir", entry)?;
            let file_type = io_result("file_type", entry.file_type())?;
            let name = entry.file_name().to_string_lossy().into_owned();
            Ok(DirEntry::new(
                name,
                file_type_of(&file_type),
                entry_inode(&entry),
            ))
        })))
    }

    fn mkdir_at(dir: &PathHandle, name: &str, mode: u32) -> VfsResult<()> {
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;
        io_result("mkdir", builder.create(dir.child(name)))
    }

    fn unlink_at(dir: &PathHandle, name: &str) -> VfsResult<()> {
        let path = dir.child(name);
        if fs::symlink_metadata(&path).is_ok_and(|meta| meta.is_dir()) {
            return Err(FsError::is_directory(format!("`{name}` is a directory")));
        }
        io_result("remove_file", fs::remove_file(path))
    }

    fn rmdir_at(dir: &PathHandle, name: &str) -> VfsResult<()> {
        io_result("remove_dir", fs::remove_dir(dir.child(name)))
    }

    fn rename_at(
        old_dir: &PathHandle,
        old_name: &str,
        new_dir: &PathHandle,
        new_name: &str,
    ) -> VfsResult<()> {
        io_result("rename", fs::rename(old_dir.child(old_name), new_dir.child(new_name)))
    }

    fn link_at(
        old_dir: &PathHandle,
        old_name: &str,
        new_dir: &PathHandle,
        new_name: &str,
        _follow: bool,
    ) -> VfsResult<()> {
        io_result("hard_link", fs::hard_link(old_dir.child(old_name), new_dir.child(new_name)))
    }

    fn symlink_at(target: &str, dir: &PathHandle, name: &str) -> VfsResult<()> {
        let link = dir.child(name);
        cfg_if::cfg_if! {
            if #[cfg(unix)] {
                io_result("symlink", std::os::unix::fs::symlink(target, link))
            } else if #[cfg(windows)] {
                let target_is_dir = fs::metadata(dir.child(target)).is_ok_and(|meta| meta.is_dir());
                let result = if target_is_dir {
                    std::os::windows::fs::symlink_dir(target, link)
                } else {
                    std::os::windows::fs::symlink_file(target, link)
                };
                io_result("symlink", result)
            } else {
                let _ = (target, link);
                Err(FsError::not_supported("Symlinks are not supported on this platform"))
            }
        }
    }

    fn readlink_at(dir: &PathHandle, name: &str) -> VfsResult<String> {
        let target = io_result("read_link", fs::read_link(dir.child(name)))?;
        target
            .into_os_string()
            .into_string()
            .map_err(|_| FsError::invalid_argument("Link target is not a valid Unicode string"))
    }

    fn set_times_at(
        dir: &PathHandle,
        name: &str,
        follow: bool,
        atime: TimestampUpdate,
        mtime: TimestampUpdate,
    ) -> VfsResult<()> {
        let path = dir.child(name);
        let meta = io_result("metadata", metadata(&path, follow))?;
        let atime = file_time(atime, || FileTime::from_last_access_time(&meta));
        let mtime = file_time(mtime, || FileTime::from_last_modification_time(&meta));
        if follow {
            io_result("set_file_times", filetime::set_file_times(&path, atime, mtime))
        } else {
            let result = filetime::set_symlink_file_times(&path, atime, mtime);
            io_result("set_symlink_file_times", result)
        }
    }

    fn chmod_at(dir: &PathHandle, name: &str, mode: u32, follow: bool) -> VfsResult<()> {
        let path = dir.child(name);
        let meta = io_result("metadata", metadata(&path, follow))?;
        if meta.file_type().is_symlink() {
            return Err(FsError::not_supported("Can not change mode of a symlink"));
        }
        io_result("set_permissions", fs::set_permissions(&path, permissions(meta, mode)))
    }

    fn chown_at(
        dir: &PathHandle,
        name: &str,
        owner: Option<u32>,
        group: Option<u32>,
        follow: bool,
    ) -> VfsResult<()> {
        cfg_if::cfg_if! {
            if #[cfg(unix)] {
                let path = dir.child(name);
                let result = if follow {
                    std::os::unix::fs::chown(path, owner, group)
                } else {
                    std::os::unix::fs::lchown(path, owner, group)
                };
                io_result("chown", result)
            } else {
                let _ = (dir, name, owner, group, follow);
                Err(FsError::not_supported("Ownership is not supported on this platform"))
            }
        }
    }

    fn access_at(
        dir: &PathHandle,
        name: &str,
        mode: FileAccessibilityCheck,
        _effective_ids: bool,
        follow: bool,
    ) -> VfsResult<()> {
        let meta = io_result("metadata", metadata(&dir.child(name), follow))?;
        if mode.contains(FileAccessibilityCheck::WRITEABLE) && meta.permissions().readonly() {
            return Err(FsError::access_denied(format!("`{name}` is read-only")));
        }
        Ok(())
    }

    fn read(file: &PathFile, buf: &mut [u8], strategy: ReadWriteStrategy) -> VfsResult<usize> {
        let file = &file.file;
        match strategy {
            ReadWriteStrategy::CurrentPosition => io_result("read", (&*file).read(buf)),
            ReadWriteStrategy::Position(offset) => {
                with_position(file, offset, |mut file| io_result("read", file.read(buf)))
            }
        }
    }

    fn write(
        file: &PathFile,
        buf: &[u8],
        strategy: ReadWriteStrategy,
        append: bool,
    ) -> VfsResult<usize> {
        let mut file = &file.file;
        match strategy {
            ReadWriteStrategy::CurrentPosition => {
                if append {
                    io_result("seek", file.seek(SeekFrom::End(0)))?;
                }
                io_result("write", file.write(buf))
            }
            ReadWriteStrategy::Position(offset) => {
                with_position(file, offset, |mut file| io_result("write", file.write(buf)))
            }
        }
    }

    fn stat_file(file: &PathFile) -> VfsResult<StructStat> {
        let meta = io_result("metadata", file.file.metadata())?;
        Ok(stat_from_metadata(&file.path, &meta))
    }

    fn allocate(file: &PathFile, offset: u64, length: u64) -> VfsResult<()> {
        let end = offset.checked_add(length).ok_or_else(|| {
            FsError::new(vfs_core::ErrorKind::FileTooBig, "Allocation end overflows")
        })?;
        let size = io_result("metadata", file.file.metadata())?.len();
        if end > size {
            io_result("set_len", file.file.set_len(end))?;
        }
        Ok(())
    }

    fn advise(_file: &PathFile, _offset: u64, _length: u64, _advice: Advice) -> VfsResult<()> {
        Ok(())
    }

    fn lock(_file: &PathFile, _lock: AdvisoryLock, _add: bool) -> VfsResult<()> {
        Err(FsError::not_supported("Advisory locks are not supported on this platform"))
    }

    fn set_file_times(
        file: &PathFile,
        atime: TimestampUpdate,
        mtime: TimestampUpdate,
    ) -> VfsResult<()> {
        let atime = explicit_file_time(atime);
        let mtime = explicit_file_time(mtime);
        io_result(
            "set_file_handle_times",
            filetime::set_file_handle_times(&file.file, atime, mtime),
        )
    }

    fn chmod_file(file: &PathFile, mode: u32) -> VfsResult<()> {
        let meta = io_result("metadata", file.file.metadata())?;
        io_result("set_permissions", file.file.set_permissions(permissions(meta, mode)))
    }

    fn chown_file(file: &PathFile, owner: Option<u32>, group: Option<u32>) -> VfsResult<()> {
        cfg_if::cfg_if! {
            if #[cfg(unix)] {
                io_result("fchown", std::os::unix::fs::fchown(&file.file, owner, group))
            } else {
                let _ = (file, owner, group);
                Err(FsError::not_supported("Ownership is not supported on this platform"))
            }
        }
    }

    fn set_fd_flags(_file: &PathFile, flags: FdFlags) -> VfsResult<()> {
        if flags.intersects(FdFlags::DSYNC | FdFlags::RSYNC | FdFlags::SYNC) {
            return Err(FsError::not_supported("Sync flags are not supported on this platform"));
        }
        // APPEND and NONBLOCK are tracked by the descriptor
        Ok(())
    }

    fn close_file(file: PathFile) -> VfsResult<()> {
        // std reports no close errors
        drop(file);
        Ok(())
    }

    fn close_dir(_dir: PathHandle) -> VfsResult<()> {
        Ok(())
    }
}

/// Runs `f` at `offset` and restores the previous file position.
fn with_position<T>(
    file: &File,
    offset: u64,
    f: impl FnOnce(&File) -> VfsResult<T>,
) -> VfsResult<T> {
    let mut handle = file;
    let saved = io_result("seek", handle.stream_position())?;
    io_result("seek", handle.seek(SeekFrom::Start(offset)))?;
    let result = f(file);
    io_result("seek", handle.seek(SeekFrom::Start(saved)))?;
    result
}

fn file_time(update: TimestampUpdate, current: impl FnOnce() -> FileTime) -> FileTime {
    explicit_file_time(update).unwrap_or_else(current)
}

fn explicit_file_time(update: TimestampUpdate) -> Option<FileTime> {
    match update {
        TimestampUpdate::Omit => None,
        TimestampUpdate::Now => Some(FileTime::now()),
        TimestampUpdate::Set(nanos) => {
            let time = StructTimespec::from_nanos(nanos);
            Some(FileTime::from_unix_time(time.seconds, time.nanoseconds as u32))
        }
    }
}

fn permissions(meta: Metadata, mode: u32) -> fs::Permissions {
    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            use std::os::unix::fs::PermissionsExt;
            let _ = meta;
            fs::Permissions::from_mode(mode & file_mode::PERMISSIONS_MASK)
        } else {
            let mut permissions = meta.permissions();
            permissions.set_readonly(mode & 0o222 == 0);
            permissions
        }
    }
}

fn file_type_of(file_type: &fs::FileType) -> FileType {
    if file_type.is_dir() {
        FileType::Directory
    } else if file_type.is_symlink() {
        FileType::SymbolicLink
    } else if file_type.is_file() {
        FileType::RegularFile
    } else {
        FileType::Unknown
    }
}

/// Stable non-zero surrogate for platforms without inode numbers.
fn surrogate_inode(path: &Path) -> u64 {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    hasher.finish().max(1)
}

#[cfg(unix)]
fn entry_inode(entry: &fs::DirEntry) -> u64 {
    use std::os::unix::fs::DirEntryExt;
    entry.ino()
}

#[cfg(not(unix))]
fn entry_inode(entry: &fs::DirEntry) -> u64 {
    surrogate_inode(&entry.path())
}

fn timespec(time: io::Result<SystemTime>) -> StructTimespec {
    time.map(StructTimespec::from_system_time).unwrap_or_default()
}

fn stat_from_metadata(path: &Path, meta: &Metadata) -> StructStat {
    let file_type = file_type_of(&meta.file_type());
    let mut stat = StructStat {
        file_type,
        inode: surrogate_inode(path),
        links: 1,
        size: meta.len(),
        mode: if meta.permissions().readonly() { 0o444 } else { 0o644 },
        access_time: timespec(meta.accessed()),
        modification_time: timespec(meta.modified()),
        change_status_time: timespec(meta.modified()),
        ..StructStat::default()
    };
    if file_type == FileType::Directory {
        stat.mode |= 0o111;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        stat.device_id = meta.dev();
        stat.inode = meta.ino();
        stat.mode = meta.mode() & file_mode::PERMISSIONS_MASK;
        stat.links = meta.nlink();
        stat.uid = u64::from(meta.uid());
        stat.gid = u64::from(meta.gid());
        stat.special_file_device_id = meta.rdev();
        stat.block_size = meta.blksize();
        stat.blocks = meta.blocks();
        stat.change_status_time = StructTimespec::new(meta.ctime(), meta.ctime_nsec());
    }
    stat
}
