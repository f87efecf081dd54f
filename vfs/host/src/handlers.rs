//! [`OperationHandler`] implementations of [`HostBackend`].

use std::io::{Seek, SeekFrom};
use std::sync::Arc;

use vfs_core::dirent::DirEntrySequence;
use vfs_core::flags::{FdFlags, OpenFlags, ReadWriteStrategy, Whence};
use vfs_core::ops::*;
use vfs_core::poll::{Event, PollHelper, StdMonotonicClock};
use vfs_core::stat::file_mode;
use vfs_core::{
    DirEntry, ErrorKind, Fd, FdRights, FileType, FsError, OperationHandler, StructStat,
    VfsResult, VirtualPath,
};

use crate::backend::HostBackend;
use crate::io_result;
use crate::platform::Platform;
use crate::resolve::Node;
use crate::resource::{DirectoryResource, FdResource, FileResource, require_rights};

fn directory_fd_error() -> FsError {
    FsError::bad_fd("Operation is not supported on a directory")
}

fn stdio_fd_error() -> FsError {
    FsError::bad_fd("Operation is not supported on a stdio stream")
}

/// Descriptor flags implied by open flags.
fn open_fd_flags(flags: OpenFlags, fd_flags: FdFlags) -> FdFlags {
    let mut result = fd_flags;
    for (open_flag, fd_flag) in [
        (OpenFlags::O_APPEND, FdFlags::APPEND),
        (OpenFlags::O_NONBLOCK, FdFlags::NONBLOCK),
        (OpenFlags::O_DSYNC, FdFlags::DSYNC),
        (OpenFlags::O_SYNC, FdFlags::SYNC),
    ] {
        if flags.contains(open_flag) {
            result |= fd_flag;
        }
    }
    result
}

fn positional_rights(strategy: ReadWriteStrategy, rights: FdRights) -> FdRights {
    match strategy {
        ReadWriteStrategy::CurrentPosition => rights,
        ReadWriteStrategy::Position(_) => rights | FdRights::FD_SEEK,
    }
}

impl<P: Platform> HostBackend<P> {
    fn open_directory_fd(
        &self,
        base: &DirectoryResource<P::Dir>,
        node: &Node<P::Dir>,
        input: &Open,
    ) -> VfsResult<Fd> {
        if input.flags.contains(OpenFlags::O_CREAT | OpenFlags::O_EXCL) {
            return Err(FsError::exists(format!("`{}` already exists", input.path)));
        }
        if input.flags.is_writable() {
            return Err(FsError::is_directory(format!("`{}` is a directory", input.path)));
        }
        let dir = node.open_directory::<P>()?;
        let virtual_path = if input.path.is_absolute() {
            input.path.clone()
        } else {
            base.virtual_path.join(input.path.as_str())?
        };
        self.table.allocate(FdResource::Directory(DirectoryResource {
            dir,
            virtual_path,
            preopened: false,
            rights: base.rights.child_directory_rights(input.rights),
        }))
    }
}

impl<P: Platform> OperationHandler<Open> for HostBackend<P> {
    fn handle(&self, input: Open) -> VfsResult<Fd> {
        let base = self.directory(input.base)?;
        let mut required = FdRights::PATH_OPEN;
        if input.flags.contains(OpenFlags::O_CREAT) {
            required |= FdRights::PATH_CREATE_FILE;
        }
        if input.flags.contains(OpenFlags::O_TRUNC) {
            required |= FdRights::PATH_FILESTAT_SET_SIZE;
        }
        require_rights(base.rights, required)?;
        if input.flags.access_mode().is_none() {
            return Err(FsError::invalid_argument("Invalid access mode"));
        }
        let directory_request = input.path.is_directory_request();
        if directory_request
            && (input.flags.contains(OpenFlags::O_CREAT) || input.flags.is_writable())
        {
            return Err(FsError::is_directory(format!(
                "`{}` can only be opened as a directory",
                input.path
            )));
        }

        let follow = !input.flags.contains(OpenFlags::O_NOFOLLOW);
        let node = self.resolve(&base, &input.path, follow)?;
        let must_be_directory = directory_request || input.flags.contains(OpenFlags::O_DIRECTORY);
        match node.try_stat::<P>()? {
            Some(stat) if stat.file_type == FileType::Directory => {
                self.open_directory_fd(&base, &node, &input)
            }
            Some(_) if must_be_directory => Err(FsError::not_directory(format!(
                "`{}` is not a directory",
                input.path
            ))),
            None if must_be_directory => {
                Err(FsError::no_entry(format!("`{}` does not exist", input.path)))
            }
            _ => {
                let (parent, name) = node.parent_and_name();
                let mode = input.mode.unwrap_or(file_mode::DEFAULT_FILE_MODE);
                // symlinks were expanded by the resolver
                let flags = input.flags | OpenFlags::O_NOFOLLOW;
                let file = P::open_file_at(parent, name, flags, input.fd_flags, mode)?;
                let rights = base.rights.child_file_rights(input.rights);
                self.table.allocate(FdResource::File(FileResource::new(
                    file,
                    open_fd_flags(input.flags, input.fd_flags),
                    rights,
                )))
            }
        }
    }
}

impl<P: Platform> OperationHandler<CloseFd> for HostBackend<P> {
    fn handle(&self, input: CloseFd) -> VfsResult<()> {
        let resource = self.table.release(input.fd)?;
        resource.close()
    }
}

impl<P: Platform> OperationHandler<ReadFd> for HostBackend<P> {
    fn handle(&self, input: ReadFd) -> VfsResult<Vec<u8>> {
        let mut buf = vec![0; input.length];
        let read = match &*self.resource(input.fd)? {
            FdResource::File(file) => {
                require_rights(file.rights, positional_rights(input.strategy, FdRights::FD_READ))?;
                P::read(&file.file, &mut buf, input.strategy)?
            }
            FdResource::Directory(_) => return Err(directory_fd_error()),
            FdResource::Stdio(stdio) => match input.strategy {
                ReadWriteStrategy::CurrentPosition => stdio.read(&mut buf)?,
                ReadWriteStrategy::Position(_) => {
                    return Err(FsError::new(ErrorKind::NotSeekable, "Stream is not seekable"));
                }
            },
        };
        buf.truncate(read);
        Ok(buf)
    }
}

impl<P: Platform> HostBackend<P> {
    fn write_file(
        file: &FileResource<P::File>,
        chunks: &[Vec<u8>],
        strategy: ReadWriteStrategy,
    ) -> VfsResult<u64> {
        let append = file.flags().contains(FdFlags::APPEND);
        let mut total: u64 = 0;
        for chunk in chunks {
            let mut written = 0;
            while written < chunk.len() {
                let strategy = match strategy {
                    ReadWriteStrategy::CurrentPosition => ReadWriteStrategy::CurrentPosition,
                    ReadWriteStrategy::Position(offset) => {
                        ReadWriteStrategy::Position(offset + total + written as u64)
                    }
                };
                match P::write(&file.file, &chunk[written..], strategy, append) {
                    Ok(0) => return Err(FsError::io("Write returned zero bytes")),
                    Ok(count) => written += count,
                    // report what reached the file before the failure
                    Err(_) if total > 0 || written > 0 => return Ok(total + written as u64),
                    Err(err) => return Err(err),
                }
            }
            total += written as u64;
        }
        Ok(total)
    }
}

impl<P: Platform> OperationHandler<WriteFd> for HostBackend<P> {
    fn handle(&self, input: WriteFd) -> VfsResult<u64> {
        match &*self.resource(input.fd)? {
            FdResource::File(file) => {
                let required = positional_rights(input.strategy, FdRights::FD_WRITE);
                require_rights(file.rights, required)?;
                Self::write_file(file, &input.chunks, input.strategy)
            }
            FdResource::Directory(_) => Err(directory_fd_error()),
            FdResource::Stdio(stdio) => {
                if let ReadWriteStrategy::Position(_) = input.strategy {
                    return Err(FsError::new(ErrorKind::NotSeekable, "Stream is not seekable"));
                }
                let mut total = 0;
                for chunk in &input.chunks {
                    total += stdio.write(chunk)? as u64;
                }
                Ok(total)
            }
        }
    }
}

impl<P: Platform> OperationHandler<SeekFd> for HostBackend<P> {
    fn handle(&self, input: SeekFd) -> VfsResult<u64> {
        let resource = self.resource(input.fd)?;
        let FdResource::File(file) = &*resource else {
            return Err(match &*resource {
                FdResource::Directory(_) => directory_fd_error(),
                _ => stdio_fd_error(),
            });
        };
        let is_tell = input.whence == Whence::Cur && input.offset == 0;
        if !(is_tell && file.rights.has(FdRights::FD_TELL)) {
            require_rights(file.rights, FdRights::FD_SEEK)?;
        }
        let target = match input.whence {
            Whence::Set => {
                let offset = u64::try_from(input.offset)
                    .map_err(|_| FsError::invalid_argument("Negative seek offset"))?;
                SeekFrom::Start(offset)
            }
            Whence::Cur => SeekFrom::Current(input.offset),
            Whence::End => SeekFrom::End(input.offset),
        };
        io_result("seek", file.file().seek(target))
    }
}

impl<P: Platform> OperationHandler<Stat> for HostBackend<P> {
    fn handle(&self, input: Stat) -> VfsResult<StructStat> {
        let base = self.directory(input.base)?;
        require_rights(base.rights, FdRights::PATH_FILESTAT_GET)?;
        let node = self.resolve(&base, &input.path, input.follow_symlinks)?;
        node.stat::<P>()
    }
}

impl<P: Platform> OperationHandler<StatFd> for HostBackend<P> {
    fn handle(&self, input: StatFd) -> VfsResult<StructStat> {
        match &*self.resource(input.fd)? {
            FdResource::File(file) => {
                require_rights(file.rights, FdRights::FD_FILESTAT_GET)?;
                P::stat_file(&file.file)
            }
            FdResource::Directory(dir) => {
                require_rights(dir.rights, FdRights::FD_FILESTAT_GET)?;
                P::stat_dir(&dir.dir)
            }
            FdResource::Stdio(_) => Err(FsError::invalid_argument("Can not stat a stdio stream")),
        }
    }
}

impl<P: Platform> OperationHandler<ReadDirFd> for HostBackend<P> {
    fn handle(&self, input: ReadDirFd) -> VfsResult<DirEntrySequence> {
        let resource = self.resource(input.fd)?;
        let Some(dir) = resource.as_directory() else {
            return Err(FsError::not_directory(format!(
                "File descriptor {} is not a directory",
                input.fd
            )));
        };
        require_rights(dir.rights, FdRights::FD_READDIR)?;
        let current = P::stat_dir(&dir.dir)?;
        let parent_inode = match P::stat_at(&dir.dir, "..", false) {
            Ok(stat) => stat.inode,
            Err(err) => {
                tracing::trace!(error = %err, "parent directory is not accessible");
                0
            }
        };
        let entries = P::read_dir(&dir.dir)?;
        Ok(DirEntrySequence::new(
            dir.virtual_path.to_string(),
            DirEntry::new(".", FileType::Directory, current.inode),
            DirEntry::new("..", FileType::Directory, parent_inode),
            entries,
            input.start,
        ))
    }
}

impl<P: Platform> OperationHandler<Mkdir> for HostBackend<P> {
    fn handle(&self, input: Mkdir) -> VfsResult<()> {
        let base = self.directory(input.base)?;
        require_rights(base.rights, FdRights::PATH_CREATE_DIRECTORY)?;
        let node = self.resolve(&base, &input.path, false)?;
        let (parent, name) = node.parent_and_name();
        let mode = input.mode.unwrap_or(file_mode::DEFAULT_DIRECTORY_MODE);
        match P::mkdir_at(parent, name, mode) {
            Err(err) if err.kind() == ErrorKind::Exists && !input.fail_if_exists => {
                match node.stat::<P>() {
                    Ok(stat) if stat.file_type == FileType::Directory => Ok(()),
                    _ => Err(err),
                }
            }
            other => other,
        }
    }
}

impl<P: Platform> OperationHandler<UnlinkFile> for HostBackend<P> {
    fn handle(&self, input: UnlinkFile) -> VfsResult<()> {
        let base = self.directory(input.base)?;
        require_rights(base.rights, FdRights::PATH_UNLINK_FILE)?;
        let node = self.resolve(&base, &input.path, false)?;
        if node.stat::<P>()?.file_type == FileType::Directory {
            return Err(FsError::is_directory(format!("`{}` is a directory", input.path)));
        }
        let (parent, name) = node.parent_and_name();
        P::unlink_at(parent, name)
    }
}

impl<P: Platform> OperationHandler<UnlinkDirectory> for HostBackend<P> {
    fn handle(&self, input: UnlinkDirectory) -> VfsResult<()> {
        let base = self.directory(input.base)?;
        require_rights(base.rights, FdRights::PATH_REMOVE_DIRECTORY)?;
        let node = self.resolve(&base, &input.path, false)?;
        let (parent, name) = node.parent_and_name();
        P::rmdir_at(parent, name)
    }
}

impl<P: Platform> OperationHandler<Rename> for HostBackend<P> {
    fn handle(&self, input: Rename) -> VfsResult<()> {
        let old_base = self.directory(input.old_base)?;
        require_rights(old_base.rights, FdRights::PATH_RENAME_SOURCE)?;
        let new_base = self.directory(input.new_base)?;
        require_rights(new_base.rights, FdRights::PATH_RENAME_TARGET)?;
        let old = self.resolve(&old_base, &input.old_path, false)?;
        let new = self.resolve(&new_base, &input.new_path, false)?;
        let (old_dir, old_name) = old.parent_and_name();
        let (new_dir, new_name) = new.parent_and_name();
        P::rename_at(old_dir, old_name, new_dir, new_name)
    }
}

impl<P: Platform> OperationHandler<Hardlink> for HostBackend<P> {
    fn handle(&self, input: Hardlink) -> VfsResult<()> {
        let old_base = self.directory(input.old_base)?;
        require_rights(old_base.rights, FdRights::PATH_LINK_SOURCE)?;
        let new_base = self.directory(input.new_base)?;
        require_rights(new_base.rights, FdRights::PATH_LINK_TARGET)?;
        let old = self.resolve(&old_base, &input.old_path, input.follow_symlinks)?;
        let new = self.resolve(&new_base, &input.new_path, false)?;
        let (old_dir, old_name) = old.parent_and_name();
        let (new_dir, new_name) = new.parent_and_name();
        // the resolver already expanded a followed symlink
        P::link_at(old_dir, old_name, new_dir, new_name, false)
    }
}

impl<P: Platform> OperationHandler<Symlink> for HostBackend<P> {
    fn handle(&self, input: Symlink) -> VfsResult<()> {
        let base = self.directory(input.new_base)?;
        require_rights(base.rights, FdRights::PATH_SYMLINK)?;
        if input.old_path.is_empty() {
            return Err(FsError::no_entry("Symlink target is empty"));
        }
        if input.old_path.contains('\0') {
            return Err(FsError::invalid_argument("Symlink target contains NUL"));
        }
        if input.old_path.starts_with('/') && !input.allow_absolute_old_path {
            return Err(FsError::not_capable("Absolute symlink targets are not allowed"));
        }
        let node = self.resolve(&base, &input.new_path, false)?;
        let (parent, name) = node.parent_and_name();
        P::symlink_at(&input.old_path, parent, name)
    }
}

impl<P: Platform> OperationHandler<ReadLink> for HostBackend<P> {
    fn handle(&self, input: ReadLink) -> VfsResult<String> {
        let base = self.directory(input.base)?;
        require_rights(base.rights, FdRights::PATH_READLINK)?;
        let node = self.resolve(&base, &input.path, false)?;
        let (parent, name) = node.parent_and_name();
        P::readlink_at(parent, name)
    }
}

impl<P: Platform> OperationHandler<SetTimestamp> for HostBackend<P> {
    fn handle(&self, input: SetTimestamp) -> VfsResult<()> {
        let base = self.directory(input.base)?;
        require_rights(base.rights, FdRights::PATH_FILESTAT_SET_TIMES)?;
        let node = self.resolve(&base, &input.path, input.follow_symlinks)?;
        let (parent, name) = node.parent_and_name();
        P::set_times_at(parent, name, false, input.atime, input.mtime)
    }
}

impl<P: Platform> OperationHandler<SetTimestampFd> for HostBackend<P> {
    fn handle(&self, input: SetTimestampFd) -> VfsResult<()> {
        match &*self.resource(input.fd)? {
            FdResource::File(file) => {
                require_rights(file.rights, FdRights::FD_FILESTAT_SET_TIMES)?;
                P::set_file_times(&file.file, input.atime, input.mtime)
            }
            FdResource::Directory(dir) => {
                require_rights(dir.rights, FdRights::FD_FILESTAT_SET_TIMES)?;
                P::set_times_at(&dir.dir, ".", false, input.atime, input.mtime)
            }
            FdResource::Stdio(_) => Err(stdio_fd_error()),
        }
    }
}

impl<P: Platform> OperationHandler<CheckAccess> for HostBackend<P> {
    fn handle(&self, input: CheckAccess) -> VfsResult<()> {
        let base = self.directory(input.base)?;
        let node = match &input.path {
            Some(path) => self.resolve(&base, path, input.follow_symlinks)?,
            None if input.allow_empty_path => Node::Directory(Arc::clone(&base.dir)),
            None => return Err(FsError::no_entry("Empty path")),
        };
        let (parent, name) = node.parent_and_name();
        P::access_at(parent, name, input.mode, input.use_effective_ids, false)
    }
}

impl<P: Platform> OperationHandler<FallocateFd> for HostBackend<P> {
    fn handle(&self, input: FallocateFd) -> VfsResult<()> {
        match &*self.resource(input.fd)? {
            FdResource::File(file) => {
                require_rights(file.rights, FdRights::FD_ALLOCATE)?;
                P::allocate(&file.file, input.offset, input.length)
            }
            FdResource::Directory(_) => Err(FsError::is_directory("Can not allocate a directory")),
            FdResource::Stdio(_) => Err(stdio_fd_error()),
        }
    }
}

impl<P: Platform> OperationHandler<TruncateFd> for HostBackend<P> {
    fn handle(&self, input: TruncateFd) -> VfsResult<()> {
        match &*self.resource(input.fd)? {
            FdResource::File(file) => {
                require_rights(file.rights, FdRights::FD_FILESTAT_SET_SIZE)?;
                io_result("set_len", file.file().set_len(input.length))
            }
            FdResource::Directory(_) => Err(directory_fd_error()),
            FdResource::Stdio(_) => Err(stdio_fd_error()),
        }
    }
}

impl<P: Platform> OperationHandler<SyncFd> for HostBackend<P> {
    fn handle(&self, input: SyncFd) -> VfsResult<()> {
        match &*self.resource(input.fd)? {
            FdResource::File(file) if input.data_only => {
                require_rights(file.rights, FdRights::FD_DATASYNC)?;
                io_result("sync_data", file.file().sync_data())
            }
            FdResource::File(file) => {
                require_rights(file.rights, FdRights::FD_SYNC)?;
                io_result("sync_all", file.file().sync_all())
            }
            FdResource::Directory(_) => Err(directory_fd_error()),
            FdResource::Stdio(stdio) => stdio.flush(),
        }
    }
}

impl<P: Platform> OperationHandler<FadviseFd> for HostBackend<P> {
    fn handle(&self, input: FadviseFd) -> VfsResult<()> {
        match &*self.resource(input.fd)? {
            FdResource::File(file) => {
                require_rights(file.rights, FdRights::FD_ADVISE)?;
                P::advise(&file.file, input.offset, input.length, input.advice)
            }
            FdResource::Directory(_) => Err(directory_fd_error()),
            FdResource::Stdio(_) => {
                Err(FsError::new(ErrorKind::NotSeekable, "Stream is not seekable"))
            }
        }
    }
}

impl<P: Platform> OperationHandler<Poll> for HostBackend<P> {
    fn handle(&self, input: Poll) -> VfsResult<Vec<Event>> {
        let clock = StdMonotonicClock::new();
        #[cfg(unix)]
        let mut waiter = crate::waiter::NativePollWaiter::default();
        #[cfg(not(unix))]
        let mut waiter = vfs_core::poll::SleepWaiter;
        PollHelper::new(&clock, &mut waiter, self.vfs.poll_period)
            .poll(&input.subscriptions, |fd| self.table.get(fd))
    }
}

impl<P: Platform> HostBackend<P> {
    fn advisory_lock(
        &self,
        fd: Fd,
        lock: vfs_core::flags::AdvisoryLock,
        add: bool,
    ) -> VfsResult<()> {
        match &*self.resource(fd)? {
            FdResource::File(file) => P::lock(&file.file, lock, add),
            FdResource::Directory(_) => Err(directory_fd_error()),
            FdResource::Stdio(_) => Err(FsError::not_supported("Streams can not be locked")),
        }
    }
}

impl<P: Platform> OperationHandler<AddAdvisoryLockFd> for HostBackend<P> {
    fn handle(&self, input: AddAdvisoryLockFd) -> VfsResult<()> {
        self.advisory_lock(input.fd, input.lock, true)
    }
}

impl<P: Platform> OperationHandler<RemoveAdvisoryLockFd> for HostBackend<P> {
    fn handle(&self, input: RemoveAdvisoryLockFd) -> VfsResult<()> {
        self.advisory_lock(input.fd, input.lock, false)
    }
}

impl<P: Platform> OperationHandler<GetFdAttributes> for HostBackend<P> {
    fn handle(&self, input: GetFdAttributes) -> VfsResult<FdAttributes> {
        Ok(match &*self.resource(input.fd)? {
            FdResource::File(file) => FdAttributes {
                file_type: P::stat_file(&file.file)?.file_type,
                flags: file.flags(),
                rights: file.rights,
            },
            FdResource::Directory(dir) => FdAttributes {
                file_type: FileType::Directory,
                flags: FdFlags::empty(),
                rights: dir.rights,
            },
            FdResource::Stdio(_) => FdAttributes {
                file_type: FileType::CharacterDevice,
                flags: FdFlags::APPEND,
                rights: vfs_core::FdRightsBlock::STDIO,
            },
        })
    }
}

impl<P: Platform> OperationHandler<SetFdFlags> for HostBackend<P> {
    fn handle(&self, input: SetFdFlags) -> VfsResult<()> {
        match &*self.resource(input.fd)? {
            FdResource::File(file) => {
                require_rights(file.rights, FdRights::FD_FDSTAT_SET_FLAGS)?;
                let mut flags = file.flags.lock();
                P::set_fd_flags(&file.file, input.flags)?;
                *flags = input.flags;
                Ok(())
            }
            FdResource::Directory(_) => Err(directory_fd_error()),
            FdResource::Stdio(_) => Err(stdio_fd_error()),
        }
    }
}

impl<P: Platform> OperationHandler<PrestatFd> for HostBackend<P> {
    fn handle(&self, input: PrestatFd) -> VfsResult<VirtualPath> {
        match self.resource(input.fd)?.as_directory() {
            Some(dir) if dir.preopened => Ok(dir.virtual_path.clone()),
            _ => Err(FsError::bad_fd(format!(
                "File descriptor {} is not a preopened directory",
                input.fd
            ))),
        }
    }
}

impl<P: Platform> OperationHandler<Fdrenumber> for HostBackend<P> {
    fn handle(&self, input: Fdrenumber) -> VfsResult<()> {
        if let Some(replaced) = self.table.renumber(input.from, input.to)? {
            if let Err(err) = replaced.close() {
                tracing::debug!(
                    fd = %input.to,
                    error = %err,
                    "failed to close renumbered descriptor"
                );
            }
        }
        Ok(())
    }
}

impl<P: Platform> OperationHandler<Chmod> for HostBackend<P> {
    fn handle(&self, input: Chmod) -> VfsResult<()> {
        let base = self.directory(input.base)?;
        let node = self.resolve(&base, &input.path, input.follow_symlinks)?;
        let (parent, name) = node.parent_and_name();
        P::chmod_at(parent, name, input.mode & file_mode::PERMISSIONS_MASK, false)
    }
}

impl<P: Platform> OperationHandler<ChmodFd> for HostBackend<P> {
    fn handle(&self, input: ChmodFd) -> VfsResult<()> {
        let mode = input.mode & file_mode::PERMISSIONS_MASK;
        match &*self.resource(input.fd)? {
            FdResource::File(file) => P::chmod_file(&file.file, mode),
            FdResource::Directory(dir) => P::chmod_at(&dir.dir, ".", mode, false),
            FdResource::Stdio(_) => Err(FsError::not_supported("Can not change mode of a stream")),
        }
    }
}

impl<P: Platform> OperationHandler<Chown> for HostBackend<P> {
    fn handle(&self, input: Chown) -> VfsResult<()> {
        let base = self.directory(input.base)?;
        let node = self.resolve(&base, &input.path, input.follow_symlinks)?;
        let (parent, name) = node.parent_and_name();
        P::chown_at(parent, name, input.owner, input.group, false)
    }
}

impl<P: Platform> OperationHandler<ChownFd> for HostBackend<P> {
    fn handle(&self, input: ChownFd) -> VfsResult<()> {
        match &*self.resource(input.fd)? {
            FdResource::File(file) => P::chown_file(&file.file, input.owner, input.group),
            FdResource::Directory(dir) => {
                P::chown_at(&dir.dir, ".", input.owner, input.group, false)
            }
            FdResource::Stdio(_) => Err(FsError::not_supported("Can not change owner of a stream")),
        }
    }
}

impl<P: Platform> OperationHandler<GetCurrentWorkingDirectory> for HostBackend<P> {
    fn handle(&self, _input: GetCurrentWorkingDirectory) -> VfsResult<VirtualPath> {
        self.current_directory()
    }
}
