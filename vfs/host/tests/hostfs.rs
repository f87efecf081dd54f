use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use vfs_core::dirent::DirSequenceStartPosition;
use vfs_core::flags::{
    Advice, AdvisoryLock, AdvisoryLockType, FdFlags, FileAccessibilityCheck, OpenFlags,
    ReadWriteStrategy, TimestampUpdate, Whence,
};
use vfs_core::ops::*;
use vfs_core::poll::{ClockId, ClockSubscription, EventType, Subscription};
use vfs_core::{
    BaseDirectory, ErrorKind, Fd, FileSystemErrno, FileType, FsError, RealPath, StructTimespec,
    VirtualPath,
};
use vfs_host::platform::portable::PortablePlatform;
use vfs_host::{
    ConfigError, CwdConfig, FileSystemConfig, HostFileSystem, NativePlatform, Platform,
    StandardInputOutput, create_with_platform,
};

const ROOT: Fd = Fd::FIRST_PREOPEN;

fn path(path: &str) -> VirtualPath {
    VirtualPath::new(path).unwrap()
}

fn cwd_of(dir: &Path) -> CwdConfig {
    CwdConfig::Path(RealPath::from_path(dir).unwrap())
}

fn sandbox<P: Platform>(dir: &Path) -> HostFileSystem<P> {
    let config = FileSystemConfig::builder()
        .stdio(StandardInputOutput::null())
        .current_working_directory(cwd_of(dir))
        .preopen_dir(dir, "/sandbox")
        .build()
        .unwrap();
    create_with_platform::<P>(config).unwrap()
}

fn open<P: Platform>(
    vfs: &HostFileSystem<P>,
    name: &str,
    flags: OpenFlags,
) -> Result<Fd, FsError> {
    vfs.execute(Open {
        base: BaseDirectory::DirectoryFd(ROOT),
        path: path(name),
        flags,
        fd_flags: FdFlags::empty(),
        mode: None,
        rights: None,
    })
}

fn stat<P: Platform>(
    vfs: &HostFileSystem<P>,
    name: &str,
) -> Result<vfs_core::StructStat, FsError> {
    vfs.execute(Stat {
        base: BaseDirectory::DirectoryFd(ROOT),
        path: path(name),
        follow_symlinks: true,
    })
}

fn write_all<P: Platform>(vfs: &HostFileSystem<P>, fd: Fd, data: &[u8]) -> u64 {
    vfs.execute(WriteFd {
        fd,
        chunks: vec![data.to_vec()],
        strategy: ReadWriteStrategy::CurrentPosition,
    })
    .unwrap()
}

fn read_at<P: Platform>(vfs: &HostFileSystem<P>, fd: Fd, offset: u64, length: usize) -> Vec<u8> {
    vfs.execute(ReadFd {
        fd,
        length,
        strategy: ReadWriteStrategy::Position(offset),
    })
    .unwrap()
}

fn list<P: Platform>(vfs: &HostFileSystem<P>, fd: Fd) -> Vec<(String, FileType)> {
    let mut entries: Vec<_> = vfs
        .execute(ReadDirFd {
            fd,
            start: DirSequenceStartPosition::Start,
        })
        .unwrap()
        .into_iter()
        .map(|entry| {
            let entry = entry.unwrap();
            (entry.name, entry.file_type)
        })
        .collect();
    entries.sort();
    entries
}

#[test_log::test]
fn preopens_and_current_directory_are_bootstrapped() {
    let dir = TempDir::new().unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());

    assert_eq!(vfs.execute(PrestatFd { fd: ROOT }).unwrap(), path("/sandbox"));
    assert_eq!(
        vfs.execute(GetCurrentWorkingDirectory).unwrap(),
        VirtualPath::current_directory()
    );
    // the current directory occupies the slot after the preopens
    let cwd_fd = Fd(ROOT.get() + 1);
    assert!(vfs.backend().descriptors().contains(cwd_fd));
    let err = vfs.execute(PrestatFd { fd: cwd_fd }).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadFileDescriptor);
    let err = vfs.execute(PrestatFd { fd: Fd::STDOUT }).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadFileDescriptor);
}

#[test_log::test]
fn inactive_current_directory() {
    let dir = TempDir::new().unwrap();
    let config = FileSystemConfig::builder()
        .stdio(StandardInputOutput::null())
        .current_working_directory(CwdConfig::Inactive)
        .preopen_dir(dir.path(), "/sandbox")
        .build()
        .unwrap();
    let vfs = create_with_platform::<NativePlatform>(config).unwrap();

    let err = vfs.execute(GetCurrentWorkingDirectory).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
    let err = vfs
        .execute(Stat {
            base: BaseDirectory::CurrentWorkingDirectory,
            path: path("file"),
            follow_symlinks: false,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadFileDescriptor);
}

#[test_log::test]
fn write_then_stat_and_read_back() {
    let dir = TempDir::new().unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());

    let fd = open(&vfs, "hello.txt", OpenFlags::O_CREAT | OpenFlags::O_RDWR).unwrap();
    assert_eq!(write_all(&vfs, fd, b"hello, "), 7);
    let written = vfs
        .execute(WriteFd {
            fd,
            chunks: vec![b"wor".to_vec(), b"ld".to_vec()],
            strategy: ReadWriteStrategy::CurrentPosition,
        })
        .unwrap();
    assert_eq!(written, 5);

    let stat = stat(&vfs, "hello.txt").unwrap();
    assert_eq!(stat.file_type, FileType::RegularFile);
    assert_eq!(stat.size, 12);
    assert_eq!(vfs.execute(StatFd { fd }).unwrap().inode, stat.inode);

    assert_eq!(read_at(&vfs, fd, 7, 64), b"world");
    let position = vfs
        .execute(SeekFd {
            fd,
            offset: 0,
            whence: Whence::Cur,
        })
        .unwrap();
    assert_eq!(position, 12);
    assert_eq!(fs::read(dir.path().join("hello.txt")).unwrap(), b"hello, world");
}

#[test_log::test]
fn creating_an_existing_file_exclusively_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("taken"), b"").unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());

    let err = open(&vfs, "taken", OpenFlags::O_CREAT | OpenFlags::O_EXCL | OpenFlags::O_WRONLY)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Exists);
    let err = open(&vfs, "missing", OpenFlags::O_RDONLY).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoEntry);
    let err = open(&vfs, "taken/", OpenFlags::O_RDONLY).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotDirectory);
}

#[test_log::test]
fn paths_cannot_leave_the_preopen() {
    let outer = TempDir::new().unwrap();
    let inner = outer.path().join("inner");
    fs::create_dir_all(inner.join("sub")).unwrap();
    fs::write(outer.path().join("secret"), b"secret").unwrap();
    #[cfg(unix)]
    std::os::unix::fs::symlink(outer.path().join("secret"), inner.join("absolute")).unwrap();
    #[cfg(unix)]
    std::os::unix::fs::symlink("../secret", inner.join("relative")).unwrap();
    let vfs = sandbox::<NativePlatform>(&inner);

    let mut escapes = vec!["../secret", "/etc/passwd", "sub/../../secret"];
    if cfg!(unix) {
        escapes.extend(["absolute", "relative"]);
    }
    for escape in escapes {
        let err = open(&vfs, escape, OpenFlags::O_RDONLY).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotCapable, "{escape}");
    }
}

#[cfg(unix)]
#[test_log::test]
fn symlinks_inside_the_preopen_are_followed() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub/target"), b"data").unwrap();
    std::os::unix::fs::symlink("sub/target", dir.path().join("link")).unwrap();
    std::os::unix::fs::symlink("../sub", dir.path().join("sub/up")).unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());

    let fd = open(&vfs, "link", OpenFlags::O_RDONLY).unwrap();
    assert_eq!(read_at(&vfs, fd, 0, 16), b"data");
    assert_eq!(stat(&vfs, "sub/up/target").unwrap().size, 4);
    assert_eq!(
        vfs.execute(ReadLink {
            base: BaseDirectory::DirectoryFd(ROOT),
            path: path("link"),
        })
        .unwrap(),
        "sub/target"
    );

    let err = open(&vfs, "link", OpenFlags::O_RDONLY | OpenFlags::O_NOFOLLOW).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TooManySymbolicLinks);
}

#[cfg(unix)]
#[test_log::test]
fn symlink_loops_are_detected() {
    let dir = TempDir::new().unwrap();
    std::os::unix::fs::symlink("b", dir.path().join("a")).unwrap();
    std::os::unix::fs::symlink("a", dir.path().join("b")).unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());

    let err = stat(&vfs, "a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TooManySymbolicLinks);
}

#[test_log::test]
fn readdir_lists_every_entry() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("file"), b"").unwrap();
    fs::create_dir(dir.path().join("dir")).unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());

    assert_eq!(
        list(&vfs, ROOT),
        vec![
            (".".to_string(), FileType::Directory),
            ("..".to_string(), FileType::Directory),
            ("dir".to_string(), FileType::Directory),
            ("file".to_string(), FileType::RegularFile),
        ]
    );

    let file = open(&vfs, "file", OpenFlags::O_RDONLY).unwrap();
    let err = vfs
        .execute(ReadDirFd {
            fd: file,
            start: DirSequenceStartPosition::Start,
        })
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::NotDirectory);
}

#[test_log::test]
fn readdir_resumes_after_a_cookie() {
    let dir = TempDir::new().unwrap();
    for name in ["a", "b", "c"] {
        fs::write(dir.path().join(name), b"").unwrap();
    }
    let vfs = sandbox::<NativePlatform>(dir.path());

    let all: Vec<_> = vfs
        .execute(ReadDirFd {
            fd: ROOT,
            start: DirSequenceStartPosition::Start,
        })
        .unwrap()
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(all.len(), 5);
    let rest: Vec<_> = vfs
        .execute(ReadDirFd {
            fd: ROOT,
            start: DirSequenceStartPosition::Cookie(all[2].cookie),
        })
        .unwrap()
        .into_iter()
        .map(|entry| entry.unwrap().name)
        .collect();
    assert_eq!(rest, vec![all[3].name.clone(), all[4].name.clone()]);
}

#[test_log::test]
fn opened_directories_are_usable_as_base() {
    let dir = TempDir::new().unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());

    vfs.execute(Mkdir {
        base: BaseDirectory::DirectoryFd(ROOT),
        path: path("nested"),
        mode: None,
        fail_if_exists: true,
    })
    .unwrap();
    let err = vfs
        .execute(Mkdir {
            base: BaseDirectory::DirectoryFd(ROOT),
            path: path("nested"),
            mode: None,
            fail_if_exists: true,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Exists);
    vfs.execute(Mkdir {
        base: BaseDirectory::DirectoryFd(ROOT),
        path: path("nested"),
        mode: None,
        fail_if_exists: false,
    })
    .unwrap();

    let nested = open(&vfs, "nested", OpenFlags::O_RDONLY | OpenFlags::O_DIRECTORY).unwrap();
    let attributes = vfs.execute(GetFdAttributes { fd: nested }).unwrap();
    assert_eq!(attributes.file_type, FileType::Directory);
    let file = vfs
        .execute(Open {
            base: BaseDirectory::DirectoryFd(nested),
            path: path("inside"),
            flags: OpenFlags::O_CREAT | OpenFlags::O_WRONLY,
            fd_flags: FdFlags::empty(),
            mode: None,
            rights: None,
        })
        .unwrap();
    write_all(&vfs, file, b"x");
    assert!(dir.path().join("nested/inside").is_file());

    let err = open(&vfs, "nested", OpenFlags::O_WRONLY).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IsDirectory);
}

#[test_log::test]
fn rename_link_and_unlink() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("original"), b"content").unwrap();
    fs::create_dir(dir.path().join("dir")).unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());
    let root = BaseDirectory::DirectoryFd(ROOT);

    vfs.execute(Rename {
        old_base: root,
        old_path: path("original"),
        new_base: root,
        new_path: path("dir/renamed"),
    })
    .unwrap();
    assert!(!dir.path().join("original").exists());
    assert_eq!(fs::read(dir.path().join("dir/renamed")).unwrap(), b"content");

    vfs.execute(Hardlink {
        old_base: root,
        old_path: path("dir/renamed"),
        new_base: root,
        new_path: path("linked"),
        follow_symlinks: false,
    })
    .unwrap();
    assert_eq!(stat(&vfs, "linked").unwrap().links, 2);

    let err = vfs
        .execute(UnlinkFile {
            base: root,
            path: path("dir"),
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IsDirectory);
    vfs.execute(UnlinkFile {
        base: root,
        path: path("dir/renamed"),
    })
    .unwrap();
    vfs.execute(UnlinkDirectory {
        base: root,
        path: path("dir"),
    })
    .unwrap();
    assert!(!dir.path().join("dir").exists());
    assert_eq!(stat(&vfs, "linked").unwrap().links, 1);
}

#[test_log::test]
fn symlink_targets_are_checked() {
    let dir = TempDir::new().unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());
    let symlink = |target: &str, allow_absolute_old_path| {
        vfs.execute(Symlink {
            old_path: target.to_string(),
            new_base: BaseDirectory::DirectoryFd(ROOT),
            new_path: path("link"),
            allow_absolute_old_path,
        })
    };

    assert_eq!(symlink("", false).unwrap_err().kind(), ErrorKind::NoEntry);
    assert_eq!(symlink("/etc", false).unwrap_err().kind(), ErrorKind::NotCapable);
}

#[test_log::test]
fn descriptors_are_unique_and_invalid_after_close() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("file"), b"").unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());

    let first = open(&vfs, "file", OpenFlags::O_RDONLY).unwrap();
    let second = open(&vfs, "file", OpenFlags::O_RDONLY).unwrap();
    assert_ne!(first, second);
    assert!(first > ROOT && second > ROOT);

    vfs.execute(CloseFd { fd: first }).unwrap();
    let err = vfs.execute(StatFd { fd: first }).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadFileDescriptor);
    let err = vfs.execute(CloseFd { fd: first }).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadFileDescriptor);
    // the lowest free slot is reused
    assert_eq!(open(&vfs, "file", OpenFlags::O_RDONLY).unwrap(), first);
}

#[test_log::test]
fn close_releases_files_and_directories() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());

    let file = open(&vfs, "file", OpenFlags::O_CREAT | OpenFlags::O_RDWR).unwrap();
    write_all(&vfs, file, b"flushed on close");
    let sub = open(&vfs, "sub", OpenFlags::O_DIRECTORY | OpenFlags::O_RDONLY).unwrap();
    assert_eq!(
        vfs.execute(GetFdAttributes { fd: sub }).unwrap().file_type,
        FileType::Directory
    );

    vfs.execute(CloseFd { fd: file }).unwrap();
    vfs.execute(CloseFd { fd: sub }).unwrap();
    let descriptors = vfs.backend().descriptors();
    assert!(!descriptors.contains(file));
    assert!(!descriptors.contains(sub));
    assert!(descriptors.contains(ROOT));
    assert_eq!(fs::read(dir.path().join("file")).unwrap(), b"flushed on close");
    // the preopen is still usable after a descriptor opened through it is gone
    assert_eq!(stat(&vfs, "sub").unwrap().file_type, FileType::Directory);
}

#[test_log::test]
fn renumber_replaces_the_target() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a"), b"aaa").unwrap();
    fs::write(dir.path().join("b"), b"b").unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());

    let a = open(&vfs, "a", OpenFlags::O_RDONLY).unwrap();
    let b = open(&vfs, "b", OpenFlags::O_RDONLY).unwrap();
    vfs.execute(Fdrenumber { from: a, to: b }).unwrap();

    assert_eq!(vfs.execute(StatFd { fd: a }).unwrap_err().kind(), ErrorKind::BadFileDescriptor);
    assert_eq!(vfs.execute(StatFd { fd: b }).unwrap().size, 3);
    vfs.execute(Fdrenumber { from: b, to: b }).unwrap();
    assert_eq!(vfs.execute(StatFd { fd: b }).unwrap().size, 3);
}

#[test_log::test]
fn stdio_descriptors() {
    let dir = TempDir::new().unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());

    let attributes = vfs.execute(GetFdAttributes { fd: Fd::STDOUT }).unwrap();
    assert_eq!(attributes.file_type, FileType::CharacterDevice);
    assert_eq!(attributes.flags, FdFlags::APPEND);
    assert_eq!(write_all(&vfs, Fd::STDOUT, b"discarded"), 9);
    let read = vfs
        .execute(ReadFd {
            fd: Fd::STDIN,
            length: 16,
            strategy: ReadWriteStrategy::CurrentPosition,
        })
        .unwrap();
    assert!(read.is_empty());
    let err = vfs
        .execute(SeekFd {
            fd: Fd::STDIN,
            offset: 0,
            whence: Whence::Set,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadFileDescriptor);

    vfs.execute(CloseFd { fd: Fd::STDERR }).unwrap();
    let err = vfs.execute(GetFdAttributes { fd: Fd::STDERR }).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadFileDescriptor);
}

#[test_log::test]
fn timestamps_round_trip_through_stat() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("file"), b"").unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());
    const SECOND: u64 = 1_000_000_000;

    vfs.execute(SetTimestamp {
        base: BaseDirectory::DirectoryFd(ROOT),
        path: path("file"),
        follow_symlinks: true,
        atime: TimestampUpdate::Omit,
        mtime: TimestampUpdate::Set(1_000_000_000 * SECOND),
    })
    .unwrap();
    let stat = stat(&vfs, "file").unwrap();
    assert_eq!(stat.modification_time, StructTimespec::new(1_000_000_000, 0));

    let fd = open(&vfs, "file", OpenFlags::O_RDWR).unwrap();
    vfs.execute(SetTimestampFd {
        fd,
        atime: TimestampUpdate::Set(1_500_000_000 * SECOND + 250),
        mtime: TimestampUpdate::Omit,
    })
    .unwrap();
    let stat = vfs.execute(StatFd { fd }).unwrap();
    assert_eq!(stat.access_time, StructTimespec::new(1_500_000_000, 250));
    assert_eq!(stat.modification_time, StructTimespec::new(1_000_000_000, 0));

    let err = vfs
        .execute(SetTimestampFd {
            fd: Fd::STDOUT,
            atime: TimestampUpdate::Now,
            mtime: TimestampUpdate::Now,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadFileDescriptor);
}

#[test_log::test]
fn check_access_of_paths_and_the_base_itself() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("file"), b"").unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());
    let check = |path: Option<&str>, allow_empty_path: bool| {
        vfs.execute(CheckAccess {
            base: BaseDirectory::DirectoryFd(ROOT),
            path: path.map(self::path),
            mode: FileAccessibilityCheck::READABLE,
            use_effective_ids: true,
            allow_empty_path,
            follow_symlinks: true,
        })
    };

    check(Some("file"), false).unwrap();
    check(None, true).unwrap();
    assert_eq!(check(None, false).unwrap_err().kind(), ErrorKind::NoEntry);
    assert_eq!(check(Some("missing"), false).unwrap_err().kind(), ErrorKind::NoEntry);
    assert_eq!(check(Some("../file"), false).unwrap_err().kind(), ErrorKind::NotCapable);
}

#[test_log::test]
fn fallocate_grows_files_only() {
    let dir = TempDir::new().unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());

    let fd = open(&vfs, "file", OpenFlags::O_CREAT | OpenFlags::O_RDWR).unwrap();
    write_all(&vfs, fd, b"0123456789");
    vfs.execute(FallocateFd {
        fd,
        offset: 50,
        length: 50,
    })
    .unwrap();
    assert_eq!(vfs.execute(StatFd { fd }).unwrap().size, 100);
    // an allocation inside the file leaves the size alone
    vfs.execute(FallocateFd {
        fd,
        offset: 0,
        length: 10,
    })
    .unwrap();
    assert_eq!(vfs.execute(StatFd { fd }).unwrap().size, 100);
    assert_eq!(read_at(&vfs, fd, 0, 10), b"0123456789");

    let err = vfs
        .execute(FallocateFd {
            fd: ROOT,
            offset: 0,
            length: 1,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IsDirectory);
}

#[test_log::test]
fn sync_and_advise() {
    let dir = TempDir::new().unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());

    let fd = open(&vfs, "file", OpenFlags::O_CREAT | OpenFlags::O_RDWR).unwrap();
    write_all(&vfs, fd, b"data");
    vfs.execute(SyncFd { fd, data_only: true }).unwrap();
    vfs.execute(SyncFd { fd, data_only: false }).unwrap();
    vfs.execute(SyncFd {
        fd: Fd::STDOUT,
        data_only: false,
    })
    .unwrap();
    let err = vfs.execute(SyncFd { fd: ROOT, data_only: false }).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadFileDescriptor);

    let advise = |fd: Fd, advice: Advice| {
        vfs.execute(FadviseFd {
            fd,
            offset: 0,
            length: 4,
            advice,
        })
    };
    advise(fd, Advice::Sequential).unwrap();
    advise(fd, Advice::DontNeed).unwrap();
    assert_eq!(advise(Fd::STDIN, Advice::Normal).unwrap_err().kind(), ErrorKind::NotSeekable);
}

#[cfg(unix)]
#[test_log::test]
fn advisory_locks_on_files() {
    let dir = TempDir::new().unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());
    let lock = AdvisoryLock::whole_file(AdvisoryLockType::Write);

    let fd = open(&vfs, "file", OpenFlags::O_CREAT | OpenFlags::O_RDWR).unwrap();
    vfs.execute(AddAdvisoryLockFd { fd, lock }).unwrap();
    vfs.execute(RemoveAdvisoryLockFd { fd, lock }).unwrap();
    let shared = AdvisoryLock::whole_file(AdvisoryLockType::Read);
    vfs.execute(AddAdvisoryLockFd { fd, lock: shared }).unwrap();
    vfs.execute(RemoveAdvisoryLockFd { fd, lock: shared }).unwrap();

    let err = vfs
        .execute(AddAdvisoryLockFd {
            fd: Fd::STDOUT,
            lock,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
    let err = vfs
        .execute(RemoveAdvisoryLockFd {
            fd: Fd::STDIN,
            lock,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
}

#[test_log::test]
fn fd_flags_can_toggle_append_but_not_sync() {
    let dir = TempDir::new().unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());

    let fd = open(&vfs, "file", OpenFlags::O_CREAT | OpenFlags::O_RDWR).unwrap();
    write_all(&vfs, fd, b"head");
    vfs.execute(SetFdFlags {
        fd,
        flags: FdFlags::APPEND,
    })
    .unwrap();
    let attributes = vfs.execute(GetFdAttributes { fd }).unwrap();
    assert_eq!(attributes.flags, FdFlags::APPEND);
    assert_eq!(attributes.file_type, FileType::RegularFile);

    vfs.execute(SeekFd {
        fd,
        offset: 0,
        whence: Whence::Set,
    })
    .unwrap();
    write_all(&vfs, fd, b"tail");
    assert_eq!(read_at(&vfs, fd, 0, 16), b"headtail");

    let err = vfs
        .execute(SetFdFlags {
            fd,
            flags: FdFlags::APPEND | FdFlags::SYNC,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
    // a rejected change leaves the flags as they were
    assert_eq!(vfs.execute(GetFdAttributes { fd }).unwrap().flags, FdFlags::APPEND);
    let err = vfs
        .execute(SetFdFlags {
            fd: ROOT,
            flags: FdFlags::empty(),
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadFileDescriptor);
}

#[cfg(unix)]
#[test_log::test]
fn chmod_by_path_and_descriptor() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("file"), b"").unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());
    let host_mode = || fs::metadata(dir.path().join("file")).unwrap().permissions().mode() & 0o777;

    vfs.execute(Chmod {
        base: BaseDirectory::DirectoryFd(ROOT),
        path: path("file"),
        mode: 0o600,
        follow_symlinks: true,
    })
    .unwrap();
    assert_eq!(host_mode(), 0o600);
    assert_eq!(stat(&vfs, "file").unwrap().mode, 0o600);

    let fd = open(&vfs, "file", OpenFlags::O_RDONLY).unwrap();
    vfs.execute(ChmodFd { fd, mode: 0o644 }).unwrap();
    assert_eq!(host_mode(), 0o644);
    assert_eq!(vfs.execute(StatFd { fd }).unwrap().mode, 0o644);

    let err = vfs
        .execute(ChmodFd {
            fd: Fd::STDERR,
            mode: 0o644,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
}

#[cfg(unix)]
#[test_log::test]
fn chown_to_the_current_owner() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("file"), b"").unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());
    let before = stat(&vfs, "file").unwrap();
    let owner = u32::try_from(before.uid).unwrap();
    let group = u32::try_from(before.gid).unwrap();

    vfs.execute(Chown {
        base: BaseDirectory::DirectoryFd(ROOT),
        path: path("file"),
        owner: Some(owner),
        group: Some(group),
        follow_symlinks: true,
    })
    .unwrap();
    let fd = open(&vfs, "file", OpenFlags::O_RDONLY).unwrap();
    vfs.execute(ChownFd {
        fd,
        owner: None,
        group: None,
    })
    .unwrap();
    vfs.execute(ChownFd {
        fd: ROOT,
        owner: Some(owner),
        group: None,
    })
    .unwrap();

    let after = vfs.execute(StatFd { fd }).unwrap();
    assert_eq!((after.uid, after.gid), (before.uid, before.gid));
    let err = vfs
        .execute(Chown {
            base: BaseDirectory::DirectoryFd(ROOT),
            path: path("missing"),
            owner: None,
            group: None,
            follow_symlinks: true,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoEntry);
}

#[test_log::test]
fn clock_subscription_times_out() {
    let dir = TempDir::new().unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());

    let started = Instant::now();
    let events = vfs
        .execute(Poll {
            subscriptions: vec![Subscription::clock(
                42,
                ClockSubscription {
                    clock: ClockId::Monotonic,
                    timeout_ns: Duration::from_millis(20).as_nanos() as u64,
                    precision_ns: 0,
                    absolute: false,
                },
            )],
        })
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(20));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].userdata, 42);
    assert_eq!(events[0].event_type, EventType::Clock);
    assert_eq!(events[0].errno, FileSystemErrno::Success);
}

#[test_log::test]
fn regular_files_are_always_ready() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("file"), b"12345").unwrap();
    let vfs = sandbox::<NativePlatform>(dir.path());
    let fd = open(&vfs, "file", OpenFlags::O_RDONLY).unwrap();

    let events = vfs
        .execute(Poll {
            subscriptions: vec![Subscription::fd_read(1, fd), Subscription::fd_read(2, Fd(999))],
        })
        .unwrap();
    let ready = events.iter().find(|event| event.userdata == 1).unwrap();
    assert_eq!(ready.fd_readwrite.bytes_available, 5);
    let bad = events.iter().find(|event| event.userdata == 2).unwrap();
    assert_eq!(bad.errno, FileSystemErrno::Badf);
}

#[test_log::test]
fn read_only_preopens_cannot_create() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("existing"), b"data").unwrap();
    let config = FileSystemConfig::builder()
        .stdio(StandardInputOutput::null())
        .current_working_directory(cwd_of(dir.path()))
        .preopen(|p| p.directory(dir.path()).alias("/ro").read(true))
        .build()
        .unwrap();
    let vfs = create_with_platform::<NativePlatform>(config).unwrap();

    let err = open(&vfs, "new", OpenFlags::O_CREAT | OpenFlags::O_WRONLY).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotCapable);
    let err = vfs
        .execute(Mkdir {
            base: BaseDirectory::DirectoryFd(ROOT),
            path: path("dir"),
            mode: None,
            fail_if_exists: true,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotCapable);

    let fd = open(&vfs, "existing", OpenFlags::O_RDONLY).unwrap();
    assert_eq!(read_at(&vfs, fd, 0, 16), b"data");
    let err = vfs
        .execute(WriteFd {
            fd,
            chunks: vec![b"x".to_vec()],
            strategy: ReadWriteStrategy::CurrentPosition,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotCapable);
}

#[test_log::test]
fn missing_preopen_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let config = FileSystemConfig::builder()
        .stdio(StandardInputOutput::null())
        .preopen_dir(dir.path().join("missing"), "/missing")
        .build()
        .unwrap();
    let err = create_with_platform::<NativePlatform>(config).unwrap_err();
    match err {
        ConfigError::Preopen { source, .. } => assert_eq!(source.kind(), ErrorKind::NoEntry),
        other => panic!("unexpected error: {other}"),
    }
}

#[test_log::test]
fn portable_platform_serves_the_same_operations() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    let vfs = sandbox::<PortablePlatform>(dir.path());

    let fd = open(&vfs, "sub/file", OpenFlags::O_CREAT | OpenFlags::O_RDWR).unwrap();
    assert_eq!(write_all(&vfs, fd, b"portable"), 8);
    assert_eq!(read_at(&vfs, fd, 4, 16), b"able");
    vfs.execute(TruncateFd { fd, length: 4 }).unwrap();
    assert_eq!(stat(&vfs, "sub/file").unwrap().size, 4);
    assert_eq!(
        list(&vfs, ROOT),
        vec![
            (".".to_string(), FileType::Directory),
            ("..".to_string(), FileType::Directory),
            ("sub".to_string(), FileType::Directory),
        ]
    );
    let err = open(&vfs, "../outside", OpenFlags::O_RDONLY).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotCapable);
}

#[test_log::test]
fn portable_descriptors_report_the_inode_of_their_path() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a"), b"a").unwrap();
    fs::write(dir.path().join("b"), b"b").unwrap();
    let vfs = sandbox::<PortablePlatform>(dir.path());

    let a = open(&vfs, "a", OpenFlags::O_RDONLY).unwrap();
    let b = open(&vfs, "b", OpenFlags::O_RDONLY).unwrap();
    let a_inode = vfs.execute(StatFd { fd: a }).unwrap().inode;
    let b_inode = vfs.execute(StatFd { fd: b }).unwrap().inode;

    assert_eq!(a_inode, stat(&vfs, "a").unwrap().inode);
    assert_eq!(b_inode, stat(&vfs, "b").unwrap().inode);
    assert_ne!(a_inode, b_inode);
    vfs.execute(CloseFd { fd: a }).unwrap();
    vfs.execute(CloseFd { fd: b }).unwrap();
}
