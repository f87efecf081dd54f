//! File descriptor rights.
//!
//! The bit values mirror the WASI Preview 1 `rights` type.

use bitflags::bitflags;

bitflags! {
    /// Actions that may be performed on a descriptor.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct FdRights: u64 {
        /// `fd_datasync`; with `PATH_OPEN`, `path_open` with `fdflags::dsync`.
        const FD_DATASYNC = 0x01;
        /// `fd_read`; with `FD_SEEK`, also `fd_pread`.
        const FD_READ = 0x02;
        /// `fd_seek`. Implies `FD_TELL`.
        const FD_SEEK = 0x04;
        const FD_FDSTAT_SET_FLAGS = 0x08;
        /// `fd_sync`; with `PATH_OPEN`, `path_open` with `rsync`/`dsync`.
        const FD_SYNC = 0x10;
        /// `fd_seek` that leaves the offset unchanged, or `fd_tell`.
        const FD_TELL = 0x20;
        /// `fd_write`; with `FD_SEEK`, also `fd_pwrite`.
        const FD_WRITE = 0x40;
        const FD_ADVISE = 0x80;
        const FD_ALLOCATE = 0x100;
        const PATH_CREATE_DIRECTORY = 0x200;
        /// With `PATH_OPEN`, `path_open` with `oflags::creat`.
        const PATH_CREATE_FILE = 0x400;
        const PATH_LINK_SOURCE = 0x800;
        const PATH_LINK_TARGET = 0x1000;
        const PATH_OPEN = 0x2000;
        const FD_READDIR = 0x4000;
        const PATH_READLINK = 0x8000;
        const PATH_RENAME_SOURCE = 0x10000;
        const PATH_RENAME_TARGET = 0x20000;
        const PATH_FILESTAT_GET = 0x40000;
        /// Change a file's size; with `PATH_OPEN`, `path_open` with `oflags::trunc`.
        const PATH_FILESTAT_SET_SIZE = 0x80000;
        const PATH_FILESTAT_SET_TIMES = 0x100000;
        const FD_FILESTAT_GET = 0x200000;
        const FD_FILESTAT_SET_SIZE = 0x400000;
        const FD_FILESTAT_SET_TIMES = 0x800000;
        const PATH_SYMLINK = 0x1000000;
        const PATH_REMOVE_DIRECTORY = 0x2000000;
        const PATH_UNLINK_FILE = 0x4000000;
        /// Subscribe to `fd_read`/`fd_write` events in `poll_oneoff`,
        /// depending on `FD_READ`/`FD_WRITE`.
        const POLL_FD_READWRITE = 0x8000000;
        const SOCK_SHUTDOWN = 0x10000000;
        const SOCK_ACCEPT = 0x20000000;
    }
}

impl FdRights {
    pub const DIRECTORY_BASE: FdRights = FdRights::PATH_CREATE_DIRECTORY
        .union(FdRights::PATH_CREATE_FILE)
        .union(FdRights::PATH_LINK_SOURCE)
        .union(FdRights::PATH_LINK_TARGET)
        .union(FdRights::PATH_OPEN)
        .union(FdRights::FD_READDIR)
        .union(FdRights::PATH_READLINK)
        .union(FdRights::PATH_RENAME_SOURCE)
        .union(FdRights::PATH_RENAME_TARGET)
        .union(FdRights::PATH_SYMLINK)
        .union(FdRights::PATH_REMOVE_DIRECTORY)
        .union(FdRights::PATH_UNLINK_FILE)
        .union(FdRights::PATH_FILESTAT_GET)
        .union(FdRights::PATH_FILESTAT_SET_TIMES)
        .union(FdRights::FD_FILESTAT_GET)
        .union(FdRights::FD_FILESTAT_SET_TIMES);

    pub const FILE_BASE: FdRights = FdRights::FD_DATASYNC
        .union(FdRights::FD_READ)
        .union(FdRights::FD_SEEK)
        .union(FdRights::FD_FDSTAT_SET_FLAGS)
        .union(FdRights::FD_SYNC)
        .union(FdRights::FD_TELL)
        .union(FdRights::FD_WRITE)
        .union(FdRights::FD_ADVISE)
        .union(FdRights::FD_ALLOCATE)
        .union(FdRights::FD_FILESTAT_GET)
        .union(FdRights::FD_FILESTAT_SET_SIZE)
        .union(FdRights::FD_FILESTAT_SET_TIMES)
        .union(FdRights::POLL_FD_READWRITE);

    pub const DIRECTORY_INHERITING: FdRights = FdRights::DIRECTORY_BASE.union(FdRights::FILE_BASE);

    pub const STDIO: FdRights = FdRights::FD_DATASYNC
        .union(FdRights::FD_READ)
        .union(FdRights::FD_SYNC)
        .union(FdRights::FD_WRITE);
}

/// Rights of a descriptor, and the rights it passes to descriptors opened
/// through it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FdRightsBlock {
    pub rights: FdRights,
    pub inheriting: FdRights,
}

impl FdRightsBlock {
    pub const DIRECTORY_BASE: FdRightsBlock = FdRightsBlock {
        rights: FdRights::DIRECTORY_BASE,
        inheriting: FdRights::DIRECTORY_INHERITING,
    };

    pub const FILE_BASE: FdRightsBlock = FdRightsBlock {
        rights: FdRights::FILE_BASE,
        inheriting: FdRights::empty(),
    };

    pub const STDIO: FdRightsBlock = FdRightsBlock {
        rights: FdRights::STDIO,
        inheriting: FdRights::empty(),
    };

    pub fn new(rights: FdRights, inheriting: FdRights) -> Self {
        Self { rights, inheriting }
    }

    #[inline]
    pub fn has(&self, rights: FdRights) -> bool {
        self.rights.contains(rights)
    }

    /// Rights of a regular file opened through a directory with these rights.
    pub fn child_file_rights(&self, requested: Option<FdRightsBlock>) -> FdRightsBlock {
        let requested = requested.map_or(FdRights::FILE_BASE, |block| block.rights);
        FdRightsBlock {
            rights: requested & self.inheriting & FdRights::FILE_BASE,
            inheriting: FdRights::empty(),
        }
    }

    /// Rights of a directory opened through a directory with these rights.
    pub fn child_directory_rights(&self, requested: Option<FdRightsBlock>) -> FdRightsBlock {
        let requested = requested.unwrap_or(FdRightsBlock::DIRECTORY_BASE);
        FdRightsBlock {
            rights: requested.rights & self.inheriting & FdRights::DIRECTORY_INHERITING,
            inheriting: requested.inheriting & self.inheriting,
        }
    }
}

impl Default for FdRightsBlock {
    fn default() -> Self {
        Self::DIRECTORY_BASE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rights_values_match_wasi() {
        assert_eq!(FdRights::FD_READ.bits(), 0x02);
        assert_eq!(FdRights::PATH_OPEN.bits(), 0x2000);
        assert_eq!(FdRights::SOCK_ACCEPT.bits(), 0x20000000);
        assert!(FdRights::DIRECTORY_INHERITING.contains(FdRights::FD_WRITE));
        assert!(!FdRights::DIRECTORY_BASE.contains(FdRights::FD_WRITE));
    }

    #[test]
    fn child_rights_are_narrowed_by_parent() {
        let parent = FdRightsBlock::new(
            FdRights::DIRECTORY_BASE,
            FdRights::FD_READ | FdRights::FD_SEEK | FdRights::PATH_OPEN,
        );
        let file = parent.child_file_rights(None);
        assert_eq!(file.rights, FdRights::FD_READ | FdRights::FD_SEEK);
        assert!(file.inheriting.is_empty());

        let dir = parent.child_directory_rights(None);
        assert_eq!(dir.rights, FdRights::PATH_OPEN);
        assert_eq!(dir.inheriting, parent.inheriting);
    }
}
