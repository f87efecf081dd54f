//! Flag sets and small value types shared by operations.

use bitflags::bitflags;

bitflags! {
    /// Open flags, using Linux values.
    ///
    /// The access mode occupies the two lowest bits: [`OpenFlags::O_RDONLY`]
    /// is the empty value, see [`OpenFlags::access_mode`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct OpenFlags: u32 {
        const O_RDONLY = 0;
        const O_WRONLY = 0o1;
        const O_RDWR = 0o2;
        const O_CREAT = 0o100;
        const O_EXCL = 0o200;
        const O_NOCTTY = 0o400;
        const O_TRUNC = 0o1000;
        const O_APPEND = 0o2000;
        const O_NONBLOCK = 0o4000;
        const O_DSYNC = 0o10000;
        const O_ASYNC = 0o20000;
        const O_DIRECTORY = 0o200000;
        const O_NOFOLLOW = 0o400000;
        const O_NOATIME = 0o1000000;
        const O_CLOEXEC = 0o2000000;
        const O_SYNC = 0o4010000;
        const O_PATH = 0o10000000;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl OpenFlags {
    const ACCMODE: u32 = 0o3;

    pub fn access_mode(self) -> Option<AccessMode> {
        match self.bits() & Self::ACCMODE {
            0 => Some(AccessMode::ReadOnly),
            1 => Some(AccessMode::WriteOnly),
            2 => Some(AccessMode::ReadWrite),
            _ => None,
        }
    }

    pub fn is_writable(self) -> bool {
        matches!(
            self.access_mode(),
            Some(AccessMode::WriteOnly | AccessMode::ReadWrite)
        )
    }

    pub fn is_readable(self) -> bool {
        matches!(
            self.access_mode(),
            Some(AccessMode::ReadOnly | AccessMode::ReadWrite)
        )
    }
}

bitflags! {
    /// Descriptor flags, using WASI `fdflags` values.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct FdFlags: u16 {
        const APPEND = 1 << 0;
        const DSYNC = 1 << 1;
        const NONBLOCK = 1 << 2;
        const RSYNC = 1 << 3;
        const SYNC = 1 << 4;
    }
}

bitflags! {
    /// Checks performed by `CheckAccess`. The empty set checks existence.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct FileAccessibilityCheck: u8 {
        const READABLE = 1 << 0;
        const WRITEABLE = 1 << 1;
        const EXECUTABLE = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Whence {
    Set,
    Cur,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Advice {
    Normal,
    Sequential,
    Random,
    WillNeed,
    DontNeed,
    NoReuse,
}

/// New value for one timestamp of a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TimestampUpdate {
    /// Leave unchanged.
    #[default]
    Omit,
    /// Set to the current time.
    Now,
    /// Set to nanoseconds since the Unix epoch.
    Set(u64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdvisoryLockType {
    Read,
    Write,
}

/// A POSIX-style record lock request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AdvisoryLock {
    pub lock_type: AdvisoryLockType,
    pub whence: Whence,
    pub start: i64,
    /// `0` locks to the end of the file, however large it grows.
    pub length: i64,
}

impl AdvisoryLock {
    /// Locks the whole file.
    pub fn whole_file(lock_type: AdvisoryLockType) -> Self {
        Self {
            lock_type,
            whence: Whence::Set,
            start: 0,
            length: 0,
        }
    }
}

/// How read/write operations position themselves in the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ReadWriteStrategy {
    /// Use and advance the descriptor's current position.
    #[default]
    CurrentPosition,
    /// Use the given absolute position; the descriptor position is unchanged.
    Position(u64),
}
