//! File metadata model.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// File type, using WASI `filetype` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum FileType {
    #[default]
    Unknown = 0,
    BlockDevice = 1,
    CharacterDevice = 2,
    Directory = 3,
    RegularFile = 4,
    SocketDgram = 5,
    SocketStream = 6,
    SymbolicLink = 7,
}

impl FileType {
    /// Decodes the `S_IFMT` part of a POSIX mode.
    pub fn from_posix_mode(mode: u32) -> Self {
        match mode & file_mode::S_IFMT {
            file_mode::S_IFBLK => Self::BlockDevice,
            file_mode::S_IFCHR => Self::CharacterDevice,
            file_mode::S_IFDIR => Self::Directory,
            file_mode::S_IFREG => Self::RegularFile,
            file_mode::S_IFSOCK => Self::SocketStream,
            file_mode::S_IFLNK => Self::SymbolicLink,
            _ => Self::Unknown,
        }
    }

    /// The `S_IFMT` bits for this type, `0` when unknown.
    pub fn posix_mode_bits(self) -> u32 {
        match self {
            Self::BlockDevice => file_mode::S_IFBLK,
            Self::CharacterDevice => file_mode::S_IFCHR,
            Self::Directory => file_mode::S_IFDIR,
            Self::RegularFile => file_mode::S_IFREG,
            Self::SocketDgram | Self::SocketStream => file_mode::S_IFSOCK,
            Self::SymbolicLink => file_mode::S_IFLNK,
            Self::Unknown => 0,
        }
    }
}

/// POSIX file mode bits.
pub mod file_mode {
    pub const S_IFMT: u32 = 0o170000;
    pub const S_IFSOCK: u32 = 0o140000;
    pub const S_IFLNK: u32 = 0o120000;
    pub const S_IFREG: u32 = 0o100000;
    pub const S_IFBLK: u32 = 0o060000;
    pub const S_IFDIR: u32 = 0o040000;
    pub const S_IFCHR: u32 = 0o020000;
    pub const S_IFIFO: u32 = 0o010000;

    pub const S_ISUID: u32 = 0o4000;
    pub const S_ISGID: u32 = 0o2000;
    pub const S_ISVTX: u32 = 0o1000;
    /// Permission bits, including set-id and sticky bits.
    pub const PERMISSIONS_MASK: u32 = 0o7777;

    /// Mode used for newly created files when none is given.
    pub const DEFAULT_FILE_MODE: u32 = 0o640;
    pub const DEFAULT_DIRECTORY_MODE: u32 = 0o775;
}

/// Seconds and nanoseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StructTimespec {
    pub seconds: i64,
    pub nanoseconds: i64,
}

impl StructTimespec {
    pub fn new(seconds: i64, nanoseconds: i64) -> Self {
        Self {
            seconds,
            nanoseconds,
        }
    }

    pub fn from_nanos(nanos: u64) -> Self {
        Self {
            seconds: (nanos / 1_000_000_000) as i64,
            nanoseconds: (nanos % 1_000_000_000) as i64,
        }
    }

    /// Total nanoseconds, saturating on overflow; `0` before the epoch.
    pub fn as_nanos(&self) -> u64 {
        if self.seconds < 0 {
            return 0;
        }
        (self.seconds as u64)
            .saturating_mul(1_000_000_000)
            .saturating_add(self.nanoseconds.max(0) as u64)
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(since) => Self::new(since.as_secs() as i64, i64::from(since.subsec_nanos())),
            Err(err) => {
                let before = err.duration();
                let mut seconds = -(before.as_secs() as i64);
                let mut nanoseconds = i64::from(before.subsec_nanos());
                if nanoseconds > 0 {
                    seconds -= 1;
                    nanoseconds = 1_000_000_000 - nanoseconds;
                }
                Self::new(seconds, nanoseconds)
            }
        }
    }

    pub fn to_system_time(&self) -> SystemTime {
        if self.seconds >= 0 {
            UNIX_EPOCH + Duration::new(self.seconds as u64, self.nanoseconds as u32)
        } else {
            UNIX_EPOCH - Duration::from_secs(self.seconds.unsigned_abs())
                + Duration::from_nanos(self.nanoseconds as u64)
        }
    }
}

impl fmt::Display for StructTimespec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanoseconds)
    }
}

/// Result of `Stat`/`StatFd`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct StructStat {
    pub device_id: u64,
    pub inode: u64,
    /// Permission bits only; the type is in [`StructStat::file_type`].
    pub mode: u32,
    pub file_type: FileType,
    pub links: u64,
    pub uid: u64,
    pub gid: u64,
    pub special_file_device_id: u64,
    pub size: u64,
    pub block_size: u64,
    pub blocks: u64,
    pub access_time: StructTimespec,
    pub modification_time: StructTimespec,
    pub change_status_time: StructTimespec,
}

impl StructStat {
    /// Full POSIX mode: type bits plus permission bits.
    pub fn posix_mode(&self) -> u32 {
        self.file_type.posix_mode_bits() | (self.mode & file_mode::PERMISSIONS_MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_type_from_mode() {
        assert_eq!(FileType::from_posix_mode(0o100644), FileType::RegularFile);
        assert_eq!(FileType::from_posix_mode(0o040755), FileType::Directory);
        assert_eq!(FileType::from_posix_mode(0o120777), FileType::SymbolicLink);
        assert_eq!(FileType::from_posix_mode(0o010644), FileType::Unknown);
    }

    #[test]
    fn timespec_conversions() {
        let ts = StructTimespec::from_nanos(1_500_000_000);
        assert_eq!(ts, StructTimespec::new(1, 500_000_000));
        assert_eq!(ts.as_nanos(), 1_500_000_000);
        let time = ts.to_system_time();
        assert_eq!(StructTimespec::from_system_time(time), ts);

        let before_epoch = UNIX_EPOCH - Duration::from_millis(1500);
        let ts = StructTimespec::from_system_time(before_epoch);
        assert_eq!(ts, StructTimespec::new(-2, 500_000_000));
        assert_eq!(ts.to_system_time(), before_epoch);
    }
}
