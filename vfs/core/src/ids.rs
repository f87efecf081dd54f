//! Core identifier types.

use std::fmt;

/// Guest-visible file descriptor.
///
/// A small non-negative integer, unique among the descriptors open in one
/// [`FileDescriptorTable`](crate::fd_table::FileDescriptorTable).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Fd(pub u32);

impl Fd {
    pub const STDIN: Fd = Fd(0);
    pub const STDOUT: Fd = Fd(1);
    pub const STDERR: Fd = Fd(2);
    /// First descriptor used for preopened directories.
    pub const FIRST_PREOPEN: Fd = Fd(3);

    /// Get the raw descriptor value.
    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Convert a descriptor to a zero-based slot index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Create a descriptor from a zero-based slot index.
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        u32::try_from(index).ok().map(Self)
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anchor a relative path is resolved against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BaseDirectory {
    CurrentWorkingDirectory,
    DirectoryFd(Fd),
}

impl fmt::Display for BaseDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CurrentWorkingDirectory => f.write_str("CWD"),
            Self::DirectoryFd(fd) => write!(f, "Fd({fd})"),
        }
    }
}
