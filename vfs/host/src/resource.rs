//! Resources stored in the descriptor table.

use std::borrow::Borrow;
use std::fmt;
use std::fs::File;
use std::io::Seek;
use std::sync::Arc;

use parking_lot::Mutex;
use vfs_core::flags::FdFlags;
use vfs_core::poll::{FdReadiness, Interest, Pollable};
use vfs_core::{FdRights, FdRightsBlock, FsError, VfsResult, VirtualPath};

use crate::io_result;
use crate::platform::Platform;
use crate::stdio::StdioResource;

/// An open regular file (or any other non-directory node).
#[derive(Debug)]
pub struct FileResource<F> {
    pub(crate) file: F,
    pub(crate) flags: Mutex<FdFlags>,
    pub(crate) rights: FdRightsBlock,
}

impl<F: Borrow<File>> FileResource<F> {
    pub(crate) fn new(file: F, flags: FdFlags, rights: FdRightsBlock) -> Self {
        Self {
            file,
            flags: Mutex::new(flags),
            rights,
        }
    }

    pub fn file(&self) -> &File {
        self.file.borrow()
    }

    pub fn flags(&self) -> FdFlags {
        *self.flags.lock()
    }

    pub fn rights(&self) -> FdRightsBlock {
        self.rights
    }
}

/// An open directory.
pub struct DirectoryResource<D> {
    pub(crate) dir: Arc<D>,
    pub(crate) virtual_path: VirtualPath,
    pub(crate) preopened: bool,
    pub(crate) rights: FdRightsBlock,
}

impl<D> DirectoryResource<D> {
    pub fn virtual_path(&self) -> &VirtualPath {
        &self.virtual_path
    }

    pub fn is_preopened(&self) -> bool {
        self.preopened
    }

    pub fn rights(&self) -> FdRightsBlock {
        self.rights
    }
}

impl<D> Clone for DirectoryResource<D> {
    fn clone(&self) -> Self {
        Self {
            dir: Arc::clone(&self.dir),
            virtual_path: self.virtual_path.clone(),
            preopened: self.preopened,
            rights: self.rights,
        }
    }
}

impl<D: fmt::Debug> fmt::Debug for DirectoryResource<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryResource")
            .field("dir", &self.dir)
            .field("virtual_path", &self.virtual_path)
            .field("preopened", &self.preopened)
            .finish()
    }
}

/// Anything a guest descriptor can refer to.
pub enum FdResource<P: Platform> {
    File(FileResource<P::File>),
    Directory(DirectoryResource<P::Dir>),
    /// Descriptors 0 and 1 share one instance.
    Stdio(Arc<StdioResource>),
}

impl<P: Platform> FdResource<P> {
    /// Closes a descriptor taken out of the table.
    ///
    /// The native handle is closed here, with its error reported, when this
    /// was the last reference. An operation still running on the descriptor
    /// keeps it open until that operation drops it.
    pub fn close(self: Arc<Self>) -> VfsResult<()> {
        let resource = match Arc::try_unwrap(self) {
            Ok(resource) => resource,
            Err(shared) => {
                return match &*shared {
                    Self::Stdio(stdio) => stdio.close(),
                    Self::File(_) | Self::Directory(_) => Ok(()),
                };
            }
        };
        match resource {
            Self::File(file) => P::close_file(file.file),
            Self::Directory(dir) => match Arc::into_inner(dir.dir) {
                Some(dir) => P::close_dir(dir),
                // a path resolution in flight still holds the handle
                None => Ok(()),
            },
            Self::Stdio(stdio) => stdio.close(),
        }
    }

    pub fn as_directory(&self) -> Option<&DirectoryResource<P::Dir>> {
        match self {
            Self::Directory(dir) => Some(dir),
            _ => None,
        }
    }

    /// Native descriptor usable with `poll(2)` for `interest`.
    #[cfg(unix)]
    pub(crate) fn native_fd(&self, interest: Interest) -> Option<i32> {
        use std::os::unix::io::AsRawFd;
        match self {
            Self::File(file) => Some(file.file().as_raw_fd()),
            Self::Directory(_) => None,
            Self::Stdio(stdio) => stdio.native_fd(interest),
        }
    }
}

/// Fails with `NotCapable` unless `block` carries all of `required`.
pub(crate) fn require_rights(block: FdRightsBlock, required: FdRights) -> VfsResult<()> {
    if block.has(required) {
        return Ok(());
    }
    Err(FsError::not_capable(format!(
        "Missing rights: {:?}",
        required.difference(block.rights)
    )))
}

impl<P: Platform> Pollable for FdResource<P> {
    fn poll_nonblocking(&self, interest: Interest) -> VfsResult<FdReadiness> {
        match self {
            Self::File(file) => {
                let bytes_available = match interest {
                    Interest::Read => {
                        let size = io_result("metadata", file.file().metadata())?.len();
                        let position = io_result("seek", file.file().stream_position())?;
                        size.saturating_sub(position)
                    }
                    Interest::Write => 0,
                };
                Ok(FdReadiness {
                    bytes_available,
                    hangup: false,
                })
            }
            Self::Directory(_) => Ok(FdReadiness::default()),
            Self::Stdio(stdio) => stdio.poll_nonblocking(interest),
        }
    }
}

impl<P: Platform> fmt::Debug for FdResource<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(file) => f.debug_tuple("File").field(file).finish(),
            Self::Directory(dir) => f.debug_tuple("Directory").field(dir).finish(),
            Self::Stdio(stdio) => f.debug_tuple("Stdio").field(stdio).finish(),
        }
    }
}
