//! Host filesystem backend.
//!
//! Exposes preopened host directories to a guest through
//! [`vfs_core::FileSystem`]. Every path is resolved by the sandboxing
//! resolver against a directory handle, so nothing outside the preopens is
//! reachable unless root access is configured as unrestricted.

mod backend;
mod config;
mod handlers;
pub mod platform;
mod resolve;
mod resource;
mod stdio;
#[cfg(unix)]
mod waiter;

pub use backend::HostBackend;
pub use config::{
    ConfigError, CwdConfig, FileSystemConfig, FileSystemConfigBuilder, PreopenDirBuilder,
    PreopenedDir,
};
pub use platform::{NativePlatform, Platform};
pub use resource::{DirectoryResource, FdResource, FileResource};
pub use stdio::{SinkProvider, SourceProvider, StandardInputOutput, StdioResource};

use std::io;

use vfs_core::{ErrorKind, FileSystem, FsError, VfsResult};

/// A [`FileSystem`] over host directories.
pub type HostFileSystem<P = NativePlatform> = FileSystem<HostBackend<P>>;

/// Builds a filesystem on the native platform of the host.
pub fn create(config: FileSystemConfig) -> Result<HostFileSystem, ConfigError> {
    create_with_platform::<NativePlatform>(config)
}

/// Builds a filesystem on platform `P`. The configured interceptors wrap
/// every operation in the order they were added.
pub fn create_with_platform<P: Platform>(
    config: FileSystemConfig,
) -> Result<HostFileSystem<P>, ConfigError> {
    let interceptors = config.interceptors().to_vec();
    let backend = HostBackend::<P>::new(config)?;
    Ok(FileSystem::with_interceptors(backend, interceptors))
}

pub(crate) fn map_io_error(context: &str, err: io::Error) -> FsError {
    FsError::new(io_error_kind(&err), format!("{context}: {err}"))
}

pub(crate) fn io_result<T>(context: &str, result: io::Result<T>) -> VfsResult<T> {
    result.map_err(|err| map_io_error(context, err))
}

#[cfg(unix)]
pub(crate) fn last_os_error(context: &str) -> FsError {
    map_io_error(context, io::Error::last_os_error())
}

#[cfg(unix)]
fn io_error_kind(err: &io::Error) -> ErrorKind {
    vfs_unix::io_error_kind(err)
}

#[cfg(not(unix))]
fn io_error_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NoEntry,
        io::ErrorKind::PermissionDenied => ErrorKind::AccessDenied,
        io::ErrorKind::AlreadyExists => ErrorKind::Exists,
        io::ErrorKind::WouldBlock => ErrorKind::Again,
        io::ErrorKind::InvalidInput => ErrorKind::InvalidArgument,
        io::ErrorKind::Interrupted => ErrorKind::Interrupted,
        io::ErrorKind::BrokenPipe => ErrorKind::Pipe,
        io::ErrorKind::Unsupported => ErrorKind::NotSupported,
        io::ErrorKind::NotADirectory => ErrorKind::NotDirectory,
        io::ErrorKind::IsADirectory => ErrorKind::IsDirectory,
        io::ErrorKind::DirectoryNotEmpty => ErrorKind::DirectoryNotEmpty,
        io::ErrorKind::ReadOnlyFilesystem => ErrorKind::ReadOnlyFileSystem,
        io::ErrorKind::StorageFull => ErrorKind::NoSpace,
        io::ErrorKind::FileTooLarge => ErrorKind::FileTooBig,
        io::ErrorKind::CrossesDevices => ErrorKind::CrossDevice,
        io::ErrorKind::TooManyLinks => ErrorKind::Mlink,
        io::ErrorKind::InvalidFilename => ErrorKind::NameTooLong,
        io::ErrorKind::NotSeekable => ErrorKind::NotSeekable,
        _ => ErrorKind::IoError,
    }
}
