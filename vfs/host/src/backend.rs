use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

use vfs_core::{
    BaseDirectory, Fd, FdRightsBlock, FileDescriptorTable, FsError, RealPath, VfsConfig,
    VfsResult, VirtualPath,
};

use crate::config::{ConfigError, CwdConfig, FileSystemConfig};
use crate::platform::{NativePlatform, Platform};
use crate::resolve::{self, Node};
use crate::resource::{DirectoryResource, FdResource};
use crate::stdio::{SourceProvider, StdioResource};

enum CurrentDirectory {
    Open(Fd),
    /// Configured, but the directory could not be opened.
    Unavailable(FsError),
    Inactive,
}

/// Operation handlers over host directories.
///
/// Owns the descriptor table. Descriptors 0..=2 are stdio, preopened
/// directories follow in configuration order, then the current directory.
pub struct HostBackend<P: Platform = NativePlatform> {
    pub(crate) table: FileDescriptorTable<FdResource<P>>,
    cwd: CurrentDirectory,
    pub(crate) unrestricted: bool,
    pub(crate) vfs: VfsConfig,
    _platform: PhantomData<fn() -> P>,
}

impl<P: Platform> HostBackend<P> {
    pub fn new(config: FileSystemConfig) -> Result<Self, ConfigError> {
        let FileSystemConfig {
            unrestricted,
            current_working_directory,
            preopens,
            stdio,
            vfs,
            ..
        } = config;
        let table = FileDescriptorTable::new();

        let shared = Arc::new(StdioResource::new(stdio.stdin, stdio.stdout));
        let stderr = Arc::new(StdioResource::new(SourceProvider::exhausted(), stdio.stderr));
        for (fd, resource) in [
            (Fd::STDIN, Arc::clone(&shared)),
            (Fd::STDOUT, shared),
            (Fd::STDERR, stderr),
        ] {
            table
                .set_preopened(fd, FdResource::Stdio(resource))
                .map_err(ConfigError::Bootstrap)?;
        }

        let cwd_path = match &current_working_directory {
            CwdConfig::Inherit => std::env::current_dir().ok(),
            CwdConfig::Path(path) => Some(path.to_path_buf()),
            CwdConfig::Inactive => None,
        };

        let mut next_fd = Fd::FIRST_PREOPEN.get();
        for preopen in &preopens {
            let host_path = host_path(preopen.real_path(), cwd_path.as_ref());
            let dir = P::open_directory(&host_path).map_err(|source| ConfigError::Preopen {
                path: preopen.real_path().clone(),
                source,
            })?;
            let fd = Fd(next_fd);
            next_fd += 1;
            table
                .set_preopened(
                    fd,
                    FdResource::Directory(DirectoryResource {
                        dir: Arc::new(dir),
                        virtual_path: preopen.virtual_path().clone(),
                        preopened: true,
                        rights: preopen.rights(),
                    }),
                )
                .map_err(ConfigError::Bootstrap)?;
            tracing::debug!(
                %fd,
                real_path = %preopen.real_path(),
                virtual_path = %preopen.virtual_path(),
                "preopened directory"
            );
        }

        let cwd = match (&current_working_directory, cwd_path) {
            (CwdConfig::Inactive, _) => CurrentDirectory::Inactive,
            (_, None) => CurrentDirectory::Unavailable(FsError::no_entry(
                "Current working directory not set",
            )),
            (_, Some(path)) => match P::open_directory(&path) {
                Ok(dir) => {
                    let fd = Fd(next_fd);
                    table
                        .set_preopened(
                            fd,
                            FdResource::Directory(DirectoryResource {
                                dir: Arc::new(dir),
                                virtual_path: VirtualPath::current_directory(),
                                preopened: false,
                                rights: FdRightsBlock::DIRECTORY_BASE,
                            }),
                        )
                        .map_err(ConfigError::Bootstrap)?;
                    tracing::debug!(
                        %fd,
                        path = %path.display(),
                        "opened current working directory"
                    );
                    CurrentDirectory::Open(fd)
                }
                Err(err) => {
                    tracing::debug!(
                        path = %path.display(),
                        error = %err,
                        "current working directory is not available"
                    );
                    CurrentDirectory::Unavailable(err)
                }
            },
        };

        Ok(Self {
            table,
            cwd,
            unrestricted,
            vfs,
            _platform: PhantomData,
        })
    }

    pub fn descriptors(&self) -> &FileDescriptorTable<FdResource<P>> {
        &self.table
    }

    pub(crate) fn resource(&self, fd: Fd) -> VfsResult<Arc<FdResource<P>>> {
        self.table
            .get(fd)
            .ok_or_else(|| FsError::bad_fd(format!("File descriptor {fd} is not open")))
    }

    /// The open directory a path operation starts from.
    pub(crate) fn directory(&self, base: BaseDirectory) -> VfsResult<DirectoryResource<P::Dir>> {
        let fd = match base {
            BaseDirectory::CurrentWorkingDirectory => match &self.cwd {
                CurrentDirectory::Open(fd) => *fd,
                _ => return Err(FsError::bad_fd("Current directory not opened")),
            },
            BaseDirectory::DirectoryFd(fd) => fd,
        };
        match &*self.resource(fd)? {
            FdResource::Directory(dir) => Ok(dir.clone()),
            _ => Err(FsError::not_directory(format!(
                "File descriptor {fd} is not a directory"
            ))),
        }
    }

    pub(crate) fn resolve(
        &self,
        base: &DirectoryResource<P::Dir>,
        path: &VirtualPath,
        follow_symlinks: bool,
    ) -> VfsResult<Node<P::Dir>> {
        resolve::resolve::<P>(&base.dir, path, follow_symlinks, self.unrestricted, &self.vfs)
    }

    /// Virtual path of the current directory.
    pub(crate) fn current_directory(&self) -> VfsResult<VirtualPath> {
        match &self.cwd {
            CurrentDirectory::Open(fd) => match &*self.resource(*fd)? {
                FdResource::Directory(dir) => Ok(dir.virtual_path.clone()),
                _ => Err(FsError::not_supported("Current directory was replaced")),
            },
            CurrentDirectory::Unavailable(err) => Err(err.clone()),
            CurrentDirectory::Inactive => {
                Err(FsError::not_supported("Current working directory is disabled"))
            }
        }
    }
}

/// Host path of a preopen. Relative paths are taken from the current directory.
fn host_path(real_path: &RealPath, cwd: Option<&PathBuf>) -> PathBuf {
    match cwd {
        Some(cwd) if !real_path.is_absolute() => cwd.join(real_path.to_path_buf()),
        _ => real_path.to_path_buf(),
    }
}

impl<P: Platform> Drop for HostBackend<P> {
    fn drop(&mut self) {
        for (fd, resource) in self.table.drain() {
            if let Err(err) = resource.close() {
                tracing::debug!(%fd, error = %err, "failed to close descriptor");
            }
        }
    }
}

impl<P: Platform> fmt::Debug for HostBackend<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBackend")
            .field("table", &self.table)
            .field("unrestricted", &self.unrestricted)
            .finish_non_exhaustive()
    }
}
