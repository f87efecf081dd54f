use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use vfs_core::{
    FdRights, FdRightsBlock, FileSystemInterceptor, FsError, PathError, RealPath, VfsConfig,
    VirtualPath,
};

use crate::stdio::StandardInputOutput;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("preopened directory `{path}` could not be opened: {source}")]
    Preopen {
        path: RealPath,
        #[source]
        source: FsError,
    },
    #[error("preopened directory error: {0}")]
    PreopenedDirectory(String),
    #[error("mapped directory alias has wrong format: `{0}`")]
    AliasFormat(String),
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),
    #[error("invalid engine limits: {0}")]
    Limits(String),
    #[error("filesystem bootstrap failed: {0}")]
    Bootstrap(#[source] FsError),
}

/// Where relative paths with the `CurrentWorkingDirectory` base go.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CwdConfig {
    /// The working directory of the host process.
    #[default]
    Inherit,
    Path(RealPath),
    /// No current directory: such paths fail with `BadFileDescriptor`.
    Inactive,
}

/// A host directory exposed to the guest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreopenedDir {
    real_path: RealPath,
    virtual_path: VirtualPath,
    rights: FdRightsBlock,
}

impl PreopenedDir {
    pub fn new(real_path: RealPath, virtual_path: VirtualPath) -> Self {
        Self {
            real_path,
            virtual_path,
            rights: FdRightsBlock::DIRECTORY_BASE,
        }
    }

    pub fn real_path(&self) -> &RealPath {
        &self.real_path
    }

    pub fn virtual_path(&self) -> &VirtualPath {
        &self.virtual_path
    }

    pub fn rights(&self) -> FdRightsBlock {
        self.rights
    }
}

/// Builder for preopened directories with restricted rights.
#[derive(Debug, Default)]
pub struct PreopenDirBuilder {
    path: Option<PathBuf>,
    alias: Option<String>,
    read: bool,
    write: bool,
    create: bool,
}

impl PreopenDirBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Host directory to expose.
    pub fn directory(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Path the guest sees the directory at. Defaults to the host path.
    pub fn alias(&mut self, alias: &str) -> &mut Self {
        self.alias = Some(alias.to_string());
        self
    }

    /// Allow listing the directory and reading its files.
    pub fn read(&mut self, toggle: bool) -> &mut Self {
        self.read = toggle;
        self
    }

    /// Allow modifying existing files.
    pub fn write(&mut self, toggle: bool) -> &mut Self {
        self.write = toggle;
        self
    }

    /// Allow creating and removing entries. Implies `write`.
    pub fn create(&mut self, toggle: bool) -> &mut Self {
        self.create = toggle;
        if toggle {
            self.write = true;
        }
        self
    }

    fn build(&self) -> Result<PreopenedDir, ConfigError> {
        if !(self.read || self.write || self.create) {
            return Err(ConfigError::PreopenedDirectory(
                "Preopened directories must have at least one of read, write, create permissions set"
                    .to_string(),
            ));
        }
        let Some(path) = &self.path else {
            return Err(ConfigError::PreopenedDirectory(
                "Preopened directories must point to a host directory".to_string(),
            ));
        };
        let real_path = RealPath::from_path(path)?;
        let virtual_path = match &self.alias {
            Some(alias) => validate_alias(alias)?,
            None => real_path.to_virtual_path()?,
        };
        Ok(PreopenedDir {
            real_path,
            virtual_path,
            rights: self.rights(),
        })
    }

    fn rights(&self) -> FdRightsBlock {
        let mut rights =
            FdRights::PATH_OPEN | FdRights::PATH_FILESTAT_GET | FdRights::FD_FILESTAT_GET;
        let mut inheriting = FdRights::PATH_OPEN
            | FdRights::PATH_FILESTAT_GET
            | FdRights::FD_FILESTAT_GET
            | FdRights::FD_SEEK
            | FdRights::FD_TELL
            | FdRights::FD_ADVISE
            | FdRights::POLL_FD_READWRITE;
        if self.read {
            rights |= FdRights::FD_READDIR | FdRights::PATH_READLINK;
            inheriting |= FdRights::FD_READ | FdRights::FD_READDIR | FdRights::PATH_READLINK;
        }
        if self.write {
            let write = FdRights::FD_WRITE
                | FdRights::FD_DATASYNC
                | FdRights::FD_SYNC
                | FdRights::FD_FDSTAT_SET_FLAGS
                | FdRights::FD_ALLOCATE
                | FdRights::FD_FILESTAT_SET_SIZE
                | FdRights::FD_FILESTAT_SET_TIMES
                | FdRights::PATH_FILESTAT_SET_SIZE
                | FdRights::PATH_FILESTAT_SET_TIMES;
            rights |= write & FdRights::DIRECTORY_BASE;
            inheriting |= write;
        }
        if self.create {
            let create = FdRights::PATH_CREATE_DIRECTORY
                | FdRights::PATH_CREATE_FILE
                | FdRights::PATH_LINK_SOURCE
                | FdRights::PATH_LINK_TARGET
                | FdRights::PATH_RENAME_SOURCE
                | FdRights::PATH_RENAME_TARGET
                | FdRights::PATH_SYMLINK
                | FdRights::PATH_REMOVE_DIRECTORY
                | FdRights::PATH_UNLINK_FILE
                | FdRights::PATH_FILESTAT_SET_SIZE;
            rights |= create;
            inheriting |= create;
        }
        FdRightsBlock::new(rights, inheriting)
    }
}

fn validate_alias(alias: &str) -> Result<VirtualPath, ConfigError> {
    if alias.contains('\0') {
        return Err(ConfigError::AliasFormat(format!(
            "Alias \"{alias}\" contains a nul byte"
        )));
    }
    Ok(VirtualPath::new(alias)?)
}

/// Settings of a host filesystem, consumed when it is created.
#[derive(Clone)]
pub struct FileSystemConfig {
    pub(crate) unrestricted: bool,
    pub(crate) current_working_directory: CwdConfig,
    pub(crate) preopens: Vec<PreopenedDir>,
    pub(crate) stdio: StandardInputOutput,
    pub(crate) interceptors: Vec<Arc<dyn FileSystemInterceptor>>,
    pub(crate) vfs: VfsConfig,
}

impl FileSystemConfig {
    pub fn builder() -> FileSystemConfigBuilder {
        FileSystemConfigBuilder::default()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.unrestricted
    }

    pub fn current_working_directory(&self) -> &CwdConfig {
        &self.current_working_directory
    }

    pub fn preopens(&self) -> &[PreopenedDir] {
        &self.preopens
    }

    pub fn stdio(&self) -> &StandardInputOutput {
        &self.stdio
    }

    pub fn interceptors(&self) -> &[Arc<dyn FileSystemInterceptor>] {
        &self.interceptors
    }

    pub fn vfs(&self) -> &VfsConfig {
        &self.vfs
    }
}

impl Default for FileSystemConfig {
    fn default() -> Self {
        Self {
            unrestricted: false,
            current_working_directory: CwdConfig::default(),
            preopens: Vec::new(),
            stdio: StandardInputOutput::default(),
            interceptors: Vec::new(),
            vfs: VfsConfig::default(),
        }
    }
}

impl fmt::Debug for FileSystemConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystemConfig")
            .field("unrestricted", &self.unrestricted)
            .field("current_working_directory", &self.current_working_directory)
            .field("preopens", &self.preopens)
            .field("stdio", &self.stdio)
            .field("interceptors", &self.interceptors.len())
            .field("vfs", &self.vfs)
            .finish()
    }
}

/// Builds a [`FileSystemConfig`].
///
/// Path errors are collected and reported by [`FileSystemConfigBuilder::build`].
#[derive(Default)]
pub struct FileSystemConfigBuilder {
    config: FileSystemConfig,
    errors: Vec<ConfigError>,
}

impl FileSystemConfigBuilder {
    /// Allow absolute paths and `..` above the preopened directories.
    pub fn unrestricted(mut self, unrestricted: bool) -> Self {
        self.config.unrestricted = unrestricted;
        self
    }

    pub fn current_working_directory(mut self, cwd: CwdConfig) -> Self {
        self.config.current_working_directory = cwd;
        self
    }

    /// Exposes `real_path` to the guest at `virtual_path` with full directory rights.
    pub fn preopen_dir(mut self, real_path: impl AsRef<Path>, virtual_path: &str) -> Self {
        let preopen = RealPath::from_path(real_path.as_ref())
            .and_then(|real| Ok(PreopenedDir::new(real, VirtualPath::new(virtual_path)?)));
        match preopen {
            Ok(preopen) => self.config.preopens.push(preopen),
            Err(err) => self.errors.push(err.into()),
        }
        self
    }

    /// Adds a preopened directory configured by `inner`.
    pub fn preopen<F>(mut self, inner: F) -> Self
    where
        F: Fn(&mut PreopenDirBuilder) -> &mut PreopenDirBuilder,
    {
        let mut builder = PreopenDirBuilder::new();
        match inner(&mut builder).build() {
            Ok(preopen) => self.config.preopens.push(preopen),
            Err(err) => self.errors.push(err),
        }
        self
    }

    pub fn stdio(mut self, stdio: StandardInputOutput) -> Self {
        self.config.stdio = stdio;
        self
    }

    /// Appends an interceptor. The first one added sees requests first.
    pub fn interceptor(mut self, interceptor: Arc<dyn FileSystemInterceptor>) -> Self {
        self.config.interceptors.push(interceptor);
        self
    }

    pub fn max_symlink_expansions(mut self, max: usize) -> Self {
        self.config.vfs.max_symlink_expansions = max;
        self
    }

    pub fn max_open_directory_handles(mut self, max: usize) -> Self {
        self.config.vfs.max_open_directory_handles = max;
        self
    }

    pub fn poll_period(mut self, period: Duration) -> Self {
        self.config.vfs.poll_period = period;
        self
    }

    /// Returns the first error recorded while building.
    pub fn build(mut self) -> Result<FileSystemConfig, ConfigError> {
        if !self.errors.is_empty() {
            return Err(self.errors.swap_remove(0));
        }
        let limits = &self.config.vfs;
        if limits.max_symlink_expansions == 0 || limits.max_open_directory_handles < 2 {
            return Err(ConfigError::Limits(
                "Resolver limits must allow at least one expansion and one handle".to_string(),
            ));
        }
        if self.config.vfs.poll_period.is_zero() {
            return Err(ConfigError::Limits("Poll period must not be zero".to_string()));
        }
        Ok(self.config)
    }
}

impl fmt::Debug for FileSystemConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystemConfigBuilder")
            .field("config", &self.config)
            .field("errors", &self.errors)
            .finish()
    }
}
