//! Platform-independent core of the WASI host filesystem.
//!
//! Backends implement [`fs::OperationHandler`] for the operations in
//! [`ops`] and are driven through [`FileSystem`]. Paths coming from the guest
//! are resolved by [`resolver::SymlinkResolver`], which keeps every lookup
//! inside the directory it starts from.

pub mod context;
pub mod dirent;
pub mod errno;
pub mod error;
pub mod fd_table;
pub mod flags;
pub mod fs;
pub mod ids;
pub mod logging;
pub mod ops;
pub mod path;
pub mod poll;
pub mod real_path;
pub mod resolver;
pub mod rights;
pub mod stat;

pub use context::VfsConfig;
pub use dirent::{DirEntry, DirEntrySequence, DirSequenceStartPosition};
pub use errno::FileSystemErrno;
pub use error::{ErrorKind, ErrorKindSet, FsError, VfsResult};
pub use fd_table::FileDescriptorTable;
pub use fs::{Chain, ErasedOutput, FileSystem, FileSystemInterceptor, OperationHandler};
pub use ids::{BaseDirectory, Fd};
pub use logging::{LogLevel, LoggingInterceptor};
pub use ops::FileSystemOperation;
pub use path::{PathError, VirtualPath};
pub use real_path::RealPath;
pub use rights::{FdRights, FdRightsBlock};
pub use stat::{FileType, StructStat, StructTimespec};
