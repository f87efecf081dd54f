use std::time::Duration;

/// Bounds enforced by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VfsConfig {
    /// Directory handles the resolver may hold open at once.
    pub max_open_directory_handles: usize,
    /// Symlink expansions allowed while resolving one path.
    pub max_symlink_expansions: usize,
    /// Longest single blocking slice of the poll wait loop.
    pub poll_period: Duration,
}

impl VfsConfig {
    pub const MAX_OPEN_DIRECTORY_HANDLES: usize = 128;
    pub const MAX_SYMLINK_EXPANSIONS: usize = 128;
    pub const POLL_PERIOD: Duration = Duration::from_millis(100);
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            max_open_directory_handles: Self::MAX_OPEN_DIRECTORY_HANDLES,
            max_symlink_expansions: Self::MAX_SYMLINK_EXPANSIONS,
            poll_period: Self::POLL_PERIOD,
        }
    }
}
