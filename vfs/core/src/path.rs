//! Guest-visible virtual paths.

use crate::error::{ErrorKind, FsError};
use std::fmt;
use std::sync::Arc;

/// Reasons a path string is rejected or cannot be resolved.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("empty path: {0}")]
    EmptyPath(String),
    #[error("invalid path format: {0}")]
    InvalidPathFormat(String),
    #[error("absolute path: {0}")]
    AbsolutePath(String),
    #[error("not a directory: {0}")]
    NotDirectory(String),
    #[error("file descriptor not open: {0}")]
    FileDescriptorNotOpen(String),
    #[error("path is outside of the root: {0}")]
    PathOutsideOfRootPath(String),
}

impl From<PathError> for FsError {
    fn from(err: PathError) -> Self {
        let kind = match &err {
            PathError::EmptyPath(_) | PathError::InvalidPathFormat(_) => {
                ErrorKind::InvalidArgument
            }
            PathError::AbsolutePath(_) | PathError::PathOutsideOfRootPath(_) => {
                ErrorKind::NotCapable
            }
            PathError::NotDirectory(_) => ErrorKind::NotDirectory,
            PathError::FileDescriptorNotOpen(_) => ErrorKind::BadFileDescriptor,
        };
        FsError::new(kind, err.to_string())
    }
}

/// A path inside the virtual file system.
///
/// The separator is always `/`. A virtual path is valid UTF-8, never empty and
/// never contains a NUL byte. It may be absolute or relative; whether an
/// absolute path is acceptable is decided when it is resolved.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualPath(Arc<str>);

impl VirtualPath {
    pub const CURRENT_DIRECTORY: &'static str = ".";

    pub fn new(path: impl AsRef<str>) -> Result<Self, PathError> {
        let path = path.as_ref();
        validate(path)?;
        Ok(Self(Arc::from(path)))
    }

    /// Validates raw guest bytes.
    pub fn from_utf8(bytes: &[u8]) -> Result<Self, PathError> {
        let path = std::str::from_utf8(bytes).map_err(|_| {
            PathError::InvalidPathFormat("Path is not a valid Unicode string".into())
        })?;
        Self::new(path)
    }

    pub fn current_directory() -> Self {
        Self(Arc::from(Self::CURRENT_DIRECTORY))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Length of the UTF-8 representation, without a terminator.
    #[inline]
    pub fn utf8_len(&self) -> usize {
        self.0.len()
    }

    pub fn is_absolute(&self) -> bool {
        self.0.starts_with('/')
    }

    /// A trailing separator requests that the target is a directory.
    pub fn is_directory_request(&self) -> bool {
        self.0.ends_with('/')
    }

    /// Appends `child` with a single separator.
    pub fn join(&self, child: &str) -> Result<Self, PathError> {
        if child.starts_with('/') {
            return Err(PathError::AbsolutePath(child.to_string()));
        }
        let mut joined = String::with_capacity(self.0.len() + child.len() + 1);
        joined.push_str(&self.0);
        if !joined.ends_with('/') {
            joined.push('/');
        }
        joined.push_str(child);
        Self::new(joined)
    }
}

fn validate(path: &str) -> Result<(), PathError> {
    if path.is_empty() {
        return Err(PathError::EmptyPath("Path is empty".into()));
    }
    if path.contains('\0') {
        return Err(PathError::InvalidPathFormat(
            "Path must not contain null characters".into(),
        ));
    }
    Ok(())
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPath({:?})", &*self.0)
    }
}

impl TryFrom<&str> for VirtualPath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for VirtualPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl AsRef<str> for VirtualPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_relative_absolute_and_dot_paths() {
        for path in ["tmp", "/path1", "/path1/", "/path/.", ".", ".."] {
            let virtual_path = VirtualPath::new(path).unwrap();
            assert_eq!(virtual_path.as_str(), path);
            assert_eq!(virtual_path.as_bytes(), path.as_bytes());
        }
    }

    #[test]
    fn rejects_empty_path() {
        assert!(matches!(VirtualPath::new(""), Err(PathError::EmptyPath(_))));
    }

    #[test]
    fn rejects_nul_bytes() {
        for path in ["\0", "/path1\0", "/path1\0/path2"] {
            assert!(matches!(
                VirtualPath::new(path),
                Err(PathError::InvalidPathFormat(_))
            ));
        }
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert!(matches!(
            VirtualPath::from_utf8(&[b'a', 0xff]),
            Err(PathError::InvalidPathFormat(_))
        ));
    }

    #[test]
    fn directory_request_and_absolute() {
        let cases = [
            ("tmp", false, false),
            ("tmp/", true, false),
            (".", false, false),
            ("/", true, true),
            ("/tmp", false, true),
        ];
        for (path, dir_request, absolute) in cases {
            let virtual_path = VirtualPath::new(path).unwrap();
            assert_eq!(virtual_path.is_directory_request(), dir_request, "{path}");
            assert_eq!(virtual_path.is_absolute(), absolute, "{path}");
        }
    }

    #[test]
    fn join_inserts_single_separator() {
        let base = VirtualPath::new("/sandbox/").unwrap();
        assert_eq!(base.join("a/b").unwrap().as_str(), "/sandbox/a/b");
        let base = VirtualPath::new("/sandbox").unwrap();
        assert_eq!(base.join("a").unwrap().as_str(), "/sandbox/a");
        assert!(base.join("/etc").is_err());
    }

    #[test]
    fn path_errors_map_to_error_kinds() {
        let err: FsError = PathError::PathOutsideOfRootPath("..".into()).into();
        assert_eq!(err.kind(), ErrorKind::NotCapable);
        let err: FsError = PathError::EmptyPath(String::new()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
