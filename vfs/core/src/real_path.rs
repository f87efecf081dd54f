//! Host-native paths.
//!
//! A real path is produced by the host side (preopen configuration, path
//! resolution) and is never taken verbatim from the guest.

use crate::path::{PathError, VirtualPath};
use std::fmt;
use std::path::{Path, PathBuf};

/// Host path in the syntax of one platform family.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RealPath {
    Posix(PosixRealPath),
    Windows(WindowsRealPath),
}

impl RealPath {
    /// Parses `path` with the syntax of the platform this crate was built for.
    pub fn native(path: &str) -> Result<Self, PathError> {
        if cfg!(windows) {
            WindowsRealPath::new(path).map(Self::Windows)
        } else {
            PosixRealPath::new(path).map(Self::Posix)
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, PathError> {
        let path = path.to_str().ok_or_else(|| {
            PathError::InvalidPathFormat("Path is not a valid Unicode string".into())
        })?;
        Self::native(path)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Posix(path) => path.as_str(),
            Self::Windows(path) => path.as_str(),
        }
    }

    pub fn is_absolute(&self) -> bool {
        match self {
            Self::Posix(path) => path.is_absolute(),
            Self::Windows(path) => path.is_absolute(),
        }
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(self.as_str())
    }

    /// Guest-facing form of this path, using `/` separators.
    pub fn to_virtual_path(&self) -> Result<VirtualPath, PathError> {
        match self {
            Self::Posix(path) => VirtualPath::new(path.as_str()),
            Self::Windows(path) => VirtualPath::new(path.as_str().replace('\\', "/")),
        }
    }
}

impl fmt::Display for RealPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path on a Unix-like file system.
///
/// Only valid Unicode paths are supported. The separator is `/`, NUL is not
/// allowed, and the empty string is not a path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PosixRealPath(String);

impl PosixRealPath {
    pub fn new(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::EmptyPath("Path is empty".into()));
        }
        if path.contains('\0') {
            return Err(PathError::InvalidPathFormat(
                "Path must not contain null characters".into(),
            ));
        }
        Ok(Self(path.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_absolute(&self) -> bool {
        self.0.starts_with('/')
    }
}

/// Classification of a Windows path string, following the rules of
/// `RtlDetermineDosPathNameType_U`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WindowsPathType {
    /// `C:\Program Files`, `D:/$RECYCLE.BIN`
    DriveAbsolute,
    /// `.\Public`, `../Users`, `Windows\System32`
    Relative,
    /// `C:Public`: relative to the current directory of drive `C:`.
    DriveCurrentDirectoryRelative,
    /// `\Windows\System32`: relative to the drive of the current directory.
    CurrentDriveRelative,
    /// `\\server\share\dir`
    Unc,
    /// `\\.\C:\Windows`
    LocalDeviceNormalized,
    /// `\\?\C:\Windows`
    LocalDeviceLiteral,
    /// `\\?` or `\\.` not followed by a separator.
    RootLocalDevice,
}

impl WindowsPathType {
    pub fn detect(path: &str) -> Self {
        let chars: Vec<char> = path.chars().take(4).collect();
        let is_slash = |c: char| c == '\\' || c == '/';
        match chars.len() {
            0 => return Self::Relative,
            1 => {
                return if is_slash(chars[0]) {
                    Self::CurrentDriveRelative
                } else {
                    Self::Relative
                };
            }
            _ => {}
        }
        let double_slash = is_slash(chars[0]) && is_slash(chars[1]);
        let device_mark = chars.get(2).copied();
        let fourth = chars.get(3).copied();
        if double_slash && device_mark == Some('?') && fourth.is_some_and(is_slash) {
            Self::LocalDeviceLiteral
        } else if double_slash && device_mark == Some('.') && fourth.is_some_and(is_slash) {
            Self::LocalDeviceNormalized
        } else if double_slash
            && matches!(device_mark, Some('.') | Some('?'))
            && (fourth.is_none() || fourth == Some('\0'))
        {
            Self::RootLocalDevice
        } else if double_slash {
            Self::Unc
        } else if is_slash(chars[0]) {
            Self::CurrentDriveRelative
        } else if chars[1] == ':' {
            if chars[0] != '\0' && device_mark.is_some_and(is_slash) {
                Self::DriveAbsolute
            } else if chars[0] != '\0' {
                Self::DriveCurrentDirectoryRelative
            } else {
                Self::Relative
            }
        } else {
            Self::Relative
        }
    }

    /// Length of the root prefix for this path type.
    pub fn prefix_len(self) -> usize {
        match self {
            Self::DriveAbsolute => 3,
            Self::Relative => 0,
            Self::DriveCurrentDirectoryRelative => 2,
            Self::CurrentDriveRelative => 1,
            Self::Unc => 2,
            Self::LocalDeviceNormalized | Self::LocalDeviceLiteral => 4,
            Self::RootLocalDevice => 3,
        }
    }

    pub fn is_absolute(self) -> bool {
        matches!(
            self,
            Self::DriveAbsolute
                | Self::Unc
                | Self::LocalDeviceNormalized
                | Self::LocalDeviceLiteral
                | Self::RootLocalDevice
        )
    }
}

/// Path on a Windows file system. Both `\` and `/` are separators.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WindowsRealPath(String);

impl WindowsRealPath {
    const FORBIDDEN: &'static [char] = &['<', '>', '"', '|', '*'];

    pub fn new(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::EmptyPath("Path is empty".into()));
        }
        if path.contains('\0') {
            return Err(PathError::InvalidPathFormat(
                "Path must not contain null characters".into(),
            ));
        }
        let path_type = WindowsPathType::detect(path);
        let body = path.get(path_type.prefix_len()..).unwrap_or_default();
        // `?` is only valid inside a device prefix
        if body.contains(Self::FORBIDDEN) || body.contains('?') {
            return Err(PathError::InvalidPathFormat(format!(
                "Path `{path}` contains reserved characters"
            )));
        }
        Ok(Self(path.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn path_type(&self) -> WindowsPathType {
        WindowsPathType::detect(&self.0)
    }

    pub fn is_absolute(&self) -> bool {
        self.path_type().is_absolute()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_path_types() {
        let cases = [
            ("", WindowsPathType::Relative),
            ("a", WindowsPathType::Relative),
            ("\\", WindowsPathType::CurrentDriveRelative),
            ("C:\\Program Files (x86)", WindowsPathType::DriveAbsolute),
            ("D:/$RECYCLE.BIN", WindowsPathType::DriveAbsolute),
            (".\\Public", WindowsPathType::Relative),
            ("../Users", WindowsPathType::Relative),
            ("C:Public", WindowsPathType::DriveCurrentDirectoryRelative),
            ("\\Windows\\System32", WindowsPathType::CurrentDriveRelative),
            ("\\\\server\\share\\ABC", WindowsPathType::Unc),
            ("\\\\.\\C:\\Windows", WindowsPathType::LocalDeviceNormalized),
            ("\\\\?\\C:\\Windows", WindowsPathType::LocalDeviceLiteral),
            ("\\\\?", WindowsPathType::RootLocalDevice),
            ("\\\\.", WindowsPathType::RootLocalDevice),
        ];
        for (path, expected) in cases {
            assert_eq!(WindowsPathType::detect(path), expected, "{path}");
        }
    }

    #[test]
    fn windows_path_validation() {
        assert!(WindowsRealPath::new("C:\\tmp\\file.txt").is_ok());
        assert!(WindowsRealPath::new("\\\\?\\C:\\tmp").is_ok());
        assert!(WindowsRealPath::new("C:\\tmp\\a|b").is_err());
        assert!(WindowsRealPath::new("C:\\tmp\\a?b").is_err());
        assert!(WindowsRealPath::new("").is_err());
    }

    #[test]
    fn windows_virtual_form() {
        let path = WindowsRealPath::new("C:\\sandbox\\dir\\file.txt").unwrap();
        let virtual_path = RealPath::Windows(path).to_virtual_path().unwrap();
        assert_eq!(virtual_path.as_str(), "C:/sandbox/dir/file.txt");
    }

    #[test]
    fn posix_path_validation() {
        assert!(PosixRealPath::new("/tmp/a").unwrap().is_absolute());
        assert!(!PosixRealPath::new("tmp").unwrap().is_absolute());
        assert!(PosixRealPath::new("/tmp\0").is_err());
    }
}
