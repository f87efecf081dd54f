//! Sandboxed path resolution with manual symlink expansion.
//!
//! Paths are walked one component at a time from a base directory handle.
//! Symlinks are expanded by the resolver itself, so a link can never point
//! the walk above the base directory: every `..` is applied to the stack of
//! handles opened so far, and popping the base is an escape attempt.
//!
//! Work is bounded by [`VfsConfig::max_open_directory_handles`] and
//! [`VfsConfig::max_symlink_expansions`].

use crate::context::VfsConfig;
use crate::error::{ErrorKind, FsError, VfsResult};
use crate::path::VirtualPath;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::fmt;

/// A path component opened relative to a directory.
#[derive(Debug)]
pub enum Component<H> {
    Directory(H),
    /// A symlink, with the text of its target.
    Symlink { handle: H, target: String },
    /// Anything else: regular files, devices, entries that do not exist yet.
    Other(H),
}

impl<H> Component<H> {
    pub fn handle(&self) -> &H {
        match self {
            Self::Directory(handle) | Self::Other(handle) => handle,
            Self::Symlink { handle, .. } => handle,
        }
    }

    pub fn into_handle(self) -> H {
        match self {
            Self::Directory(handle) | Self::Other(handle) => handle,
            Self::Symlink { handle, .. } => handle,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }
}

/// Backend primitives used by [`SymlinkResolver`].
pub trait ComponentOpener {
    type Handle;

    /// Opens `name` relative to the directory `base`.
    ///
    /// `is_basename` is set for the last component of the path. A trailing
    /// `/` is kept on the basename to request a directory.
    fn open(
        &mut self,
        base: &Self::Handle,
        name: &str,
        is_basename: bool,
    ) -> VfsResult<Component<Self::Handle>>;

    fn close(&mut self, handle: Self::Handle) -> VfsResult<()>;

    /// Opens the host root directory. Only used when escaping the base is
    /// allowed.
    fn open_root(&mut self) -> VfsResult<Self::Handle> {
        Err(FsError::not_capable("Root access is not allowed"))
    }
}

/// What happens when a path climbs above the base or is absolute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EscapePolicy {
    /// Fail with `NotCapable`.
    #[default]
    Deny,
    /// Follow the host filesystem above the base directory.
    Allow,
}

#[derive(Clone, Copy, Debug)]
pub struct ResolveOptions {
    /// Expand a symlink in the last component.
    pub follow_basename: bool,
    pub escape: EscapePolicy,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            follow_basename: true,
            escape: EscapePolicy::Deny,
        }
    }
}

struct Opened<H> {
    component: Component<H>,
    /// Reached through `..` above the base (only with [`EscapePolicy::Allow`]).
    ascent: bool,
}

type PendingComponents = VecDeque<String>;

pub struct SymlinkResolver<'a, O: ComponentOpener> {
    opener: &'a mut O,
    base: &'a O::Handle,
    config: &'a VfsConfig,
    options: ResolveOptions,
}

impl<'a, O: ComponentOpener> SymlinkResolver<'a, O> {
    pub fn new(
        opener: &'a mut O,
        base: &'a O::Handle,
        config: &'a VfsConfig,
        options: ResolveOptions,
    ) -> Self {
        Self {
            opener,
            base,
            config,
            options,
        }
    }

    /// Resolves `path` and returns the opened last component.
    ///
    /// The result is always a handle owned by the caller, never `base`
    /// itself: a path that resolves to the base re-opens `.`. Every
    /// intermediate handle is closed before returning, on success and on
    /// failure.
    pub fn resolve(self, path: &VirtualPath) -> VfsResult<Component<O::Handle>> {
        let Self {
            opener,
            base,
            config,
            options,
        } = self;
        let mut walk = Walk {
            base,
            config,
            options,
            paths: SmallVec::new(),
            expansions: 0,
        };
        let mut state = scopeguard::guard(
            (opener, SmallVec::<[Opened<O::Handle>; 8]>::new()),
            |(opener, mut opened)| {
                while let Some(entry) = opened.pop() {
                    if let Err(err) = opener.close(entry.component.into_handle()) {
                        tracing::warn!(
                            error = %err,
                            "failed to close handle during path resolution"
                        );
                    }
                }
            },
        );
        let (opener, opened) = &mut *state;
        walk.push_path(&mut **opener, opened, path.as_str())?;
        walk.run(&mut **opener, opened)?;

        match opened.pop() {
            Some(last) => Ok(last.component),
            None => opener.open(base, ".", true),
        }
    }
}

struct Walk<'a, H> {
    base: &'a H,
    config: &'a VfsConfig,
    options: ResolveOptions,
    paths: SmallVec<[PendingComponents; 4]>,
    expansions: usize,
}

impl<H> Walk<'_, H> {
    fn run<O>(&mut self, opener: &mut O, opened: &mut SmallVec<[Opened<H>; 8]>) -> VfsResult<()>
    where
        O: ComponentOpener<Handle = H> + ?Sized,
    {
        while let Some(current) = self.paths.last_mut() {
            let Some(component) = current.pop_front() else {
                // symlink target fully walked
                self.paths.pop();
                continue;
            };
            match component.as_str() {
                // `.` names the directory it follows
                "" | "." | "./" => {
                    self.top(opened)?;
                }
                ".." | "../" => self.parent(opener, opened, &component)?,
                _ => self.open_component(opener, opened, &component)?,
            }
        }
        Ok(())
    }

    fn is_basename(&self) -> bool {
        self.paths.iter().all(VecDeque::is_empty)
    }

    fn top<'s>(&'s self, opened: &'s [Opened<H>]) -> VfsResult<&'s H> {
        match opened.last() {
            None => Ok(self.base),
            Some(Opened {
                component: Component::Directory(handle),
                ..
            }) => Ok(handle),
            Some(_) => Err(FsError::not_directory(
                "A component in path is not a directory",
            )),
        }
    }

    fn parent<O>(
        &mut self,
        opener: &mut O,
        opened: &mut SmallVec<[Opened<H>; 8]>,
        component: &str,
    ) -> VfsResult<()>
    where
        O: ComponentOpener<Handle = H> + ?Sized,
    {
        let climbs_above_base = opened.last().is_none_or(|entry| entry.ascent);
        if !climbs_above_base {
            self.top(opened)?;
            if let Some(dropped) = opened.pop() {
                opener.close(dropped.component.into_handle())?;
            }
            return Ok(());
        }
        if self.options.escape == EscapePolicy::Deny {
            return Err(FsError::not_capable("Path outside of root path"));
        }
        let is_basename = self.is_basename();
        let handle = opener.open(self.top(opened)?, component, is_basename)?;
        self.push_handle(opened, handle, true)
    }

    fn open_component<O>(
        &mut self,
        opener: &mut O,
        opened: &mut SmallVec<[Opened<H>; 8]>,
        component: &str,
    ) -> VfsResult<()>
    where
        O: ComponentOpener<Handle = H> + ?Sized,
    {
        let is_basename = self.is_basename();
        let opened_component = opener
            .open(self.top(opened)?, component, is_basename)
            .map_err(open_error_to_resolve_error)?;
        tracing::trace!(component, is_basename, "path component opened");

        match opened_component {
            Component::Symlink { handle, target }
                if !is_basename || self.options.follow_basename =>
            {
                opener.close(handle)?;
                self.push_path(opener, opened, &target)
            }
            other => self.push_handle(opened, other, false),
        }
    }

    fn push_handle(
        &mut self,
        opened: &mut SmallVec<[Opened<H>; 8]>,
        component: Component<H>,
        ascent: bool,
    ) -> VfsResult<()> {
        // the base handle counts against the limit
        if opened.len() + 1 >= self.config.max_open_directory_handles {
            // `opened` is closed by the caller's guard; this one is not in it yet
            opened.push(Opened { component, ascent });
            return Err(FsError::name_too_long("Too many handles opened"));
        }
        opened.push(Opened { component, ascent });
        Ok(())
    }

    fn push_path<O>(
        &mut self,
        opener: &mut O,
        opened: &mut SmallVec<[Opened<H>; 8]>,
        path: &str,
    ) -> VfsResult<()>
    where
        O: ComponentOpener<Handle = H> + ?Sized,
    {
        if self.expansions >= self.config.max_symlink_expansions {
            return Err(FsError::too_many_symlinks(
                "Too many levels of symbolic links",
            ));
        }
        let relative = match path.strip_prefix('/') {
            None => path,
            Some(_) if self.options.escape == EscapePolicy::Deny => {
                return Err(FsError::not_capable("Absolute path"));
            }
            Some(rest) => {
                while let Some(entry) = opened.pop() {
                    opener.close(entry.component.into_handle())?;
                }
                let root = opener.open_root()?;
                self.push_handle(opened, Component::Directory(root), true)?;
                rest
            }
        };
        let components = split_to_components(relative, path.starts_with('/'))?;
        self.expansions += 1;
        self.paths.push(components);
        Ok(())
    }
}

/// Splits a relative path on `/`.
///
/// A trailing separator is folded into the last non-empty component, which
/// then keeps requesting a directory. `allow_empty` accepts `""` (the root
/// itself after its `/` was stripped).
fn split_to_components(path: &str, allow_empty: bool) -> VfsResult<PendingComponents> {
    let mut components: PendingComponents = path.split('/').map(str::to_owned).collect();
    if components.back().is_some_and(|last| !last.is_empty()) {
        return Ok(components);
    }
    while let Some(last) = components.pop_back() {
        if !last.is_empty() {
            components.push_back(format!("{last}/"));
            break;
        }
    }
    if components.is_empty() && !allow_empty {
        return Err(FsError::invalid_argument("Empty path"));
    }
    Ok(components)
}

fn open_error_to_resolve_error(err: FsError) -> FsError {
    match err.kind() {
        ErrorKind::Mlink => err.with_kind(ErrorKind::TooManySymbolicLinks),
        ErrorKind::NotCapable => FsError::not_capable(format!(
            "Escape from root during path resolution detected: {}",
            err.message()
        )),
        _ => err,
    }
}

impl<O: ComponentOpener> fmt::Debug for SymlinkResolver<'_, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymlinkResolver")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::split_to_components;

    fn split(path: &str) -> Vec<String> {
        split_to_components(path, false).unwrap().into_iter().collect()
    }

    #[test]
    fn splits_components() {
        assert_eq!(split("a/b"), vec!["a", "b"]);
        assert_eq!(split("a//b"), vec!["a", "", "b"]);
        assert_eq!(split("a/b/"), vec!["a", "b/"]);
        assert_eq!(split("a/b//"), vec!["a", "b/"]);
        assert_eq!(split("../"), vec!["../"]);
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(split_to_components("", false).is_err());
        assert!(split_to_components("//", false).is_err());
        assert!(split_to_components("", true).unwrap().is_empty());
    }
}
