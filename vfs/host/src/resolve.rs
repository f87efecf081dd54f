//! Path resolution against host directory handles.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use vfs_core::resolver::{Component, ComponentOpener, EscapePolicy, ResolveOptions, SymlinkResolver};
use vfs_core::{ErrorKind, FileType, FsError, StructStat, VfsConfig, VfsResult, VirtualPath};

use crate::platform::Platform;

/// A resolved path: an opened directory, or a name inside an opened
/// directory.
///
/// The last component of a path is never opened, so operations that act on
/// an entry by name (unlink, rename, ...) get its parent directory.
pub(crate) enum Node<D> {
    Directory(Arc<D>),
    Entry { parent: Arc<D>, name: String },
}

impl<D> Node<D> {
    fn entry(parent: &Arc<D>, name: &str) -> Self {
        Self::Entry {
            parent: Arc::clone(parent),
            name: name.to_owned(),
        }
    }

    /// Directory and name to pass to `*at` primitives.
    pub(crate) fn parent_and_name(&self) -> (&Arc<D>, &str) {
        match self {
            Self::Directory(dir) => (dir, "."),
            Self::Entry { parent, name } => (parent, name),
        }
    }

    /// Metadata of the node itself; a symlink is not followed.
    pub(crate) fn stat<P: Platform<Dir = D>>(&self) -> VfsResult<StructStat> {
        match self {
            Self::Directory(dir) => P::stat_dir(dir),
            Self::Entry { parent, name } => P::stat_at(parent, name, false),
        }
    }

    /// Like [`Node::stat`], with `None` for a missing entry.
    pub(crate) fn try_stat<P: Platform<Dir = D>>(&self) -> VfsResult<Option<StructStat>> {
        match self.stat::<P>() {
            Ok(stat) => Ok(Some(stat)),
            Err(err) if err.kind() == ErrorKind::NoEntry => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn open_directory<P: Platform<Dir = D>>(&self) -> VfsResult<Arc<D>> {
        match self {
            Self::Directory(dir) => Ok(Arc::clone(dir)),
            Self::Entry { parent, name } => P::open_dir_at(parent, name).map(Arc::new),
        }
    }
}

impl<D> fmt::Debug for Node<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory(_) => f.write_str("Directory"),
            Self::Entry { name, .. } => f.debug_struct("Entry").field("name", name).finish(),
        }
    }
}

/// Opens path components for [`SymlinkResolver`].
///
/// Intermediate directories are opened with `O_NOFOLLOW`; symlinks are
/// reported with their target so that the resolver expands them itself.
struct HostOpener<P>(PhantomData<fn() -> P>);

impl<P: Platform> ComponentOpener for HostOpener<P> {
    type Handle = Node<P::Dir>;

    fn open(
        &mut self,
        base: &Node<P::Dir>,
        name: &str,
        is_basename: bool,
    ) -> VfsResult<Component<Node<P::Dir>>> {
        let Node::Directory(dir) = base else {
            return Err(FsError::not_directory("A component in path is not a directory"));
        };
        let (name, wants_directory) = match name.strip_suffix('/') {
            Some(name) => (name, true),
            None => (name, false),
        };
        if name == "." || name == ".." {
            if is_basename {
                return Ok(Component::Other(Node::entry(dir, name)));
            }
            let opened = P::open_dir_at(dir, name)?;
            return Ok(Component::Directory(Node::Directory(Arc::new(opened))));
        }

        let stat = match P::stat_at(dir, name, false) {
            Ok(stat) => stat,
            // the basename may be created by the operation
            Err(err) if err.kind() == ErrorKind::NoEntry && is_basename => {
                return Ok(Component::Other(Node::entry(dir, name)));
            }
            Err(err) => return Err(err),
        };
        match stat.file_type {
            FileType::SymbolicLink => {
                let mut target = P::readlink_at(dir, name)?;
                if wants_directory && !target.ends_with('/') {
                    target.push('/');
                }
                Ok(Component::Symlink {
                    handle: Node::entry(dir, name),
                    target,
                })
            }
            FileType::Directory if !is_basename => {
                let opened = P::open_dir_at(dir, name)?;
                Ok(Component::Directory(Node::Directory(Arc::new(opened))))
            }
            FileType::Directory => Ok(Component::Other(Node::entry(dir, name))),
            _ if wants_directory => Err(FsError::not_directory(format!(
                "`{name}` is not a directory"
            ))),
            _ => Ok(Component::Other(Node::entry(dir, name))),
        }
    }

    fn close(&mut self, handle: Node<P::Dir>) -> VfsResult<()> {
        drop(handle);
        Ok(())
    }

    fn open_root(&mut self) -> VfsResult<Node<P::Dir>> {
        Ok(Node::Directory(Arc::new(P::root_directory()?)))
    }
}

/// Resolves `path` relative to `base`.
pub(crate) fn resolve<P: Platform>(
    base: &Arc<P::Dir>,
    path: &VirtualPath,
    follow_symlinks: bool,
    unrestricted: bool,
    config: &VfsConfig,
) -> VfsResult<Node<P::Dir>> {
    let base = Node::Directory(Arc::clone(base));
    let mut opener = HostOpener::<P>(PhantomData);
    let options = ResolveOptions {
        follow_basename: follow_symlinks,
        escape: if unrestricted {
            EscapePolicy::Allow
        } else {
            EscapePolicy::Deny
        },
    };
    let resolved = SymlinkResolver::new(&mut opener, &base, config, options).resolve(path)?;
    tracing::trace!(path = %path, node = ?resolved.handle(), "path resolved");
    Ok(resolved.into_handle())
}
