//! Descriptor table.
//!
//! Maps guest descriptors to shared resources. Every access goes through one
//! reentrant lock, so a caller can hold it across several table calls with
//! [`FileDescriptorTable::with_lock`] and still call back into the table.

use crate::error::{ErrorKind, FsError, VfsResult};
use crate::ids::Fd;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

pub struct FileDescriptorTable<R> {
    inner: ReentrantMutex<RefCell<Slots<R>>>,
}

struct Slots<R> {
    entries: Vec<Option<Arc<R>>>,
    first_usable: usize,
    max_descriptors: usize,
    open: usize,
}

impl<R> Slots<R> {
    fn get(&self, fd: Fd) -> Option<&Arc<R>> {
        self.entries.get(fd.index()).and_then(Option::as_ref)
    }

    fn insert(&mut self, fd: Fd, resource: Arc<R>) -> Option<Arc<R>> {
        let index = fd.index();
        if index >= self.entries.len() {
            self.entries.resize_with(index + 1, || None);
        }
        let previous = self.entries[index].replace(resource);
        if previous.is_none() {
            self.open += 1;
        }
        previous
    }

    fn remove(&mut self, fd: Fd) -> Option<Arc<R>> {
        let removed = self.entries.get_mut(fd.index()).and_then(Option::take);
        if removed.is_some() {
            self.open -= 1;
        }
        removed
    }

    fn lowest_free(&self) -> Option<Fd> {
        let index = (self.first_usable..self.max_descriptors)
            .find(|index| self.entries.get(*index).is_none_or(Option::is_none))?;
        Fd::from_index(index)
    }
}

impl<R> FileDescriptorTable<R> {
    pub const DEFAULT_MAX_DESCRIPTORS: usize = 1024;

    pub fn new() -> Self {
        Self::with_limits(Fd::FIRST_PREOPEN, Self::DEFAULT_MAX_DESCRIPTORS)
    }

    /// A table allocating descriptors in `first_usable..max_descriptors`.
    pub fn with_limits(first_usable: Fd, max_descriptors: usize) -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(Slots {
                entries: Vec::new(),
                first_usable: first_usable.index(),
                max_descriptors,
                open: 0,
            })),
        }
    }

    /// Runs `f` with the table lock held.
    pub fn with_lock<T>(&self, f: impl FnOnce(&Self) -> T) -> T {
        let _guard = self.inner.lock();
        f(self)
    }

    /// Installs a resource at a fixed descriptor during bootstrap.
    pub fn set_preopened(&self, fd: Fd, resource: R) -> VfsResult<Arc<R>> {
        let guard = self.inner.lock();
        let mut slots = guard.borrow_mut();
        if slots.get(fd).is_some() {
            return Err(FsError::exists(format!("Descriptor {fd} is already in use")));
        }
        let resource = Arc::new(resource);
        slots.insert(fd, Arc::clone(&resource));
        Ok(resource)
    }

    /// Stores `resource` at the lowest free descriptor.
    pub fn allocate(&self, resource: R) -> VfsResult<Fd> {
        let guard = self.inner.lock();
        let mut slots = guard.borrow_mut();
        let Some(fd) = slots.lowest_free() else {
            return Err(FsError::new(
                ErrorKind::Nfile,
                "Too many open file descriptors",
            ));
        };
        slots.insert(fd, Arc::new(resource));
        Ok(fd)
    }

    pub fn get(&self, fd: Fd) -> Option<Arc<R>> {
        let guard = self.inner.lock();
        let slots = guard.borrow();
        slots.get(fd).cloned()
    }

    pub fn contains(&self, fd: Fd) -> bool {
        self.get(fd).is_some()
    }

    /// Removes `fd` from the table. The caller closes the returned resource.
    pub fn release(&self, fd: Fd) -> VfsResult<Arc<R>> {
        let guard = self.inner.lock();
        let mut slots = guard.borrow_mut();
        slots
            .remove(fd)
            .ok_or_else(|| FsError::bad_fd(format!("File descriptor {fd} is not open")))
    }

    /// Moves the resource at `from` to `to`.
    ///
    /// Both descriptors must be open. Returns the resource previously at `to`,
    /// which the caller closes; `None` when `from == to`.
    pub fn renumber(&self, from: Fd, to: Fd) -> VfsResult<Option<Arc<R>>> {
        let guard = self.inner.lock();
        let mut slots = guard.borrow_mut();
        if slots.get(from).is_none() {
            return Err(FsError::bad_fd("Incorrect fromFd"));
        }
        if slots.get(to).is_none() {
            return Err(FsError::bad_fd("Incorrect toFd"));
        }
        if from == to {
            return Ok(None);
        }
        let Some(moved) = slots.remove(from) else {
            return Err(FsError::bad_fd("Incorrect fromFd"));
        };
        Ok(slots.insert(to, moved))
    }

    /// Removes every resource. The caller closes them.
    pub fn drain(&self) -> Vec<(Fd, Arc<R>)> {
        let guard = self.inner.lock();
        let mut slots = guard.borrow_mut();
        slots.open = 0;
        std::mem::take(&mut slots.entries)
            .into_iter()
            .enumerate()
            .filter_map(|(index, slot)| Some((Fd::from_index(index)?, slot?)))
            .collect()
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.lock();
        let slots = guard.borrow();
        slots.open
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open descriptors in ascending order.
    pub fn descriptors(&self) -> Vec<Fd> {
        let guard = self.inner.lock();
        let slots = guard.borrow();
        slots
            .entries
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .filter_map(|(index, _)| Fd::from_index(index))
            .collect()
    }
}

impl<R> Default for FileDescriptorTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for FileDescriptorTable<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDescriptorTable")
            .field("open", &self.descriptors())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_lowest_free_slot_after_preopens() {
        let table = FileDescriptorTable::new();
        table.set_preopened(Fd::STDIN, "stdin").unwrap();
        table.set_preopened(Fd(3), "preopen").unwrap();

        assert_eq!(table.allocate("a").unwrap(), Fd(4));
        assert_eq!(table.allocate("b").unwrap(), Fd(5));
        table.release(Fd(4)).unwrap();
        assert_eq!(table.allocate("c").unwrap(), Fd(4));
        assert_eq!(*table.get(Fd(4)).unwrap(), "c");
    }

    #[test]
    fn release_of_unknown_fd_is_bad_descriptor() {
        let table: FileDescriptorTable<()> = FileDescriptorTable::new();
        let err = table.release(Fd(10)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadFileDescriptor);
    }

    #[test]
    fn exhausted_table_reports_nfile() {
        let table = FileDescriptorTable::with_limits(Fd(3), 5);
        table.allocate(1).unwrap();
        table.allocate(2).unwrap();
        assert_eq!(table.allocate(3).unwrap_err().kind(), ErrorKind::Nfile);
    }

    #[test]
    fn renumber_replaces_target() {
        let table = FileDescriptorTable::new();
        let from = table.allocate("from").unwrap();
        let to = table.allocate("to").unwrap();
        let replaced = table.renumber(from, to).unwrap().unwrap();
        assert_eq!(*replaced, "to");
        assert!(table.renumber(to, to).unwrap().is_none());
        assert!(!table.contains(from));
        assert_eq!(*table.get(to).unwrap(), "from");
        assert_eq!(table.len(), 1);

        assert_eq!(
            table.renumber(Fd(100), to).unwrap_err().kind(),
            ErrorKind::BadFileDescriptor
        );
    }

    #[test]
    fn lock_is_reentrant() {
        let table = FileDescriptorTable::new();
        let fd = table.with_lock(|table| {
            let fd = table.allocate(7).unwrap();
            assert!(table.contains(fd));
            fd
        });
        assert_eq!(table.descriptors(), vec![fd]);
        let drained = table.drain();
        assert_eq!(drained.len(), 1);
        assert!(table.is_empty());
    }
}
