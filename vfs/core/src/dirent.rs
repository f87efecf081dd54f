//! Directory entries and resumable directory listings.
//!
//! Cookies are positions in the listing: the entry with cookie `n` is the
//! `n`-th entry (1-based). Reading from cookie `n` resumes after that entry.

use crate::error::VfsResult;
use crate::stat::FileType;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DirEntry {
    pub name: String,
    pub file_type: FileType,
    /// `0` when the backend cannot provide a stable inode.
    pub inode: u64,
    pub cookie: u64,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, file_type: FileType, inode: u64) -> Self {
        let file_type = if inode == 0 { FileType::Unknown } else { file_type };
        Self {
            name: name.into(),
            file_type,
            inode,
            cookie: 0,
        }
    }

    pub fn is_dot_or_dot_dot(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// Where a directory listing starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum DirSequenceStartPosition {
    #[default]
    Start,
    /// Resume after the entry that carried this cookie.
    Cookie(u64),
}

impl DirSequenceStartPosition {
    pub fn skip_count(self) -> u64 {
        match self {
            Self::Start => 0,
            Self::Cookie(cookie) => cookie,
        }
    }
}

/// Assigns 1-based position cookies and skips the first `start_offset`
/// entries of the wrapped listing.
pub struct OffsetCookieDecorator<I> {
    inner: I,
    start_offset: u64,
    position: u64,
}

impl<I> OffsetCookieDecorator<I>
where
    I: Iterator<Item = VfsResult<DirEntry>>,
{
    pub fn new(inner: I, start_offset: u64) -> Self {
        Self {
            inner,
            start_offset,
            position: 0,
        }
    }
}

impl<I> Iterator for OffsetCookieDecorator<I>
where
    I: Iterator<Item = VfsResult<DirEntry>>,
{
    type Item = VfsResult<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(Err(err)),
            };
            self.position += 1;
            if self.position <= self.start_offset {
                continue;
            }
            return Some(Ok(DirEntry {
                cookie: self.position,
                ..entry
            }));
        }
    }
}

/// Yields synthesized `.` and `..` first, then the wrapped listing without
/// any native `.`/`..` entries.
pub struct DotEntriesDecorator<I> {
    dots: std::array::IntoIter<DirEntry, 2>,
    inner: I,
}

impl<I> DotEntriesDecorator<I>
where
    I: Iterator<Item = VfsResult<DirEntry>>,
{
    pub fn new(current: DirEntry, parent: DirEntry, inner: I) -> Self {
        Self {
            dots: [current, parent].into_iter(),
            inner,
        }
    }
}

impl<I> Iterator for DotEntriesDecorator<I>
where
    I: Iterator<Item = VfsResult<DirEntry>>,
{
    type Item = VfsResult<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(dot) = self.dots.next() {
            return Some(Ok(dot));
        }
        loop {
            match self.inner.next()? {
                Ok(entry) if entry.is_dot_or_dot_dot() => continue,
                other => return Some(other),
            }
        }
    }
}

/// A lazy, finite, one-shot directory listing.
///
/// Iterating consumes the sequence, so it can be walked by exactly one
/// iterator. Dropping it releases the native directory stream.
pub struct DirEntrySequence {
    description: String,
    entries: Box<dyn Iterator<Item = VfsResult<DirEntry>> + Send>,
}

impl DirEntrySequence {
    /// Wraps a raw backend listing: adds `.`/`..`, then cookies from `start`.
    pub fn new<I>(
        description: impl Into<String>,
        current: DirEntry,
        parent: DirEntry,
        raw: I,
        start: DirSequenceStartPosition,
    ) -> Self
    where
        I: Iterator<Item = VfsResult<DirEntry>> + Send + 'static,
    {
        let with_dots = DotEntriesDecorator::new(current, parent, raw);
        Self {
            description: description.into(),
            entries: Box::new(OffsetCookieDecorator::new(with_dots, start.skip_count())),
        }
    }

    pub fn empty() -> Self {
        Self {
            description: String::from("empty"),
            entries: Box::new(std::iter::empty()),
        }
    }
}

impl IntoIterator for DirEntrySequence {
    type Item = VfsResult<DirEntry>;
    type IntoIter = Box<dyn Iterator<Item = VfsResult<DirEntry>> + Send>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries
    }
}

impl fmt::Debug for DirEntrySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirEntrySequence")
            .field("directory", &self.description)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FsError;
    use pretty_assertions::assert_eq;

    fn dot() -> DirEntry {
        DirEntry::new(".", FileType::Directory, 1)
    }

    fn dot_dot() -> DirEntry {
        DirEntry::new("..", FileType::Directory, 2)
    }

    fn test_dir() -> DirEntry {
        DirEntry::new("testdir", FileType::Directory, 3)
    }

    fn with_cookie(entry: DirEntry, cookie: u64) -> DirEntry {
        DirEntry { cookie, ..entry }
    }

    fn decorate(entries: Vec<DirEntry>, start_offset: u64) -> Vec<DirEntry> {
        OffsetCookieDecorator::new(entries.into_iter().map(Ok), start_offset)
            .collect::<VfsResult<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn offset_cookies_are_one_based() {
        let entries = decorate(vec![dot(), dot_dot(), test_dir()], 0);
        assert_eq!(
            entries,
            vec![
                with_cookie(dot(), 1),
                with_cookie(dot_dot(), 2),
                with_cookie(test_dir(), 3),
            ]
        );
        assert!(decorate(vec![], 0).is_empty());
    }

    #[test]
    fn start_offset_skips_entries() {
        let all = vec![dot(), dot_dot(), test_dir()];
        assert_eq!(
            decorate(all.clone(), 1),
            vec![with_cookie(dot_dot(), 2), with_cookie(test_dir(), 3)]
        );
        assert_eq!(decorate(all.clone(), 2), vec![with_cookie(test_dir(), 3)]);
        assert!(decorate(all.clone(), 3).is_empty());
        assert!(decorate(all, 4).is_empty());
        assert!(decorate(vec![dot()], 1).is_empty());
        assert!(decorate(vec![], 1).is_empty());
    }

    #[test]
    fn errors_pass_through_without_consuming_a_cookie() {
        let raw = vec![Ok(test_dir()), Err(FsError::io("read failed")), Ok(dot())];
        let items: Vec<_> = OffsetCookieDecorator::new(raw.into_iter(), 0).collect();
        assert_eq!(items[0], Ok(with_cookie(test_dir(), 1)));
        assert!(items[1].is_err());
        assert_eq!(items[2], Ok(with_cookie(dot(), 2)));
    }

    #[test]
    fn dot_entries_are_synthesized_once() {
        let raw = vec![Ok(test_dir()), Ok(dot()), Ok(dot_dot())];
        let names: Vec<String> = DirEntrySequence::new(
            "test",
            dot(),
            dot_dot(),
            raw.into_iter(),
            DirSequenceStartPosition::Start,
        )
        .into_iter()
        .map(|entry| entry.unwrap().name)
        .collect();
        assert_eq!(names, vec![".", "..", "testdir"]);
    }

    #[test]
    fn zero_inode_means_unknown_type() {
        let entry = DirEntry::new("file", FileType::RegularFile, 0);
        assert_eq!(entry.file_type, FileType::Unknown);
    }
}
