//! Standard input/output streams exposed as descriptors 0, 1 and 2.
//!
//! Streams are opened lazily, on the first read or write, through
//! provider closures. Closing is idempotent; any use after close fails with
//! `BadFileDescriptor`.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use vfs_core::poll::{FdReadiness, Interest, Pollable};
use vfs_core::{FsError, VfsResult};

use crate::io_result;

type OpenSource = dyn Fn() -> io::Result<Box<dyn Read + Send>> + Send + Sync;
type OpenSink = dyn Fn() -> io::Result<Box<dyn Write + Send>> + Send + Sync;

/// Opens the input stream of a stdio descriptor.
#[derive(Clone)]
pub struct SourceProvider {
    open: Arc<OpenSource>,
    native_fd: Option<i32>,
}

impl SourceProvider {
    pub fn new<F>(open: F) -> Self
    where
        F: Fn() -> io::Result<Box<dyn Read + Send>> + Send + Sync + 'static,
    {
        Self {
            open: Arc::new(open),
            native_fd: None,
        }
    }

    /// A source that is always at end of stream.
    pub fn exhausted() -> Self {
        Self::new(|| Ok(Box::new(io::empty())))
    }

    /// The standard input of the host process.
    pub fn host_stdin() -> Self {
        Self {
            native_fd: cfg!(unix).then_some(0),
            ..Self::new(|| Ok(Box::new(io::stdin())))
        }
    }

    /// Native descriptor backing the stream, used for readiness polling.
    pub fn native_fd(&self) -> Option<i32> {
        self.native_fd
    }
}

impl fmt::Debug for SourceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceProvider")
            .field("native_fd", &self.native_fd)
            .finish_non_exhaustive()
    }
}

/// Opens the output stream of a stdio descriptor.
#[derive(Clone)]
pub struct SinkProvider {
    open: Arc<OpenSink>,
    native_fd: Option<i32>,
}

impl SinkProvider {
    pub fn new<F>(open: F) -> Self
    where
        F: Fn() -> io::Result<Box<dyn Write + Send>> + Send + Sync + 'static,
    {
        Self {
            open: Arc::new(open),
            native_fd: None,
        }
    }

    /// A sink that accepts and drops everything.
    pub fn discard() -> Self {
        Self::new(|| Ok(Box::new(io::sink())))
    }

    pub fn host_stdout() -> Self {
        Self {
            native_fd: cfg!(unix).then_some(1),
            ..Self::new(|| Ok(Box::new(io::stdout())))
        }
    }

    pub fn host_stderr() -> Self {
        Self {
            native_fd: cfg!(unix).then_some(2),
            ..Self::new(|| Ok(Box::new(io::stderr())))
        }
    }

    pub fn native_fd(&self) -> Option<i32> {
        self.native_fd
    }
}

impl fmt::Debug for SinkProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkProvider")
            .field("native_fd", &self.native_fd)
            .finish_non_exhaustive()
    }
}

/// Stream providers for the three standard descriptors.
#[derive(Clone, Debug)]
pub struct StandardInputOutput {
    pub stdin: SourceProvider,
    pub stdout: SinkProvider,
    pub stderr: SinkProvider,
}

impl StandardInputOutput {
    /// The host process's own streams.
    pub fn inherit() -> Self {
        Self {
            stdin: SourceProvider::host_stdin(),
            stdout: SinkProvider::host_stdout(),
            stderr: SinkProvider::host_stderr(),
        }
    }

    /// Empty input, discarded output.
    pub fn null() -> Self {
        Self {
            stdin: SourceProvider::exhausted(),
            stdout: SinkProvider::discard(),
            stderr: SinkProvider::discard(),
        }
    }
}

impl Default for StandardInputOutput {
    fn default() -> Self {
        Self::inherit()
    }
}

#[derive(Default)]
struct Streams {
    reader: Option<Box<dyn Read + Send>>,
    writer: Option<Box<dyn Write + Send>>,
    closed: bool,
}

/// A stdio descriptor: one input and one output stream.
pub struct StdioResource {
    source: SourceProvider,
    sink: SinkProvider,
    streams: Mutex<Streams>,
}

impl StdioResource {
    pub fn new(source: SourceProvider, sink: SinkProvider) -> Self {
        Self {
            source,
            sink,
            streams: Mutex::new(Streams::default()),
        }
    }

    pub fn read(&self, buf: &mut [u8]) -> VfsResult<usize> {
        let mut streams = self.streams.lock();
        ensure_open(&streams)?;
        if streams.reader.is_none() {
            streams.reader = Some(io_result("open input stream", (self.source.open)())?);
        }
        match streams.reader.as_deref_mut() {
            Some(reader) => io_result("read", reader.read(buf)),
            None => Err(FsError::io("Input stream is not open")),
        }
    }

    /// Writes all of `buf` and flushes it.
    pub fn write(&self, buf: &[u8]) -> VfsResult<usize> {
        let mut streams = self.streams.lock();
        ensure_open(&streams)?;
        if streams.writer.is_none() {
            streams.writer = Some(io_result("open output stream", (self.sink.open)())?);
        }
        match streams.writer.as_deref_mut() {
            Some(writer) => {
                io_result("write", writer.write_all(buf))?;
                io_result("flush", writer.flush())?;
                Ok(buf.len())
            }
            None => Err(FsError::io("Output stream is not open")),
        }
    }

    pub fn flush(&self) -> VfsResult<()> {
        let mut streams = self.streams.lock();
        ensure_open(&streams)?;
        match streams.writer.as_deref_mut() {
            Some(writer) => io_result("flush", writer.flush()),
            None => Ok(()),
        }
    }

    /// Flushes and drops both streams. Closing twice is not an error.
    pub fn close(&self) -> VfsResult<()> {
        let mut streams = self.streams.lock();
        if streams.closed {
            return Ok(());
        }
        streams.closed = true;
        streams.reader = None;
        match streams.writer.take() {
            Some(mut writer) => io_result("flush", writer.flush()),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.streams.lock().closed
    }

    pub(crate) fn native_fd(&self, interest: Interest) -> Option<i32> {
        match interest {
            Interest::Read => self.source.native_fd(),
            Interest::Write => self.sink.native_fd(),
        }
    }
}

fn ensure_open(streams: &Streams) -> VfsResult<()> {
    if streams.closed {
        return Err(FsError::bad_fd("Stream is closed"));
    }
    Ok(())
}

impl Pollable for StdioResource {
    fn poll_nonblocking(&self, interest: Interest) -> VfsResult<FdReadiness> {
        ensure_open(&self.streams.lock())?;
        #[cfg(unix)]
        {
            if let Some(fd) = self.native_fd(interest) {
                return match crate::platform::unix::poll_fd_now(fd, interest)? {
                    Some((bytes_available, hangup)) => Ok(FdReadiness {
                        bytes_available,
                        hangup,
                    }),
                    None => Err(FsError::again("Stream is not ready")),
                };
            }
        }
        let _ = interest;
        // streams without a native descriptor never block
        Ok(FdReadiness::default())
    }
}

impl fmt::Debug for StdioResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdioResource")
            .field("source", &self.source)
            .field("sink", &self.sink)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn streams_open_lazily() {
        let opened = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&opened);
        let source = SourceProvider::new(move || {
            *counter.lock() += 1;
            Ok(Box::new(Cursor::new(b"hello".to_vec())))
        });
        let stdio = StdioResource::new(source, SinkProvider::discard());
        assert_eq!(*opened.lock(), 0);

        let mut buf = [0; 3];
        assert_eq!(stdio.read(&mut buf).unwrap(), 3);
        assert_eq!(stdio.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(*opened.lock(), 1);
    }

    #[test]
    fn close_is_idempotent() {
        let output = SharedBuffer::default();
        let sink_buffer = output.clone();
        let sink = SinkProvider::new(move || Ok(Box::new(sink_buffer.clone())));
        let stdio = StdioResource::new(SourceProvider::exhausted(), sink);

        assert_eq!(stdio.write(b"out").unwrap(), 3);
        stdio.close().unwrap();
        stdio.close().unwrap();
        assert_eq!(output.0.lock().as_slice(), b"out");
        assert_eq!(
            stdio.write(b"late").unwrap_err().kind(),
            vfs_core::ErrorKind::BadFileDescriptor
        );
    }

    #[test]
    fn exhausted_source_reads_nothing() {
        let stdio = StdioResource::new(SourceProvider::exhausted(), SinkProvider::discard());
        let mut buf = [0; 8];
        assert_eq!(stdio.read(&mut buf).unwrap(), 0);
        assert_eq!(
            stdio.poll_nonblocking(Interest::Read).unwrap(),
            FdReadiness::default()
        );
    }
}
