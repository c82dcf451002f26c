//! Abstractions for bi-directional buffered communications on top of
//! streams. This allows for efficient reading and writing for
//! stream-oriented communication in a request/response oriented server.

mod buffer;
mod pool;
mod server;

pub use buffer::*;
pub use pool::BufferPool;
pub use server::ServerSession;

use metriken::{metric, Counter, Gauge};
use ::net::*;

use core::borrow::{Borrow, BorrowMut};
use core::fmt::Debug;
use std::io::{ErrorKind, Read, Result, Write};

// The size of one kilobyte, in bytes
const KB: usize = 1024;

// If the read buffer has less than this amount available before a read, we
// will grow the read buffer. The selected value is the size of a single page.
const BUFFER_MIN_FREE: usize = 4 * KB;

// The target size of the read operations, and the default session buffer
// size.
pub const TARGET_READ_SIZE: usize = 16 * KB;

#[metric(
    name = "session_buffer_byte",
    description = "current size of the session buffers in bytes"
)]
pub static SESSION_BUFFER_BYTE: Gauge = Gauge::new();

#[metric(name = "session_recv", description = "number of reads from sessions")]
pub static SESSION_RECV: Counter = Counter::new();

#[metric(
    name = "session_recv_ex",
    description = "number of exceptions while reading from sessions"
)]
pub static SESSION_RECV_EX: Counter = Counter::new();

#[metric(
    name = "bytes_read",
    description = "number of bytes read from sessions"
)]
pub static BYTES_READ: Counter = Counter::new();

#[metric(name = "session_send", description = "number of writes to sessions")]
pub static SESSION_SEND: Counter = Counter::new();

#[metric(
    name = "session_send_ex",
    description = "number of exceptions while writing to sessions"
)]
pub static SESSION_SEND_EX: Counter = Counter::new();

#[metric(
    name = "bytes_written",
    description = "number of bytes written to sessions"
)]
pub static BYTES_WRITTEN: Counter = Counter::new();

/// A `Session` is an underlying `Stream` with its read and write buffers.
/// This abstraction allows the caller to efficiently read from the underlying
/// stream by buffering the incoming bytes. It also allows for efficient
/// writing by first buffering writes to the underlying stream.
pub struct Session {
    stream: Stream,
    read_buffer: Buffer,
    write_buffer: Buffer,
}

impl Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        write!(f, "{:?}", self.stream)
    }
}

impl Session {
    /// Construct a new `Session` from a `Stream` and read and write
    /// `Buffer`s.
    pub fn new(stream: Stream, read_buffer: Buffer, write_buffer: Buffer) -> Self {
        Self {
            stream,
            read_buffer,
            write_buffer,
        }
    }

    /// Return the event `Interest`s for the `Session`.
    pub fn interest(&self) -> Interest {
        if self.write_buffer.has_remaining() {
            self.stream.interest().add(Interest::WRITABLE)
        } else {
            self.stream.interest()
        }
    }

    /// Fill the read buffer by calling read on the underlying stream until
    /// read would block. Returns the number of bytes read. `Ok(0)` indicates
    /// that the remote side has closed the stream.
    pub fn fill(&mut self) -> Result<usize> {
        SESSION_RECV.increment();
        let mut read = 0;

        loop {
            // if the buffer has too little space available, expand it
            if self.read_buffer.remaining_mut() < BUFFER_MIN_FREE {
                self.read_buffer.reserve(TARGET_READ_SIZE);
            }

            // read directly into the read buffer
            match self.stream.read(self.read_buffer.borrow_mut()) {
                Ok(0) => {
                    // This means the underlying stream is closed, we need to
                    // notify the caller by returning this result.
                    return Ok(0);
                }
                Ok(n) => {
                    // Successfully read 'n' bytes from the stream into the
                    // buffer. Advance the write position.
                    unsafe {
                        self.read_buffer.advance_mut(n);
                    }
                    read += n;
                }
                Err(e) => match e.kind() {
                    ErrorKind::WouldBlock => {
                        if read == 0 {
                            return Err(e);
                        } else {
                            break;
                        }
                    }
                    ErrorKind::Interrupted => {}
                    _ => {
                        SESSION_RECV_EX.increment();
                        return Err(e);
                    }
                },
            }
        }

        BYTES_READ.add(read as _);
        Ok(read)
    }

    /// Mark `amt` bytes as consumed from the read buffer.
    pub fn consume(&mut self, amt: usize) {
        self.read_buffer.advance(amt)
    }

    /// Return the number of bytes currently in the read buffer.
    pub fn read_pending(&self) -> usize {
        self.read_buffer.remaining()
    }

    /// Return the number of bytes currently in the write buffer.
    pub fn write_pending(&self) -> usize {
        self.write_buffer.remaining()
    }

    /// Attempts to flush the write buffer to the underlying `Stream`. This
    /// may result in multiple calls to write on the underlying stream.
    pub fn flush(&mut self) -> Result<usize> {
        SESSION_SEND.increment();
        let mut flushed = 0;
        while self.write_buffer.has_remaining() {
            match self.stream.write(self.write_buffer.borrow()) {
                Ok(amt) => {
                    self.write_buffer.advance(amt);
                    flushed += amt;
                }
                Err(e) => match e.kind() {
                    ErrorKind::WouldBlock => {
                        // returns `WouldBlock` if no bytes were flushed
                        if flushed == 0 {
                            return Err(e);
                        }
                        break;
                    }
                    ErrorKind::Interrupted => {
                        // this should be retried immediately
                    }
                    _ => {
                        SESSION_SEND_EX.increment();
                        return Err(e);
                    }
                },
            }
        }

        BYTES_WRITTEN.add(flushed as _);
        Ok(flushed)
    }

    /// Shutdown the underlying stream.
    pub fn shutdown(&self) {
        let _ = self.stream.shutdown();
    }

    /// Consume the session, returning its buffers so they can be returned to
    /// a pool.
    pub fn into_buffers(self) -> (Buffer, Buffer) {
        (self.read_buffer, self.write_buffer)
    }

    pub fn read_buffer_mut(&mut self) -> &mut Buffer {
        &mut self.read_buffer
    }

    pub fn write_buffer_mut(&mut self) -> &mut Buffer {
        &mut self.write_buffer
    }
}

impl From<Stream> for Session {
    fn from(other: Stream) -> Self {
        Self::new(
            other,
            Buffer::new(TARGET_READ_SIZE),
            Buffer::new(TARGET_READ_SIZE),
        )
    }
}

impl Borrow<[u8]> for Session {
    fn borrow(&self) -> &[u8] {
        self.read_buffer.borrow()
    }
}

impl Buf for Session {
    fn remaining(&self) -> usize {
        self.read_buffer.remaining()
    }

    fn chunk(&self) -> &[u8] {
        self.read_buffer.chunk()
    }

    fn advance(&mut self, amt: usize) {
        self.read_buffer.advance(amt)
    }
}

unsafe impl BufMut for Session {
    fn remaining_mut(&self) -> usize {
        self.write_buffer.remaining_mut()
    }

    unsafe fn advance_mut(&mut self, amt: usize) {
        self.write_buffer.advance_mut(amt)
    }

    fn chunk_mut(&mut self) -> &mut UninitSlice {
        self.write_buffer.chunk_mut()
    }

    fn put<T: Buf>(&mut self, src: T)
    where
        Self: Sized,
    {
        self.write_buffer.put(src)
    }

    fn put_slice(&mut self, src: &[u8]) {
        self.write_buffer.put_slice(src)
    }
}

impl event::Source for Session {
    fn register(&mut self, registry: &Registry, token: Token, interest: Interest) -> Result<()> {
        self.stream.register(registry, token, interest)
    }

    fn reregister(&mut self, registry: &Registry, token: Token, interest: Interest) -> Result<()> {
        self.stream.reregister(registry, token, interest)
    }

    fn deregister(&mut self, registry: &Registry) -> Result<()> {
        self.stream.deregister(registry)
    }
}
