use crate::*;

use std::fmt::Debug;

/// A wrapper type that unifies types which represent a stream. TCP streams
/// and UNIX-domain streams are both wrapped by this type so that the rest of
/// the server is transport-agnostic.
pub struct Stream {
    inner: StreamType,
}

/// Provides concrete types for stream variants. Since the number of variants
/// is expected to be small, dispatch through enum variants should be more
/// efficient than using a trait for dynamic dispatch.
enum StreamType {
    Tcp(mio::net::TcpStream),
    Unix(mio::net::UnixStream),
}

impl Stream {
    pub fn interest(&self) -> Interest {
        Interest::READABLE
    }

    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            StreamType::Tcp(s) => s.shutdown(std::net::Shutdown::Both),
            StreamType::Unix(s) => s.shutdown(std::net::Shutdown::Both),
        }
    }
}

impl Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        match &self.inner {
            StreamType::Tcp(s) => write!(f, "{:?}", s),
            StreamType::Unix(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<mio::net::TcpStream> for Stream {
    fn from(other: mio::net::TcpStream) -> Self {
        Self {
            inner: StreamType::Tcp(other),
        }
    }
}

impl From<mio::net::UnixStream> for Stream {
    fn from(other: mio::net::UnixStream) -> Self {
        Self {
            inner: StreamType::Unix(other),
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match &mut self.inner {
            StreamType::Tcp(s) => s.read(buf),
            StreamType::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match &mut self.inner {
            StreamType::Tcp(s) => s.write(buf),
            StreamType::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match &mut self.inner {
            StreamType::Tcp(s) => s.flush(),
            StreamType::Unix(s) => s.flush(),
        }
    }
}

impl event::Source for Stream {
    fn register(&mut self, registry: &Registry, token: Token, interest: Interest) -> Result<()> {
        match &mut self.inner {
            StreamType::Tcp(s) => s.register(registry, token, interest),
            StreamType::Unix(s) => s.register(registry, token, interest),
        }
    }

    fn reregister(&mut self, registry: &Registry, token: Token, interest: Interest) -> Result<()> {
        match &mut self.inner {
            StreamType::Tcp(s) => s.reregister(registry, token, interest),
            StreamType::Unix(s) => s.reregister(registry, token, interest),
        }
    }

    fn deregister(&mut self, registry: &Registry) -> Result<()> {
        match &mut self.inner {
            StreamType::Tcp(s) => s.deregister(registry),
            StreamType::Unix(s) => s.deregister(registry),
        }
    }
}
