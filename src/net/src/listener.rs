use crate::*;

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// A listening socket, either TCP or UNIX-domain.
pub struct Listener {
    inner: ListenerType,
}

enum ListenerType {
    Tcp(mio::net::TcpListener),
    Unix(mio::net::UnixListener),
}

impl Listener {
    /// Bind a TCP listening socket with `SO_REUSEADDR`.
    pub fn bind_tcp(addr: SocketAddr) -> Result<Self> {
        // mio's TcpListener::bind sets SO_REUSEADDR
        let listener = mio::net::TcpListener::bind(addr)?;
        Ok(Self {
            inner: ListenerType::Tcp(listener),
        })
    }

    /// Bind a UNIX-domain listening socket at the given path with the given
    /// file mode. Any stale socket file at the path is removed first.
    pub fn bind_unix<P: AsRef<Path>>(path: P, mode: u32) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let listener = mio::net::UnixListener::bind(path)?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
        Ok(Self {
            inner: ListenerType::Unix(listener),
        })
    }

    /// Accepts a new `Stream` and applies the socket options for its
    /// transport.
    ///
    /// An error `e` with `e.kind()` of `ErrorKind::WouldBlock` indicates that
    /// the operation should be retried again in the future.
    pub fn accept(&self) -> Result<Stream> {
        STREAM_ACCEPT.increment();
        let result = self._accept();
        if result.is_err() {
            STREAM_ACCEPT_EX.increment();
        }
        result
    }

    fn _accept(&self) -> Result<Stream> {
        match &self.inner {
            ListenerType::Tcp(listener) => {
                let (stream, _addr) = listener.accept()?;
                let _ = stream.set_nodelay(true);
                let _ = configure_tcp(&stream);
                Ok(Stream::from(stream))
            }
            ListenerType::Unix(listener) => {
                let (stream, _addr) = listener.accept()?;
                Ok(Stream::from(stream))
            }
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        match &self.inner {
            ListenerType::Tcp(listener) => listener.local_addr(),
            ListenerType::Unix(_) => Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "unix-domain listener has no socket address",
            )),
        }
    }
}

impl event::Source for Listener {
    fn register(&mut self, registry: &Registry, token: Token, interests: Interest) -> Result<()> {
        match &mut self.inner {
            ListenerType::Tcp(listener) => listener.register(registry, token, interests),
            ListenerType::Unix(listener) => listener.register(registry, token, interests),
        }
    }

    fn reregister(&mut self, registry: &Registry, token: Token, interests: Interest) -> Result<()> {
        match &mut self.inner {
            ListenerType::Tcp(listener) => listener.reregister(registry, token, interests),
            ListenerType::Unix(listener) => listener.reregister(registry, token, interests),
        }
    }

    fn deregister(&mut self, registry: &Registry) -> Result<()> {
        match &mut self.inner {
            ListenerType::Tcp(listener) => listener.deregister(registry),
            ListenerType::Unix(listener) => listener.deregister(registry),
        }
    }
}
