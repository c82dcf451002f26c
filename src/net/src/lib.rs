pub use mio::net::UdpSocket;
pub use mio::*;

pub mod event {
    pub use mio::event::*;
}

mod listener;
mod stream;
mod udp;

pub use listener::Listener;
pub use stream::Stream;
pub use udp::udp_socket;

use metriken::{metric, Counter};

use std::io::{Read, Write};
use std::net::SocketAddr;
use std::os::unix::io::AsRawFd;

type Result<T> = std::io::Result<T>;

#[metric(name = "stream_accept", description = "streams accepted")]
static STREAM_ACCEPT: Counter = Counter::new();

#[metric(
    name = "stream_accept_ex",
    description = "exceptions while accepting streams"
)]
static STREAM_ACCEPT_EX: Counter = Counter::new();

/// Set `SO_KEEPALIVE` and a zero-timeout `SO_LINGER` on an accepted TCP
/// stream so that closed connections reset instead of lingering in
/// `TIME_WAIT`.
fn configure_tcp(stream: &mio::net::TcpStream) -> Result<()> {
    let fd = stream.as_raw_fd();

    let keepalive: libc::c_int = 1;
    let res = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_KEEPALIVE,
            &keepalive as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if res != 0 {
        return Err(std::io::Error::last_os_error());
    }

    let linger = libc::linger {
        l_onoff: 0,
        l_linger: 0,
    };
    let res = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_LINGER,
            &linger as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::linger>() as libc::socklen_t,
        )
    };
    if res != 0 {
        return Err(std::io::Error::last_os_error());
    }

    Ok(())
}
