use crate::*;

/// Bind a non-blocking UDP socket and grow its send buffer to the largest
/// size the kernel will allow, found by binary search. Large send buffers
/// let bursts of reply datagrams go out without drops.
///
/// A `std` socket is returned so that it can be cloned once per worker
/// thread before each clone is registered with that worker's event loop.
pub fn udp_socket(addr: SocketAddr) -> Result<std::net::UdpSocket> {
    let socket = std::net::UdpSocket::bind(addr)?;
    socket.set_nonblocking(true)?;
    maximize_sndbuf(socket.as_raw_fd());
    Ok(socket)
}

fn maximize_sndbuf(fd: libc::c_int) {
    let mut old: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
    let res = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_SNDBUF,
            &mut old as *mut _ as *mut libc::c_void,
            &mut len,
        )
    };
    if res != 0 {
        return;
    }

    let mut min = old;
    let mut max: libc::c_int = 256 * 1024 * 1024;

    while min <= max {
        let avg = min + (max - min) / 2;
        let res = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_SNDBUF,
                &avg as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if res == 0 {
            min = avg + 1;
        } else {
            max = avg - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_clone_and_send() {
        let a = udp_socket("127.0.0.1:0".parse().unwrap()).unwrap();
        let b = udp_socket("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = b.local_addr().unwrap();
        let clone = a.try_clone().unwrap();
        clone.send_to(b"ping", addr).unwrap();
    }
}
