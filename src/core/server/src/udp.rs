//! UDP transport. Every datagram starts with an 8-byte frame header:
//! request id (2), sequence number (2), datagram count (2), and a reserved
//! field (2). Only single-datagram requests are supported; replies are
//! split across as many datagrams as needed, sharing the request id.

use crate::*;

use std::net::SocketAddr;

const UDP_HEADER_SIZE: usize = 8;

/// The largest reply datagram, header included. Chosen to stay under
/// typical path MTUs rather than relying on IP fragmentation.
const UDP_MAX_PAYLOAD_SIZE: usize = 1400;

// enough for the largest single-datagram request
const UDP_READ_BUFFER_SIZE: usize = 64 * 1024;

pub(crate) struct UdpServer {
    socket: UdpSocket,
    read_buffer: Box<[u8]>,
    write_buffer: Vec<u8>,
}

impl UdpServer {
    pub fn new(socket: UdpSocket) -> Self {
        Self {
            socket,
            read_buffer: vec![0; UDP_READ_BUFFER_SIZE].into_boxed_slice(),
            write_buffer: Vec::new(),
        }
    }

    /// Receive and answer datagrams until the socket would block.
    pub fn handle<Parser, Request, Response, Storage>(
        &mut self,
        parser: &Parser,
        storage: &mut Storage,
    ) where
        Parser: Parse<Request> + Clone,
        Response: Compose,
        Storage: Execute<Request, Response>,
    {
        loop {
            let (len, addr) = match self.socket.recv_from(&mut self.read_buffer) {
                Ok(received) => received,
                Err(e) => {
                    if e.kind() != ErrorKind::WouldBlock {
                        debug!("error receiving datagram: {}", e);
                    }
                    return;
                }
            };

            if len <= UDP_HEADER_SIZE {
                continue;
            }

            session::BYTES_READ.add(len as _);

            let request_id =
                u16::from_be_bytes([self.read_buffer[0], self.read_buffer[1]]);
            let seq = u16::from_be_bytes([self.read_buffer[2], self.read_buffer[3]]);
            let total = u16::from_be_bytes([self.read_buffer[4], self.read_buffer[5]]);

            self.write_buffer.clear();

            if seq != 0 || total != 1 {
                self.write_buffer
                    .extend_from_slice(b"SERVER_ERROR multi-packet request not supported\r\n");
                self.send_reply(request_id, addr);
                continue;
            }

            // each datagram gets a fresh protocol latch
            let parser = parser.clone();
            let payload = &self.read_buffer[UDP_HEADER_SIZE..len];

            match parser.parse(payload) {
                Ok(parsed) => {
                    let request = parsed.into_inner();
                    let response = storage.execute(&request);
                    response.compose(&mut self.write_buffer);
                    self.send_reply(request_id, addr);
                }
                Err(_) => {
                    // a datagram either holds a complete request or it is
                    // unanswerable; there is no stream to wait on or close
                    trace!("dropping unparseable datagram");
                }
            }
        }
    }

    /// Split the composed reply into datagrams and send them. The sequence
    /// number counts up from zero and every datagram carries the total
    /// count.
    fn send_reply(&mut self, request_id: u16, addr: SocketAddr) {
        if self.write_buffer.is_empty() {
            return;
        }

        let chunks: Vec<&[u8]> = self
            .write_buffer
            .chunks(UDP_MAX_PAYLOAD_SIZE - UDP_HEADER_SIZE)
            .collect();
        let total = chunks.len() as u16;

        for (seq, chunk) in chunks.iter().enumerate() {
            let mut datagram = Vec::with_capacity(UDP_HEADER_SIZE + chunk.len());
            datagram.extend_from_slice(&request_id.to_be_bytes());
            datagram.extend_from_slice(&(seq as u16).to_be_bytes());
            datagram.extend_from_slice(&total.to_be_bytes());
            datagram.extend_from_slice(&0u16.to_be_bytes());
            datagram.extend_from_slice(chunk);

            match self.socket.send_to(&datagram, addr) {
                Ok(sent) => {
                    session::BYTES_WRITTEN.add(sent as _);
                }
                Err(e) => {
                    debug!("error sending reply datagram: {}", e);
                    return;
                }
            }
        }
    }
}
