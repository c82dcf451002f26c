use crate::*;

pub struct ListenerBuilder {
    buffer_pool: Arc<BufferPool>,
    listener: ::net::Listener,
    max_connections: usize,
    nevent: usize,
    poll: Poll,
    timeout: Duration,
    waker: Arc<Waker>,
}

impl ListenerBuilder {
    pub fn new<T: ServerConfig + BufConfig>(config: &T) -> Result<Self> {
        let server = config.server();
        let buf = config.buf();

        let listener = if let Some(path) = server.unix_socket() {
            ::net::Listener::bind_unix(&path, server.unix_mode())?
        } else {
            let addr = server.socket_addr().map_err(|e| {
                error!("{}", e);
                Error::new(ErrorKind::Other, "bad listen address")
            })?;
            ::net::Listener::bind_tcp(addr)?
        };

        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);

        let nevent = server.nevent();
        let timeout = Duration::from_millis(server.timeout() as u64);

        let buffer_pool = Arc::new(BufferPool::new(buf.size(), buf.pool_size()));

        Ok(Self {
            buffer_pool,
            listener,
            max_connections: server.max_connections(),
            nevent,
            poll,
            timeout,
            waker,
        })
    }

    pub fn waker(&self) -> Arc<Waker> {
        self.waker.clone()
    }

    pub fn build(
        mut self,
        signal_queue: Queues<(), Signal>,
        session_queue: Queues<Session, Session>,
    ) -> Result<Listener> {
        self.listener
            .register(self.poll.registry(), LISTENER_TOKEN, Interest::READABLE)?;

        Ok(Listener {
            accept_paused: false,
            buffer_pool: self.buffer_pool,
            listener: self.listener,
            max_connections: self.max_connections,
            nevent: self.nevent,
            poll: self.poll,
            session_queue,
            signal_queue,
            timeout: self.timeout,
            waker: self.waker,
        })
    }
}

/// Accepts new sessions and hands them to the workers in round-robin order.
/// Sessions come back here when a worker is done with them, so their buffers
/// can be flushed and returned to the pool.
pub struct Listener {
    accept_paused: bool,
    buffer_pool: Arc<BufferPool>,
    listener: ::net::Listener,
    max_connections: usize,
    nevent: usize,
    poll: Poll,
    session_queue: Queues<Session, Session>,
    signal_queue: Queues<(), Signal>,
    timeout: Duration,
    waker: Arc<Waker>,
}

impl Listener {
    /// Stop accepting until a connection slot frees up. Used when the
    /// process runs out of descriptors or hits the connection limit.
    fn pause_accept(&mut self) {
        if !self.accept_paused {
            self.accept_paused = true;
            let _ = self.listener.deregister(self.poll.registry());
        }
    }

    fn resume_accept(&mut self) {
        if self.accept_paused {
            self.accept_paused = false;
            if self
                .listener
                .register(self.poll.registry(), LISTENER_TOKEN, Interest::READABLE)
                .is_err()
            {
                error!("failed to re-register listener");
            }
        }
    }

    fn track_structures(&self) {
        CONNECTION_STRUCTURES
            .set(CURR_CONNECTIONS.value() + (self.buffer_pool.retained() / 2) as i64);
    }

    /// Repeatedly call accept until it would block, the connection limit is
    /// reached, or the descriptors run out.
    fn do_accept(&mut self) {
        loop {
            if CURR_CONNECTIONS.value() >= self.max_connections as i64 {
                self.pause_accept();
                return;
            }

            match self.listener.accept() {
                Ok(stream) => {
                    let session = Session::new(
                        stream,
                        self.buffer_pool.acquire(),
                        self.buffer_pool.acquire(),
                    );

                    TOTAL_CONNECTIONS.increment();
                    CURR_CONNECTIONS.increment();

                    trace!("accepted new session: {:?}", session);

                    if let Err(session) = self.session_queue.try_send_rr(session) {
                        error!("error sending session to worker");
                        self.reclaim(session);
                    }
                    self.track_structures();
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    return;
                }
                Err(e) if e.raw_os_error() == Some(libc::EMFILE) => {
                    warn!("out of file descriptors, pausing accept");
                    self.pause_accept();
                    return;
                }
                Err(e) => {
                    debug!("error accepting connection: {}", e);
                    return;
                }
            }
        }
    }

    /// Flush any final bytes, close the stream, and recycle the buffers.
    fn reclaim(&self, mut session: Session) {
        let _ = session.flush();
        session.shutdown();
        let (read_buffer, write_buffer) = session.into_buffers();
        self.buffer_pool.release(read_buffer);
        self.buffer_pool.release(write_buffer);
        CURR_CONNECTIONS.decrement();
    }

    pub fn run(&mut self) {
        info!("running listener");

        let mut events = Events::with_capacity(self.nevent);

        loop {
            if self.poll.poll(&mut events, Some(self.timeout)).is_err() {
                error!("error polling listener");
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER_TOKEN => {
                        self.do_accept();
                    }
                    WAKER_TOKEN => {
                        // workers return closed sessions for cleanup
                        while let Some(session) =
                            self.session_queue.try_recv().map(|v| v.into_inner())
                        {
                            self.reclaim(session);
                            self.resume_accept();
                        }
                        self.track_structures();

                        while let Some(signal) =
                            self.signal_queue.try_recv().map(|v| v.into_inner())
                        {
                            match signal {
                                Signal::FlushAll => {}
                                Signal::Shutdown => {
                                    return;
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }

            let _ = self.session_queue.wake();
        }
    }
}
