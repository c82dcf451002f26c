use crate::udp::UdpServer;
use crate::*;

pub struct WorkersBuilder<Parser, Request, Response, Storage> {
    workers: Vec<WorkerBuilder<Parser, Request, Response, Storage>>,
}

impl<Parser, Request, Response, Storage> WorkersBuilder<Parser, Request, Response, Storage>
where
    Parser: Parse<Request> + Clone,
    Response: Compose,
    Storage: EntryStore + Execute<Request, Response> + Clone,
{
    pub fn new<T: WorkerConfig + UdpConfig>(
        config: &T,
        parser: Parser,
        storage: Storage,
    ) -> Result<Self> {
        let threads = config.worker().threads();

        // when udp is enabled the socket is bound once and cloned for each
        // worker, letting the kernel distribute datagrams
        let udp_socket = if config.udp().enabled() {
            let addr = config.udp().socket_addr().map_err(|e| {
                error!("{}", e);
                Error::new(ErrorKind::Other, "bad udp listen address")
            })?;
            Some(::net::udp_socket(addr)?)
        } else {
            None
        };

        let mut workers = Vec::with_capacity(threads);
        for _ in 0..threads {
            let udp = match &udp_socket {
                Some(socket) => Some(socket.try_clone()?),
                None => None,
            };
            workers.push(WorkerBuilder::new(
                config,
                parser.clone(),
                storage.clone(),
                udp,
            )?);
        }

        Ok(Self { workers })
    }

    pub fn wakers(&self) -> Vec<Arc<Waker>> {
        self.workers.iter().map(|w| w.waker.clone()).collect()
    }

    pub fn build(
        self,
        session_queues: Vec<Queues<Session, Session>>,
        signal_queues: Vec<Queues<(), Signal>>,
    ) -> Vec<Worker<Parser, Request, Response, Storage>> {
        let mut workers = Vec::with_capacity(self.workers.len());
        let mut session_queues = session_queues;
        let mut signal_queues = signal_queues;
        for builder in self.workers {
            workers.push(builder.build(session_queues.remove(0), signal_queues.remove(0)));
        }
        workers
    }
}

struct WorkerBuilder<Parser, Request, Response, Storage> {
    nevent: usize,
    parser: Parser,
    poll: Poll,
    reqs_per_event: usize,
    storage: Storage,
    timeout: Duration,
    udp: Option<UdpServer>,
    waker: Arc<Waker>,
    _request: PhantomData<Request>,
    _response: PhantomData<Response>,
}

impl<Parser, Request, Response, Storage> WorkerBuilder<Parser, Request, Response, Storage> {
    fn new<T: WorkerConfig>(
        config: &T,
        parser: Parser,
        storage: Storage,
        udp: Option<std::net::UdpSocket>,
    ) -> Result<Self> {
        let worker = config.worker();

        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);

        let udp = match udp {
            Some(socket) => {
                let mut socket = UdpSocket::from_std(socket);
                poll.registry()
                    .register(&mut socket, UDP_TOKEN, Interest::READABLE)?;
                Some(UdpServer::new(socket))
            }
            None => None,
        };

        Ok(Self {
            nevent: worker.nevent(),
            parser,
            poll,
            reqs_per_event: worker.reqs_per_event(),
            storage,
            timeout: Duration::from_millis(worker.timeout() as u64),
            udp,
            waker,
            _request: PhantomData,
            _response: PhantomData,
        })
    }

    fn build(
        self,
        session_queue: Queues<Session, Session>,
        signal_queue: Queues<(), Signal>,
    ) -> Worker<Parser, Request, Response, Storage> {
        Worker {
            backlog: Vec::new(),
            nevent: self.nevent,
            parser: self.parser,
            poll: self.poll,
            reqs_per_event: self.reqs_per_event,
            session_queue,
            sessions: Slab::new(),
            signal_queue,
            storage: self.storage,
            timeout: self.timeout,
            udp: self.udp,
            waker: self.waker,
        }
    }
}

/// A `Worker` owns its sessions for their whole lifetime and processes their
/// requests against the shared storage.
pub struct Worker<Parser, Request, Response, Storage> {
    /// sessions with buffered requests left over after hitting the per-event
    /// request budget
    backlog: Vec<Token>,
    nevent: usize,
    parser: Parser,
    poll: Poll,
    reqs_per_event: usize,
    session_queue: Queues<Session, Session>,
    sessions: Slab<ServerSession<Parser, Response, Request>>,
    signal_queue: Queues<(), Signal>,
    storage: Storage,
    timeout: Duration,
    udp: Option<UdpServer>,
    waker: Arc<Waker>,
}

impl<Parser, Request, Response, Storage> Worker<Parser, Request, Response, Storage>
where
    Parser: Parse<Request> + Clone,
    Response: Compose,
    Storage: EntryStore + Execute<Request, Response>,
{
    /// Return the `Session` to the `Listener` to flush and close.
    fn close(&mut self, token: Token) {
        if self.sessions.contains(token.0) {
            let mut session = self.sessions.remove(token.0).into_inner();
            let _ = session.deregister(self.poll.registry());
            if self.session_queue.try_send_rr(session).is_err() {
                // the cleanup queue is full, the session drops here and the
                // accounting must happen in its place
                CURR_CONNECTIONS.decrement();
            }
            let _ = self.session_queue.wake();
        }
    }

    /// Fill the session from the socket and process buffered requests.
    fn read(&mut self, token: Token) -> Result<()> {
        let session = self
            .sessions
            .get_mut(token.0)
            .ok_or_else(|| Error::new(ErrorKind::Other, "non-existent session"))?;

        match session.fill() {
            Ok(0) => {
                return Err(Error::new(ErrorKind::Other, "client hangup"));
            }
            Ok(_) => {}
            Err(e) => {
                return map_err(e);
            }
        }

        self.process(token)
    }

    /// Process up to `reqs_per_event` buffered requests for the session. If
    /// more input remains after that, the session goes on the backlog so
    /// that its sibling sessions get a turn first.
    fn process(&mut self, token: Token) -> Result<()> {
        let session = self
            .sessions
            .get_mut(token.0)
            .ok_or_else(|| Error::new(ErrorKind::Other, "non-existent session"))?;

        for _ in 0..self.reqs_per_event {
            match session.receive() {
                Ok(request) => {
                    let response = self.storage.execute(&request);
                    let hangup = response.should_hangup();
                    session.send(response)?;
                    if hangup {
                        let _ = session.flush();
                        return Err(Error::new(ErrorKind::Other, "hangup after response"));
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    break;
                }
                Err(e) => {
                    return Err(e);
                }
            }
        }

        if session.write_pending() > 0 {
            match session.flush() {
                Ok(_) => {}
                Err(e) => {
                    map_err(e)?;
                }
            }
            if session.write_pending() > 0 {
                session.reregister(self.poll.registry(), token, session.interest())?;
            }
        }

        if session.read_pending() > 0 {
            self.backlog.push(token);
        }

        Ok(())
    }

    /// Flush the session's write buffer.
    fn write(&mut self, token: Token) -> Result<()> {
        let session = self
            .sessions
            .get_mut(token.0)
            .ok_or_else(|| Error::new(ErrorKind::Other, "non-existent session"))?;

        match session.flush() {
            Ok(_) => Ok(()),
            Err(e) => map_err(e),
        }
    }

    fn session_event(&mut self, event: &Event) {
        let token = event.token();

        if event.is_error() {
            self.close(token);
            return;
        }

        if event.is_writable() && self.write(token).is_err() {
            self.close(token);
            return;
        }

        if event.is_readable() && self.read(token).is_err() {
            self.close(token);
        }
    }

    pub fn run(&mut self) {
        let mut events = Events::with_capacity(self.nevent);

        loop {
            self.storage.expire();

            // skip the poll delay while sessions have buffered requests
            let timeout = if self.backlog.is_empty() {
                Some(self.timeout)
            } else {
                Some(Duration::from_millis(0))
            };

            if self.poll.poll(&mut events, timeout).is_err() {
                error!("error polling worker");
            }

            for event in events.iter() {
                match event.token() {
                    WAKER_TOKEN => {
                        // take in new sessions from the listener
                        while let Some(mut session) =
                            self.session_queue.try_recv().map(|v| v.into_inner())
                        {
                            let s = self.sessions.vacant_entry();
                            let token = Token(s.key());
                            if session
                                .register(self.poll.registry(), token, session.interest())
                                .is_ok()
                            {
                                s.insert(ServerSession::new(session, self.parser.clone()));
                            } else if self.session_queue.try_send_rr(session).is_err() {
                                CURR_CONNECTIONS.decrement();
                            } else {
                                let _ = self.session_queue.wake();
                            }
                        }

                        while let Some(signal) =
                            self.signal_queue.try_recv().map(|v| v.into_inner())
                        {
                            match signal {
                                Signal::FlushAll => {
                                    warn!("received flush_all signal");
                                    self.storage.clear();
                                }
                                Signal::Shutdown => {
                                    return;
                                }
                            }
                        }
                    }
                    UDP_TOKEN => {
                        if let Some(mut udp) = self.udp.take() {
                            udp.handle::<Parser, Request, Response, Storage>(
                                &self.parser,
                                &mut self.storage,
                            );
                            self.udp = Some(udp);
                        }
                    }
                    _ => {
                        self.session_event(event);
                    }
                }
            }

            // give sessions which hit the request budget another turn
            let backlog = std::mem::take(&mut self.backlog);
            for token in backlog {
                if self.sessions.contains(token.0) && self.process(token).is_err() {
                    self.close(token);
                }
            }

            let _ = self.session_queue.wake();
        }
    }
}
