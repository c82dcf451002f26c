use crate::*;

use crossbeam_channel::{bounded, Sender};

use std::thread::JoinHandle;

pub struct ProcessBuilder<Parser, Request, Response, Storage> {
    listener: ListenerBuilder,
    log_drain: Box<dyn Drain>,
    maintenance: MaintenanceBuilder,
    workers: WorkersBuilder<Parser, Request, Response, Storage>,
}

impl<Parser, Request, Response, Storage> ProcessBuilder<Parser, Request, Response, Storage>
where
    Parser: 'static + Parse<Request> + Clone + Send,
    Request: 'static + Send,
    Response: 'static + Compose + Send,
    Storage: 'static + EntryStore + Execute<Request, Response> + Clone + Send,
{
    pub fn new<T: ServerConfig + WorkerConfig + UdpConfig + BufConfig>(
        config: &T,
        storage: Storage,
        parser: Parser,
        log_drain: Box<dyn Drain>,
    ) -> Result<Self> {
        let listener = ListenerBuilder::new(config)?;
        let workers = WorkersBuilder::new(config, parser, storage)?;
        let maintenance = MaintenanceBuilder::new()?;

        Ok(Self {
            listener,
            log_drain,
            maintenance,
            workers,
        })
    }

    pub fn spawn(self) -> Result<Process> {
        let mut thread_wakers = vec![self.listener.waker()];
        thread_wakers.extend_from_slice(&self.workers.wakers());

        // channel for the parent `Process` to send `Signal`s to the
        // maintenance thread
        let (signal_tx, signal_rx) = bounded(QUEUE_CAPACITY);

        // queues for the maintenance thread to fan `Signal`s out to all
        // sibling threads
        let (mut signal_queue_tx, mut signal_queue_rx) = Queues::new(
            vec![self.maintenance.waker()],
            thread_wakers,
            QUEUE_CAPACITY,
        );

        // queues for the `Listener` to send `Session`s to the worker
        // threads and to get closed sessions back
        let (mut listener_session_queues, worker_session_queues) = Queues::new(
            vec![self.listener.waker()],
            self.workers.wakers(),
            QUEUE_CAPACITY,
        );

        let mut maintenance =
            self.maintenance
                .build(self.log_drain, signal_rx, signal_queue_tx.remove(0));

        let mut listener = self
            .listener
            .build(signal_queue_rx.remove(0), listener_session_queues.remove(0))?;

        let workers = self.workers.build(worker_session_queues, signal_queue_rx);

        let mut threads = vec![std::thread::Builder::new()
            .name(format!("{}_listener", THREAD_PREFIX))
            .spawn(move || listener.run())
            .map_err(|e| Error::new(ErrorKind::Other, e))?];

        for (id, mut worker) in workers.into_iter().enumerate() {
            threads.push(
                std::thread::Builder::new()
                    .name(format!("{}_worker_{}", THREAD_PREFIX, id))
                    .spawn(move || worker.run())
                    .map_err(|e| Error::new(ErrorKind::Other, e))?,
            );
        }

        threads.push(
            std::thread::Builder::new()
                .name(format!("{}_maintenance", THREAD_PREFIX))
                .spawn(move || maintenance.run())
                .map_err(|e| Error::new(ErrorKind::Other, e))?,
        );

        Ok(Process { signal_tx, threads })
    }
}

pub struct Process {
    signal_tx: Sender<Signal>,
    threads: Vec<JoinHandle<()>>,
}

impl Process {
    /// Broadcast a flush to the worker threads, emptying the cache.
    pub fn flush_all(&self) {
        if self.signal_tx.try_send(Signal::FlushAll).is_err() {
            error!("error sending flush signal to maintenance thread");
        }
    }

    /// Attempts to gracefully shutdown the `Process` by sending a shutdown
    /// to each thread and then waiting to join those threads.
    ///
    /// This function will block until all threads have terminated.
    pub fn shutdown(self) {
        // this sends a shutdown to the maintenance thread, which will
        // broadcast the signal to all sibling threads in the process
        if self.signal_tx.try_send(Signal::Shutdown).is_err() {
            fatal!("error sending shutdown signal to maintenance thread");
        }

        // wait and join all threads
        self.wait()
    }

    /// Will block until all threads terminate. This should be used to keep
    /// the process alive while the child threads run.
    pub fn wait(self) {
        for thread in self.threads {
            let _ = thread.join();
        }
    }
}
