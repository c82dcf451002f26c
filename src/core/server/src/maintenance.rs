use crate::*;

use crossbeam_channel::Receiver;

use std::time::Instant;

// how often the clock is refreshed
const TICK: Duration = Duration::from_secs(1);

pub struct MaintenanceBuilder {
    poll: Poll,
    waker: Arc<Waker>,
}

impl MaintenanceBuilder {
    pub fn new() -> Result<Self> {
        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);
        Ok(Self { poll, waker })
    }

    pub fn waker(&self) -> Arc<Waker> {
        self.waker.clone()
    }

    pub fn build(
        self,
        log_drain: Box<dyn Drain>,
        signal_rx: Receiver<Signal>,
        signal_queue: Queues<Signal, ()>,
    ) -> Maintenance {
        Maintenance {
            log_drain,
            poll: self.poll,
            signal_queue,
            signal_rx,
        }
    }
}

/// The housekeeping thread: refreshes the coarse clock once a second,
/// drains the log queue, and fans process-level signals out to the listener
/// and the workers.
pub struct Maintenance {
    log_drain: Box<dyn Drain>,
    poll: Poll,
    signal_queue: Queues<Signal, ()>,
    signal_rx: Receiver<Signal>,
}

impl Maintenance {
    pub fn run(&mut self) {
        let mut events = Events::with_capacity(QUEUE_CAPACITY);
        let mut last_tick = Instant::now();

        common::time::refresh();

        loop {
            let _ = self.log_drain.flush();

            if last_tick.elapsed() >= TICK {
                common::time::refresh();
                last_tick = Instant::now();
            }

            if self
                .poll
                .poll(&mut events, Some(Duration::from_millis(100)))
                .is_err()
            {
                error!("error polling maintenance");
            }

            while let Ok(signal) = self.signal_rx.try_recv() {
                if self.signal_queue.try_send_all(signal).is_err() {
                    error!("error broadcasting signal");
                }
                let _ = self.signal_queue.wake();

                if signal == Signal::Shutdown {
                    let _ = self.log_drain.flush();
                    return;
                }
            }
        }
    }
}
