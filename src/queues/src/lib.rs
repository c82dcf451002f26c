//! Queue types for inter-thread communication within the process.

pub use net::Waker;

use crossbeam_queue::ArrayQueue;

use std::sync::Arc;

/// A struct for sending and receiving items by using very simple routing.
/// This allows for us to send messages to a specific receiver, to the next
/// receiver in round-robin order, or to all receivers. Automatically wraps
/// items with the identifier of the sender so that a response can be sent
/// back to the corresponding receiver.
pub struct Queues<T, U> {
    senders: Vec<WakingSender<TrackedItem<T>>>,
    receiver: Arc<ArrayQueue<TrackedItem<U>>>,
    id: usize,
    next: usize,
}

struct WakingSender<T> {
    inner: Arc<ArrayQueue<T>>,
    waker: Arc<Waker>,
    needs_wake: bool,
}

impl<T> Clone for WakingSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            waker: self.waker.clone(),
            needs_wake: false,
        }
    }
}

impl<T> WakingSender<T> {
    pub fn try_send(&mut self, item: T) -> Result<(), T> {
        let result = self.inner.push(item);
        if result.is_ok() {
            self.needs_wake = true;
        }
        result
    }

    pub fn wake(&mut self) -> Result<(), std::io::Error> {
        if self.needs_wake {
            let result = self.waker.wake();
            if result.is_ok() {
                self.needs_wake = false;
            }
            result
        } else {
            Ok(())
        }
    }
}

/// The `Queues` type allows sending items of one type, and receiving items of
/// another type. This allows for bi-directional communication between threads
/// where a transformation of the messages from one type to another may be
/// performed.
///
/// For instance, this allows the listener to hand accepted sessions to the
/// workers and receive closed sessions back for cleanup.
impl<T, U> Queues<T, U> {
    /// Construct the queues for communicating between both sides. Side `a`
    /// sends items of type `T` to side `b`. Side `b` sends items of type `U`
    /// to side `a`.
    ///
    /// To construct this type, you must pass the `Waker`s registered for each
    /// `Poll` instance for side `a` and side `b`. This is required so that
    /// the queues can be used within the event loops and wakeups for the
    /// receivers can be issued by the senders.
    ///
    /// Since bounded queues are used internally, the capacity is the maximum
    /// number of pending items each receiver can have.
    ///
    /// NOTE: the return vectors maintain the ordering of the wakers that were
    /// provided. Care must be taken to ensure that the corresponding queues
    /// are given to the event loop with the corresponding waker.
    pub fn new<A: AsRef<[Arc<Waker>]>, B: AsRef<[Arc<Waker>]>>(
        a_wakers: A,
        b_wakers: B,
        capacity: usize,
    ) -> (Vec<Queues<T, U>>, Vec<Queues<U, T>>) {
        let mut a_wakers = a_wakers.as_ref().to_vec();
        let mut b_wakers = b_wakers.as_ref().to_vec();

        // T messages are sent to side b, so we have a `WakingSender` for each
        // side b queue.

        // these will be used in side a to transmit
        let mut a_tx = Vec::<WakingSender<TrackedItem<T>>>::with_capacity(b_wakers.len());

        // these will be used in side b to receive
        let mut b_rx = Vec::<Arc<ArrayQueue<TrackedItem<T>>>>::with_capacity(b_wakers.len());

        for waker in b_wakers.drain(..) {
            let q = Arc::new(ArrayQueue::new(capacity));
            let s = WakingSender {
                inner: q.clone(),
                waker,
                needs_wake: false,
            };
            a_tx.push(s);
            b_rx.push(q);
        }

        // these will be used in side b to transmit
        let mut b_tx = Vec::<WakingSender<TrackedItem<U>>>::with_capacity(a_wakers.len());

        // these will be used in side a to receive
        let mut a_rx = Vec::<Arc<ArrayQueue<TrackedItem<U>>>>::with_capacity(a_wakers.len());

        for waker in a_wakers.drain(..) {
            let q = Arc::new(ArrayQueue::new(capacity));
            let s = WakingSender {
                inner: q.clone(),
                waker,
                needs_wake: false,
            };
            b_tx.push(s);
            a_rx.push(q);
        }

        let mut a = Vec::new();
        let mut b = Vec::new();

        for (id, receiver) in a_rx.drain(..).enumerate() {
            a.push(Queues {
                senders: a_tx.clone(),
                receiver,
                id,
                next: 0,
            })
        }

        for (id, receiver) in b_rx.drain(..).enumerate() {
            b.push(Queues {
                senders: b_tx.clone(),
                receiver,
                id,
                next: 0,
            })
        }

        (a, b)
    }

    /// Try to receive a single item from the queue. Returns a
    /// `TrackedItem<U>` which allows the receiver to know which sender sent
    /// the item.
    pub fn try_recv(&self) -> Option<TrackedItem<U>> {
        self.receiver.pop()
    }

    /// Try to receive all pending items from the queue.
    pub fn try_recv_all(&self, buf: &mut Vec<TrackedItem<U>>) {
        let pending = self.receiver.len();
        for _ in 0..pending {
            if let Some(item) = self.receiver.pop() {
                buf.push(item);
            }
        }
    }

    /// Try to send a single item to the receiver specified by the `id`.
    /// Allows targeted 1:1 communication.
    pub fn try_send_to(&mut self, id: usize, item: T) -> Result<(), T> {
        self.senders[id]
            .try_send(TrackedItem {
                sender: self.id,
                inner: item,
            })
            .map_err(|e| e.into_inner())
    }

    /// Try to send a single item to the next receiver in round-robin order.
    /// If that receiver's queue is full, the remaining receivers are tried in
    /// turn before giving up.
    pub fn try_send_rr(&mut self, item: T) -> Result<(), T> {
        let mut item = TrackedItem {
            sender: self.id,
            inner: item,
        };
        for _ in 0..self.senders.len() {
            let id = self.next;
            self.next = (self.next + 1) % self.senders.len();
            match self.senders[id].try_send(item) {
                Ok(()) => {
                    return Ok(());
                }
                Err(i) => {
                    item = i;
                }
            }
        }
        Err(item.into_inner())
    }

    /// Wake any remote receivers which have been sent items since the last
    /// time this was called.
    pub fn wake(&mut self) -> Result<(), std::io::Error> {
        let mut result = Ok(());
        for sender in self.senders.iter_mut() {
            if let Err(e) = sender.wake() {
                result = Err(e);
            }
        }
        result
    }
}

impl<T: Clone, U> Queues<T, U> {
    /// Allows broadcast communication of the item to all receivers on the
    /// other side.
    pub fn try_send_all(&mut self, item: T) -> Result<(), T> {
        let mut result = Ok(());
        for sender in self.senders.iter_mut() {
            if sender
                .try_send(TrackedItem {
                    sender: self.id,
                    inner: item.clone(),
                })
                .is_err()
            {
                result = Err(item.clone());
            }
        }
        result
    }
}

pub struct TrackedItem<T> {
    sender: usize,
    inner: T,
}

impl<T> TrackedItem<T> {
    pub fn sender(&self) -> usize {
        self.sender
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}
