//! The server runtime: a listener thread which accepts sessions and hands
//! them round-robin to worker threads, each of which runs its own event
//! loop; plus a maintenance thread which keeps the coarse clock fresh and
//! drains the log queue.

use common::Signal;
use config::*;
use entrystore::EntryStore;
use logger::*;
use metriken::{metric, Counter, Gauge};
use ::net::event::{Event, Source};
use ::net::*;
use protocol_common::{Compose, Execute, Parse};
use queues::Queues;
use session::{BufferPool, ServerSession, Session};
use slab::Slab;

use core::marker::PhantomData;
use core::time::Duration;
use std::io::{Error, ErrorKind, Result};
use std::sync::Arc;

mod listener;
mod maintenance;
mod process;
mod udp;
mod workers;

use listener::ListenerBuilder;
use maintenance::MaintenanceBuilder;
use workers::WorkersBuilder;

pub use process::{Process, ProcessBuilder};

const QUEUE_CAPACITY: usize = 1024;

const LISTENER_TOKEN: Token = Token(usize::MAX - 1);
const UDP_TOKEN: Token = Token(usize::MAX - 2);
const WAKER_TOKEN: Token = Token(usize::MAX);

const THREAD_PREFIX: &str = "lrucache";

#[metric(
    name = "curr_connections",
    description = "open connections, excluding the listener"
)]
pub static CURR_CONNECTIONS: Gauge = Gauge::new();

#[metric(
    name = "total_connections",
    description = "connections accepted since start"
)]
pub static TOTAL_CONNECTIONS: Counter = Counter::new();

#[metric(
    name = "connection_structures",
    description = "connection structures allocated, live or pooled"
)]
pub static CONNECTION_STRUCTURES: Gauge = Gauge::new();

fn map_err(e: Error) -> Result<()> {
    match e.kind() {
        ErrorKind::WouldBlock => Ok(()),
        _ => Err(e),
    }
}
