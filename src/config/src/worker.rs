use serde::{Deserialize, Serialize};

// constants to define default values
const WORKER_THREADS: usize = 4;
const WORKER_TIMEOUT: usize = 100;
const WORKER_NEVENT: usize = 1024;
const WORKER_REQS_PER_EVENT: usize = 20;

// helper functions for default values
fn threads() -> usize {
    WORKER_THREADS
}

fn timeout() -> usize {
    WORKER_TIMEOUT
}

fn nevent() -> usize {
    WORKER_NEVENT
}

fn reqs_per_event() -> usize {
    WORKER_REQS_PER_EVENT
}

// definitions
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Worker {
    #[serde(default = "threads")]
    threads: usize,
    #[serde(default = "timeout")]
    timeout: usize,
    #[serde(default = "nevent")]
    nevent: usize,
    /// Maximum number of requests processed for one session per readiness
    /// event, preventing one busy session from starving the others.
    #[serde(default = "reqs_per_event")]
    reqs_per_event: usize,
}

// implementation
impl Worker {
    pub fn threads(&self) -> usize {
        std::cmp::max(1, self.threads)
    }

    /// Event loop poll timeout, in milliseconds
    pub fn timeout(&self) -> usize {
        self.timeout
    }

    pub fn nevent(&self) -> usize {
        self.nevent
    }

    pub fn reqs_per_event(&self) -> usize {
        std::cmp::max(1, self.reqs_per_event)
    }
}

// trait implementations
impl Default for Worker {
    fn default() -> Self {
        Self {
            threads: threads(),
            timeout: timeout(),
            nevent: nevent(),
            reqs_per_event: reqs_per_event(),
        }
    }
}

// trait definitions
pub trait WorkerConfig {
    fn worker(&self) -> &Worker;
}
