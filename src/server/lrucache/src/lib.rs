//! Lrucache is a cache server which speaks both the memcache text protocol
//! and the memcache binary protocol over TCP, UDP, and UNIX-domain sockets.
//! Items live in a memory-bounded store and are evicted in
//! least-recently-used order when the budget is exceeded.

use config::*;
use entrystore::{Lru, Shared};
use logger::configure_logging;
use protocol_memcache::{Request, RequestParser, Response};
use server::{Process, ProcessBuilder};

type Parser = RequestParser;
type Storage = Shared<Lru>;

/// This structure represents a running `Lrucache` process.
pub struct Lrucache {
    process: Process,
}

impl Lrucache {
    /// Creates a new `Lrucache` process from the given config.
    pub fn new(config: LrucacheConfig) -> Result<Self, std::io::Error> {
        // anchor the coarse clock
        common::time::initialize();

        // initialize logging
        let log_drain = configure_logging(&config);

        // initialize metrics
        metrics::init(config.cache().heap_size(), config.worker().threads());

        // initialize storage
        let storage = Storage::new(Lru::new(&config));

        // initialize the protocol parser
        let parser = Parser::new().max_value_size(config.cache().item_max_size());

        // initialize the process
        let process_builder = ProcessBuilder::<Parser, Request, Response, Storage>::new(
            &config, storage, parser, log_drain,
        )?;

        // spawn threads
        let process = process_builder.spawn()?;

        Ok(Self { process })
    }

    /// Wait for all threads to complete. Blocks until the process has fully
    /// terminated. Under normal conditions, this will block indefinitely.
    pub fn wait(self) {
        self.process.wait()
    }

    /// Triggers a shutdown of the process and blocks until the process has
    /// fully terminated. This is more likely to be used for running
    /// integration tests or other automated testing.
    pub fn shutdown(self) {
        self.process.shutdown()
    }
}
