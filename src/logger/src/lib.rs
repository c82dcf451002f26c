//! A nonblocking logger. Hot threads format log records onto a bounded
//! channel and return immediately; a [`Drain`] owned by the maintenance
//! thread writes them to the output. If the channel fills, records are
//! dropped rather than blocking a worker.

pub use log::{debug, error, info, log_enabled, trace, warn, Level, LevelFilter};

use config::DebugConfig;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

mod outputs;

pub use outputs::{File, Output, Stdout};

/// Log a message at error level and terminate the process.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {{
        $crate::error!($($arg)*);
        eprintln!($($arg)*);
        std::process::exit(1);
    }}
}

static DROPPED: AtomicU64 = AtomicU64::new(0);

/// Receives formatted log messages and writes them to the output. Must be
/// flushed periodically, typically from the maintenance thread.
pub trait Drain: Send {
    fn flush(&mut self) -> std::io::Result<()>;
}

struct LogDrain {
    receiver: Receiver<Vec<u8>>,
    output: Box<dyn Output>,
}

impl Drain for LogDrain {
    fn flush(&mut self) -> std::io::Result<()> {
        while let Ok(msg) = self.receiver.try_recv() {
            self.output.write_all(&msg)?;
        }
        let dropped = DROPPED.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            let msg = format!("... dropped {} log messages\n", dropped);
            self.output.write_all(msg.as_bytes())?;
        }
        self.output.flush()
    }
}

/// A no-op drain for configurations with logging disabled.
pub struct NopDrain;

impl Drain for NopDrain {
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

struct ChannelLog {
    level: Level,
    sender: Sender<Vec<u8>>,
}

impl log::Log for ChannelLog {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let msg = format!(
            "{}.{:06} {} {}\n",
            now.as_secs(),
            now.subsec_micros(),
            record.level(),
            record.args()
        )
        .into_bytes();
        if let Err(TrySendError::Full(_)) = self.sender.try_send(msg) {
            DROPPED.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn flush(&self) {}
}

/// Builder for the process logger.
pub struct LogBuilder {
    level: Level,
    queue_depth: usize,
    output: Box<dyn Output>,
}

impl Default for LogBuilder {
    fn default() -> Self {
        Self {
            level: Level::Info,
            queue_depth: 4096,
            output: Box::new(Stdout::new()),
        }
    }
}

impl LogBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    pub fn output(mut self, output: Box<dyn Output>) -> Self {
        self.output = output;
        self
    }

    /// Install the logger and return the drain. May only be called once per
    /// process; later calls return an error from the `log` facade.
    pub fn start(self) -> Result<Box<dyn Drain>, log::SetLoggerError> {
        let (sender, receiver) = bounded(self.queue_depth);
        let logger = ChannelLog {
            level: self.level,
            sender,
        };
        log::set_boxed_logger(Box::new(logger))?;
        log::set_max_level(self.level.to_level_filter());
        Ok(Box::new(LogDrain {
            receiver,
            output: self.output,
        }))
    }
}

/// Adjust the maximum log level at runtime. Used by the `verbosity` command.
pub fn set_max_level(level: LevelFilter) {
    log::set_max_level(level);
}

/// Build and install the logger described by the debug config section,
/// returning the drain for the maintenance thread to flush.
pub fn configure_logging<T: DebugConfig>(config: &T) -> Box<dyn Drain> {
    let debug = config.debug();

    let output: Box<dyn Output> = if let Some(path) = debug.log_file() {
        match File::open(&path, debug.log_backup(), debug.log_max_size()) {
            Ok(f) => Box::new(f),
            Err(e) => {
                eprintln!("failed to open log file {}: {}", path, e);
                std::process::exit(1);
            }
        }
    } else {
        Box::new(Stdout::new())
    };

    let builder = LogBuilder::new()
        .level(debug.log_level())
        .queue_depth(debug.log_queue_depth())
        .output(output);

    match builder.start() {
        Ok(drain) => drain,
        Err(_) => {
            // a logger is already installed (tests); drain nothing
            Box::new(NopDrain)
        }
    }
}
