/// Signals which can be broadcast to the threads within the process.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Signal {
    /// Invalidate every item in the cache.
    FlushAll,
    /// Begin a clean shutdown of the process.
    Shutdown,
}
