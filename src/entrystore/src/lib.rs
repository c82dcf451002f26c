//! Storage backends. The server runtime is generic over a type which can
//! execute protocol requests; this crate provides the concrete store.

mod lru;
mod shared;

pub use lru::Lru;
pub use shared::Shared;

/// Maintenance hooks which every storage backend provides.
pub trait EntryStore {
    /// Incrementally remove dead items. Called from the event loop between
    /// request batches, so it must bound its own work.
    fn expire(&mut self);

    /// Remove every item.
    fn clear(&mut self);
}
