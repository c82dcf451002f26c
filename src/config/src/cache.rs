use crate::units::MB;

use serde::{Deserialize, Serialize};

// constants to define default values
const CACHE_HEAP_SIZE: usize = 64 * MB;
const CACHE_ITEM_MAX_SIZE: usize = MB;
const CACHE_EVICTIONS: bool = true;
const CACHE_CAS: bool = true;

// helper functions for default values
fn heap_size() -> usize {
    CACHE_HEAP_SIZE
}

fn item_max_size() -> usize {
    CACHE_ITEM_MAX_SIZE
}

fn evictions() -> bool {
    CACHE_EVICTIONS
}

fn cas() -> bool {
    CACHE_CAS
}

// definitions
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Cache {
    /// Memory budget for keys and values, in bytes. When the budget is
    /// exceeded, items are evicted in least-recently-used order.
    #[serde(default = "heap_size")]
    heap_size: usize,
    /// Largest accepted value size, in bytes.
    #[serde(default = "item_max_size")]
    item_max_size: usize,
    /// When disabled, stores that would exceed the memory budget fail
    /// instead of evicting.
    #[serde(default = "evictions")]
    evictions: bool,
    /// When disabled, items carry no compare-and-swap version and `gets`
    /// reports a CAS value of zero.
    #[serde(default = "cas")]
    cas: bool,
}

// implementation
impl Cache {
    pub fn heap_size(&self) -> usize {
        self.heap_size
    }

    pub fn item_max_size(&self) -> usize {
        self.item_max_size
    }

    pub fn evictions(&self) -> bool {
        self.evictions
    }

    pub fn cas(&self) -> bool {
        self.cas
    }
}

// trait implementations
impl Default for Cache {
    fn default() -> Self {
        Self {
            heap_size: heap_size(),
            item_max_size: item_max_size(),
            evictions: evictions(),
            cas: cas(),
        }
    }
}

// trait definitions
pub trait CacheConfig {
    fn cache(&self) -> &Cache;
}
