//! A memory-bounded key/value store: a hashtable over a slab of entries
//! threaded onto an intrusive least-recently-used list. When the memory
//! budget is exceeded, entries are evicted from the tail of the list.

mod memcache;

use crate::EntryStore;

use ahash::RandomState;
use common::time::{current_time, TimeType};
use config::{CacheConfig, TimeConfig};
use metriken::{metric, Counter, Gauge};
use slab::Slab;

use std::collections::HashMap;

#[metric(name = "curr_items", description = "items currently cached")]
pub static CURR_ITEMS: Gauge = Gauge::new();

#[metric(name = "total_items", description = "items stored since start")]
pub static TOTAL_ITEMS: Counter = Counter::new();

#[metric(
    name = "curr_bytes",
    description = "bytes currently used to cache items"
)]
pub static CURR_BYTES: Gauge = Gauge::new();

#[metric(name = "evictions", description = "items evicted to free memory")]
pub static EVICTIONS: Counter = Counter::new();

// accounts for the entry struct, the slab slot, and the hashtable entry
const ITEM_OVERHEAD: usize = 64;

// upper bound on list steps for one `expire` call
const EXPIRE_BATCH: usize = 32;

const NONE: usize = usize::MAX;

pub(crate) struct Entry {
    key: Box<[u8]>,
    value: Box<[u8]>,
    flags: u32,
    /// Relative expiration time, zero means the item never expires.
    exptime: u32,
    /// Relative time the item was last stored, used by `flush_all`.
    linked_at: u32,
    cas: u64,
    prev: usize,
    next: usize,
}

impl Entry {
    fn size(&self) -> usize {
        self.key.len() + self.value.len() + ITEM_OVERHEAD
    }
}

#[derive(Debug)]
pub(crate) enum StoreError {
    /// The item exceeds the maximum item size.
    TooLarge,
    /// The store is full and eviction is disabled, or the item exceeds the
    /// total memory budget.
    OutOfMemory,
}

pub struct Lru {
    map: HashMap<Box<[u8]>, usize, RandomState>,
    entries: Slab<Entry>,
    head: usize,
    tail: usize,
    heap_size: usize,
    item_max_size: usize,
    evictions: bool,
    cas_enabled: bool,
    next_cas: u64,
    bytes_used: usize,
    /// Items stored at or before this relative time are dead. Zero means
    /// no flush has happened.
    oldest_live: u32,
    time_type: TimeType,
}

impl Lru {
    pub fn new<T: CacheConfig + TimeConfig>(config: &T) -> Self {
        let cache = config.cache();

        let hasher = RandomState::with_seeds(
            0xbb8c484891ec6c86,
            0x0522a25ae9c769f9,
            0xeed2797b9571bc75,
            0x4feb29c1fbbd59d0,
        );

        Self {
            map: HashMap::with_hasher(hasher),
            entries: Slab::new(),
            head: NONE,
            tail: NONE,
            heap_size: cache.heap_size(),
            item_max_size: cache.item_max_size(),
            evictions: cache.evictions(),
            cas_enabled: cache.cas(),
            next_cas: 0,
            bytes_used: 0,
            oldest_live: 0,
            time_type: config.time().time_type(),
        }
    }

    pub(crate) fn time_type(&self) -> TimeType {
        self.time_type
    }

    pub(crate) fn next_cas(&mut self) -> u64 {
        if self.cas_enabled {
            self.next_cas += 1;
            self.next_cas
        } else {
            0
        }
    }

    fn is_dead(&self, entry: &Entry) -> bool {
        (entry.exptime != 0 && entry.exptime <= current_time())
            || (self.oldest_live != 0 && entry.linked_at <= self.oldest_live)
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = {
            let entry = &self.entries[index];
            (entry.prev, entry.next)
        };
        if prev == NONE {
            self.head = next;
        } else {
            self.entries[prev].next = next;
        }
        if next == NONE {
            self.tail = prev;
        } else {
            self.entries[next].prev = prev;
        }
    }

    fn link_front(&mut self, index: usize) {
        let head = self.head;
        {
            let entry = &mut self.entries[index];
            entry.prev = NONE;
            entry.next = head;
        }
        if head != NONE {
            self.entries[head].prev = index;
        }
        self.head = index;
        if self.tail == NONE {
            self.tail = index;
        }
    }

    /// Remove the entry at the index, updating the hashtable, the list, and
    /// the accounting.
    fn remove_index(&mut self, index: usize) -> Entry {
        self.unlink(index);
        let entry = self.entries.remove(index);
        self.map.remove(&entry.key);
        self.bytes_used -= entry.size();
        CURR_ITEMS.decrement();
        CURR_BYTES.sub(entry.size() as _);
        entry
    }

    /// Find a live entry for the key. A dead entry found here is removed, so
    /// expiration costs nothing beyond the accesses which would happen
    /// anyway.
    pub(crate) fn locate(&mut self, key: &[u8]) -> Option<usize> {
        let index = *self.map.get(key)?;
        if self.is_dead(&self.entries[index]) {
            self.remove_index(index);
            None
        } else {
            Some(index)
        }
    }

    /// Promote an entry to the front of the list.
    pub(crate) fn touch(&mut self, index: usize) {
        if self.head != index {
            self.unlink(index);
            self.link_front(index);
        }
    }

    pub(crate) fn entry(&self, index: usize) -> (&[u8], u32, u64, u32) {
        let entry = &self.entries[index];
        (&entry.value, entry.flags, entry.cas, entry.exptime)
    }

    /// Store a value under the key, replacing any existing entry. Returns
    /// the new CAS value.
    pub(crate) fn insert(
        &mut self,
        key: &[u8],
        value: &[u8],
        flags: u32,
        exptime: u32,
    ) -> Result<u64, StoreError> {
        let size = key.len() + value.len() + ITEM_OVERHEAD;

        if size > self.item_max_size {
            return Err(StoreError::TooLarge);
        }

        if let Some(index) = self.map.get(key).copied() {
            self.remove_index(index);
        }

        if size > self.heap_size {
            return Err(StoreError::OutOfMemory);
        }

        while self.bytes_used + size > self.heap_size {
            if !self.evictions {
                return Err(StoreError::OutOfMemory);
            }
            let tail = self.tail;
            if tail == NONE {
                return Err(StoreError::OutOfMemory);
            }
            let dead = self.is_dead(&self.entries[tail]);
            self.remove_index(tail);
            if !dead {
                EVICTIONS.increment();
            }
        }

        let cas = self.next_cas();
        let entry = Entry {
            key: key.to_owned().into_boxed_slice(),
            value: value.to_owned().into_boxed_slice(),
            flags,
            exptime,
            linked_at: current_time(),
            cas,
            prev: NONE,
            next: NONE,
        };

        let index = self.entries.insert(entry);
        self.map.insert(key.to_owned().into_boxed_slice(), index);
        self.link_front(index);
        self.bytes_used += size;

        CURR_ITEMS.increment();
        TOTAL_ITEMS.increment();
        CURR_BYTES.add(size as _);

        Ok(cas)
    }

    /// Replace the value of an existing entry in place, keeping its flags
    /// and expiration. Returns the new CAS value.
    pub(crate) fn replace_value(
        &mut self,
        index: usize,
        value: Box<[u8]>,
    ) -> Result<u64, StoreError> {
        let old_size = self.entries[index].size();
        let new_size = self.entries[index].key.len() + value.len() + ITEM_OVERHEAD;

        if new_size > self.item_max_size {
            return Err(StoreError::TooLarge);
        }
        if new_size > self.heap_size
            || (!self.evictions && self.bytes_used - old_size + new_size > self.heap_size)
        {
            return Err(StoreError::OutOfMemory);
        }

        let cas = self.next_cas();
        let entry = &mut self.entries[index];
        entry.value = value;
        entry.cas = cas;

        self.bytes_used = self.bytes_used - old_size + new_size;
        CURR_BYTES.add(new_size as i64 - old_size as i64);

        // a grown value may push the store over budget
        while self.bytes_used > self.heap_size && self.tail != index && self.tail != NONE {
            let tail = self.tail;
            let dead = self.is_dead(&self.entries[tail]);
            self.remove_index(tail);
            if !dead {
                EVICTIONS.increment();
            }
        }

        Ok(cas)
    }

    pub(crate) fn remove(&mut self, key: &[u8]) -> bool {
        match self.locate(key) {
            Some(index) => {
                self.remove_index(index);
                true
            }
            None => false,
        }
    }

    /// Mark everything stored up to now (or up to a future time) as dead.
    pub(crate) fn flush(&mut self, oldest_live: u32) {
        self.oldest_live = oldest_live;
    }

    /// Dump metadata for up to `limit` items, most recently used first.
    pub(crate) fn dump(&self, limit: usize) -> Vec<(Box<[u8]>, usize, u32)> {
        let mut items = Vec::new();
        let mut index = self.head;
        while index != NONE && items.len() < limit {
            let entry = &self.entries[index];
            if !self.is_dead(entry) {
                items.push((entry.key.clone(), entry.value.len(), entry.exptime));
            }
            index = entry.next;
        }
        items
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn bytes_used(&self) -> usize {
        self.bytes_used
    }
}

impl EntryStore for Lru {
    fn expire(&mut self) {
        let mut index = self.tail;
        for _ in 0..EXPIRE_BATCH {
            if index == NONE {
                break;
            }
            let prev = self.entries[index].prev;
            if self.is_dead(&self.entries[index]) {
                self.remove_index(index);
            }
            index = prev;
        }
    }

    fn clear(&mut self) {
        while self.tail != NONE {
            self.remove_index(self.tail);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::LrucacheConfig;

    fn store() -> Lru {
        common::time::initialize();
        Lru::new(&LrucacheConfig::default())
    }

    #[test]
    fn insert_remove_accounting() {
        let mut lru = store();
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.bytes_used(), 0);

        lru.insert(b"key", b"value", 0, 0).unwrap();
        assert_eq!(lru.len(), 1);
        assert_eq!(lru.bytes_used(), 3 + 5 + ITEM_OVERHEAD);

        // replacing the same key does not leak the old entry
        lru.insert(b"key", b"longer value", 0, 0).unwrap();
        assert_eq!(lru.len(), 1);
        assert_eq!(lru.bytes_used(), 3 + 12 + ITEM_OVERHEAD);

        assert!(lru.remove(b"key"));
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.bytes_used(), 0);
    }

    #[test]
    fn cas_values_are_unique() {
        let mut lru = store();
        let a = lru.insert(b"a", b"1", 0, 0).unwrap();
        let b = lru.insert(b"b", b"1", 0, 0).unwrap();
        assert!(b > a);
    }

    #[test]
    fn expired_entries_are_removed_on_access() {
        let mut lru = store();
        // relative time 1 is always in the past
        lru.insert(b"stale", b"x", 0, 1).unwrap();
        assert_eq!(lru.len(), 1);
        assert!(lru.locate(b"stale").is_none());
        assert_eq!(lru.len(), 0);
    }

    #[test]
    fn expire_sweeps_dead_entries() {
        let mut lru = store();
        lru.insert(b"stale", b"x", 0, 1).unwrap();
        lru.insert(b"live", b"x", 0, 0).unwrap();
        lru.expire();
        assert_eq!(lru.len(), 1);
        assert!(lru.locate(b"live").is_some());
    }

    #[test]
    fn clear_empties_the_store() {
        let mut lru = store();
        lru.insert(b"a", b"1", 0, 0).unwrap();
        lru.insert(b"b", b"2", 0, 0).unwrap();
        lru.clear();
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.bytes_used(), 0);
        assert!(lru.locate(b"a").is_none());
    }

    #[test]
    fn dump_is_mru_ordered_and_limited() {
        let mut lru = store();
        lru.insert(b"a", b"1", 0, 0).unwrap();
        lru.insert(b"b", b"2", 0, 0).unwrap();
        lru.insert(b"c", b"3", 0, 0).unwrap();

        let items = lru.dump(2);
        assert_eq!(items.len(), 2);
        assert_eq!(&*items[0].0, &b"c"[..]);
        assert_eq!(&*items[1].0, &b"b"[..]);
    }
}
