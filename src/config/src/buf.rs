use crate::units::KB;

use serde::{Deserialize, Serialize};

// constants to define default values
const BUF_SIZE: usize = 16 * KB;
const BUF_POOL_SIZE: usize = 1024;

// helper functions for default values
fn size() -> usize {
    BUF_SIZE
}

fn pool_size() -> usize {
    BUF_POOL_SIZE
}

// definitions
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Buf {
    /// Target size for session buffers. Buffers grow past this as needed and
    /// shrink back down when drained. A buffer which has grown beyond the
    /// target is never retained on the free pool.
    #[serde(default = "size")]
    size: usize,
    /// Maximum number of session buffers retained on the free pool.
    #[serde(default = "pool_size")]
    pool_size: usize,
}

// implementation
impl Buf {
    pub fn size(&self) -> usize {
        // the buffer must be able to hold a complete binary protocol header
        std::cmp::max(64, self.size)
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }
}

// trait implementations
impl Default for Buf {
    fn default() -> Self {
        Self {
            size: size(),
            pool_size: pool_size(),
        }
    }
}

// trait definitions
pub trait BufConfig {
    fn buf(&self) -> &Buf;
}
