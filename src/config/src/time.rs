pub use common::time::TimeType;

use serde::{Deserialize, Serialize};

// helper functions for default values
fn time_type() -> TimeType {
    TimeType::Memcache
}

// definitions
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Time {
    #[serde(default = "time_type")]
    time_type: TimeType,
}

// implementation
impl Time {
    pub fn time_type(&self) -> TimeType {
        self.time_type
    }
}

// trait implementations
impl Default for Time {
    fn default() -> Self {
        Self {
            time_type: time_type(),
        }
    }
}

// trait definitions
pub trait TimeConfig {
    fn time(&self) -> &Time;
}
