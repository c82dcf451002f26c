mod buf;
mod cache;
mod debug;
mod lrucache;
mod server;
mod time;
mod udp;
mod units;
mod worker;

pub use buf::{Buf, BufConfig};
pub use cache::{Cache, CacheConfig};
pub use debug::{Debug, DebugConfig};
pub use lrucache::LrucacheConfig;
pub use server::{Server, ServerConfig};
pub use time::{Time, TimeConfig};
pub use udp::{Udp, UdpConfig};
pub use units::*;
pub use worker::{Worker, WorkerConfig};
