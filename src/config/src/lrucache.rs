use crate::*;

use serde::{Deserialize, Serialize};

use std::io::Read;

/// The aggregate configuration for a lrucache instance.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct LrucacheConfig {
    #[serde(default)]
    server: Server,
    #[serde(default)]
    worker: Worker,
    #[serde(default)]
    udp: Udp,
    #[serde(default)]
    buf: Buf,
    #[serde(default)]
    time: Time,
    #[serde(default)]
    debug: Debug,
    #[serde(default)]
    cache: Cache,
}

impl LrucacheConfig {
    pub fn load(file: &str) -> Result<Self, std::io::Error> {
        let mut file = std::fs::File::open(file)?;
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        toml::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    pub fn print(&self) {
        match toml::to_string_pretty(self) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("failed to serialize config: {}", e),
        }
    }

}

impl ServerConfig for LrucacheConfig {
    fn server(&self) -> &Server {
        &self.server
    }
}

impl WorkerConfig for LrucacheConfig {
    fn worker(&self) -> &Worker {
        &self.worker
    }
}

impl UdpConfig for LrucacheConfig {
    fn udp(&self) -> &Udp {
        &self.udp
    }
}

impl BufConfig for LrucacheConfig {
    fn buf(&self) -> &Buf {
        &self.buf
    }
}

impl TimeConfig for LrucacheConfig {
    fn time(&self) -> &Time {
        &self.time
    }
}

impl DebugConfig for LrucacheConfig {
    fn debug(&self) -> &Debug {
        &self.debug
    }
}

impl CacheConfig for LrucacheConfig {
    fn cache(&self) -> &Cache {
        &self.cache
    }
}
