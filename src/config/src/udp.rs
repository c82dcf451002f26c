use serde::{Deserialize, Serialize};

use std::net::{AddrParseError, SocketAddr};

// constants to define default values
const UDP_ENABLED: bool = false;
const UDP_HOST: &str = "0.0.0.0";
const UDP_PORT: &str = "11211";

// helper functions for default values
fn enabled() -> bool {
    UDP_ENABLED
}

fn host() -> String {
    UDP_HOST.to_string()
}

fn port() -> String {
    UDP_PORT.to_string()
}

// definitions
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Udp {
    #[serde(default = "enabled")]
    enabled: bool,
    #[serde(default = "host")]
    host: String,
    #[serde(default = "port")]
    port: String,
}

// implementation
impl Udp {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn host(&self) -> String {
        self.host.clone()
    }

    pub fn port(&self) -> String {
        self.port.clone()
    }

    /// Return the result of parsing the host and port
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host(), self.port()).parse()
    }
}

// trait implementations
impl Default for Udp {
    fn default() -> Self {
        Self {
            enabled: enabled(),
            host: host(),
            port: port(),
        }
    }
}

// trait definitions
pub trait UdpConfig {
    fn udp(&self) -> &Udp;
}
