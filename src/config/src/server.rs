use serde::{Deserialize, Serialize};

use std::net::{AddrParseError, SocketAddr};

// constants to define default values
const SERVER_HOST: &str = "0.0.0.0";
const SERVER_PORT: &str = "11211";
const SERVER_MAX_CONNECTIONS: usize = 1024;
const SERVER_TIMEOUT: usize = 100;
const SERVER_NEVENT: usize = 1024;
const SERVER_UNIX_MODE: u32 = 0o700;

// helper functions for default values
fn host() -> String {
    SERVER_HOST.to_string()
}

fn port() -> String {
    SERVER_PORT.to_string()
}

fn max_connections() -> usize {
    SERVER_MAX_CONNECTIONS
}

fn timeout() -> usize {
    SERVER_TIMEOUT
}

fn nevent() -> usize {
    SERVER_NEVENT
}

fn unix_socket() -> Option<String> {
    None
}

fn unix_mode() -> u32 {
    SERVER_UNIX_MODE
}

// definitions
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Server {
    #[serde(default = "host")]
    host: String,
    #[serde(default = "port")]
    port: String,
    /// When set, the server listens on this UNIX-domain socket path and the
    /// network listeners are disabled.
    #[serde(default = "unix_socket")]
    unix_socket: Option<String>,
    #[serde(default = "unix_mode")]
    unix_mode: u32,
    #[serde(default = "max_connections")]
    max_connections: usize,
    #[serde(default = "timeout")]
    timeout: usize,
    #[serde(default = "nevent")]
    nevent: usize,
}

// implementation
impl Server {
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

    pub fn unix_socket(&self) -> Option<String> {
        self.unix_socket.clone()
    }

    pub fn unix_mode(&self) -> u32 {
        self.unix_mode
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Event loop poll timeout, in milliseconds
    pub fn timeout(&self) -> usize {
        self.timeout
    }

    pub fn nevent(&self) -> usize {
        self.nevent
    }
}

// trait implementations
impl Default for Server {
    fn default() -> Self {
        Self {
            host: host(),
            port: port(),
            unix_socket: unix_socket(),
            unix_mode: unix_mode(),
            max_connections: max_connections(),
            timeout: timeout(),
            nevent: nevent(),
        }
    }
}

// trait definitions
pub trait ServerConfig {
    fn server(&self) -> &Server;
}
