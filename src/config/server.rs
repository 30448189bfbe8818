use std::{net::IpAddr, net::SocketAddr};

use serde::{Deserialize, Serialize};

/// Listener for the interactions endpoint.
///
/// The platform must reach `http://<host>:<port>/interactions`, usually
/// through a TLS-terminating proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Default: 0.0.0.0
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Default: 8080
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted interaction payload.
    /// Default: 256 KiB
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit() -> usize {
    256 * 1024
}
