use std::net::SocketAddr;
use std::time::Duration;

/// Time in-flight requests get to finish once shutdown begins.
pub const REQUEST_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Config {
    // Listen address
    pub listen_addr: SocketAddr,
    // log level for http tracing
    pub log_level: tracing::Level,
    // bound on draining in-flight requests at shutdown
    pub grace_period: Duration,
}

impl Config {
    pub fn new(listen_addr: SocketAddr) -> Self {
        tracing::info!("Creating HTTP server Config: listen_addr={}", listen_addr);
        Self {
            listen_addr,
            log_level: tracing::Level::INFO,
            grace_period: REQUEST_GRACE_PERIOD,
        }
    }
}
