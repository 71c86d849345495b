use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

#[derive(Debug, Clone)]
pub struct Config {
    // storage configuration
    /// on-disk data directory (sqlite db + files), if not set then
    ///  everything is kept in memory
    pub data_dir: Option<PathBuf>,

    // http server configuration
    /// address for the API server to listen on.
    ///  if not set then 0.0.0.0:3000 will be used
    pub api_listen_addr: Option<SocketAddr>,

    // link garbage collection
    /// how often to sweep expired temporary links that nobody reads,
    ///  if not set the sweep task is disabled (lazy expiry still applies)
    pub link_sweep_interval: Option<Duration>,

    // misc
    pub log_level: tracing::Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            api_listen_addr: Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 3000)),
            link_sweep_interval: Some(Duration::from_secs(600)),
            log_level: tracing::Level::INFO,
        }
    }
}
