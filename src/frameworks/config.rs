use std::{env, net::IpAddr, path::PathBuf};

// Runtime/server constants (not gameplay tuning).

pub fn http_port() -> u16 {
    env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080)
}

pub fn bind_addr() -> IpAddr {
    env::var("BIND_ADDR")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(IpAddr::from([0, 0, 0, 0]))
}

/// Directory the static client assets are served from.
pub fn static_dir() -> PathBuf {
    env::var("STATIC_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("public"))
}

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const BROADCAST_CAPACITY: usize = 128;
pub const DIRECT_CHANNEL_CAPACITY: usize = 32;
