use serde::{Deserialize, Serialize};

use crate::default::{
    get_default_address, get_default_drain_timeout_ms, get_default_log, get_default_log_file,
    get_default_log_level, get_default_max_body_bytes, get_default_max_idle_per_host,
    get_default_port, get_default_timeout_ms, get_default_upstream,
};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub listen: Listen,

    // order matters: it is the rotation order
    pub backends: Vec<Backend>,

    #[serde(default = "get_default_upstream")]
    pub upstream: Upstream,

    #[serde(default = "get_default_log")]
    pub log: Log,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Listen {
    #[serde(default = "get_default_address")]
    pub address: String, // "0.0.0.0"

    #[serde(default = "get_default_port")]
    pub port: u32, // 8000

    // largest inbound request body accepted, larger ones get 413
    #[serde(default = "get_default_max_body_bytes")]
    pub max_body_bytes: usize,

    // how long in-flight requests may finish after shutdown
    #[serde(default = "get_default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for Listen {
    fn default() -> Self {
        Self {
            address: get_default_address(),
            port: get_default_port(),
            max_body_bytes: get_default_max_body_bytes(),
            drain_timeout_ms: get_default_drain_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(untagged)]
pub enum Backend {
    Simple(String),
    Full { address: String },
}

impl Backend {
    pub fn address(&self) -> &str {
        match self {
            Backend::Simple(address) => address,
            Backend::Full { address } => address,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Upstream {
    #[serde(default = "get_default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "get_default_max_idle_per_host")]
    pub max_idle_per_host: usize,

    // largest upstream response body relayed, larger ones become 502
    #[serde(default = "get_default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for Upstream {
    fn default() -> Self {
        get_default_upstream()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Log {
    #[serde(default = "get_default_log_level")]
    pub level: String, // "trace, debug, info, warn, error, off"

    #[serde(default)]
    pub enabled: bool, // write to `file` instead of stderr

    #[serde(default = "get_default_log_file")]
    pub file: String,
}

impl Default for Log {
    fn default() -> Self {
        get_default_log()
    }
}

impl Config {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.listen.address, self.listen.port)
    }

    pub fn backend_addresses(&self) -> Vec<String> {
        self.backends
            .iter()
            .map(|backend| backend.address().to_string())
            .collect()
    }
}
