use crate::config::{Log, Upstream};

// default values
pub fn get_default_address() -> String {
    String::from("0.0.0.0")
}

pub fn get_default_port() -> u32 {
    8000
}

pub fn get_default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

pub fn get_default_drain_timeout_ms() -> u64 {
    5_000
}

pub fn get_default_timeout_ms() -> u64 {
    30_000
}

pub fn get_default_max_idle_per_host() -> usize {
    32
}

pub fn get_default_upstream() -> Upstream {
    Upstream {
        timeout_ms: get_default_timeout_ms(),
        max_idle_per_host: get_default_max_idle_per_host(),
        max_body_bytes: get_default_max_body_bytes(),
    }
}

pub fn get_default_log_level() -> String {
    String::from("info")
}

pub fn get_default_log_file() -> String {
    String::from("./logs/roundhouse.log")
}

pub fn get_default_log() -> Log {
    Log {
        level: get_default_log_level(),
        enabled: false,
        file: get_default_log_file(),
    }
}
