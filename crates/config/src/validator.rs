use crate::config::Config;
use log::{error, info};

pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

pub fn validate(config: &Config) -> bool {
    info!("Starting configuration validation...");

    // --- Validate Log level ---
    if !VALID_LOG_LEVELS
        .iter()
        .any(|lvl| lvl.eq_ignore_ascii_case(&config.log.level))
    {
        error!("Invalid log level: {}", config.log.level);
        return false;
    }

    // --- Validate listen address ---
    if config.listen.address.is_empty() {
        error!("Listen address is empty");
        return false;
    }

    // --- Validate listen port ---
    if config.listen.port == 0 || config.listen.port > 65535 {
        error!(
            "Invalid listen port: {} (must be between 1 and 65535)",
            config.listen.port
        );
        return false;
    }

    if config.listen.max_body_bytes == 0 {
        error!("Listen max body size is invalid (0)");
        return false;
    }

    // --- Validate upstream settings ---
    if config.upstream.timeout_ms == 0 {
        error!("Upstream timeout is invalid (0)");
        return false;
    }

    if config.upstream.max_body_bytes == 0 {
        error!("Upstream max body size is invalid (0)");
        return false;
    }

    // --- Validate backends ---
    if config.backends.is_empty() {
        error!("No backends configured");
        return false;
    }

    for (index, backend) in config.backends.iter().enumerate() {
        if backend.address().trim().is_empty() {
            error!("Backend address is missing for backend #{}", index);
            return false;
        }
    }

    info!("Configuration validation passed successfully");

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backend;

    fn valid_config() -> Config {
        Config {
            backends: vec![
                Backend::Simple("http://127.0.0.1:8081".to_string()),
                Backend::Full {
                    address: "http://127.0.0.1:8082".to_string(),
                },
            ],
            ..Config::default()
        }
    }

    #[test]
    fn accepts_valid_config() {
        assert!(validate(&valid_config()));
    }

    #[test]
    fn rejects_empty_backend_list() {
        let mut config = valid_config();
        config.backends.clear();
        assert!(!validate(&config));
    }

    #[test]
    fn rejects_blank_backend_address() {
        let mut config = valid_config();
        config.backends.push(Backend::Simple("  ".to_string()));
        assert!(!validate(&config));
    }

    #[test]
    fn rejects_out_of_range_port() {
        let mut config = valid_config();
        config.listen.port = 0;
        assert!(!validate(&config));

        config.listen.port = 70_000;
        assert!(!validate(&config));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = valid_config();
        config.log.level = "loud".to_string();
        assert!(!validate(&config));

        config.log.level = "DEBUG".to_string();
        assert!(validate(&config));
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config = valid_config();
        config.upstream.timeout_ms = 0;
        assert!(!validate(&config));
    }

    #[test]
    fn rejects_zero_body_limits() {
        let mut config = valid_config();
        config.listen.max_body_bytes = 0;
        assert!(!validate(&config));

        let mut config = valid_config();
        config.upstream.max_body_bytes = 0;
        assert!(!validate(&config));
    }
}
