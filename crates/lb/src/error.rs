#[derive(Debug)]
pub enum ConfigError {
    EmptyPool,
    InvalidAddress { address: String, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EmptyPool => write!(f, "backend pool is empty"),
            ConfigError::InvalidAddress { address, reason } => {
                write!(f, "invalid backend address '{address}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failure of a single request/response exchange against one upstream.
#[derive(Debug)]
pub enum ExchangeError {
    InvalidRequest(String),
    Transport(String),
    Body(String),
    Timeout,
}

impl std::fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeError::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            ExchangeError::Transport(msg) => write!(f, "transport error: {msg}"),
            ExchangeError::Body(msg) => write!(f, "upstream body error: {msg}"),
            ExchangeError::Timeout => write!(f, "upstream timeout"),
        }
    }
}

impl std::error::Error for ExchangeError {}

#[derive(Debug)]
pub enum DispatchError {
    /// Every backend reported not-alive during one bounded scan.
    NoAvailableBackend,
    Upstream {
        address: String,
        source: ExchangeError,
    },
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::NoAvailableBackend => write!(f, "no available backend"),
            DispatchError::Upstream { address, source } => {
                write!(f, "upstream {address} failed: {source}")
            }
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::NoAvailableBackend => None,
            DispatchError::Upstream { source, .. } => Some(source),
        }
    }
}
