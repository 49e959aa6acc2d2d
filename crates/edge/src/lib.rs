use std::{sync::Arc, time::Duration};

use roundhouse_lb::Dispatcher;
use tokio::net::TcpListener;

pub mod http_listener;

/// Inbound HTTP/1 side of the load balancer.
pub struct HttpListener {
    pub listener: TcpListener,
    pub dispatcher: Arc<Dispatcher>,
    pub max_body_bytes: usize,
    pub drain_timeout: Duration,
}
