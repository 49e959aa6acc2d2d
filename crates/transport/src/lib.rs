pub mod http_client;
pub mod proxy_backend;
