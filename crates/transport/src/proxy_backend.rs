use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Bytes;
use hyper::{Request, Response};
use log::debug;

use roundhouse_bridge::forward::{UpstreamTarget, build_upstream_request, clean_response};
use roundhouse_lb::{Backend, ConfigError, ExchangeError, Liveness};

use crate::http_client::HttpClient;

pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Backend that relays each request to one upstream over HTTP or HTTPS.
pub struct ProxyBackend {
    address: String,
    target: UpstreamTarget,
    client: HttpClient,
    timeout: Duration,
    max_body_bytes: usize,
    liveness: Liveness,
}

impl ProxyBackend {
    pub fn new(address: &str, client: HttpClient, timeout: Duration) -> Result<Self, ConfigError> {
        let target =
            UpstreamTarget::parse(address).map_err(|err| ConfigError::InvalidAddress {
                address: address.to_string(),
                reason: err.to_string(),
            })?;

        Ok(Self {
            address: address.trim().to_string(),
            target,
            client,
            timeout,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            liveness: Liveness::default(),
        })
    }

    /// Caps how much of an upstream response body is buffered.
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Handle for whatever external signal decides this backend is up or down.
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }
}

#[async_trait]
impl Backend for ProxyBackend {
    fn address(&self) -> &str {
        &self.address
    }

    fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    async fn exchange(
        &self,
        req: Request<Full<Bytes>>,
    ) -> Result<Response<Full<Bytes>>, ExchangeError> {
        let req = build_upstream_request(&self.target, req)
            .map_err(|err| ExchangeError::InvalidRequest(err.to_string()))?;

        debug!("{} {} -> {}", req.method(), req.uri(), self.address);

        let exchange = async {
            let resp = self
                .client
                .send(req)
                .await
                .map_err(|err| ExchangeError::Transport(err.to_string()))?;

            let (parts, body) = resp.into_parts();
            let body = Limited::new(body, self.max_body_bytes)
                .collect()
                .await
                .map_err(|err| {
                    if err.downcast_ref::<LengthLimitError>().is_some() {
                        ExchangeError::Body(format!(
                            "response body exceeds {} bytes",
                            self.max_body_bytes
                        ))
                    } else {
                        ExchangeError::Body(err.to_string())
                    }
                })?
                .to_bytes();

            Ok::<_, ExchangeError>(Response::from_parts(parts, Full::new(body)))
        };

        let resp = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ExchangeError::Timeout)??;

        Ok(clean_response(resp))
    }
}
