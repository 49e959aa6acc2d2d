use std::{convert::Infallible, future::Future, io, net::SocketAddr, sync::Arc, time::Duration};

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use log::{debug, error, info, warn};
use tokio::{net::TcpListener, sync::watch, task::JoinSet};

use roundhouse_bridge::forward::ClientAddr;
use roundhouse_lb::{DispatchError, Dispatcher, ExchangeError};

use crate::HttpListener;

pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

const ACCEPT_BACKOFF_START: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

impl HttpListener {
    pub async fn bind(address: &str, dispatcher: Arc<Dispatcher>) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self {
            listener,
            dispatcher,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        })
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until the process ends. Accept errors are retried, never fatal.
    pub async fn serve(self) -> io::Result<()> {
        self.serve_until(std::future::pending()).await
    }

    /// Serves until `shutdown` resolves, then lets in-flight requests finish
    /// for up to `drain_timeout` before aborting what is left.
    pub async fn serve_until<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("serving requests at '{}'", self.local_addr()?);

        let (drain_tx, drain_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        let listener = &self.listener;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                (stream, peer) = accept_with_backoff(move || listener.accept()) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let max_body_bytes = self.max_body_bytes;
                    let mut drain_rx = drain_rx.clone();

                    connections.spawn(async move {
                        let service = service_fn(move |req| {
                            handle(Arc::clone(&dispatcher), peer, max_body_bytes, req)
                        });
                        let conn = http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service);
                        tokio::pin!(conn);

                        let result = tokio::select! {
                            res = conn.as_mut() => res,
                            _ = drain_rx.changed() => {
                                conn.as_mut().graceful_shutdown();
                                conn.as_mut().await
                            }
                        };
                        if let Err(err) = result {
                            debug!("connection from {} ended with error: {}", peer, err);
                        }
                    });
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = &mut shutdown => break,
            }
        }

        info!("Draining {} connections", connections.len());
        let _ = drain_tx.send(true);

        let drained = tokio::time::timeout(self.drain_timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                "Drain timeout reached, aborting {} connections",
                connections.len()
            );
            connections.abort_all();
        }

        Ok(())
    }
}

/// Retries `accept` with exponential backoff until it yields a connection.
///
/// Errors such as EMFILE or ECONNABORTED are transient for a listener.
pub async fn accept_with_backoff<T, F, Fut>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let mut delay = Duration::ZERO;
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(err) => {
                delay = if delay.is_zero() {
                    ACCEPT_BACKOFF_START
                } else {
                    (delay * 2).min(ACCEPT_BACKOFF_MAX)
                };
                error!("Accept failed: {}; retrying in {:?}", err, delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

pub async fn handle(
    dispatcher: Arc<Dispatcher>,
    peer: SocketAddr,
    max_body_bytes: usize,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match Limited::new(body, max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            warn!(
                "Request body from {} exceeds {} bytes",
                peer, max_body_bytes
            );
            return Ok(plain(StatusCode::PAYLOAD_TOO_LARGE, "request body too large"));
        }
        Err(err) => {
            error!("Failed to read request body from {}: {}", peer, err);
            return Ok(plain(StatusCode::BAD_REQUEST, "unreadable request body"));
        }
    };

    let mut req = Request::from_parts(parts, Full::new(body));
    req.extensions_mut().insert(ClientAddr(peer));

    match dispatcher.dispatch(req).await {
        Ok(resp) => Ok(resp),
        Err(err) => Ok(error_response(&err)),
    }
}

pub fn error_response(err: &DispatchError) -> Response<Full<Bytes>> {
    match err {
        DispatchError::NoAvailableBackend => {
            plain(StatusCode::SERVICE_UNAVAILABLE, "no available backend")
        }
        DispatchError::Upstream {
            source: ExchangeError::Timeout,
            ..
        } => plain(StatusCode::GATEWAY_TIMEOUT, "upstream timeout"),
        DispatchError::Upstream { .. } => plain(StatusCode::BAD_GATEWAY, "upstream error"),
    }
}

fn plain(status: StatusCode, reason: &'static str) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from_static(reason.as_bytes())));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn dispatch_errors_map_to_gateway_statuses() {
        let resp = error_response(&DispatchError::NoAvailableBackend);
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let resp = error_response(&DispatchError::Upstream {
            address: "http://127.0.0.1:1".to_string(),
            source: ExchangeError::Timeout,
        });
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);

        let resp = error_response(&DispatchError::Upstream {
            address: "http://127.0.0.1:1".to_string(),
            source: ExchangeError::Transport("connection refused".to_string()),
        });
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(resp.headers()["content-type"], "text/plain; charset=utf-8");
    }

    #[tokio::test]
    async fn accept_errors_are_retried_until_success() {
        let attempts = AtomicUsize::new(0);

        let accepted = accept_with_backoff(|| {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                match attempt {
                    0 => Err(io::Error::from_raw_os_error(24)), // EMFILE
                    1 => Err(io::Error::from(io::ErrorKind::ConnectionAborted)),
                    _ => Ok(attempt),
                }
            }
        })
        .await;

        assert_eq!(accepted, 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
