use std::{convert::Infallible, time::Duration};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, StatusCode, body::Incoming, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use roundhouse_bridge::forward::ClientAddr;
use roundhouse_lb::{Backend, ConfigError, ExchangeError};
use roundhouse_transport::{http_client::HttpClient, proxy_backend::ProxyBackend};

async fn start_upstream(delay: Duration) -> std::io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(v) => v,
                Err(_) => break,
            };
            let service = service_fn(move |req: Request<Incoming>| async move {
                tokio::time::sleep(delay).await;
                let header = |name: &str| {
                    req.headers()
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-")
                        .to_string()
                };
                let summary = format!(
                    "{} {} host={} xff={}",
                    req.method(),
                    req.uri(),
                    header("host"),
                    header("x-forwarded-for"),
                );
                let resp = Response::builder()
                    .status(StatusCode::CREATED)
                    .header("x-upstream", "yes")
                    .body(Full::new(Bytes::from(summary)))
                    .unwrap();
                Ok::<_, Infallible>(resp)
            });

            tokio::spawn(async move {
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    Ok(port)
}

fn client() -> HttpClient {
    HttpClient::new(8).unwrap()
}

fn request(path: &str) -> Request<Full<Bytes>> {
    let mut req = Request::builder()
        .method("GET")
        .uri(path)
        .header("host", "lb.local")
        .body(Full::new(Bytes::new()))
        .unwrap();
    req.extensions_mut()
        .insert(ClientAddr("10.9.8.7:41000".parse().unwrap()));
    req
}

#[tokio::test]
async fn exchange_relays_request_and_response() {
    let port = start_upstream(Duration::ZERO).await.unwrap();
    let address = format!("http://127.0.0.1:{port}");
    let backend =
        ProxyBackend::new(&address, client(), Duration::from_secs(5)).unwrap();

    let resp = backend.exchange(request("/orders?id=7")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.headers()["x-upstream"], "yes");

    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(
        body,
        format!("GET /orders?id=7 host=127.0.0.1:{port} xff=10.9.8.7")
    );
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let port = start_upstream(Duration::from_millis(500)).await.unwrap();
    let address = format!("http://127.0.0.1:{port}");
    let backend =
        ProxyBackend::new(&address, client(), Duration::from_millis(50)).unwrap();

    let err = backend.exchange(request("/")).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Timeout));
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let address = format!("http://127.0.0.1:{port}");
    let backend =
        ProxyBackend::new(&address, client(), Duration::from_secs(5)).unwrap();

    let err = backend.exchange(request("/")).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Transport(_)));
}

#[test]
fn unparsable_address_is_a_config_error() {
    let err = ProxyBackend::new("ftp://files.local", client(), Duration::from_secs(1))
        .err()
        .unwrap();
    match err {
        ConfigError::InvalidAddress { address, .. } => assert_eq!(address, "ftp://files.local"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn liveness_handle_controls_is_alive() {
    let backend = ProxyBackend::new(
        "http://127.0.0.1:1",
        client(),
        Duration::from_secs(1),
    )
    .unwrap();
    assert!(backend.is_alive());

    let liveness = backend.liveness();
    liveness.mark_down();
    assert!(!backend.is_alive());
    liveness.mark_up();
    assert!(backend.is_alive());
}

#[tokio::test]
async fn oversized_upstream_body_is_rejected() {
    let port = start_upstream(Duration::ZERO).await.unwrap();
    let address = format!("http://127.0.0.1:{port}");
    let backend = ProxyBackend::new(&address, client(), Duration::from_secs(5))
        .unwrap()
        .with_max_body_bytes(8);

    let err = backend.exchange(request("/orders")).await.unwrap_err();
    match err {
        ExchangeError::Body(reason) => assert!(reason.contains("exceeds 8 bytes")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn https_addresses_are_accepted() {
    let backend =
        ProxyBackend::new("https://www.bing.com", client(), Duration::from_secs(1)).unwrap();
    assert_eq!(backend.address(), "https://www.bing.com");
}

#[tokio::test]
async fn https_backend_negotiates_tls() {
    // plain HTTP upstream: the TLS handshake must fail instead of sending cleartext
    let port = start_upstream(Duration::ZERO).await.unwrap();
    let address = format!("https://127.0.0.1:{port}");
    let backend = ProxyBackend::new(&address, client(), Duration::from_secs(5)).unwrap();

    let err = backend.exchange(request("/")).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Transport(_)));
}
