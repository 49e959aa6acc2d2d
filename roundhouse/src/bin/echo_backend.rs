use std::{convert::Infallible, net::SocketAddr};

use bytes::Bytes;
use clap::Parser;
use http_body_util::Full;
use hyper::{Request, Response, body::Incoming, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(version, about = "Minimal HTTP/1 backend for roundhouse")]
struct Cli {
    #[arg(long, default_value_t = 8081)]
    port: u16,

    // Name reported in every response body
    #[arg(long, default_value = "backend")]
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let addr: SocketAddr = format!("127.0.0.1:{}", cli.port).parse()?;
    let body = Bytes::from(format!("served-by:{}\n", cli.name));

    let listener = TcpListener::bind(addr).await?;
    println!("HTTP/1 backend '{}' listening on http://{}", cli.name, addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let body = body.clone();
        let service = service_fn(move |_req: Request<Incoming>| {
            let body = body.clone();
            async move { Ok::<_, Infallible>(Response::new(Full::new(body))) }
        });

        tokio::spawn(async move {
            let _ = hyper::server::conn::http1::Builder::new()
                .serve_connection(io, service)
                .await;
        });
    }
}
