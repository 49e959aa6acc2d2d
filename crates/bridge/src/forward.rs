use std::net::SocketAddr;

use bytes::Bytes;
use http::{
    HeaderMap, HeaderName, HeaderValue, Request, Response, Uri, Version,
    uri::{Authority, PathAndQuery, Scheme},
};
use http_body_util::Full;

const HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug)]
pub enum BridgeError {
    InvalidAddress(String),
    InvalidUri,
    InvalidHeader,
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::InvalidAddress(reason) => write!(f, "invalid address: {reason}"),
            BridgeError::InvalidUri => write!(f, "invalid uri"),
            BridgeError::InvalidHeader => write!(f, "invalid header"),
        }
    }
}

impl std::error::Error for BridgeError {}

/// Peer address of the inbound connection, carried as a request extension.
#[derive(Clone, Copy, Debug)]
pub struct ClientAddr(pub SocketAddr);

/// Parsed backend locator, e.g. `http://10.0.0.5:8080/base` or `https://www.bing.com`.
#[derive(Clone, Debug)]
pub struct UpstreamTarget {
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    base_query: Option<String>,
}

impl UpstreamTarget {
    pub fn parse(address: &str) -> Result<Self, BridgeError> {
        let uri: Uri = address
            .trim()
            .parse()
            .map_err(|err| BridgeError::InvalidAddress(format!("{err}")))?;

        let scheme = uri
            .scheme()
            .cloned()
            .ok_or_else(|| BridgeError::InvalidAddress("missing scheme".to_string()))?;
        if scheme != Scheme::HTTP && scheme != Scheme::HTTPS {
            return Err(BridgeError::InvalidAddress(format!(
                "unsupported scheme '{scheme}'"
            )));
        }

        let authority = uri
            .authority()
            .cloned()
            .ok_or_else(|| BridgeError::InvalidAddress("missing host".to_string()))?;
        if authority.host().is_empty() {
            return Err(BridgeError::InvalidAddress("missing host".to_string()));
        }

        Ok(Self {
            scheme,
            authority,
            base_path: uri.path().to_string(),
            base_query: uri.query().map(str::to_string),
        })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn is_https(&self) -> bool {
        self.scheme == Scheme::HTTPS
    }

    /// Absolute URI on this backend for an inbound path and query.
    pub fn uri_for(&self, inbound: &Uri) -> Result<Uri, BridgeError> {
        let path = join_path(&self.base_path, inbound.path());
        let query = match (self.base_query.as_deref(), inbound.query()) {
            (Some(base), Some(req)) if !base.is_empty() => Some(format!("{base}&{req}")),
            (Some(base), None) => Some(base.to_string()),
            (_, req) => req.map(str::to_string),
        };

        let path_and_query = match query {
            Some(query) => format!("{path}?{query}"),
            None => path,
        };
        let path_and_query =
            PathAndQuery::try_from(path_and_query).map_err(|_| BridgeError::InvalidUri)?;

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|_| BridgeError::InvalidUri)
    }
}

/// Joins two path segments with exactly one slash between them.
pub fn join_path(base: &str, path: &str) -> String {
    let base_slash = base.ends_with('/');
    let path_slash = path.starts_with('/');
    match (base_slash, path_slash) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Removes hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_headers(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(http::header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_HEADERS {
        headers.remove(*name);
    }
}

/// Rewrites an inbound request so it can be sent to `target`.
pub fn build_upstream_request(
    target: &UpstreamTarget,
    req: Request<Full<Bytes>>,
) -> Result<Request<Full<Bytes>>, BridgeError> {
    let (mut parts, body) = req.into_parts();

    parts.uri = target.uri_for(&parts.uri)?;
    parts.version = Version::HTTP_11;

    strip_hop_headers(&mut parts.headers);
    parts.headers.remove(http::header::CONTENT_LENGTH);

    let host = HeaderValue::from_str(target.authority().as_str())
        .map_err(|_| BridgeError::InvalidHeader)?;
    parts.headers.insert(http::header::HOST, host);

    if let Some(ClientAddr(addr)) = parts.extensions.get::<ClientAddr>().copied() {
        let forwarded = forwarded_for(&parts.headers, addr)?;
        parts
            .headers
            .insert(HeaderName::from_static(X_FORWARDED_FOR), forwarded);
    }

    Ok(Request::from_parts(parts, body))
}

/// Every prior `x-forwarded-for` value joined with `", "`, then the client IP.
///
/// Works on raw bytes so a non-UTF-8 prior hop is carried over untouched.
fn forwarded_for(headers: &HeaderMap, client: SocketAddr) -> Result<HeaderValue, BridgeError> {
    let mut value = Vec::new();
    for prior in headers.get_all(X_FORWARDED_FOR) {
        value.extend_from_slice(prior.as_bytes());
        value.extend_from_slice(b", ");
    }
    value.extend_from_slice(client.ip().to_string().as_bytes());

    HeaderValue::from_bytes(&value).map_err(|_| BridgeError::InvalidHeader)
}

/// Drops hop-by-hop headers from an upstream response before relaying it.
pub fn clean_response(resp: Response<Full<Bytes>>) -> Response<Full<Bytes>> {
    let (mut parts, body) = resp.into_parts();
    strip_hop_headers(&mut parts.headers);
    Response::from_parts(parts, body)
}
