//! External reverse proxy.
//!
//! # Responsibilities
//! - Forward a request to `{scheme}://{authority}{proxy_path}?{query}`
//! - Strip hop-by-hop headers in both directions
//! - Map upstream failures to `502 Bad Gateway`
//!
//! # Design Decisions
//! - The upstream authority is resolved once at compile time from the name
//!   the rule gives; an unmapped name is used as the authority itself
//! - Request and response bodies are buffered; proxied RPC payloads are small

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use url::Url;

use crate::routing::Handler;

/// Largest request body forwarded upstream.
const MAX_PROXY_BODY: usize = 8 * 1024 * 1024;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    header::HOST,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Where a proxied route forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    /// Name the route was configured with.
    pub service: String,
    /// `host:port` actually dialled.
    pub authority: String,
    pub path: String,
    pub https: bool,
}

impl ProxyTarget {
    /// URL for one request; the incoming query string is carried over.
    pub fn url(&self, query: Option<&str>) -> Result<Url, url::ParseError> {
        let scheme = if self.https { "https" } else { "http" };
        let mut url = Url::parse(&format!("{}://{}", scheme, self.authority))?;
        url.set_path(&self.path);
        url.set_query(query.filter(|q| !q.is_empty()));
        Ok(url)
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

/// A handler forwarding every request to `target`.
pub fn proxy_handler(client: reqwest::Client, target: ProxyTarget) -> Handler {
    let target = Arc::new(target);
    Arc::new(move |req: Request| {
        let client = client.clone();
        let target = target.clone();
        async move {
            match forward(&client, &target, req).await {
                Ok(response) => response,
                Err(message) => {
                    tracing::warn!(
                        service = %target.service,
                        authority = %target.authority,
                        path = %target.path,
                        error = %message,
                        "Upstream request failed"
                    );
                    (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
                }
            }
        }
        .boxed()
    })
}

async fn forward(client: &reqwest::Client, target: &ProxyTarget, req: Request) -> Result<Response, String> {
    let url = target.url(req.uri().query()).map_err(|e| e.to_string())?;
    let (parts, body) = req.into_parts();
    let body = to_bytes(body, MAX_PROXY_BODY).await.map_err(|e| e.to_string())?;

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);

    tracing::debug!(method = %parts.method, url = %url, "Forwarding request");
    let upstream = client
        .request(parts.method, url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::CONTENT_LENGTH);
    let body = upstream.bytes().await.map_err(|e| e.to_string())?;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}
