//! Request fingerprints.

use axum::body::Body;
use axum::extract::Request;
use axum::http::Method;
use bytes::{Bytes, BytesMut};
use futures_util::{stream, StreamExt};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("request body could not be read: {0}")]
    Body(#[from] axum::Error),
}

/// Only these methods contribute their body to the key.
pub fn hashes_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// `METHOD:path:query`, plus `:sha256(body)` for methods with a meaningful
/// body. The body is buffered and put back so the handler still sees it.
///
/// A body longer than `limit` yields no key. The request comes back with the
/// buffered prefix followed by the unread remainder of the stream.
pub async fn fingerprint(req: Request, limit: usize) -> Result<(Request, Option<String>), FingerprintError> {
    let mut key = format!(
        "{}:{}:{}",
        req.method(),
        req.uri().path(),
        req.uri().query().unwrap_or("")
    );

    if !hashes_body(req.method()) {
        return Ok((req, Some(key)));
    }

    let (parts, body) = req.into_parts();
    let mut frames = body.into_data_stream();
    let mut buffered = BytesMut::new();
    while let Some(chunk) = frames.next().await {
        let chunk = chunk?;
        if buffered.len() + chunk.len() > limit {
            let head: [Result<Bytes, axum::Error>; 2] = [Ok(buffered.freeze()), Ok(chunk)];
            let body = Body::from_stream(stream::iter(head).chain(frames));
            return Ok((Request::from_parts(parts, body), None));
        }
        buffered.extend_from_slice(&chunk);
    }
    let bytes = buffered.freeze();

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    key.push(':');
    key.push_str(&format!("{:x}", hasher.finalize()));

    Ok((Request::from_parts(parts, Body::from(bytes)), Some(key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn request(method: Method, uri: &str, body: &'static str) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body))
            .unwrap()
    }

    async fn key_of(req: Request) -> String {
        fingerprint(req, 1024).await.unwrap().1.unwrap()
    }

    #[tokio::test]
    async fn test_get_ignores_body() {
        let a = key_of(request(Method::GET, "/svc/echo?x=1", "one")).await;
        let b = key_of(request(Method::GET, "/svc/echo?x=1", "two")).await;
        assert_eq!(a, "GET:/svc/echo:x=1");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_post_hashes_body_and_keeps_it() {
        let (req, a) = fingerprint(request(Method::POST, "/svc/echo", "{\"a\":1}"), 1024).await.unwrap();
        let a = a.unwrap();
        let b = key_of(request(Method::POST, "/svc/echo", "{\"a\":2}")).await;

        assert!(a.starts_with("POST:/svc/echo::"));
        assert_eq!(a.len(), "POST:/svc/echo::".len() + 64);
        assert_ne!(a, b);

        let body = to_bytes(req.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_query_is_part_of_key() {
        let a = key_of(request(Method::PUT, "/x?v=1", "")).await;
        let b = key_of(request(Method::PUT, "/x?v=2", "")).await;
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_oversized_body_is_unkeyed_but_intact() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = ["0123", "4567", "89"]
            .into_iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/x")
            .body(Body::from_stream(stream::iter(chunks)))
            .unwrap();

        let (req, key) = fingerprint(req, 6).await.unwrap();
        assert!(key.is_none());
        let body = to_bytes(req.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"0123456789");
    }

    #[tokio::test]
    async fn test_body_at_limit_is_keyed() {
        let (_, key) = fingerprint(request(Method::POST, "/x", "0123"), 4).await.unwrap();
        assert!(key.is_some());
    }
}
