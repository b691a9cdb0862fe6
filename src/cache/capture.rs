//! Response capture and replay.
//!
//! # Responsibilities
//! - Decide which responses are cacheable ([`StatusWindow`])
//! - Tee a live response body into an owned buffer while it streams to the
//!   client ([`RecordingBody`])
//! - Rebuild a response from a [`CachedResponse`] on a hit
//!
//! # Design Decisions
//! - Status and headers are copied from the response parts, the body is
//!   copied frame by frame as it is polled; nothing is shared with the live
//!   response once captured
//! - The completion callback fires only after the last frame was forwarded,
//!   so a store never delays the client
//! - Bodies over the size limit or ending in an error are forwarded untouched
//!   and simply not cached

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::{Bytes, BytesMut};
use http_body::{Body as HttpBody, Frame, SizeHint};

/// A response copied out of the live exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    /// Distinct header names in first-seen order.
    pub header_names: Vec<String>,
    /// Values for `header_names[i]`, in original order.
    pub header_values: Vec<Vec<String>>,
    pub body: Bytes,
}

impl CachedResponse {
    /// Copy status and headers from a live response. The body is filled in
    /// once it has been recorded.
    pub fn from_parts(status: StatusCode, headers: &HeaderMap) -> Self {
        let mut header_names = Vec::with_capacity(headers.keys_len());
        let mut header_values = Vec::with_capacity(headers.keys_len());
        for name in headers.keys() {
            header_names.push(name.as_str().to_string());
            header_values.push(
                headers
                    .get_all(name)
                    .iter()
                    .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                    .collect(),
            );
        }
        Self {
            status: status.as_u16(),
            header_names,
            header_values,
            body: Bytes::new(),
        }
    }

    /// Rebuild a response. Headers that no longer parse are skipped.
    pub fn to_response(&self) -> Response {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);

        let headers = response.headers_mut();
        for (name, values) in self.header_names.iter().zip(&self.header_values) {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                continue;
            };
            for value in values {
                if let Ok(value) = HeaderValue::from_str(value) {
                    headers.append(name.clone(), value);
                }
            }
        }
        response
    }
}

/// Inclusive range of cacheable status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusWindow {
    pub min: u16,
    pub max: u16,
}

impl StatusWindow {
    pub fn contains(&self, status: StatusCode) -> bool {
        (self.min..=self.max).contains(&status.as_u16())
    }
}

/// `age < ttl`; an entry exactly `ttl` old is already stale.
pub fn is_fresh(age: Duration, ttl_secs: i64) -> bool {
    ttl_secs > 0 && age < Duration::from_secs(ttl_secs as u64)
}

type OnComplete = Box<dyn FnOnce(CachedResponse) + Send>;

/// Forwards every frame of `inner` while keeping a copy of the data.
pub struct RecordingBody {
    inner: Body,
    buf: BytesMut,
    limit: usize,
    captured: Option<CachedResponse>,
    on_complete: Option<OnComplete>,
}

impl RecordingBody {
    fn record(&mut self, data: &Bytes) {
        if self.on_complete.is_none() {
            return;
        }
        if self.buf.len() + data.len() > self.limit {
            tracing::debug!(limit = self.limit, "Response body too large to cache");
            self.abandon();
            return;
        }
        self.buf.extend_from_slice(data);
    }

    fn finish(&mut self) {
        if let (Some(callback), Some(mut captured)) = (self.on_complete.take(), self.captured.take()) {
            captured.body = self.buf.split().freeze();
            callback(captured);
        }
    }

    fn abandon(&mut self) {
        self.on_complete = None;
        self.captured = None;
        self.buf = BytesMut::new();
    }
}

impl HttpBody for RecordingBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.record(data);
                }
                if this.inner.is_end_stream() {
                    this.finish();
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.abandon();
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Hand `response` back with a recording body. `on_complete` runs once with
/// the captured copy after the client has received the full body.
pub fn record<F>(response: Response, limit: usize, on_complete: F) -> Response
where
    F: FnOnce(CachedResponse) + Send + 'static,
{
    let (parts, body) = response.into_parts();
    let captured = CachedResponse::from_parts(parts.status, &parts.headers);

    if body.is_end_stream() {
        on_complete(captured);
        return Response::from_parts(parts, body);
    }

    let recording = RecordingBody {
        inner: body,
        buf: BytesMut::new(),
        limit,
        captured: Some(captured),
        on_complete: Some(Box::new(on_complete)),
    };
    Response::from_parts(parts, Body::new(recording))
}
