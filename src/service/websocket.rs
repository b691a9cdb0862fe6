//! WebSocket adapter.
//!
//! # Responsibilities
//! - Complete the upgrade handshake (`GET wbsk_path`)
//! - Invoke the adapter once per inbound text or binary frame
//! - Reply with the envelope in the frame type the request used
//!
//! # Design Decisions
//! - Unless disabled, a present `Origin` must name the same host as `Host`
//! - A read or write error ends the session; ping/pong is left to axum

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, Request};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use bytes::Bytes;
use futures_util::FutureExt;
use url::Url;

use crate::access::client_ip;
use crate::config::schema::WebSocketConfig;
use crate::routing::Handler;
use crate::service::envelope::ApiResponse;
use crate::service::{Adapter, CallContext};

/// Upgrade parameters shared by every WebSocket endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebSocketSettings {
    /// 0 keeps the library default.
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
    pub check_origin: bool,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            read_buffer_size: 0,
            write_buffer_size: 0,
            check_origin: true,
        }
    }
}

impl From<&WebSocketConfig> for WebSocketSettings {
    fn from(config: &WebSocketConfig) -> Self {
        Self {
            read_buffer_size: config.read_buffer_size,
            write_buffer_size: config.write_buffer_size,
            check_origin: !config.not_check_origin,
        }
    }
}

/// No `Origin` passes; otherwise its host (and port) must equal `Host`.
pub fn same_origin(headers: &HeaderMap) -> bool {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return true;
    };
    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok());
    let origin = origin.to_str().ok().and_then(|o| Url::parse(o).ok());
    match (origin, host) {
        (Some(origin), Some(host)) => {
            let authority = match (origin.host_str(), origin.port()) {
                (Some(h), Some(p)) => format!("{}:{}", h, p),
                (Some(h), None) => h.to_string(),
                _ => return false,
            };
            authority.eq_ignore_ascii_case(host)
        }
        _ => false,
    }
}

pub fn websocket_handler(context: CallContext, adapter: Adapter, settings: WebSocketSettings) -> Handler {
    let context = Arc::new(context);
    Arc::new(move |req: Request| {
        let context = context.clone();
        let adapter = adapter.clone();
        async move {
            if settings.check_origin && !same_origin(req.headers()) {
                tracing::warn!(tag = %context.tag(), "WebSocket origin rejected");
                return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
            }

            let mut ctx = CallContext::clone(&context);
            ctx.client_ip = client_ip(&req);
            let (mut parts, _body) = req.into_parts();
            let mut upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
                Ok(upgrade) => upgrade,
                Err(rejection) => return rejection.into_response(),
            };
            ctx.headers = parts.headers;

            if settings.read_buffer_size > 0 {
                upgrade = upgrade.read_buffer_size(settings.read_buffer_size);
            }
            if settings.write_buffer_size > 0 {
                upgrade = upgrade.write_buffer_size(settings.write_buffer_size);
            }
            upgrade.on_upgrade(move |socket| serve_socket(socket, ctx, adapter))
        }
        .boxed()
    })
}

async fn serve_socket(mut socket: WebSocket, ctx: CallContext, adapter: Adapter) {
    let tag = ctx.tag();
    tracing::debug!(tag = %tag, "WebSocket session opened");

    while let Some(frame) = socket.recv().await {
        let (payload, text) = match frame {
            Ok(Message::Text(text)) => (Bytes::copy_from_slice(text.as_str().as_bytes()), true),
            Ok(Message::Binary(data)) => (data, false),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                tracing::debug!(tag = %tag, error = %err, "Reading message failed");
                break;
            }
        };

        let reply = match adapter(ctx.clone(), payload).await {
            Ok(data) => ApiResponse::success(data, &tag),
            Err(err) => {
                tracing::error!(tag = %tag, error = %err, "Execute service failed");
                err.into_response(&tag)
            }
        };
        let json = reply.to_json();
        let message = if text {
            Message::Text(json.into())
        } else {
            Message::Binary(Bytes::from(json))
        };
        if let Err(err) = socket.send(message).await {
            tracing::debug!(tag = %tag, error = %err, "Writing message failed");
            break;
        }
    }

    tracing::debug!(tag = %tag, "WebSocket session closed");
}
