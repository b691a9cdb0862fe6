//! HTTP adapter: one POST body per call.

use std::sync::Arc;

use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;

use crate::access::client_ip;
use crate::routing::Handler;
use crate::service::envelope::{self, ApiResponse};
use crate::service::{Adapter, CallContext};

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Largest request body read for a service call.
const MAX_CALL_BODY: usize = 16 * 1024 * 1024;

pub fn http_handler(context: CallContext, adapter: Adapter) -> Handler {
    let context = Arc::new(context);
    Arc::new(move |req: Request| {
        let context = context.clone();
        let adapter = adapter.clone();
        async move {
            let tag = context.tag();
            let mut ctx = CallContext::clone(&context);
            ctx.client_ip = client_ip(&req);
            let (parts, body) = req.into_parts();
            ctx.headers = parts.headers;

            let reply = match to_bytes(body, MAX_CALL_BODY).await {
                Ok(payload) => match adapter(ctx, payload).await {
                    Ok(data) => ApiResponse::success(data, &tag),
                    Err(err) => {
                        tracing::error!(tag = %tag, error = %err, "Execute service failed");
                        err.into_response(&tag)
                    }
                },
                Err(err) => {
                    tracing::error!(tag = %tag, error = %err, "Reading request failed");
                    ApiResponse::failure(envelope::READING_REQUEST_ERROR, err.to_string(), &tag)
                }
            };
            json_reply(&reply)
        }
        .boxed()
    })
}

pub fn json_reply(reply: &ApiResponse) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))],
        reply.to_json(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{adapter_fn, ServiceError};
    use axum::body::Body;
    use serde_json::{json, Value};

    fn context() -> CallContext {
        CallContext {
            service_name: "EchoService".into(),
            method_name: "Echo".into(),
            ..CallContext::default()
        }
    }

    async fn call(handler: &Handler, body: &'static str) -> (Response, ApiResponse) {
        let req = Request::builder()
            .method("POST")
            .uri("/echo")
            .header("x-user", "alice")
            .body(Body::from(body))
            .unwrap();
        let response = handler(req).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], JSON_CONTENT_TYPE);
        let (parts, body) = response.into_parts();
        let bytes = to_bytes(body, usize::MAX).await.unwrap();
        (Response::from_parts(parts, Body::empty()), serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let handler = http_handler(
            context(),
            adapter_fn(|ctx: CallContext, payload| async move {
                let input: Value = serde_json::from_slice(&payload)?;
                Ok::<_, ServiceError>(json!({ "echo": input, "user": ctx.headers["x-user"].to_str().unwrap_or("") }))
            }),
        );
        let (_, reply) = call(&handler, r#"{"n":1}"#).await;
        assert_eq!(reply.code, envelope::SUCCESS);
        assert_eq!(reply.tag, "EchoService.Echo");
        assert_eq!(reply.data, Some(json!({"echo": {"n": 1}, "user": "alice"})));
    }

    #[tokio::test]
    async fn test_failures_stay_200() {
        let parse = http_handler(
            context(),
            adapter_fn(|_ctx, payload| async move { Ok::<_, ServiceError>(serde_json::from_slice::<Value>(&payload)?) }),
        );
        let (_, reply) = call(&parse, "{").await;
        assert_eq!(reply.code, envelope::PARSING_REQUEST_ERROR);

        let failing = http_handler(context(), adapter_fn(|_ctx, _| async { Err(ServiceError::execute("nope")) }));
        let (_, reply) = call(&failing, "").await;
        assert_eq!(reply, ApiResponse::failure(envelope::EXECUTE_SERVICE_ERROR, "nope", "EchoService.Echo"));

        let custom = ApiResponse::failure(401, "login first", "");
        let expected = custom.clone();
        let rejecting = http_handler(
            context(),
            adapter_fn(move |_ctx, _| {
                let custom = custom.clone();
                async move { Err(ServiceError::Reject(custom)) }
            }),
        );
        let (_, reply) = call(&rejecting, "").await;
        assert_eq!(reply, expected);
    }
}
