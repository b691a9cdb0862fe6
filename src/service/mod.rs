//! Service endpoints.
//!
//! # Data Flow
//! ```text
//! ServiceHandler { package, service, method → Adapter, options }
//!     → ServiceSetting (defaults → server options → handler options → service_config)
//!     → per enabled method:
//!           POST http_path → http.rs      body → adapter → JSON envelope
//!           GET  wbsk_path → websocket.rs frame → adapter → JSON envelope frame
//!     → registered on the root Router like any other route
//! ```
//!
//! # Design Decisions
//! - Adapters see raw payload bytes; decoding them is the adapter's business
//! - Every outcome, failures included, is a `200` carrying an [`ApiResponse`]
//! - A [`ServiceError::Reject`] envelope is written verbatim

pub mod envelope;
pub mod http;
pub mod websocket;

use std::collections::BTreeMap;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;

use axum::http::HeaderMap;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::setting::{merge_service_config, ServiceOption, ServiceSetting};

pub use envelope::ApiResponse;
pub use http::http_handler;
pub use websocket::{websocket_handler, WebSocketSettings};

/// Failure returned by an [`Adapter`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Send this envelope as is.
    #[error("{0}")]
    Reject(ApiResponse),

    /// The payload could not be decoded.
    #[error("parsing request: {0}")]
    Parse(String),

    #[error("{0}")]
    Execute(String),
}

impl ServiceError {
    pub fn execute(err: impl std::fmt::Display) -> Self {
        Self::Execute(err.to_string())
    }

    /// Envelope written back to the caller.
    pub fn into_response(self, tag: &str) -> ApiResponse {
        match self {
            ServiceError::Reject(response) => response,
            ServiceError::Parse(msg) => ApiResponse::failure(envelope::PARSING_REQUEST_ERROR, msg, tag),
            ServiceError::Execute(msg) => ApiResponse::failure(envelope::EXECUTE_SERVICE_ERROR, msg, tag),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Parse(err.to_string())
    }
}

/// Request facts handed to an adapter along with the payload.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub package_name: String,
    pub service_name: String,
    pub method_name: String,
    pub headers: HeaderMap,
    pub client_ip: Option<IpAddr>,
}

impl CallContext {
    /// `Service.Method`, echoed back in every envelope.
    pub fn tag(&self) -> String {
        format!("{}.{}", self.service_name, self.method_name)
    }
}

/// One service method: payload in, JSON value out.
pub type Adapter =
    Arc<dyn Fn(CallContext, Bytes) -> BoxFuture<'static, Result<serde_json::Value, ServiceError>> + Send + Sync>;

pub fn adapter_fn<F, Fut>(f: F) -> Adapter
where
    F: Fn(CallContext, Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, ServiceError>> + Send + 'static,
{
    Arc::new(move |ctx, payload| f(ctx, payload).boxed())
}

/// A named service and its method adapters.
#[derive(Clone)]
pub struct ServiceHandler {
    pub package_name: String,
    pub service_name: String,
    pub adapters: BTreeMap<String, Adapter>,
    pub options: Vec<ServiceOption>,
}

impl ServiceHandler {
    pub fn new(package_name: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            service_name: service_name.into(),
            adapters: BTreeMap::new(),
            options: Vec::new(),
        }
    }

    pub fn method<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(CallContext, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, ServiceError>> + Send + 'static,
    {
        self.adapters.insert(name.into(), adapter_fn(f));
        self
    }

    pub fn option(mut self, option: ServiceOption) -> Self {
        self.options.push(option);
        self
    }

    /// Resolve endpoint settings for every method.
    pub fn setting(&self, server_options: &[ServiceOption], rules: &[ServiceConfig]) -> ServiceSetting {
        ServiceSetting::new(
            &self.package_name,
            &self.service_name,
            self.adapters.keys().map(String::as_str),
        )
        .apply(server_options)
        .apply(&self.options)
        .apply(&merge_service_config(rules))
    }

    pub(crate) fn context(&self, method_name: &str) -> CallContext {
        CallContext {
            package_name: self.package_name.clone(),
            service_name: self.service_name.clone(),
            method_name: method_name.to_string(),
            ..CallContext::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setting::service_option;
    use serde_json::json;

    fn user_service() -> ServiceHandler {
        ServiceHandler::new("demo.v1", "UserService")
            .method("Get", |_ctx, _payload| async { Ok(json!({})) })
            .method("List", |_ctx, _payload| async { Ok(json!([])) })
    }

    #[test]
    fn test_setting_precedence() {
        let server = vec![service_option(|s: &mut ServiceSetting| {
            for m in s.methods.values_mut() {
                m.http_path = "/server".into();
            }
        })];
        let handler = user_service().option(service_option(|s: &mut ServiceSetting| {
            if let Some(m) = s.methods.get_mut("Get") {
                m.http_path = "/handler".into();
            }
        }));
        let rules = vec![ServiceConfig {
            service: "User*".into(),
            method: "List".into(),
            wbsk_off: Some(false),
            ..ServiceConfig::default()
        }];

        let setting = handler.setting(&server, &rules);
        assert_eq!(setting.methods["Get"].http_path, "/handler");
        assert_eq!(setting.methods["List"].http_path, "/server");
        assert!(setting.methods["Get"].wbsk_off);
        assert!(!setting.methods["List"].wbsk_off);
        assert_eq!(setting.methods["List"].wbsk_path, "/demo/v1/user/list");
    }

    #[test]
    fn test_error_envelopes() {
        let rejected = ApiResponse::failure(42, "custom", "");
        assert_eq!(ServiceError::Reject(rejected.clone()).into_response("S.M"), rejected);
        assert_eq!(
            ServiceError::execute("boom").into_response("S.M"),
            ApiResponse::failure(envelope::EXECUTE_SERVICE_ERROR, "boom", "S.M")
        );
        let parse: ServiceError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(parse.into_response("S.M").code, envelope::PARSING_REQUEST_ERROR);
    }

    #[test]
    fn test_tag() {
        assert_eq!(user_service().context("Get").tag(), "UserService.Get");
    }
}
