//! Filter chain primitives.
//!
//! A route is served by an ordered list of [`Filter`]s followed by one terminal
//! [`Handler`]. Each filter receives the request and a [`Next`] handle; calling
//! `next.run(req)` runs the remainder of the chain, not calling it short-circuits.
//!
//! ```text
//! request → filter[0] → filter[1] → ... → handler
//! response ←────────────────────────────────┘
//! ```

use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

/// Terminal request handler.
pub type Handler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// A middleware step that may inspect, rewrite, or short-circuit a request.
pub type Filter = Arc<dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync>;

/// Build a [`Handler`] from an async closure.
pub fn handler_fn<F, Fut, R>(f: F) -> Handler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + 'static,
{
    Arc::new(move |req| f(req).map(IntoResponse::into_response).boxed())
}

/// Build a [`Filter`] from an async closure.
pub fn filter_fn<F, Fut, R>(f: F) -> Filter
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + 'static,
{
    Arc::new(move |req, next| f(req, next).map(IntoResponse::into_response).boxed())
}

/// Concatenate two filter lists, preserving order.
pub fn join_filters(first: &[Filter], second: &[Filter]) -> Vec<Filter> {
    let mut joined = Vec::with_capacity(first.len() + second.len());
    joined.extend_from_slice(first);
    joined.extend_from_slice(second);
    joined
}

/// An immutable, cheaply cloneable filter chain ending in a handler.
#[derive(Clone)]
pub struct Chain {
    filters: Arc<[Filter]>,
    handler: Handler,
}

impl Chain {
    pub fn new(filters: Vec<Filter>, handler: Handler) -> Self {
        Self {
            filters: filters.into(),
            handler,
        }
    }

    /// Number of filters ahead of the handler.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run the whole chain for one request.
    pub async fn call(&self, req: Request) -> Response {
        Next {
            chain: self.clone(),
            index: 0,
        }
        .run(req)
        .await
    }
}

/// The remainder of a chain, handed to each filter.
pub struct Next {
    chain: Chain,
    index: usize,
}

impl Next {
    /// Run the next filter, or the handler once all filters have run.
    pub async fn run(self, req: Request) -> Response {
        match self.chain.filters.get(self.index).cloned() {
            Some(filter) => {
                let next = Next {
                    index: self.index + 1,
                    chain: self.chain,
                };
                filter(req, next).await
            }
            None => (self.chain.handler)(req).await,
        }
    }
}

/// Adapt a filter list to an axum middleware so it can wrap services that are
/// not [`Handler`]s (static file mounts).
pub fn into_middleware(
    filters: Vec<Filter>,
) -> impl Fn(Request, axum::middleware::Next) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static
{
    let filters: Arc<[Filter]> = filters.into();
    move |req: Request, inner: axum::middleware::Next| {
        let handler: Handler = Arc::new(move |req| {
            let inner = inner.clone();
            async move { inner.run(req).await }.boxed()
        });
        let chain = Chain {
            filters: filters.clone(),
            handler,
        };
        async move { chain.call(req).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use std::sync::Mutex;

    fn tracing_filter(log: Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Filter {
        filter_fn(move |req, next: Next| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(name);
                next.run(req).await
            }
        })
    }

    #[tokio::test]
    async fn test_filters_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler_log = log.clone();
        let chain = Chain::new(
            vec![
                tracing_filter(log.clone(), "first"),
                tracing_filter(log.clone(), "second"),
            ],
            handler_fn(move |_req| {
                let log = handler_log.clone();
                async move {
                    log.lock().unwrap().push("handler");
                    StatusCode::OK
                }
            }),
        );

        let res = chain.call(Request::new(Body::empty())).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "handler"]);
    }

    #[tokio::test]
    async fn test_filter_short_circuit() {
        let reached = Arc::new(Mutex::new(false));
        let flag = reached.clone();
        let chain = Chain::new(
            vec![filter_fn(|_req, _next| async { StatusCode::FORBIDDEN })],
            handler_fn(move |_req| {
                let flag = flag.clone();
                async move {
                    *flag.lock().unwrap() = true;
                    StatusCode::OK
                }
            }),
        );

        let res = chain.call(Request::new(Body::empty())).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert!(!*reached.lock().unwrap());
    }
}
