//! Request tracing middleware.
//!
//! Wraps each request in an `http_request` span and records the final
//! status and latency into the gateway metrics.

use super::ip_protection::ClientIp;
use super::metrics::{GatewayMetrics, RequestTimer};
use axum::{body::Body, http::Request, response::Response};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{debug, field, info_span, Instrument, Span};

/// Tracing layer that creates spans for each request
#[derive(Clone)]
pub struct TracingLayer {
    metrics: Arc<GatewayMetrics>,
}

impl TracingLayer {
    pub fn new(metrics: Arc<GatewayMetrics>) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService {
            inner,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Tracing service
#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
    metrics: Arc<GatewayMetrics>,
}

impl<S> Service<Request<Body>> for TracingService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let timer = RequestTimer::new(Arc::clone(&self.metrics));

        let span = info_span!(
            "http_request",
            method = %req.method(),
            path = %req.uri().path(),
            client_ip = field::Empty,
            status = field::Empty,
        );
        if let Some(ip) = req.extensions().get::<ClientIp>() {
            span.record("client_ip", field::display(ip.0));
        }

        Box::pin(
            async move {
                let result = inner.call(req).await;

                let success = match &result {
                    Ok(response) => {
                        let status = response.status();
                        Span::current().record("status", status.as_u16());
                        debug!("Request completed");
                        status.is_success()
                    }
                    Err(_) => false,
                };
                timer.finish(success);

                result
            }
            .instrument(span),
        )
    }
}
