//! Access gate middleware.
//!
//! Runs the `AccessPolicy` for every request and short-circuits with the
//! fixed HTML rejection when it denies. Must sit inside `IpProtectionLayer`
//! so the `ClientIp` extension is present.

use super::ip_protection::ClientIp;
use crate::domain::error::ApiError;
use crate::services::access::{AccessPolicy, GateOutcome};
use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::info;

/// Access gate layer
#[derive(Clone)]
pub struct AccessGateLayer {
    policy: Arc<AccessPolicy>,
}

impl AccessGateLayer {
    pub fn new(policy: Arc<AccessPolicy>) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for AccessGateLayer {
    type Service = AccessGateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessGateService {
            inner,
            policy: Arc::clone(&self.policy),
        }
    }
}

/// Access gate service
#[derive(Clone)]
pub struct AccessGateService<S> {
    inner: S,
    policy: Arc<AccessPolicy>,
}

impl<S> Service<Request<Body>> for AccessGateService<S>
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
        let policy = Arc::clone(&self.policy);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let client_ip = req
                .extensions()
                .get::<ClientIp>()
                .copied()
                .unwrap_or(ClientIp(IpAddr::V4(Ipv4Addr::LOCALHOST)));
            let path = req.uri().path().to_string();

            match policy.evaluate(&client_ip.identity(), &path).await {
                GateOutcome::Decided(decision) if decision.allowed => inner.call(req).await,
                GateOutcome::Decided(decision) => {
                    info!(
                        client_ip = %client_ip.0,
                        path = %path,
                        reason = ?decision.reason,
                        "Request denied by access gate"
                    );
                    Ok(ApiError::access_denied(decision.reason).into_response())
                }
                GateOutcome::Unavailable => Ok(ApiError::gate_unavailable().into_response()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryPolicyStore;
    use crate::domain::config::GateConfig;
    use crate::middleware::metrics::GatewayMetrics;
    use axum::http::StatusCode;
    use std::convert::Infallible;
    use tower::{service_fn, ServiceExt};

    async fn status_for(store: &Arc<InMemoryPolicyStore>, ip: &str, path: &str) -> StatusCode {
        let policy = AccessPolicy::new(
            Arc::clone(store) as Arc<dyn crate::ports::PolicyStore>,
            &GateConfig::default(),
            Arc::new(GatewayMetrics::new()),
        );
        let inner = service_fn(|_req: Request<Body>| async {
            Ok::<_, Infallible>(StatusCode::OK.into_response())
        });
        let service = AccessGateLayer::new(Arc::new(policy)).layer(inner);

        let mut req = Request::builder().uri(path).body(Body::empty()).unwrap();
        req.extensions_mut().insert(ClientIp(ip.parse().unwrap()));
        service.oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_banned_short_circuits() {
        let store = Arc::new(InMemoryPolicyStore::new());
        store.ban("203.0.113.7");

        assert_eq!(status_for(&store, "203.0.113.7", "/").await, StatusCode::FORBIDDEN);
        assert_eq!(status_for(&store, "198.51.100.1", "/").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_maintenance_short_circuits() {
        let store = Arc::new(InMemoryPolicyStore::new());
        store.set_global_open(false);

        assert_eq!(
            status_for(&store, "198.51.100.1", "/api/create-ticket").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&store, "198.51.100.1", "/panelowner.html").await,
            StatusCode::OK
        );
    }
}
