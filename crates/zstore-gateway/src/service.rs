//! Ticket gateway service - wires adapters, services and the HTTP server.

use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::middleware::{GatewayMetrics, MiddlewareStack};
use crate::ports::{ChatPlatform, PolicyStore};
use crate::router::{build_router, AppState};
use crate::services::{AccessPolicy, ChannelProvisioner, ChannelTeardown};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Ticket gateway service state
pub struct TicketGatewayService {
    config: GatewayConfig,
    platform: Arc<dyn ChatPlatform>,
    provisioner: Arc<ChannelProvisioner>,
    teardown: Arc<ChannelTeardown>,
    stack: MiddlewareStack,
    metrics: Arc<GatewayMetrics>,
    shutdown_tx: watch::Sender<bool>,
}

impl TicketGatewayService {
    /// Create a new gateway service over the given collaborators
    pub fn new(
        config: GatewayConfig,
        platform: Arc<dyn ChatPlatform>,
        store: Arc<dyn PolicyStore>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;

        let metrics = Arc::new(GatewayMetrics::new());

        let provisioner = Arc::new(ChannelProvisioner::new(
            Arc::clone(&platform),
            config.guild_id()?,
            config.category_id()?,
            config.owner_id()?,
            Arc::clone(&metrics),
        ));

        let teardown = Arc::new(ChannelTeardown::new(
            Arc::clone(&platform),
            config.category_id()?,
            config.teardown.delay,
            Arc::clone(&metrics),
        ));

        let policy = Arc::new(AccessPolicy::new(store, &config.gate, Arc::clone(&metrics)));
        let stack = MiddlewareStack::from_config(&config, policy, Arc::clone(&metrics));

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            platform,
            provisioner,
            teardown,
            stack,
            metrics,
            shutdown_tx,
        })
    }

    /// Build the HTTP router without binding a socket
    pub fn router(&self) -> Router {
        let state = AppState {
            provisioner: Arc::clone(&self.provisioner),
            teardown: Arc::clone(&self.teardown),
            metrics: Arc::clone(&self.metrics),
        };
        build_router(state, &self.stack, &self.config)
    }

    /// Serve until `shutdown()` is called or the server fails
    pub async fn start(&self) -> Result<(), GatewayError> {
        info!("Starting ticket gateway...");

        match self.platform.current_user().await {
            Ok(user) => info!(bot = %user.tag(), "Chat platform session ready"),
            Err(e) => {
                error!(error = %e, "Chat platform session check failed");
                return Err(GatewayError::Platform(e));
            }
        }

        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{}: {}", addr, e)))?;
        info!(
            addr = %addr,
            admin_path = %self.config.gate.admin_path,
            fail_open = self.config.gate.fail_open,
            "HTTP server listening"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let result = axum::serve(
            listener,
            self.router().into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            // Resolves on `shutdown()` or when the sender is dropped
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        })
        .await;

        let pending = self.teardown.pending_count();
        if pending > 0 {
            warn!(pending, "Dropping pending channel teardowns");
        }
        self.teardown.shutdown();

        match result {
            Ok(()) => {
                info!("Ticket gateway stopped");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "HTTP server error");
                Err(GatewayError::Internal(e.to_string()))
            }
        }
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Get metrics
    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Get the teardown scheduler
    pub fn teardown(&self) -> Arc<ChannelTeardown> {
        Arc::clone(&self.teardown)
    }
}
