//! Gateway with a deferred startup lifecycle.
//!
//! `new()` allocates shared state, `start()` binds the listener, and
//! `serve()` accepts connections until the shutdown future resolves.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, put};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    create_user, delete_all_users, delete_user, feed_upgrade_handler, get_asset, get_user,
    health_handler, list_users, liveness_handler, patch_user, put_user, put_user_image,
    readiness_handler, AppState,
};
use super::middleware::{build_http_layers, track_in_flight};
use super::shutdown::ShutdownController;
use crate::records::RecordStoreAdapter;
use crate::traits::AssetStore;

/// HTTP/WebSocket front end for a [`RecordStoreAdapter`].
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    adapter: Arc<RecordStoreAdapter>,
    assets: Arc<dyn AssetStore>,
    shutdown: Arc<ShutdownController>,
    start_time: Instant,
}

impl NetworkModule {
    /// Creates the module without binding a port.
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        adapter: Arc<RecordStoreAdapter>,
        assets: Arc<dyn AssetStore>,
    ) -> Self {
        Self {
            config,
            listener: None,
            adapter,
            assets,
            shutdown: Arc::new(ShutdownController::new()),
            start_time: Instant::now(),
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles routes and middleware.
    ///
    /// Record and asset routes are counted as in flight and refused while
    /// draining; probes are not.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            adapter: Arc::clone(&self.adapter),
            assets: Arc::clone(&self.assets),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            start_time: self.start_time,
        };

        let records = Router::new()
            .route(
                "/users",
                get(list_users).post(create_user).delete(delete_all_users),
            )
            .route("/users/feed", get(feed_upgrade_handler))
            .route(
                "/users/{id}",
                get(get_user)
                    .put(put_user)
                    .patch(patch_user)
                    .delete(delete_user),
            )
            .route("/users/{id}/image", put(put_user_image))
            .route("/assets/{*path}", get(get_asset))
            .route_layer(axum::middleware::from_fn_with_state(
                Arc::clone(&self.shutdown),
                track_in_flight,
            ));

        let probes = Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler));

        records
            .merge(probes)
            .layer(DefaultBodyLimit::max(self.config.max_body_bytes))
            .layer(build_http_layers(&self.config))
            .with_state(state)
    }

    /// Binds the listener and returns the bound port (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    ///
    /// When `shutdown` resolves the controller moves to `Draining`: new
    /// record requests get 503 and open feeds are closed. Then `serve` waits
    /// up to `drain_timeout` for the in-flight count to reach zero.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called or the server hits a
    /// fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router();
        let listener = self
            .listener
            .context("start() must be called before serve()")?;
        let controller = self.shutdown;

        controller.set_ready();
        info!("serving HTTP/WS connections");

        let signal = {
            let controller = Arc::clone(&controller);
            async move {
                shutdown.await;
                info!("shutdown requested");
                controller.trigger_shutdown();
            }
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await?;

        if controller.wait_for_drain(self.config.drain_timeout).await {
            info!("drained cleanly");
        } else {
            warn!(
                in_flight = controller.in_flight_count(),
                "drain timeout expired with requests remaining"
            );
        }
        Ok(())
    }
}
