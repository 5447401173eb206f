mod routes;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{MonitoringEngine, Result};

pub struct Server {
    engine: Arc<MonitoringEngine>,
}

impl Server {
    pub fn new(engine: Arc<MonitoringEngine>) -> Self {
        Self { engine }
    }

    pub fn build_router(self) -> Router {
        let state = Arc::new(self);

        let monitoring = Router::new()
            .route("/metrics/current", get(routes::current_metrics))
            .route("/metrics/series", post(routes::metric_series))
            .route("/metrics/names", get(routes::metric_names))
            .route("/alerts", get(routes::list_alerts))
            .route(
                "/alerts/rules",
                get(routes::list_alert_rules).post(routes::add_alert_rule),
            )
            .route("/alerts/rules/{id}", delete(routes::remove_alert_rule))
            .route("/alerts/{id}/acknowledge", post(routes::acknowledge_alert))
            .route("/health", get(routes::overview))
            .route("/health/components", get(routes::components))
            .route("/health/components/{name}", get(routes::component))
            .route("/dashboard/system", get(routes::dashboard))
            .route("/stats/summary", get(routes::stats));

        Router::new()
            .route("/health", get(routes::health))
            .route("/metrics", get(routes::metrics))
            .nest("/monitoring", monitoring)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    pub async fn start(
        self,
        addr: &str,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}
