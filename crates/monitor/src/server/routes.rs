use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use super::Server;
use crate::alerting::{Alert, AlertRule, AlertRuleRequest, AlertStatus, Severity};
use crate::engine::{MetricSeries, MetricsQuery};
use crate::health::{HealthCheck, MonitoringOverview};
use crate::{metrics as self_metrics, Error, Result};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Config(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (
            status,
            Json(json!({ "success": false, "error": self.to_string() })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct AlertsFilter {
    pub status: Option<AlertStatus>,
    pub severity: Option<Severity>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn metrics() -> Result<String> {
    self_metrics::gather_metrics()
}

pub async fn current_metrics(State(server): State<Arc<Server>>) -> Json<Value> {
    let metrics = server.engine.current_metrics().await;
    Json(json!({
        "success": true,
        "count": metrics.len(),
        "data": metrics,
    }))
}

pub async fn metric_series(
    State(server): State<Arc<Server>>,
    Json(query): Json<MetricsQuery>,
) -> Json<Vec<MetricSeries>> {
    Json(server.engine.metric_series(query).await)
}

pub async fn metric_names(State(server): State<Arc<Server>>) -> Json<Vec<String>> {
    Json(server.engine.metric_names().await)
}

pub async fn list_alerts(
    State(server): State<Arc<Server>>,
    Query(filter): Query<AlertsFilter>,
) -> Json<Vec<Alert>> {
    Json(server.engine.list_alerts(filter.status, filter.severity).await)
}

pub async fn list_alert_rules(State(server): State<Arc<Server>>) -> Json<Vec<AlertRule>> {
    Json(server.engine.list_alert_rules().await)
}

pub async fn add_alert_rule(
    State(server): State<Arc<Server>>,
    Json(request): Json<AlertRuleRequest>,
) -> Result<Json<Value>> {
    let name = request.name.clone();
    let rule_id = server.engine.add_alert_rule(request).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Alert rule '{}' stored", name),
        "rule_id": rule_id,
    })))
}

pub async fn remove_alert_rule(
    State(server): State<Arc<Server>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let rule = server.engine.remove_alert_rule(&id).await?;
    Ok(Json(json!({ "success": true, "rule_id": rule.id })))
}

pub async fn acknowledge_alert(
    State(server): State<Arc<Server>>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    server.engine.acknowledge_alert(&id).await?;
    Ok(Json(json!({ "success": true, "alert_id": id })))
}

pub async fn overview(State(server): State<Arc<Server>>) -> Json<MonitoringOverview> {
    Json(server.engine.overview().await)
}

pub async fn components(State(server): State<Arc<Server>>) -> Json<Vec<HealthCheck>> {
    Json(server.engine.components().await)
}

pub async fn component(
    State(server): State<Arc<Server>>,
    Path(name): Path<String>,
) -> Result<Json<HealthCheck>> {
    Ok(Json(server.engine.component_health(&name).await?))
}

pub async fn dashboard(State(server): State<Arc<Server>>) -> Json<Value> {
    Json(json!({ "success": true, "data": server.engine.dashboard().await }))
}

pub async fn stats(State(server): State<Arc<Server>>) -> Json<Value> {
    Json(json!({ "success": true, "data": server.engine.stats().await }))
}
