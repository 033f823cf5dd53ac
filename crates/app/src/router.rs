use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;

use employee_directory_core::EmployeeService;
use employee_directory_storage::{Database, EmployeeRepository};

use crate::{employees, telemetry};

pub type EmployeeDirectory = EmployeeService<EmployeeRepository>;

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    employees: Arc<EmployeeDirectory>,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, storage: Database) -> Self {
        Self {
            metrics,
            employees: Arc::new(EmployeeService::new(storage.employees())),
        }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn employees(&self) -> &EmployeeDirectory {
        &self.employees
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .merge(employees::routes())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
