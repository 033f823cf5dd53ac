use std::time::Instant;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use metrics::{counter, histogram};
use serde::Deserialize;
use tracing::{error, info};

use employee_directory_core::{Employee, EmployeeServiceError, PageRequest};
use employee_directory_storage::EmployeeStoreError;

use crate::problem::ProblemResponse;
use crate::router::AppState;

const MAX_PAGE_SIZE: u32 = 100;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/employees", post(create).get(list))
        .route(
            "/api/employees/:id",
            get(get_by_id).put(update).delete(delete),
        )
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    size: Option<u32>,
}

impl PageQuery {
    fn into_page_request(self) -> Result<PageRequest, ProblemResponse> {
        let page = self.page.unwrap_or(0);
        let size = self.size.unwrap_or(PageRequest::DEFAULT_SIZE);
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(ProblemResponse::bad_request(
                "invalid_page",
                format!("size must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        Ok(PageRequest::of(page, size))
    }
}

async fn create(
    State(state): State<AppState>,
    payload: Result<Json<Employee>, JsonRejection>,
) -> Result<(StatusCode, Json<Employee>), ProblemResponse> {
    let start = Instant::now();
    let Json(payload) = payload.map_err(|rejection| fail("create", start, json_problem(rejection)))?;

    let employee = Employee { id: None, ..payload };
    let created = state
        .employees()
        .create(employee)
        .await
        .map_err(|err| fail("create", start, service_problem("create", err)))?;

    info!(stage = "employees", id = ?created.id, "employee created");
    succeed("create", start);
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list(
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Vec<Employee>>, ProblemResponse> {
    let start = Instant::now();
    let Query(query) = query.map_err(|rejection| {
        fail(
            "list",
            start,
            ProblemResponse::bad_request("invalid_page", rejection.body_text()),
        )
    })?;
    let page = query
        .into_page_request()
        .map_err(|problem| fail("list", start, problem))?;

    let employees = state
        .employees()
        .list(page)
        .await
        .map_err(|err| fail("list", start, service_problem("list", err)))?;

    succeed("list", start);
    Ok(Json(employees))
}

async fn get_by_id(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Employee>, ProblemResponse> {
    let start = Instant::now();
    let Path(id) = id.map_err(|rejection| fail("get", start, path_problem(rejection)))?;

    let employee = state
        .employees()
        .get_by_id(id)
        .await
        .map_err(|err| fail("get", start, service_problem("get", err)))?
        .ok_or_else(|| fail("get", start, not_found(id)))?;

    succeed("get", start);
    Ok(Json(employee))
}

async fn update(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<Employee>, JsonRejection>,
) -> Result<Json<Employee>, ProblemResponse> {
    let start = Instant::now();
    let Path(id) = id.map_err(|rejection| fail("update", start, path_problem(rejection)))?;
    let Json(payload) = payload.map_err(|rejection| fail("update", start, json_problem(rejection)))?;

    let existing = state
        .employees()
        .get_by_id(id)
        .await
        .map_err(|err| fail("update", start, service_problem("update", err)))?
        .ok_or_else(|| fail("update", start, not_found(id)))?;

    let employee = Employee {
        id: existing.id,
        first_name: payload.first_name,
        last_name: payload.last_name,
        email: payload.email,
    };
    let updated = state
        .employees()
        .update(employee)
        .await
        .map_err(|err| fail("update", start, service_problem("update", err)))?;

    info!(stage = "employees", id, "employee updated");
    succeed("update", start);
    Ok(Json(updated))
}

async fn delete(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ProblemResponse> {
    let start = Instant::now();
    let Path(id) = id.map_err(|rejection| fail("delete", start, path_problem(rejection)))?;

    state
        .employees()
        .delete_by_id(id)
        .await
        .map_err(|err| fail("delete", start, service_problem("delete", err)))?;

    info!(stage = "employees", id, "employee deleted");
    succeed("delete", start);
    Ok(StatusCode::OK)
}

fn succeed(op: &'static str, start: Instant) {
    counter!("employee_requests_total", "op" => op, "result" => "ok").increment(1);
    histogram!("employee_request_duration_seconds", "op" => op)
        .record(start.elapsed().as_secs_f64());
}

fn fail(op: &'static str, start: Instant, problem: ProblemResponse) -> ProblemResponse {
    counter!("employee_requests_total", "op" => op, "result" => problem.problem_type())
        .increment(1);
    histogram!("employee_request_duration_seconds", "op" => op)
        .record(start.elapsed().as_secs_f64());
    problem
}

fn service_problem(
    op: &'static str,
    err: EmployeeServiceError<EmployeeStoreError>,
) -> ProblemResponse {
    match err {
        EmployeeServiceError::DuplicateEmail(email) => {
            counter!("employee_duplicate_email_total").increment(1);
            ProblemResponse::new(
                StatusCode::CONFLICT,
                "duplicate_email",
                format!("employee already exists with email: {email}"),
            )
        }
        EmployeeServiceError::Store(err) => {
            error!(stage = "employees", op, error = %err, "employee storage failure");
            ProblemResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "failed to access employee storage",
            )
        }
    }
}

fn json_problem(rejection: JsonRejection) -> ProblemResponse {
    ProblemResponse::new(rejection.status(), "invalid_json", rejection.body_text())
}

fn path_problem(rejection: PathRejection) -> ProblemResponse {
    ProblemResponse::bad_request("invalid_id", rejection.body_text())
}

fn not_found(id: i64) -> ProblemResponse {
    ProblemResponse::not_found("employee_not_found", format!("employee {id} not found"))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use employee_directory_core::EmployeeStore;

    use super::*;
    use crate::router::{app_router, tests::setup_state};

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .expect("handler should respond");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should read")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    fn lolik() -> Value {
        json!({
            "firstName": "Lolik",
            "lastName": "Bolik",
            "email": "lolikbolik@deneg.net"
        })
    }

    async fn seed(state: &AppState, first: &str, last: &str, email: &str) -> Employee {
        state
            .employees()
            .store()
            .save(Employee::new(first, last, email))
            .await
            .expect("seed employee")
    }

    #[tokio::test]
    async fn create_returns_created_employee() {
        let app = app_router(setup_state().await);

        let (status, body) = send(&app, Method::POST, "/api/employees", Some(lolik())).await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(body["id"].as_i64().expect("numeric id") > 0);
        assert_eq!(body["firstName"], "Lolik");
        assert_eq!(body["lastName"], "Bolik");
        assert_eq!(body["email"], "lolikbolik@deneg.net");
    }

    #[tokio::test]
    async fn create_ignores_client_supplied_id() {
        let state = setup_state().await;
        let existing = seed(&state, "Ronny", "Kolman", "ronny@bodybuildin.net").await;
        let app = app_router(state.clone());

        let mut payload = lolik();
        payload["id"] = json!(existing.id);
        let (status, body) = send(&app, Method::POST, "/api/employees", Some(payload)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_ne!(body["id"].as_i64(), existing.id);
        let untouched = state
            .employees()
            .get_by_id(existing.id.expect("id"))
            .await
            .expect("lookup");
        assert_eq!(untouched, Some(existing));
    }

    #[tokio::test]
    async fn create_with_duplicate_email_returns_conflict() {
        let state = setup_state().await;
        let app = app_router(state.clone());

        let (status, _) = send(&app, Method::POST, "/api/employees", Some(lolik())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app, Method::POST, "/api/employees", Some(lolik())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["type"], "duplicate_email");
        assert_eq!(
            body["detail"],
            "employee already exists with email: lolikbolik@deneg.net"
        );
        assert_eq!(state.employees().store().count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn create_with_malformed_json_is_rejected() {
        let app = app_router(setup_state().await);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/employees")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{\"firstName\":"))
                    .unwrap(),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );
    }

    #[tokio::test]
    async fn list_returns_all_employees() {
        let state = setup_state().await;
        seed(&state, "Lolik", "Bolik", "lolikbolik@deneg.net").await;
        seed(&state, "Lolik2", "Bolik2", "lolikbolik2@deneg.net").await;
        let app = app_router(state);

        let (status, body) = send(&app, Method::GET, "/api/employees", None).await;

        assert_eq!(status, StatusCode::OK);
        let employees = body.as_array().expect("array body");
        assert_eq!(employees.len(), 2);
    }

    #[tokio::test]
    async fn list_respects_paging_params() {
        let state = setup_state().await;
        for n in 1..=5 {
            seed(&state, &format!("First{n}"), "Last", &format!("e{n}@deneg.net")).await;
        }
        let app = app_router(state);

        let (status, body) = send(&app, Method::GET, "/api/employees?page=1&size=2", None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body
            .as_array()
            .expect("array body")
            .iter()
            .map(|employee| employee["firstName"].as_str().expect("name"))
            .collect();
        assert_eq!(names, vec!["First3", "First4"]);

        let (_, again) = send(&app, Method::GET, "/api/employees?page=1&size=2", None).await;
        assert_eq!(body, again);
    }

    #[tokio::test]
    async fn list_on_empty_table_returns_empty_array() {
        let app = app_router(setup_state().await);

        let (status, body) = send(&app, Method::GET, "/api/employees", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn list_rejects_invalid_page_size() {
        let app = app_router(setup_state().await);

        let (status, body) = send(&app, Method::GET, "/api/employees?size=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "invalid_page");

        let (status, _) = send(&app, Method::GET, "/api/employees?size=1000", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::GET, "/api/employees?page=abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_by_id_returns_employee() {
        let state = setup_state().await;
        let saved = seed(&state, "Lolik", "Bolik", "lolikbolik@deneg.net").await;
        let app = app_router(state);

        let uri = format!("/api/employees/{}", saved.id.expect("id"));
        let (status, body) = send(&app, Method::GET, &uri, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["firstName"], "Lolik");
        assert_eq!(body["lastName"], "Bolik");
        assert_eq!(body["email"], "lolikbolik@deneg.net");
    }

    #[tokio::test]
    async fn get_by_unknown_id_returns_not_found() {
        let app = app_router(setup_state().await);

        let (status, body) = send(&app, Method::GET, "/api/employees/1000", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["type"], "employee_not_found");
    }

    #[tokio::test]
    async fn get_with_non_numeric_id_is_bad_request() {
        let app = app_router(setup_state().await);

        let (status, body) = send(&app, Method::GET, "/api/employees/abc", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "invalid_id");
    }

    #[tokio::test]
    async fn update_overwrites_existing_employee() {
        let state = setup_state().await;
        let saved = seed(&state, "Lolik", "Bolik", "lolikbolik@deneg.net").await;
        let id = saved.id.expect("id");
        let app = app_router(state);

        let uri = format!("/api/employees/{id}");
        let (status, body) = send(
            &app,
            Method::PUT,
            &uri,
            Some(json!({
                "firstName": "Adam",
                "lastName": "Madam",
                "email": "adamadam@deneg.net"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id);
        assert_eq!(body["firstName"], "Adam");
        assert_eq!(body["lastName"], "Madam");
        assert_eq!(body["email"], "adamadam@deneg.net");

        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["firstName"], "Adam");
        assert_eq!(body["email"], "adamadam@deneg.net");
    }

    #[tokio::test]
    async fn update_of_unknown_id_returns_not_found() {
        let state = setup_state().await;
        let app = app_router(state.clone());

        let (status, _) = send(
            &app,
            Method::PUT,
            "/api/employees/1000",
            Some(json!({
                "firstName": "Adam",
                "lastName": "Madam",
                "email": "adamadam@deneg.net"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(state.employees().store().count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn delete_removes_employee() {
        let state = setup_state().await;
        let saved = seed(&state, "Lolik", "Bolik", "lolikbolik@deneg.net").await;
        let app = app_router(state);

        let uri = format!("/api/employees/{}", saved.id.expect("id"));
        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_of_unknown_id_is_ok() {
        let app = app_router(setup_state().await);

        let (status, _) = send(&app, Method::DELETE, "/api/employees/1000", None).await;

        assert_eq!(status, StatusCode::OK);
    }
}
