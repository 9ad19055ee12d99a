//! CRUD routes shared by every resource.

use axum::{
    extract::{rejection::JsonRejection, Path, RawQuery, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;

use jobboard_core::{ListResult, ResourceKind, ResourceService, Visibility};

use crate::error::{ApiError, ApiResult};
use crate::extract::CurrentActor;
use crate::response::{reply, Reply};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/{resource}", get(list).post(create))
        .route(
            "/api/v1/{resource}/{id}",
            get(find_one).patch(update).put(update).delete(remove),
        )
        .route("/api/v1/{resource}/{id}/increment/{field}", post(increment))
}

fn service(state: &AppState, resource: &str) -> ApiResult<ResourceService> {
    let kind = ResourceKind::from_collection(resource)
        .map_err(|e| ApiError::NotFound(e.to_string()))?;
    Ok(state.service(kind))
}

fn body(payload: Result<Json<Value>, JsonRejection>) -> ApiResult<Value> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

async fn list(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    RawQuery(query): RawQuery,
) -> ApiResult<Reply<ListResult>> {
    let svc = service(&state, &resource)?;
    let page = svc
        .list(query.as_deref().unwrap_or_default(), Visibility::Active)
        .await?;
    Ok(reply(StatusCode::OK, format!("Fetched {resource}"), page))
}

async fn find_one(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> ApiResult<Reply<Value>> {
    let svc = service(&state, &resource)?;
    let doc = svc.find_one(&id, query.as_deref().unwrap_or_default()).await?;
    Ok(reply(StatusCode::OK, format!("Fetched {}", svc.kind().label()), doc))
}

async fn create(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    CurrentActor(actor): CurrentActor,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Reply<Value>> {
    let svc = service(&state, &resource)?;
    let doc = svc.create(&body(payload)?, &actor).await?;
    Ok(reply(StatusCode::CREATED, format!("Created {}", svc.kind().label()), doc))
}

async fn update(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    CurrentActor(actor): CurrentActor,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Reply<Value>> {
    let svc = service(&state, &resource)?;
    let doc = svc.update(&id, &body(payload)?, &actor).await?;
    Ok(reply(StatusCode::OK, format!("Updated {}", svc.kind().label()), doc))
}

async fn remove(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Reply<Value>> {
    let svc = service(&state, &resource)?;
    let doc = svc.remove(&id, &actor).await?;
    Ok(reply(StatusCode::OK, format!("Deleted {}", svc.kind().label()), doc))
}

async fn increment(
    State(state): State<AppState>,
    Path((resource, id, field)): Path<(String, String, String)>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Reply<Value>> {
    let svc = service(&state, &resource)?;
    let doc = svc.increment(&id, &field, &actor).await?;
    Ok(reply(StatusCode::OK, format!("Incremented {field}"), doc))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use jobboard_core::MemoryStore;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::routes::build_router;
    use crate::state::AppState;

    use super::*;

    fn app() -> Router {
        let config = AppConfig::from_lookup(|key| {
            (key == "STORE_BACKEND").then(|| "memory".to_string())
        })
        .unwrap();
        build_router(AppState::new(Arc::new(MemoryStore::new()), config))
    }

    fn request(method: &str, uri: &str, body: Option<Value>, actor: bool) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if actor {
            builder = builder
                .header("x-user-id", "u1")
                .header("x-user-email", "admin@jobs.io");
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn crud_round_trip() {
        let app = app();

        let (status, created) = send(
            &app,
            request("POST", "/api/v1/companies", Some(json!({"name": "ACME Corp", "country": "VN"})), true),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["statusCode"], 201);
        let id = created["data"]["_id"].as_str().unwrap().to_string();

        let (status, page) = send(&app, request("GET", "/api/v1/companies?name=acme&pageSize=5", None, false)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["data"]["meta"], json!({"current": 1, "pageSize": 5, "pages": 1, "total": 1}));
        assert_eq!(page["data"]["result"][0]["_id"], id.as_str());

        let (status, updated) = send(
            &app,
            request("PATCH", &format!("/api/v1/companies/{id}"), Some(json!({"country": "SG"})), true),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["data"]["country"], "SG");
        assert_eq!(updated["data"]["name"], "ACME Corp");

        let (status, _) = send(&app, request("DELETE", &format!("/api/v1/companies/{id}"), None, true)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, request("GET", &format!("/api/v1/companies/{id}"), None, false)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["statusCode"], 404);
        assert_eq!(body["error"], "Not Found");

        let (_, page) = send(&app, request("GET", "/api/v1/companies", None, false)).await;
        assert_eq!(page["data"]["meta"]["total"], 0);
    }

    #[tokio::test]
    async fn writes_require_an_actor() {
        let app = app();
        let (status, body) = send(
            &app,
            request("POST", "/api/v1/skills", Some(json!({"name": "Rust"})), false),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["statusCode"], 401);
    }

    #[tokio::test]
    async fn error_statuses() {
        let app = app();

        let (status, _) = send(&app, request("GET", "/api/v1/planets", None, false)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, request("GET", "/api/v1/jobs/12345", None, false)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Bad Request");

        let (status, body) = send(
            &app,
            request("POST", "/api/v1/jobs", Some(json!({"salary": "lots"})), true),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let fields: Vec<&str> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|d| d["field"].as_str())
            .collect();
        assert_eq!(fields, vec!["name", "salary"]);

        let (status, _) = send(
            &app,
            request("POST", "/api/v1/categories", Some(json!({"name": "backend"})), true),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = send(
            &app,
            request("POST", "/api/v1/categories", Some(json!({"name": "Backend"})), true),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["statusCode"], 409);
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let app = app();
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/skills")
            .header("content-type", "application/json")
            .header("x-user-id", "u1")
            .header("x-user-email", "admin@jobs.io")
            .body(Body::from("{\"name\":"))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["statusCode"], 400);
    }

    #[tokio::test]
    async fn blog_views_increment() {
        let app = app();
        let (_, created) = send(
            &app,
            request("POST", "/api/v1/blogs", Some(json!({"title": "Hiring"})), true),
        )
        .await;
        let id = created["data"]["_id"].as_str().unwrap().to_string();

        let uri = format!("/api/v1/blogs/{id}/increment/views");
        let (status, body) = send(&app, request("POST", &uri, None, true)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["views"], 1);

        let uri = format!("/api/v1/blogs/{id}/increment/title");
        let (status, _) = send(&app, request("POST", &uri, None, true)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/v1/blogs/{id}/increment/views");
        let (status, _) = send(&app, request("POST", &uri, None, false)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let uri = format!("/api/v1/blogs/{id}");
        let patch = json!({"views": 500, "title": "Hiring now"});
        let (status, body) = send(&app, request("PATCH", &uri, Some(patch), true)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["views"], 1);
    }

    #[tokio::test]
    async fn duplicate_application_is_a_conflict() {
        let app = app();
        let (_, user) = send(
            &app,
            request("POST", "/api/v1/users", Some(json!({"name": "Lan", "email": "lan@jobs.io"})), true),
        )
        .await;
        let (_, job) = send(
            &app,
            request("POST", "/api/v1/jobs", Some(json!({"name": "Rust dev"})), true),
        )
        .await;
        let body = json!({
            "userId": user["data"]["_id"],
            "jobId": job["data"]["_id"],
            "cvUrl": "cv.pdf",
        });

        let (status, _) = send(&app, request("POST", "/api/v1/applications", Some(body.clone()), true)).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, err) = send(&app, request("POST", "/api/v1/applications", Some(body), true)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["statusCode"], 409);
    }

    #[tokio::test]
    async fn health_and_ping() {
        let app = app();
        let (status, body) = send(&app, request("GET", "/health", None, false)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        let (status, _) = send(&app, request("GET", "/api/v1/ping", None, false)).await;
        assert_eq!(status, StatusCode::OK);
    }
}
