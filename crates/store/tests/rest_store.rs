//! REST record store against an in-process fake PostgREST server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use imagegen_core::GenerationRecord;
use imagegen_store::{RecordStore, RestRecordStore, RestStoreConfig, StoreError};
use serde_json::{json, Value};

#[derive(Default)]
struct Backend {
    credits: HashMap<String, u32>,
    generations: Vec<Value>,
    /// When set, the next conditional update sees this balance instead,
    /// as if another session had just spent credits.
    interfering_write: Option<u32>,
    last_auth: Option<String>,
}

type Shared = Arc<Mutex<Backend>>;

fn eq_param(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.strip_prefix("eq."))
        .map(str::to_string)
}

async fn get_users(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let mut b = backend.lock().unwrap();
    b.last_auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let id = eq_param(&params, "id").unwrap_or_default();
    match b.credits.get(&id) {
        Some(credits) => Json(json!([{ "credits": credits }])),
        None => Json(json!([])),
    }
}

async fn patch_users(
    State(backend): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut b = backend.lock().unwrap();
    let id = eq_param(&params, "id").unwrap_or_default();
    let expected: u32 = eq_param(&params, "credits")
        .and_then(|v| v.parse().ok())
        .unwrap_or(u32::MAX);

    if let Some(balance) = b.interfering_write.take() {
        b.credits.insert(id.clone(), balance);
    }

    match b.credits.get_mut(&id) {
        Some(current) if *current == expected => {
            *current = body["credits"].as_u64().unwrap_or_default() as u32;
            Json(json!([{ "credits": *current }]))
        }
        _ => Json(json!([])),
    }
}

async fn post_generation(State(backend): State<Shared>, Json(body): Json<Value>) -> StatusCode {
    backend.lock().unwrap().generations.push(body);
    StatusCode::CREATED
}

async fn spawn_backend(backend: Shared) -> String {
    let router = Router::new()
        .route("/rest/v1/users", get(get_users).patch(patch_users))
        .route("/rest/v1/image_generations", post(post_generation))
        .with_state(backend);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn backend_with(user: &str, credits: u32) -> Shared {
    let mut backend = Backend::default();
    backend.credits.insert(user.to_string(), credits);
    Arc::new(Mutex::new(backend))
}

#[tokio::test]
async fn reads_and_deducts_credits() {
    let backend = backend_with("u1", 12);
    let url = spawn_backend(Arc::clone(&backend)).await;
    let store =
        RestRecordStore::new(RestStoreConfig::new(url, "anon").with_access_token("jwt")).unwrap();

    assert_eq!(store.get_credits("u1").await.unwrap(), 12);
    assert_eq!(
        backend.lock().unwrap().last_auth.as_deref(),
        Some("Bearer jwt")
    );

    assert_eq!(store.deduct_credits("u1", 5).await.unwrap(), 7);
    assert_eq!(backend.lock().unwrap().credits["u1"], 7);
}

#[tokio::test]
async fn deduction_refuses_to_go_negative() {
    let backend = backend_with("u1", 3);
    let url = spawn_backend(Arc::clone(&backend)).await;
    let store = RestRecordStore::new(RestStoreConfig::new(url, "anon")).unwrap();

    let err = store.deduct_credits("u1", 5).await.unwrap_err();
    assert_matches!(
        err,
        StoreError::InsufficientCredits {
            required: 5,
            available: 3
        }
    );
    assert_eq!(backend.lock().unwrap().credits["u1"], 3);
}

#[tokio::test]
async fn deduction_retries_after_concurrent_write() {
    let backend = backend_with("u1", 20);
    backend.lock().unwrap().interfering_write = Some(15);
    let url = spawn_backend(Arc::clone(&backend)).await;
    let store = RestRecordStore::new(RestStoreConfig::new(url, "anon")).unwrap();

    // First attempt expects 20 but finds 15; the retry re-reads and wins.
    assert_eq!(store.deduct_credits("u1", 5).await.unwrap(), 10);
    assert_eq!(backend.lock().unwrap().credits["u1"], 10);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let backend = backend_with("u1", 3);
    let url = spawn_backend(backend).await;
    let store = RestRecordStore::new(RestStoreConfig::new(url, "anon")).unwrap();

    assert_matches!(
        store.get_credits("ghost").await,
        Err(StoreError::UserNotFound(id)) if id == "ghost"
    );
}

#[tokio::test]
async fn saves_generation_rows() {
    let backend = backend_with("u1", 3);
    let url = spawn_backend(Arc::clone(&backend)).await;
    let store = RestRecordStore::new(RestStoreConfig::new(url, "anon")).unwrap();

    let record = GenerationRecord {
        user_id: "u1".to_string(),
        image_type: "infographic".to_string(),
        title: None,
        content: Some("Quarterly numbers".to_string()),
        style: Some("flat".to_string()),
        colour: None,
        credits_used: 10,
        image_data: "iVBORw0KGgo".to_string(),
    };
    store.save_generation(&record).await.unwrap();

    let b = backend.lock().unwrap();
    assert_eq!(b.generations.len(), 1);
    let row = &b.generations[0];
    assert_eq!(row["user_id"], "u1");
    assert_eq!(row["image_type"], "infographic");
    assert_eq!(row["credits_used"], 10);
    assert!(row.get("title").is_none());
}

#[tokio::test]
async fn backend_errors_surface_status_and_body() {
    let router = Router::new().route(
        "/rest/v1/users",
        get(|| async { (StatusCode::UNAUTHORIZED, "JWT expired") }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let store = RestRecordStore::new(RestStoreConfig::new(format!("http://{addr}"), "anon")).unwrap();
    assert_matches!(
        store.get_credits("u1").await,
        Err(StoreError::Api { status: 401, body }) if body == "JWT expired"
    );
}
