//! In-process mock of the UTMka backend and the link shortener.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use utmka::{ClckShortener, Config, PreferenceStore, RestGateway};

#[derive(Debug, Default)]
pub struct Backend {
    pub history: Vec<Value>,
    pub templates: Vec<Value>,
    pub next_id: i64,
    /// "METHOD /path" of every request, in arrival order
    pub requests: Vec<String>,
    pub preferences: Value,
    pub fail_history: bool,
    pub templates_delay_ms: u64,
    /// Filename to answer example downloads with instead of the requested one
    pub example_filename: Option<String>,
}

pub type Shared = Arc<Mutex<Backend>>;

fn log(state: &Shared, entry: String) {
    state.lock().unwrap().requests.push(entry);
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn list_history(State(state): State<Shared>) -> Response {
    log(&state, "GET /history".into());
    let backend = state.lock().unwrap();
    if backend.fail_history {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "database is locked");
    }
    Json(Value::Array(backend.history.clone())).into_response()
}

async fn add_history(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    log(&state, "POST /history".into());
    let mut backend = state.lock().unwrap();
    backend.next_id += 1;
    let id = backend.next_id;
    let url = body["url"].as_str().unwrap_or_default().to_string();
    let mut record = json!({
        "id": id,
        "user_email": body["user_email"],
        "full_url": url,
        "base_url": url.split('?').next().unwrap_or_default(),
        "created_at": format!("2024-05-{:02} 12:00:00", id.min(28)),
        "short_url": null,
        "tag_name": body.get("tag_name").cloned().unwrap_or(Value::Null),
        "tag_color": body.get("tag_color").cloned().unwrap_or(Value::Null),
    });
    for key in utmka::UTM_KEYS {
        record[key] = utmka::parse_utm_params(&url)
            .pairs()
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v.map(|v| Value::String(v.to_string())))
            .unwrap_or(Value::Null);
    }
    backend.history.insert(0, record);
    Json(json!({ "success": true, "id": id })).into_response()
}

async fn delete_history(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    log(&state, format!("DELETE /history/{}", id));
    let mut backend = state.lock().unwrap();
    let before = backend.history.len();
    backend.history.retain(|h| h["id"] != id);
    if backend.history.len() == before {
        return error(StatusCode::NOT_FOUND, "Not found");
    }
    Json(json!({ "success": true })).into_response()
}

fn update_history(state: &Shared, id: i64, fields: &[(&str, Value)]) -> Response {
    let mut backend = state.lock().unwrap();
    match backend.history.iter_mut().find(|h| h["id"] == id) {
        Some(record) => {
            for (key, value) in fields {
                record[*key] = value.clone();
            }
            Json(json!({ "success": true })).into_response()
        }
        None => error(StatusCode::NOT_FOUND, "Not found"),
    }
}

async fn set_short_url(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    log(&state, format!("PUT /history/{}/short_url", id));
    match body["short_url"].as_str() {
        Some(short) if !short.is_empty() => {
            update_history(&state, id, &[("short_url", Value::String(short.into()))])
        }
        _ => error(StatusCode::BAD_REQUEST, "short_url is required"),
    }
}

async fn set_tag(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    log(&state, format!("PUT /history/{}/tag", id));
    update_history(
        &state,
        id,
        &[
            ("tag_name", body["tag_name"].clone()),
            ("tag_color", body["tag_color"].clone()),
        ],
    )
}

async fn list_templates(State(state): State<Shared>) -> Response {
    log(&state, "GET /templates".into());
    let delay = state.lock().unwrap().templates_delay_ms;
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let backend = state.lock().unwrap();
    Json(Value::Array(backend.templates.clone())).into_response()
}

async fn add_templates(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    log(&state, "POST /templates".into());
    let items = match body {
        Value::Array(items) => items,
        other => vec![other],
    };
    if items.iter().any(|i| i["name"].as_str().map_or(true, str::is_empty)) {
        return error(StatusCode::BAD_REQUEST, "name is required");
    }

    let mut backend = state.lock().unwrap();
    let count = items.len();
    for mut item in items {
        backend.next_id += 1;
        item["id"] = json!(backend.next_id);
        item["created_at"] = json!("2024-04-01T09:30:00");
        backend.templates.insert(0, item);
    }
    Json(json!({ "success": true, "imported_count": count })).into_response()
}

async fn delete_template(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    log(&state, format!("DELETE /templates/{}", id));
    state.lock().unwrap().templates.retain(|t| t["id"] != id);
    Json(json!({ "success": true })).into_response()
}

async fn import_history(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    log(&state, "POST /import_history".into());
    let items = body.as_array().cloned().unwrap_or_default();
    let mut backend = state.lock().unwrap();
    for mut item in items.clone() {
        backend.next_id += 1;
        item["id"] = json!(backend.next_id);
        backend.history.push(item);
    }
    Json(json!({ "success": true, "imported_count": items.len() })).into_response()
}

async fn export_templates(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    log(&state, "POST /export_templates".into());
    let backend = state.lock().unwrap();
    let email = body["user_email"].as_str().unwrap_or_default().replace('@', "_");
    Json(json!({
        "success": true,
        "filename": format!("utm_templates_{}.json", email),
        "file_content": serde_json::to_string_pretty(&backend.templates).unwrap(),
        "count": backend.templates.len(),
    }))
    .into_response()
}

async fn export_history(State(state): State<Shared>) -> Response {
    log(&state, "POST /export_history".into());
    let backend = state.lock().unwrap();
    Json(json!({
        "success": true,
        "filename": "utm_history_local_user.json",
        "file_path": "/srv/downloads/utm_history_local_user.json",
        "count": backend.history.len(),
    }))
    .into_response()
}

async fn download_example(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    log(&state, "POST /download_template_with_folder".into());
    let requested = body["filename"].as_str().unwrap_or_default().to_string();
    let filename = state
        .lock()
        .unwrap()
        .example_filename
        .clone()
        .unwrap_or(requested);
    Json(json!({
        "success": true,
        "filename": filename,
        "file_content": "[{\"name\": \"Example\", \"utm_source\": \"google\"}]",
    }))
    .into_response()
}

async fn get_preferences(State(state): State<Shared>) -> Response {
    log(&state, "GET /api/preferences".into());
    Json(state.lock().unwrap().preferences.clone()).into_response()
}

async fn set_preferences(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    log(&state, "POST /api/preferences".into());
    let mut backend = state.lock().unwrap();
    if let (Some(current), Some(update)) = (backend.preferences.as_object_mut(), body.as_object()) {
        for (k, v) in update {
            current.insert(k.clone(), v.clone());
        }
    }
    Json(backend.preferences.clone()).into_response()
}

async fn check_update(State(state): State<Shared>) -> Response {
    log(&state, "GET /api/update/check".into());
    Json(json!({
        "available": true,
        "current_version": "3.1.0",
        "latest_version": "3.2.0",
        "download_url": "https://example.com/utmka-3.2.0.exe",
        "release_url": "https://example.com/releases/3.2.0",
        "release_notes": "Faster history",
    }))
    .into_response()
}

async fn shorten(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let url = query.get("url").cloned().unwrap_or_default();
    log(&state, format!("GET /-- {}", url));
    if url.contains("refuse") {
        return "error: invalid url".into_response();
    }
    if url.contains("blank") {
        return "  ".into_response();
    }
    format!("https://clck.ru/{}\n", url.len()).into_response()
}

pub fn router(state: Shared) -> Router {
    Router::new()
        .route("/history", get(list_history).post(add_history))
        .route("/history/{id}", delete(delete_history))
        .route("/history/{id}/short_url", put(set_short_url))
        .route("/history/{id}/tag", put(set_tag))
        .route("/templates", get(list_templates).post(add_templates))
        .route("/templates/{id}", delete(delete_template))
        .route("/import_history", post(import_history))
        .route("/export_templates", post(export_templates))
        .route("/export_history", post(export_history))
        .route("/download_template_with_folder", post(download_example))
        .route("/api/preferences", get(get_preferences).post(set_preferences))
        .route("/api/update/check", get(check_update))
        .route("/--", get(shorten))
        .with_state(state)
}

/// Serves the mock on an ephemeral port and returns its base URL.
pub async fn spawn_backend(backend: Backend) -> (String, Shared) {
    let state: Shared = Arc::new(Mutex::new(backend));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(Arc::clone(&state));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

pub fn test_config(base_url: &str, data_dir: &std::path::Path) -> Config {
    Config {
        api_base_url: base_url.to_string(),
        user_email: "tester@example.com".to_string(),
        shortener_url: format!("{}/--", base_url),
        request_timeout_secs: 2,
        render_debounce_ms: 5,
        data_dir: data_dir.to_path_buf(),
        sync_preferences: true,
        check_updates: false,
    }
}

pub fn gateway(base_url: &str) -> RestGateway {
    RestGateway::new(base_url, "tester@example.com", Duration::from_secs(2)).unwrap()
}

pub fn shortener(base_url: &str) -> ClckShortener {
    ClckShortener::new(&format!("{}/--", base_url), Duration::from_secs(2)).unwrap()
}

pub fn prefs_in(dir: &std::path::Path) -> PreferenceStore {
    PreferenceStore::open(&dir.join(utmka::PREFERENCES_FILE)).unwrap()
}

pub fn template(id: i64, name: &str, created_at: &str) -> Value {
    json!({
        "id": id,
        "user_email": "tester@example.com",
        "name": name,
        "utm_source": "google",
        "utm_medium": "cpc",
        "utm_campaign": null,
        "utm_content": null,
        "utm_term": null,
        "tag_name": null,
        "tag_color": null,
        "created_at": created_at,
    })
}
