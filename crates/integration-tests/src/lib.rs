//! Integration tests for the Podforge client.
//!
//! [`MockApi`] serves an in-memory copy of the product service REST API on
//! a local port, so the real `HttpGateway` (reqwest, multipart, JSON error
//! bodies) can be exercised end to end.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p podforge-integration-tests
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Multipart, Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use podforge_client::testing::draft_json;
use serde_json::{Value, json};

type Shared = Arc<Mutex<MockState>>;

#[derive(Default)]
struct MockState {
    templates: Vec<Value>,
    drafts: BTreeMap<i64, Value>,
    next_draft_id: i64,
    next_asset_id: i64,
    /// Statuses `GET /drafts/{id}` walks through after a push.
    push_progress: HashMap<i64, VecDeque<String>>,
    integrations: BTreeMap<String, Value>,
    pending_shop: Option<String>,
    /// One-shot canned responses, keyed by `"METHOD /path"`.
    overrides: HashMap<String, (StatusCode, String)>,
    requests: Vec<String>,
}

/// Running mock of the REST API. The server stops with the test runtime.
#[derive(Clone)]
pub struct MockApi {
    base_url: String,
    state: Shared,
}

impl MockApi {
    /// Serve the mock under `/api` on a free local port.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(MockState {
            templates: vec![json!({
                "id": 1,
                "name": "Classic Tee",
                "gelato_template_id": "tpl_classic_tee",
                "metadata": {"sizes": ["S", "M", "L"]},
                "is_active": true
            })],
            next_draft_id: 1,
            next_asset_id: 1,
            ..MockState::default()
        }));

        let api = Router::new()
            .route("/health", get(health))
            .route("/templates", get(list_templates))
            .route("/drafts", get(list_drafts))
            .route("/drafts/bulk", post(create_drafts))
            .route("/drafts/{id}", get(get_draft))
            .route("/drafts/{id}/push", post(push_draft))
            .route("/assets/upload", post(upload_assets))
            .route("/integrations", get(list_integrations))
            .route(
                "/integrations/gelato",
                post(connect_gelato).delete(disconnect_gelato),
            )
            .route("/integrations/shopify/start", post(start_shopify))
            .route("/integrations/shopify/test", post(test_shopify))
            .route("/integrations/shopify", axum::routing::delete(disconnect_shopify));

        let app = Router::new()
            .nest("/api", api)
            .layer(middleware::from_fn_with_state(state.clone(), record))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock API");
        let addr = listener.local_addr().expect("mock API address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}/api"),
            state,
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Base URL to configure the client with.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Store a draft with the given status.
    pub fn insert_draft(&self, id: i64, status: &str) {
        let mut state = self.state();
        state.drafts.insert(id, draft_json(id, status));
        state.next_draft_id = state.next_draft_id.max(id + 1);
    }

    /// After the draft is pushed, successive reads report these statuses;
    /// the last one sticks.
    pub fn script_push(&self, id: i64, statuses: &[&str]) {
        self.state()
            .push_progress
            .insert(id, statuses.iter().map(ToString::to_string).collect());
    }

    /// Replace the integrations listing.
    pub fn set_integration(&self, item: Value) {
        let provider = item["provider"].as_str().unwrap_or_default().to_string();
        self.state().integrations.insert(provider, item);
    }

    /// Answer the next `METHOD /path` request with a canned response.
    pub fn override_next(&self, route: &str, status: u16, body: &str) {
        let status = StatusCode::from_u16(status).expect("valid status code");
        self.state()
            .overrides
            .insert(route.to_string(), (status, body.to_string()));
    }

    /// Simulate the Shopify OAuth callback hitting the server.
    pub fn complete_shopify_oauth(&self) {
        let mut state = self.state();
        let shop = state
            .pending_shop
            .take()
            .unwrap_or_else(|| "unknown.myshopify.com".to_string());
        state.integrations.insert(
            "shopify".to_string(),
            json!({"provider": "shopify", "status": "connected", "metadata": {"shopDomain": shop}}),
        );
    }

    /// Every request so far as `"METHOD /path"`, without the `/api` prefix.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.state().requests.clone()
    }

    /// Number of requests to `"METHOD /path"`.
    #[must_use]
    pub fn count(&self, route: &str) -> usize {
        self.state().requests.iter().filter(|r| *r == route).count()
    }
}

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

async fn record(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    let route = format!(
        "{} {}",
        request.method(),
        path.strip_prefix("/api").unwrap_or(path)
    );

    let canned = {
        let mut state = lock(&state);
        state.requests.push(route.clone());
        state.overrides.remove(&route)
    };

    match canned {
        Some((status, body)) => (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        None => next.run(request).await,
    }
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn list_templates(State(state): State<Shared>) -> Json<Value> {
    Json(Value::Array(lock(&state).templates.clone()))
}

async fn list_drafts(State(state): State<Shared>) -> Json<Value> {
    Json(Value::Array(lock(&state).drafts.values().cloned().collect()))
}

async fn get_draft(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    let mut state = lock(&state);
    let next_status = state.push_progress.get_mut(&id).and_then(|queue| {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    });

    match state.drafts.get_mut(&id) {
        Some(draft) => {
            if let Some(status) = next_status {
                draft["status"] = Value::String(status);
            }
            Json(draft.clone()).into_response()
        }
        None => detail(StatusCode::NOT_FOUND, "Not found."),
    }
}

async fn create_drafts(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let Some(specs) = body["drafts"].as_array() else {
        return detail(StatusCode::BAD_REQUEST, "drafts must be a list.");
    };

    let mut state = lock(&state);
    let mut created = Vec::with_capacity(specs.len());
    for spec in specs {
        let id = state.next_draft_id;
        state.next_draft_id += 1;

        let mut draft = draft_json(id, "draft");
        draft["title"] = spec["title"].clone();
        draft["price"] = spec["price"].clone();
        if let Some(tags) = spec.get("tags") {
            draft["tags"] = tags.clone();
        }
        state.drafts.insert(id, draft.clone());
        created.push(draft);
    }

    (StatusCode::CREATED, Json(Value::Array(created))).into_response()
}

async fn push_draft(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    let mut state = lock(&state);
    match state.drafts.get_mut(&id) {
        Some(draft) => {
            draft["status"] = json!("queued");
            (
                StatusCode::ACCEPTED,
                Json(json!({"task_id": format!("task-{id}"), "draft_id": id})),
            )
                .into_response()
        }
        None => detail(StatusCode::NOT_FOUND, "Not found."),
    }
}

async fn upload_assets(State(state): State<Shared>, mut multipart: Multipart) -> Response {
    let mut files = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("files") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let mime = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let Ok(bytes) = field.bytes().await else {
            return detail(StatusCode::BAD_REQUEST, "Unreadable file.");
        };
        files.push((name, mime, bytes.len()));
    }
    if files.is_empty() {
        return detail(StatusCode::BAD_REQUEST, "No files uploaded.");
    }

    let mut state = lock(&state);
    let assets = files
        .into_iter()
        .map(|(name, mime, size)| {
            let id = state.next_asset_id;
            state.next_asset_id += 1;
            json!({
                "id": id,
                "file": format!("/media/designs/{name}"),
                "original_filename": name,
                "mime_type": mime,
                "size_bytes": size,
                "created_at": "2026-01-05T10:00:00Z"
            })
        })
        .collect();

    (StatusCode::CREATED, Json(Value::Array(assets))).into_response()
}

async fn list_integrations(State(state): State<Shared>) -> Json<Value> {
    let items: Vec<Value> = lock(&state).integrations.values().cloned().collect();
    Json(json!({ "items": items }))
}

async fn connect_gelato(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let key = body["apiKey"].as_str().unwrap_or_default();
    if key.trim().is_empty() {
        return detail(StatusCode::BAD_REQUEST, "apiKey is required.");
    }
    if key == "invalid" {
        return detail(StatusCode::BAD_REQUEST, "Gelato rejected the API key.");
    }

    lock(&state).integrations.insert(
        "gelato".to_string(),
        json!({
            "provider": "gelato",
            "status": "connected",
            "metadata": {"lastVerified": "2026-01-05T10:00:00Z"}
        }),
    );
    Json(json!({"ok": true})).into_response()
}

async fn disconnect_gelato(State(state): State<Shared>) -> StatusCode {
    lock(&state).integrations.remove("gelato");
    StatusCode::NO_CONTENT
}

async fn start_shopify(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let Some(shop) = body["shopDomain"].as_str().map(str::to_string) else {
        return detail(StatusCode::BAD_REQUEST, "shopDomain is required.");
    };
    let redirect = format!("https://{shop}/admin/oauth/authorize?client_id=mock&state=s1");
    lock(&state).pending_shop = Some(shop);
    Json(json!({ "redirectUrl": redirect })).into_response()
}

async fn disconnect_shopify(State(state): State<Shared>) -> StatusCode {
    lock(&state).integrations.remove("shopify");
    StatusCode::NO_CONTENT
}

async fn test_shopify(State(state): State<Shared>) -> Response {
    let connected = lock(&state)
        .integrations
        .get("shopify")
        .is_some_and(|item| item["status"] == "connected");
    if connected {
        Json(json!({"ok": true})).into_response()
    } else {
        detail(StatusCode::BAD_REQUEST, "Shopify is not connected.")
    }
}
