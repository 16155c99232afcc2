//! Shared test harness.
//!
//! Provides a scripted in-memory provider, an in-memory shadow store, a
//! fully wired orchestrator over a temp data directory, and an HTTP app
//! builder mirroring the production middleware stack. Not every test
//! binary uses every helper.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::task::TaskTracker;
use uuid::Uuid;

use lumashot_api::engine::orchestrator::Orchestrator;
use lumashot_api::engine::shadow::{ShadowError, ShadowStore};
use lumashot_api::engine::store::{JobHandle, TaskStore};
use lumashot_api::storage::ArtifactStore;
use lumashot_core::catalog;
use lumashot_core::shoot::{ShootJob, ShootOptions, ShootVariant};
use lumashot_core::status::{ItemStatus, JobStatus};
use lumashot_render::{ImageProvider, RenderError};

// ---------------------------------------------------------------------------
// Scripted provider
// ---------------------------------------------------------------------------

/// In-memory [`ImageProvider`] with per-prompt scripted outcomes.
///
/// Responses are keyed by the exact prompt; tests make prompts
/// predictable via per-item prompt overrides. Unscripted prompts
/// succeed with synthetic bytes. Tracks total calls and the maximum
/// number of concurrently in-flight calls.
pub struct FakeProvider {
    responses: Mutex<HashMap<String, VecDeque<Result<Vec<u8>, String>>>>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::with_delay(None)
    }

    /// A provider whose calls take `delay`, to force call overlap.
    pub fn with_delay(delay: Option<Duration>) -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queue the next outcomes for calls whose prompt equals `prompt`.
    pub fn script(&self, prompt: &str, outcomes: Vec<Result<Vec<u8>, String>>) {
        self.responses
            .lock()
            .unwrap()
            .entry(prompt.to_string())
            .or_default()
            .extend(outcomes);
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn observed_max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ImageProvider for FakeProvider {
    async fn generate(
        &self,
        _source_image: &[u8],
        prompt: &str,
        _aspect_ratio: &str,
    ) -> Result<Vec<u8>, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .responses
            .lock()
            .unwrap()
            .get_mut(prompt)
            .and_then(VecDeque::pop_front);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match scripted {
            Some(Ok(bytes)) => Ok(bytes),
            Some(Err(message)) => Err(RenderError::Api {
                status: 502,
                body: message,
            }),
            None => Ok(format!("artifact for {prompt}").into_bytes()),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory shadow
// ---------------------------------------------------------------------------

/// [`ShadowStore`] over a `HashMap`, mirroring the Postgres semantics
/// closely enough for engine and recovery tests.
pub struct MemoryShadow {
    pub jobs: Mutex<HashMap<Uuid, ShootJob>>,
    pub writes: AtomicUsize,
}

impl MemoryShadow {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Seed a job directly, as if a previous process had mirrored it.
    pub fn seed(&self, job: ShootJob) {
        self.jobs.lock().unwrap().insert(job.id, job);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn job(&self, id: Uuid) -> Option<ShootJob> {
        self.jobs.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait::async_trait]
impl ShadowStore for MemoryShadow {
    async fn persist_job(&self, job: &ShootJob) -> Result<(), ShadowError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.jobs
            .lock()
            .unwrap()
            .entry(job.id)
            .or_insert_with(|| job.clone());
        Ok(())
    }

    async fn update_item(
        &self,
        shoot_id: Uuid,
        template_id: &str,
        status: ItemStatus,
        output_ref: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), ShadowError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&shoot_id) {
            if let Some(item) = job.items.iter_mut().find(|i| i.template_id == template_id) {
                item.status = status;
                item.output_ref = output_ref.map(str::to_string);
                item.error = error.map(str::to_string);
            }
        }
        Ok(())
    }

    async fn update_job(
        &self,
        shoot_id: Uuid,
        status: JobStatus,
        progress: Option<u32>,
        error_message: Option<&str>,
    ) -> Result<(), ShadowError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&shoot_id) {
            job.status = status;
            if let Some(progress) = progress {
                job.progress = progress;
            }
            if let Some(message) = error_message {
                job.error_message = Some(message.to_string());
            }
        }
        Ok(())
    }

    async fn record_variant(
        &self,
        shoot_id: Uuid,
        variant: &ShootVariant,
    ) -> Result<(), ShadowError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&shoot_id) {
            job.add_variant(variant.clone());
        }
        Ok(())
    }

    async fn load_job(&self, shoot_id: Uuid) -> Result<Option<ShootJob>, ShadowError> {
        Ok(self.jobs.lock().unwrap().get(&shoot_id).cloned())
    }

    async fn list_incomplete(&self) -> Result<Vec<ShootJob>, ShadowError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| !j.status.is_terminal())
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Wired engine
// ---------------------------------------------------------------------------

/// A fully wired orchestrator over in-memory collaborators.
pub struct TestEngine {
    pub store: Arc<TaskStore>,
    pub shadow: Arc<MemoryShadow>,
    pub provider: Arc<FakeProvider>,
    pub artifacts: Arc<ArtifactStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub tracker: TaskTracker,
    _data_dir: tempfile::TempDir,
}

impl TestEngine {
    pub async fn new() -> Self {
        Self::with_provider(FakeProvider::new(), 4).await
    }

    pub async fn with_provider(provider: FakeProvider, concurrency: usize) -> Self {
        let data_dir = tempfile::tempdir().expect("tempdir");
        let artifacts = Arc::new(ArtifactStore::new(data_dir.path()));
        artifacts.init().await.expect("artifact store init");

        let store = Arc::new(TaskStore::new());
        let shadow = Arc::new(MemoryShadow::new());
        let provider = Arc::new(provider);
        let tracker = TaskTracker::new();
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&store),
            shadow.clone() as Arc<dyn ShadowStore>,
            provider.clone() as Arc<dyn ImageProvider>,
            Arc::clone(&artifacts),
            concurrency,
            tracker.clone(),
        ));

        Self {
            store,
            shadow,
            provider,
            artifacts,
            orchestrator,
            tracker,
            _data_dir: data_dir,
        }
    }

    /// Build and register a shoot over the given templates.
    ///
    /// Every item gets a prompt override equal to its template id, so
    /// provider prompts are predictable for scripting (no style suffix).
    pub async fn create_shoot(
        &self,
        user_id: Option<i64>,
        template_ids: &[&str],
    ) -> Arc<JobHandle> {
        let source_id = self
            .artifacts
            .store_source(b"source-image")
            .await
            .expect("store source");

        let ids: Vec<String> = template_ids.iter().map(|s| s.to_string()).collect();
        let templates = catalog::resolve(&ids).expect("known templates");
        let overrides = template_ids
            .iter()
            .map(|id| (id.to_string(), id.to_string()))
            .collect();

        let job = ShootJob::build(
            source_id,
            user_id,
            String::new(),
            &templates,
            ShootOptions {
                prompt_overrides: overrides,
                post_process: false,
            },
        );
        self.store.insert(job)
    }

    /// Claim a pending shoot and run it to completion inline.
    pub async fn run_to_completion(&self, handle: &Arc<JobHandle>) {
        use lumashot_api::engine::orchestrator::Claim;
        match self
            .orchestrator
            .try_claim(handle.id())
            .expect("claim should succeed")
        {
            Claim::Started(claimed) => Arc::clone(&self.orchestrator).run(claimed).await,
            Claim::Finished(_) => panic!("shoot was already terminal"),
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP app builder
// ---------------------------------------------------------------------------

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;

use lumashot_api::config::ServerConfig;
use lumashot_api::engine::shadow::PgShadow;
use lumashot_api::routes;
use lumashot_api::state::AppState;

/// A wired HTTP application over a real database pool and a scripted
/// provider.
pub struct TestApp {
    pub app: Router,
    pub provider: Arc<FakeProvider>,
    pub state: AppState,
    _data_dir: tempfile::TempDir,
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(data_dir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        data_dir: data_dir.to_path_buf(),
        render_api_url: "http://localhost:9800".to_string(),
        render_api_key: String::new(),
        generation_concurrency: 4,
    }
}

/// Build the full application router with the same middleware stack as
/// production, but with a scripted provider and the given pool as the
/// shadow.
pub async fn build_test_app(pool: PgPool) -> TestApp {
    build_test_app_with_provider(pool, FakeProvider::new()).await
}

pub async fn build_test_app_with_provider(pool: PgPool, provider: FakeProvider) -> TestApp {
    let data_dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(data_dir.path());

    let artifacts = Arc::new(ArtifactStore::new(data_dir.path()));
    artifacts.init().await.expect("artifact store init");

    let store = Arc::new(TaskStore::new());
    let shadow: Arc<dyn ShadowStore> = Arc::new(PgShadow::new(pool.clone()));
    let provider = Arc::new(provider);
    let tracker = TaskTracker::new();
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&store),
        Arc::clone(&shadow),
        provider.clone() as Arc<dyn ImageProvider>,
        Arc::clone(&artifacts),
        config.generation_concurrency,
        tracker.clone(),
    ));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        store,
        orchestrator,
        shadow,
        artifacts,
        tracker,
    };

    let request_id_header = HeaderName::from_static("x-request-id");
    let app = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state.clone());

    TestApp {
        app,
        provider,
        state,
        _data_dir: data_dir,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request"),
    )
    .await
    .expect("response")
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
    )
    .await
    .expect("response")
}

pub async fn post_bytes(
    app: Router,
    uri: &str,
    content_type: &str,
    bytes: Vec<u8>,
) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(bytes))
            .expect("request"),
    )
    .await
    .expect("response")
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("valid JSON body")
}

/// Read an SSE response body and parse every `data:` line as JSON.
pub async fn sse_events(response: Response<Body>) -> Vec<serde_json::Value> {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let text = String::from_utf8(bytes.to_vec()).expect("utf-8 SSE body");
    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).expect("valid JSON event"))
        .collect()
}
