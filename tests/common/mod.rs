use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Method, Request};
use axum::Router;
use contractlens::config::AppConfig;
use contractlens::db::{self, PgPool};
use contractlens::extract::TextExtractor;
use contractlens::llm::{LlmClient, LlmError};
use contractlens::routes;
use contractlens::state::AppState;
use contractlens::storage::ObjectStorage;
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const UNREACHABLE_DATABASE_URL: &str = "postgres://contractlens@127.0.0.1:1/unreachable";

#[allow(dead_code)]
#[derive(Clone)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: Option<String>,
        _content_disposition: Option<String>,
    ) -> Result<()> {
        let stored = StoredObject {
            key: key.to_string(),
            bytes: bytes.to_vec(),
            content_type,
        };
        let mut guard = self.objects.lock().await;
        guard.insert(stored.key.clone(), stored);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let mut guard = self.objects.lock().await;
        guard.remove(key);
        Ok(())
    }
}

impl FakeStorage {
    #[allow(dead_code)]
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        let guard = self.objects.lock().await;
        guard.get(key).cloned()
    }

    #[allow(dead_code)]
    pub async fn object_count(&self) -> usize {
        let guard = self.objects.lock().await;
        guard.len()
    }
}

#[allow(dead_code)]
#[derive(Clone, Debug)]
pub struct LlmCall {
    pub system_prompt: Option<String>,
    pub user_content: String,
    pub model: String,
}

/// Replies with a fixed result and records every prompt it receives.
pub struct ScriptedLlm {
    reply: Result<String, String>,
    calls: Mutex<Vec<LlmCall>>,
}

impl ScriptedLlm {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[allow(dead_code)]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[allow(dead_code)]
    pub async fn calls(&self) -> Vec<LlmCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        user_content: &str,
        model: &str,
    ) -> Result<String, LlmError> {
        self.calls.lock().await.push(LlmCall {
            system_prompt: system_prompt.map(str::to_string),
            user_content: user_content.to_string(),
            model: model.to_string(),
        });
        self.reply
            .clone()
            .map_err(LlmError::MalformedResponse)
    }
}

pub struct StaticExtractor(pub String);

impl TextExtractor for StaticExtractor {
    fn extract(&self, _bytes: &[u8]) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[allow(dead_code)]
pub struct UnreadableExtractor;

impl TextExtractor for UnreadableExtractor {
    fn extract(&self, _bytes: &[u8]) -> Result<String> {
        Err(anyhow!("trailer not found"))
    }
}

#[allow(dead_code)]
pub struct CrashingExtractor;

impl TextExtractor for CrashingExtractor {
    fn extract(&self, _bytes: &[u8]) -> Result<String> {
        panic!("pdf parser crashed");
    }
}

pub struct TestOptions {
    pub llm: Arc<ScriptedLlm>,
    pub extractor: Arc<dyn TextExtractor>,
    pub api_key: Option<String>,
    pub use_fallback_extraction: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            llm: Arc::new(ScriptedLlm::replying("{}")),
            extractor: Arc::new(StaticExtractor("Sample contract text.\n".to_string())),
            api_key: Some("sk-test".to_string()),
            use_fallback_extraction: false,
        }
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    storage: Arc<FakeStorage>,
    llm: Arc<ScriptedLlm>,
}

impl TestApp {
    /// App whose database can never be reached. Suitable for routes that
    /// answer before touching the database.
    pub fn offline(options: TestOptions) -> Self {
        let pool: PgPool = Pool::builder()
            .max_size(1)
            .connection_timeout(Duration::from_secs(1))
            .build_unchecked(ConnectionManager::new(UNREACHABLE_DATABASE_URL));
        Self::assemble(pool, UNREACHABLE_DATABASE_URL, options)
    }

    /// App backed by `TEST_DATABASE_URL`. Tests using it are `#[ignore]`d
    /// and run with `cargo test -- --ignored` against a scratch database.
    #[allow(dead_code)]
    pub async fn with_database(options: TestOptions) -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for database-backed tests")?;

        let pool = db::init_pool_with_size(&database_url, db::DEFAULT_MAX_POOL_SIZE)?;
        prepare_database(&pool).await?;
        Ok(Self::assemble(pool, &database_url, options))
    }

    fn assemble(pool: PgPool, database_url: &str, options: TestOptions) -> Self {
        let config = test_config(database_url, &options);
        let storage = Arc::new(FakeStorage::default());
        let storage_for_state: Arc<dyn ObjectStorage> = storage.clone();
        let llm_for_state: Arc<dyn LlmClient> = options.llm.clone();
        let state = AppState::new(pool, config, storage_for_state, llm_for_state, options.extractor);
        let router = routes::create_router(state.clone());

        Self {
            state,
            router,
            storage,
            llm: options.llm,
        }
    }

    #[allow(dead_code)]
    pub fn storage(&self) -> Arc<FakeStorage> {
        self.storage.clone()
    }

    #[allow(dead_code)]
    pub fn llm(&self) -> Arc<ScriptedLlm> {
        self.llm.clone()
    }

    #[allow(dead_code)]
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.post_raw(path, "application/json", body).await
    }

    #[allow(dead_code)]
    pub async fn post_raw(
        &self,
        path: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", content_type)
            .body(Body::from(body))?;
        self.send(request).await
    }

    #[allow(dead_code)]
    pub async fn post_empty(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .body(Body::empty())?;
        self.send(request).await
    }

    #[allow(dead_code)]
    pub async fn get(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())?;
        self.send(request).await
    }

    /// Sends a multipart ingest request. `file` is `(filename, content type, bytes)`.
    #[allow(dead_code)]
    pub async fn ingest(
        &self,
        file: Option<(&str, &str, &[u8])>,
        title: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();

        if let Some((filename, content_type, data)) = file {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!(
                    "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                    filename
                )
                .as_bytes(),
            );
            body.extend(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
            body.extend(data);
            body.extend(b"\r\n");
        }

        if let Some(title) = title {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(b"Content-Disposition: form-data; name=\"title\"\r\n\r\n");
            body.extend(title.as_bytes());
            body.extend(b"\r\n");
        }

        body.extend(format!("--{boundary}--\r\n").as_bytes());

        self.post_raw(
            "/api/ingest/",
            &format!("multipart/form-data; boundary={boundary}"),
            body,
        )
        .await
    }

    async fn send(&self, request: Request<Body>) -> Result<hyper::Response<Body>> {
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }
}

fn test_config(database_url: &str, options: &TestOptions) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        cors_allowed_origin: None,
        max_upload_bytes: 10 * 1024 * 1024,
        media_root: "media".into(),
        aws_endpoint_url: None,
        aws_access_key_id: None,
        aws_secret_access_key: None,
        aws_region: "us-east-1".to_string(),
        s3_bucket: None,
        pdfium_library_path: None,
        openai_api_key: options.api_key.clone(),
        openai_base_url: "http://127.0.0.1:9/v1".to_string(),
        llm_model: "test-model".to_string(),
        use_fallback_extraction: options.use_fallback_extraction,
        stream_word_delay_ms: 0,
    }
}

#[allow(dead_code)]
pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

#[allow(dead_code)]
pub async fn body_json(body: Body) -> Result<Value> {
    let bytes = body_to_vec(body).await?;
    serde_json::from_slice(&bytes).context("response body is not JSON")
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        db::run_migrations(&pool)?;
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.batch_execute("TRUNCATE TABLE documents RESTART IDENTITY CASCADE;")
            .context("failed to truncate tables")?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}
