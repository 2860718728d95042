//! Shared fixtures for integration tests: an in-memory remote, a provider
//! factory over it, a wired engine and a webhook sink.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use bytes::Bytes;
use tokio::sync::Semaphore;
use uuid::Uuid;

use mft_core::config::AppConfig;
use mft_core::error::AppError;
use mft_core::result::AppResult;
use mft_core::traits::{RemoteEntry, TransferProvider};
use mft_database::Stores;
use mft_entity::{Job, ProviderType, TransferConfig};
use mft_storage::{EndpointSpec, ProviderFactory};
use mft_worker::Engine;

/// Files of every fake endpoint, keyed by `root/relative-path`.
#[derive(Debug, Default)]
pub struct FakeRemote {
    files: Mutex<BTreeMap<String, Bytes>>,
    listed_roots: Mutex<Vec<String>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    gate: Mutex<Option<Arc<Semaphore>>>,
    read_delay: Mutex<Option<Duration>>,
    reads_in_flight: AtomicUsize,
    peak_reads: AtomicUsize,
    faults: Mutex<HashMap<String, Fault>>,
    attempts: Mutex<HashMap<String, usize>>,
}

/// An injected failure for one key.
#[derive(Debug, Clone, Copy)]
enum Fault {
    /// Fail with a connection error this many more times.
    Transient(usize),
    /// Always fail with an authentication error.
    Auth,
}

impl FakeRemote {
    pub fn put(&self, path: &str, data: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), Bytes::from(data.to_string()));
    }

    pub fn exists(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    /// Roots passed to `list`, in call order.
    pub fn listed_roots(&self) -> Vec<String> {
        self.listed_roots.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Block every `list` call until [`FakeRemote::release`].
    pub fn hold(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    fn gate(&self) -> Option<Arc<Semaphore>> {
        self.gate.lock().unwrap().clone()
    }

    /// Make every read take `delay`, so concurrent reads overlap.
    pub fn slow_reads(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = Some(delay);
    }

    /// Highest number of reads observed in progress at once.
    pub fn peak_concurrent_reads(&self) -> usize {
        self.peak_reads.load(Ordering::SeqCst)
    }

    /// Fail the next `times` reads or writes of `path` with a connection error.
    pub fn fail_transiently(&self, path: &str, times: usize) {
        self.faults
            .lock()
            .unwrap()
            .insert(path.to_string(), Fault::Transient(times));
    }

    /// Reject every read or write of `path` with an authentication error.
    pub fn reject(&self, path: &str) {
        self.faults.lock().unwrap().insert(path.to_string(), Fault::Auth);
    }

    /// Read and write calls made for `path`, failed ones included.
    pub fn attempts(&self, path: &str) -> usize {
        self.attempts.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    fn inject(&self, key: &str) -> AppResult<()> {
        *self.attempts.lock().unwrap().entry(key.to_string()).or_default() += 1;
        let mut faults = self.faults.lock().unwrap();
        match faults.get_mut(key) {
            Some(Fault::Auth) => Err(AppError::provider_auth(format!(
                "{key}: authentication failed"
            ))),
            Some(Fault::Transient(left)) if *left > 0 => {
                *left -= 1;
                Err(AppError::provider_connection(format!(
                    "{key}: connection reset"
                )))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug)]
struct FakeProvider {
    root: String,
    remote: Arc<FakeRemote>,
    rejects: bool,
}

impl FakeProvider {
    fn key(&self, path: &str) -> String {
        format!("{}/{}", self.root.trim_end_matches('/'), path)
    }

    fn check(&self) -> AppResult<()> {
        if self.rejects {
            Err(AppError::provider_auth(format!(
                "{}: authentication failed",
                self.root
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TransferProvider for FakeProvider {
    fn provider_type(&self) -> &str {
        "fake"
    }

    async fn list(&self, dir: &str) -> AppResult<Vec<RemoteEntry>> {
        self.check()?;
        if let Some(gate) = self.remote.gate() {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| AppError::internal(e.to_string()))?;
        }
        self.remote.listed_roots.lock().unwrap().push(self.root.clone());

        let prefix = if dir.is_empty() {
            format!("{}/", self.root.trim_end_matches('/'))
        } else {
            format!("{}/", self.key(dir))
        };
        let files = self.remote.files.lock().unwrap();
        Ok(files
            .iter()
            .filter_map(|(key, data)| {
                let name = key.strip_prefix(&prefix)?;
                (!name.contains('/')).then(|| RemoteEntry {
                    path: name.to_string(),
                    name: name.to_string(),
                    size_bytes: data.len() as u64,
                    modified: None,
                    created: None,
                    is_directory: false,
                })
            })
            .collect())
    }

    async fn read(&self, path: &str) -> AppResult<Bytes> {
        self.check()?;
        self.remote.inject(&self.key(path))?;
        self.remote.reads.fetch_add(1, Ordering::SeqCst);

        let delay = *self.remote.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            let now = self.remote.reads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.remote.peak_reads.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.remote.reads_in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        self.remote
            .files
            .lock()
            .unwrap()
            .get(&self.key(path))
            .cloned()
            .ok_or_else(|| AppError::storage(format!("{path} not found")))
    }

    async fn write(&self, path: &str, data: Bytes) -> AppResult<u64> {
        self.check()?;
        self.remote.inject(&self.key(path))?;
        self.remote.writes.fetch_add(1, Ordering::SeqCst);
        let len = data.len() as u64;
        self.remote.files.lock().unwrap().insert(self.key(path), data);
        Ok(len)
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        self.check()?;
        self.remote.files.lock().unwrap().remove(&self.key(path));
        Ok(())
    }
}

/// Builds fake providers; the listed provider types reject credentials.
#[derive(Debug)]
pub struct FakeFactory {
    pub remote: Arc<FakeRemote>,
    pub rejected: Vec<ProviderType>,
}

impl ProviderFactory for FakeFactory {
    fn build(&self, spec: &EndpointSpec<'_>) -> AppResult<Arc<dyn TransferProvider>> {
        Ok(Arc::new(FakeProvider {
            root: spec.root.to_string(),
            remote: Arc::clone(&self.remote),
            rejects: self.rejected.contains(&spec.provider_type),
        }))
    }
}

/// Settings with fast retries for tests.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.worker.retry_backoff_ms = 1;
    config.worker.tick_interval_ms = 20;
    config.worker.shutdown_grace_seconds = 5;
    config.webhook.retry_delay_ms = 50;
    config.webhook.timeout_seconds = 2;
    config
}

/// An engine over in-memory stores and a fake remote.
pub struct Harness {
    pub engine: Engine,
    pub remote: Arc<FakeRemote>,
}

impl Harness {
    pub fn new() -> Self {
        Self::rejecting(Vec::new())
    }

    /// Endpoints of the given types fail with an authentication error.
    pub fn rejecting(rejected: Vec<ProviderType>) -> Self {
        let remote = Arc::new(FakeRemote::default());
        let factory = Arc::new(FakeFactory {
            remote: Arc::clone(&remote),
            rejected,
        });
        let engine = Engine::new(&test_config(), Stores::memory(), factory).unwrap();
        Self { engine, remote }
    }

    /// A config reading `/src/{name}` and writing `/dst/{name}`, with the
    /// given source files.
    pub async fn config(&self, name: &str, files: &[&str]) -> TransferConfig {
        for file in files {
            self.remote
                .put(&format!("/src/{name}/{file}"), &format!("content of {file}"));
        }
        let mut config =
            TransferConfig::new(name, &format!("/src/{name}"), &format!("/dst/{name}"));
        config.skip_processed_files = true;
        self.engine.stores.configs.create(&config).await.unwrap()
    }

    /// An SFTP-sourced config; rejected when the harness rejects SFTP.
    pub async fn sftp_config(&self, name: &str) -> TransferConfig {
        let mut config = TransferConfig::new(name, "/inbox", &format!("/dst/{name}"));
        config.source_type = ProviderType::Sftp;
        config.source_credentials =
            serde_json::json!({"host": "sftp.example.com", "user": "mft", "password": "secret"});
        self.engine.stores.configs.create(&config).await.unwrap()
    }

    pub async fn job(&self, job: Job) -> Job {
        self.engine.service.create(job).await.unwrap()
    }

    /// Wait until the job's run-lock is free.
    pub async fn wait_idle(&self, job_id: Uuid) {
        wait_until(|| !self.engine.runner.is_running(job_id)).await;
    }
}

/// Poll `check` for up to five seconds.
pub async fn wait_until(check: impl Fn() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 5s");
}

/// One request received by the sink.
#[derive(Debug, Clone)]
pub struct Received {
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Received {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

#[derive(Clone, Default)]
struct SinkState {
    received: Arc<Mutex<Vec<Received>>>,
    failures_left: Arc<AtomicUsize>,
}

/// An in-process HTTP endpoint that records webhook calls.
pub struct WebhookSink {
    pub url: String,
    state: SinkState,
}

impl WebhookSink {
    pub async fn start() -> Self {
        Self::failing_first(0).await
    }

    /// Answer 500 to the first `failures` requests.
    pub async fn failing_first(failures: usize) -> Self {
        let state = SinkState {
            received: Arc::default(),
            failures_left: Arc::new(AtomicUsize::new(failures)),
        };
        let app = Router::new()
            .route("/hook", post(receive))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            url: format!("http://{addr}/hook"),
            state,
        }
    }

    pub fn received(&self) -> Vec<Received> {
        self.state.received.lock().unwrap().clone()
    }
}

async fn receive(State(state): State<SinkState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    state
        .received
        .lock()
        .unwrap()
        .push(Received { headers, body });
    let fail = state
        .failures_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if fail {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}
