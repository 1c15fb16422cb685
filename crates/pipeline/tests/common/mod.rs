//! Test doubles shared by the pipeline integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use imagegen_core::{
    GenerationRecord, GenerationRequest, HistoryRecord, ImageGenerator, RawResponse,
    TransportError,
};
use imagegen_core::types::Credits;
use imagegen_events::EventBus;
use imagegen_pipeline::{ImagePipeline, PipelineConfig};
use imagegen_store::{
    DynHistoryStore, DynRecordStore, HistoryStore, MemoryHistoryStore, RecordStore, StoreError,
};

/// A valid base64 payload comfortably above the minimum length.
pub fn sample_image() -> String {
    STANDARD.encode((0..2048u32).map(|i| (i % 251) as u8).collect::<Vec<_>>())
}

/// What the fake endpoint does for one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Image,
    Status(u16, &'static str),
    Transport(TransportError),
}

type Script = dyn Fn(usize, &GenerationRequest) -> Reply + Send + Sync;

/// Scripted [`ImageGenerator`] that records every call.
pub struct FakeGenerator {
    script: Box<Script>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl FakeGenerator {
    pub fn new(script: impl Fn(usize, &GenerationRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Every call returns an image.
    pub fn succeeding() -> Self {
        Self::new(|_, _| Reply::Image)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<GenerationRequest> {
        self.seen.lock().unwrap().clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ImageGenerator for FakeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<RawResponse, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match (self.script)(call, request) {
            Reply::Image => Ok(RawResponse::new(
                200,
                serde_json::json!({ "image": sample_image() }).to_string(),
            )),
            Reply::Status(status, body) => Ok(RawResponse::new(status, body)),
            Reply::Transport(e) => Err(e),
        }
    }
}

/// Record store whose every operation fails.
pub struct FailingRecordStore;

#[async_trait]
impl RecordStore for FailingRecordStore {
    async fn get_credits(&self, _user_id: &str) -> Result<Credits, StoreError> {
        Err(StoreError::Conflict("backend down".into()))
    }

    async fn deduct_credits(&self, _user_id: &str, _amount: Credits) -> Result<Credits, StoreError> {
        Err(StoreError::Conflict("backend down".into()))
    }

    async fn save_generation(&self, _record: &GenerationRecord) -> Result<(), StoreError> {
        Err(StoreError::Conflict("backend down".into()))
    }
}

/// History store whose every operation fails.
pub struct FailingHistoryStore;

#[async_trait]
impl HistoryStore for FailingHistoryStore {
    async fn append(&self, _record: HistoryRecord) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    async fn remove(&self, _id: &str) -> Result<bool, StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    async fn list(&self) -> Result<Vec<HistoryRecord>, StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }
}

/// A pipeline wired to `generator`, returning the collaborators so tests
/// can inspect them.
pub struct Harness {
    pub pipeline: Arc<ImagePipeline>,
    pub generator: Arc<FakeGenerator>,
    pub history: Arc<MemoryHistoryStore>,
    pub events: Arc<EventBus>,
}

pub fn harness(
    generator: FakeGenerator,
    records: Option<DynRecordStore>,
    config: PipelineConfig,
) -> Harness {
    let generator = Arc::new(generator);
    let history = Arc::new(MemoryHistoryStore::new());
    let events = Arc::new(EventBus::default());
    let pipeline = ImagePipeline::new(
        Arc::clone(&generator) as Arc<dyn ImageGenerator>,
        records,
        Arc::clone(&history) as DynHistoryStore,
        Arc::clone(&events),
        config,
    );
    Harness {
        pipeline: Arc::new(pipeline),
        generator,
        history,
        events,
    }
}

pub fn featured(n: usize) -> GenerationRequest {
    GenerationRequest::featured_image(format!("Post {n}"), format!("Body of post {n}")).unwrap()
}

pub fn infographic(n: usize) -> GenerationRequest {
    GenerationRequest::infographic(format!("Figures for report {n}")).unwrap()
}
