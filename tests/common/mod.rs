#![allow(dead_code)]

use std::{
    collections::HashMap,
    io::Cursor,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, Rgba, RgbaImage};
use serde_json::Value;
use tokio::sync::Notify;

use docuflow::capture::{HostSurface, SurfaceTarget};
use docuflow::enrichment::{
    ApiShape, Availability, InferenceBackend, InferenceCapabilities, InferenceSession, SessionOptions,
};
use docuflow::models::{CaptureMeta, Point, SurfaceOrigin, Viewport};
use docuflow::settings::SettingsStore;
use docuflow::storage::{DurablePartition, EphemeralPartition, MemoryEphemeral};
use docuflow::Recorder;

pub fn png_data_url(width: u32, height: u32) -> String {
    let canvas = RgbaImage::from_pixel(width, height, Rgba([240, 240, 240, 255]));
    let mut bytes = Cursor::new(Vec::new());
    canvas.write_to(&mut bytes, ImageFormat::Png).unwrap();
    format!("data:image/png;base64,{}", STANDARD.encode(bytes.into_inner()))
}

pub fn click_at(x: f64, y: f64, selector: &str) -> CaptureMeta {
    CaptureMeta {
        event: Some("click".into()),
        selector: Some(selector.into()),
        point: Some(Point { x, y }),
        viewport: Some(Viewport { width: 32.0, height: 24.0 }),
        url: Some("https://app.example.com/settings".into()),
        title: Some("Settings".into()),
        ..Default::default()
    }
}

pub fn blur(selector: &str) -> CaptureMeta {
    CaptureMeta {
        event: Some("blur".into()),
        selector: Some(selector.into()),
        value: Some("jane@example.com".into()),
        ..Default::default()
    }
}

/// Host surface returning a small PNG for every capture.
#[derive(Default)]
pub struct FakeHost {
    pub fail_capture: AtomicBool,
    pub captures: AtomicUsize,
    pub broadcasts: Mutex<Vec<bool>>,
    pub last_origin: Mutex<Option<SurfaceOrigin>>,
}

#[async_trait]
impl HostSurface for FakeHost {
    async fn resolve_target(&self, origin: Option<&SurfaceOrigin>) -> Result<SurfaceTarget> {
        *self.last_origin.lock().unwrap() = origin.cloned();
        Ok(SurfaceTarget {
            window_id: origin.and_then(|o| o.window_id).unwrap_or(1),
        })
    }

    async fn capture_visible(&self, _target: SurfaceTarget) -> Result<String> {
        if self.fail_capture.load(Ordering::SeqCst) {
            return Err(anyhow!("surface is not capturable"));
        }
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(png_data_url(32, 24))
    }

    async fn broadcast_recording(&self, on: bool) -> Result<()> {
        self.broadcasts.lock().unwrap().push(on);
        Err(anyhow!("no observers listening"))
    }
}

type Responder = dyn Fn(&SessionOptions, &str) -> Option<String> + Send + Sync;

/// Inference backend whose replies come from a closure. With a gate, every
/// prompt waits for a `notify_one` before answering.
pub struct ScriptedBackend {
    shape: ApiShape,
    availability: Mutex<Availability>,
    responder: Arc<Responder>,
    gate: Option<Arc<Notify>>,
    pub probes: AtomicUsize,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBackend {
    pub fn new(
        shape: ApiShape,
        availability: Availability,
        responder: impl Fn(&SessionOptions, &str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            shape,
            availability: Mutex::new(availability),
            responder: Arc::new(responder),
            gate: None,
            probes: AtomicUsize::new(0),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_availability(&self, availability: Availability) {
        *self.availability.lock().unwrap() = availability;
    }
}

struct ScriptedSession {
    options: SessionOptions,
    responder: Arc<Responder>,
    gate: Option<Arc<Notify>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl InferenceSession for ScriptedSession {
    async fn prompt(&mut self, text: &str) -> Result<String> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.prompts.lock().unwrap().push(text.to_string());
        (self.responder)(&self.options, text).ok_or_else(|| anyhow!("model produced nothing"))
    }

    async fn destroy(&mut self) {}
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn shape(&self) -> ApiShape {
        self.shape
    }

    async fn probe(&self, _options: &SessionOptions) -> Availability {
        self.probes.fetch_add(1, Ordering::SeqCst);
        *self.availability.lock().unwrap()
    }

    async fn open_session(&self, options: &SessionOptions) -> Result<Box<dyn InferenceSession>> {
        Ok(Box::new(ScriptedSession {
            options: options.clone(),
            responder: self.responder.clone(),
            gate: self.gate.clone(),
            prompts: self.prompts.clone(),
        }))
    }
}

/// In-memory durable partition that can be told to reject writes.
#[derive(Default)]
pub struct FlakyDurable {
    entries: Mutex<HashMap<String, Value>>,
    pub fail_writes: AtomicBool,
    pub writes: AtomicUsize,
}

impl FlakyDurable {
    pub fn seed(&self, key: &str, value: Value) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn snapshot(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl DurablePartition for FlakyDurable {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let entries = self.entries.lock().unwrap();
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    async fn set(&self, entries: Vec<(String, Value)>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("durable quota exceeded"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().unwrap().extend(entries);
        Ok(())
    }
}

/// Ephemeral partition that can be told to reject stores.
#[derive(Default)]
pub struct FlakyEphemeral {
    pub inner: MemoryEphemeral,
    pub fail_sets: AtomicBool,
    pub sets: AtomicUsize,
}

#[async_trait]
impl EphemeralPartition for FlakyEphemeral {
    async fn set(&self, key: &str, payload: String) -> Result<()> {
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(anyhow!("session storage quota exceeded"));
        }
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, payload).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        self.inner.remove(keys).await
    }
}

pub struct Harness {
    pub recorder: Recorder,
    pub host: Arc<FakeHost>,
    pub durable: Arc<FlakyDurable>,
    pub ephemeral: Arc<FlakyEphemeral>,
    _dir: tempfile::TempDir,
}

pub fn harness(capabilities: InferenceCapabilities) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let settings = Arc::new(SettingsStore::new(dir.path().join("settings.json")).unwrap());
    let host = Arc::new(FakeHost::default());
    let durable = Arc::new(FlakyDurable::default());
    let ephemeral = Arc::new(FlakyEphemeral::default());
    let recorder = Recorder::with_partitions(
        durable.clone(),
        ephemeral.clone(),
        settings,
        host.clone(),
        capabilities,
    );
    Harness {
        recorder,
        host,
        durable,
        ephemeral,
        _dir: dir,
    }
}

/// Polls `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
