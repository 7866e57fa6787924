pub mod annotate;
pub mod article;
pub mod capture;
pub mod db;
pub mod document;
pub mod enrichment;
pub mod error;
pub mod models;
pub mod service;
pub mod settings;
pub mod storage;
pub mod translation;
pub mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use log::info;

use article::ArticleAuthor;
use capture::{CaptureController, HostSurface};
use db::Database;
use enrichment::{Enricher, InferenceCapabilities, InferenceChain, InferenceWorker};
use service::{BackgroundService, Request, Response, ServiceHandle};
use settings::SettingsStore;
use storage::{DurablePartition, EphemeralPartition, MemoryEphemeral, Storage};

pub use error::RecorderError;

/// Initialises `env_logger`; safe to call more than once.
pub fn init_logging() {
    utils::logging::init();
}

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub data_dir: PathBuf,
}

impl RecorderConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("docuflow.sqlite3")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }
}

/// A running recorder: the background service, the privileged inference
/// worker and the article authoring client, wired to shared storage.
pub struct Recorder {
    service: ServiceHandle,
    author: ArticleAuthor,
    storage: Storage,
    settings: Arc<SettingsStore>,
}

impl Recorder {
    /// Opens the durable store and settings under `config.data_dir` and starts
    /// every context. Must be called from within a Tokio runtime.
    pub fn open(
        config: RecorderConfig,
        host: Arc<dyn HostSurface>,
        capabilities: InferenceCapabilities,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("failed to create data directory {}", config.data_dir.display())
        })?;

        let database = Database::new(config.db_path())?;
        let settings = Arc::new(SettingsStore::new(config.settings_path())?);
        info!("Recorder data lives in {}", config.data_dir.display());

        Ok(Self::with_partitions(
            Arc::new(database),
            Arc::new(MemoryEphemeral::new()),
            settings,
            host,
            capabilities,
        ))
    }

    /// Wires the recorder over caller-supplied partitions.
    pub fn with_partitions(
        durable: Arc<dyn DurablePartition>,
        ephemeral: Arc<dyn EphemeralPartition>,
        settings: Arc<SettingsStore>,
        host: Arc<dyn HostSurface>,
        capabilities: InferenceCapabilities,
    ) -> Self {
        let storage = Storage::new(durable, ephemeral);
        let chain = Arc::new(InferenceChain::new(capabilities, settings.clone()));
        let worker = InferenceWorker::spawn(chain.clone(), storage.clone(), settings.clone());
        let enricher = Enricher::new(worker, chain.clone(), settings.clone());

        let capture = CaptureController::new(storage.clone(), host, enricher.clone(), settings.clone());
        let background = BackgroundService::new(capture, storage.clone(), enricher, settings.clone());
        let service = ServiceHandle::spawn(background);
        let author = ArticleAuthor::new(service.clone(), storage.clone(), chain, settings.clone());

        Self {
            service,
            author,
            storage,
            settings,
        }
    }

    /// Sends one request to the background service. An unreachable service is
    /// reported as a failed reply.
    pub async fn request(&self, request: Request) -> Response {
        self.service
            .request(request)
            .await
            .unwrap_or_else(|err| Response::failed(err.code()))
    }

    pub fn service(&self) -> &ServiceHandle {
        &self.service
    }

    pub fn author(&self) -> &ArticleAuthor {
        &self.author
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }
}
