//! Capability seam for on-device inference.
//!
//! A host exposes text inference through one of two API shapes. Each shape is
//! an [`InferenceBackend`]; which ones exist is decided once at startup and
//! recorded in [`InferenceCapabilities`].

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    /// The model is missing but opening a session starts the download.
    Downloadable,
    Downloading,
    Unavailable,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApiShape {
    Primary,
    Legacy,
}

/// Session scope: the system instruction plus the language used for both the
/// expected input and output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub system_prompt: String,
    pub language: String,
}

#[async_trait]
pub trait InferenceSession: Send {
    /// Single-turn prompt returning free text.
    async fn prompt(&mut self, text: &str) -> Result<String>;

    async fn destroy(&mut self);
}

#[async_trait]
pub trait InferenceBackend: Send + Sync {
    fn shape(&self) -> ApiShape;

    async fn probe(&self, options: &SessionOptions) -> Availability;

    async fn open_session(&self, options: &SessionOptions) -> Result<Box<dyn InferenceSession>>;
}

#[derive(Clone, Default)]
pub struct InferenceCapabilities {
    pub primary: Option<Arc<dyn InferenceBackend>>,
    pub legacy: Option<Arc<dyn InferenceBackend>>,
}

impl InferenceCapabilities {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_primary(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.primary = Some(backend);
        self
    }

    pub fn with_legacy(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.legacy = Some(backend);
        self
    }
}
