use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecorderSettings {
    /// When false the compositor passes raw captures through untouched.
    pub annotate_screenshots: bool,
    /// Language the inference sessions are scoped to for input and output.
    pub expected_language: String,
    /// How much of the screenshot data URL is quoted into a description prompt.
    pub prompt_screenshot_chars: usize,
    /// Limit for element text and field values in the step context string.
    pub context_field_chars: usize,
    pub article_context_chars: usize,
    pub existing_description_chars: usize,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            annotate_screenshots: true,
            expected_language: "en".into(),
            prompt_screenshot_chars: 2048,
            context_field_chars: 120,
            article_context_chars: 800,
            existing_description_chars: 200,
        }
    }
}

/// Settings file shared by every context. Reads are served from memory; an
/// update is written to disk before it becomes visible.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<RecorderSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = load(&path)?;
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> RecorderSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, settings: RecorderSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let encoded = serde_json::to_string_pretty(&settings).context("settings did not encode")?;
        fs::write(&self.path, encoded)
            .with_context(|| format!("could not save settings to {}", self.path.display()))?;
        *guard = settings;
        Ok(())
    }
}

fn load(path: &Path) -> Result<RecorderSettings> {
    if !path.exists() {
        return Ok(RecorderSettings::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read settings from {}", path.display()))?;
    Ok(serde_json::from_str(&raw).unwrap_or_else(|err| {
        log::warn!("ignoring malformed settings in {}: {err}", path.display());
        RecorderSettings::default()
    }))
}
