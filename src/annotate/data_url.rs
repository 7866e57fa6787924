use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// A decoded `data:<mime>;base64,<payload>` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        let rest = raw
            .strip_prefix("data:")
            .ok_or_else(|| anyhow!("not a data URL"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| anyhow!("data URL has no payload separator"))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| anyhow!("data URL is not base64 encoded"))?;
        let bytes = STANDARD
            .decode(payload.trim())
            .context("data URL payload is not valid base64")?;

        Ok(Self {
            mime: mime.to_ascii_lowercase(),
            bytes,
        })
    }

    pub fn encode(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}
