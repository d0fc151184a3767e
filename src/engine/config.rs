//! # Engine Configuration
//!
//! Settings that shape how the engine reads requests and runs handlers.
//!
//! Configuration can come from a YAML file, from environment variables, or
//! both (file first, then [`EngineConfig::apply_env`] to let the environment
//! override individual fields).
//!
//! ## Environment Variables
//!
//! | Variable | Field | Example |
//! |---|---|---|
//! | `BRRT_APP_NAME` | `app_name` | `orders` |
//! | `BRRT_STREAM_REQUEST_BODY` | `stream_request_body` | `true` |
//! | `BRRT_BODY_LIMIT` | `body_limit` | `1048576` |
//! | `BRRT_REQUEST_ID_HEADER` | `request_id_header` | `X-Correlation-ID` |
//! | `BRRT_STACK_SIZE` | `stack_size` | `0x8000` or `32768` |
//!
//! ## Streaming bodies
//!
//! With `stream_request_body` off (the default) the engine reads the whole
//! body before dispatch and answers `413` when it exceeds `body_limit`. With it
//! on, handlers receive the live connection stream and `body_limit` is not
//! applied; the handler decides how much to read.
//!
//! ```yaml
//! app_name: orders
//! stream_request_body: true
//! stack_size: 0x8000
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::env;
use std::path::Path;

/// Default maximum buffered request body (4 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Default coroutine stack size (16 KB).
pub const DEFAULT_STACK_SIZE: usize = 0x4000;

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name reported in logs
    pub app_name: String,
    /// Hand the live body stream to handlers instead of buffering it
    pub stream_request_body: bool,
    /// Largest body accepted when buffering, in bytes
    pub body_limit: usize,
    /// Header used by the request id middleware
    pub request_id_header: String,
    /// Stack size for handler coroutines in bytes
    #[serde(deserialize_with = "deserialize_size")]
    pub stack_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_name: "brrtbridge".to_string(),
            stream_request_body: false,
            body_limit: DEFAULT_BODY_LIMIT,
            request_id_header: "X-Request-ID".to_string(),
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by any `BRRT_*` variables that are set.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("invalid engine configuration")
    }

    /// Load a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Override fields from `BRRT_*` environment variables. Unparseable values
    /// are ignored and the current value is kept.
    pub fn apply_env(&mut self) {
        if let Ok(name) = env::var("BRRT_APP_NAME") {
            self.app_name = name;
        }
        if let Some(stream) = env::var("BRRT_STREAM_REQUEST_BODY")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.stream_request_body = stream;
        }
        if let Some(limit) = env::var("BRRT_BODY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.body_limit = limit;
        }
        if let Ok(header) = env::var("BRRT_REQUEST_ID_HEADER") {
            self.request_id_header = header;
        }
        if let Some(size) = env::var("BRRT_STACK_SIZE")
            .ok()
            .and_then(|v| parse_size(&v))
        {
            self.stack_size = size;
        }
    }
}

/// Parse `0x`-prefixed hexadecimal or plain decimal.
pub fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

fn deserialize_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(usize),
        Text(String),
    }

    match Size::deserialize(deserializer)? {
        Size::Number(n) => Ok(n),
        Size::Text(s) => parse_size(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid size '{s}'"))),
    }
}
