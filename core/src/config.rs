//! Client configuration: credentials and endpoint URLs.
//!
//! Reads from the environment with `ClientConfig::from_env`:
//!
//! - `H3YUN_ENGINE_CODE` (required)
//! - `H3YUN_ENGINE_SECRET` (required)
//! - `H3YUN_BASE_URL` (optional, defaults to `https://www.h3yun.com`)

use std::env;
use std::fmt;

use crate::error::{ApiError, ApiResult};

pub const DEFAULT_BASE_URL: &str = "https://www.h3yun.com";

const INVOKE_PATH: &str = "/OpenApi/Invoke";
const UPLOAD_PATH: &str = "/OpenApi/UploadAttachment";

/// The engine code / engine secret pair identifying the calling application.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    engine_code: String,
    engine_secret: String,
}

impl Credentials {
    pub fn new(engine_code: impl Into<String>, engine_secret: impl Into<String>) -> Self {
        Self {
            engine_code: engine_code.into(),
            engine_secret: engine_secret.into(),
        }
    }

    pub fn engine_code(&self) -> &str {
        &self.engine_code
    }

    pub fn engine_secret(&self) -> &str {
        &self.engine_secret
    }

    /// The two headers attached to every request.
    pub(crate) fn headers(&self) -> [(String, String); 2] {
        [
            ("EngineCode".to_string(), self.engine_code.clone()),
            ("EngineSecret".to_string(), self.engine_secret.clone()),
        ]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("engine_code", &self.engine_code)
            .field("engine_secret", &"<redacted>")
            .finish()
    }
}

/// URLs of the action-dispatch and attachment-upload endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub invoke_url: String,
    pub upload_url: String,
}

impl Endpoints {
    /// Derive both endpoint URLs from a deployment base URL.
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            invoke_url: format!("{base}{INVOKE_PATH}"),
            upload_url: format!("{base}{UPLOAD_PATH}"),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }
}

/// Everything a `Client` needs besides its transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub credentials: Credentials,
    pub endpoints: Endpoints,
}

impl ClientConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            endpoints: Endpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ApiResult<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ApiError::Config(format!("{key} is not set")))
        };
        let credentials = Credentials::new(required("H3YUN_ENGINE_CODE")?, required("H3YUN_ENGINE_SECRET")?);
        let endpoints = match lookup("H3YUN_BASE_URL") {
            Some(base) if !base.is_empty() => Endpoints::with_base_url(&base),
            _ => Endpoints::default(),
        };
        Ok(Self { credentials, endpoints })
    }
}
