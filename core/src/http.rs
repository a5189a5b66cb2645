//! HTTP transport: plain-data requests and responses plus the executor seam.
//!
//! # Design
//! The client builds `HttpRequest` values and parses `HttpResponse` values
//! without touching the network. Executing the round trip is the job of a
//! `Transport`. `UreqTransport` is the blocking default; tests plug in a
//! closure instead, so no process-wide client or fake is ever needed.
//!
//! Every OpenApi call is a POST, so the request carries no method.

use std::fmt;
use std::io::Read;

use tracing::trace;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// An HTTP POST described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Executes one `HttpRequest`.
///
/// Implementations must return non-2xx responses as data; only failures to
/// complete the round trip are errors.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> ApiResult<HttpResponse>;
}

impl<F> Transport for F
where
    F: Fn(&HttpRequest) -> ApiResult<HttpResponse>,
{
    fn execute(&self, request: &HttpRequest) -> ApiResult<HttpResponse> {
        self(request)
    }
}

/// Blocking transport backed by a `ureq` agent.
///
/// No timeout is configured; callers needing a deadline supply their own
/// agent through `UreqTransport::with_agent`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    /// Use a preconfigured agent. It should have `http_status_as_error`
    /// disabled so that error statuses still reach the envelope decoder.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> ApiResult<HttpResponse> {
        let mut builder = self.agent.post(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = builder
            .send(request.body.as_slice())
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        // Large result pages exceed ureq's default 10 MiB cap.
        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        trace!(status, %body, "response body");

        Ok(HttpResponse { status, headers, body })
    }
}

/// A `multipart/form-data` body with a single file part.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Encode `reader`'s full contents as one form part named `field`.
pub fn multipart_file<R: Read + ?Sized>(field: &str, file_name: &str, reader: &mut R) -> ApiResult<MultipartBody> {
    let boundary = format!("chuanyun-{}", Uuid::new_v4().simple());

    let mut bytes = Vec::new();
    bytes.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            escape_quotes(field),
            escape_quotes(file_name),
        )
        .as_bytes(),
    );
    reader.read_to_end(&mut bytes)?;
    bytes.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Ok(MultipartBody {
        content_type: format!("multipart/form-data; boundary={boundary}"),
        bytes,
    })
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
