//! Synchronous client for the H3 (chuanyun) low-code platform OpenApi.
//!
//! # Overview
//! Every business action goes to one invoke URL as a JSON envelope whose
//! `ActionName` selects the operation; attachments go to a separate upload
//! URL as multipart. Both requests carry the `EngineCode` and `EngineSecret`
//! headers. Responses share one envelope (`BizResponse`).
//!
//! ```no_run
//! use chuanyun_core::{Client, Filter, MatchOperator};
//!
//! # fn main() -> Result<(), chuanyun_core::ApiError> {
//! let client = Client::new("ENGINE_CODE", "ENGINE_SECRET");
//! let filter = Filter::new().rows(0, 49).matching("Status", MatchOperator::Equal, 1);
//! let resp = client.load_biz_objects_with("D000024chuangjian", &filter)?;
//! if !resp.successful {
//!     eprintln!("service refused: {:?}", resp.error_text());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - `Client` holds only configuration and a `Transport`; there is no shared
//!   mutable state between calls.
//! - Each operation is split into `build_*` (produces an `HttpRequest`) and
//!   `parse_response` (consumes an `HttpResponse`), so the I/O boundary is
//!   explicit and the default `UreqTransport` can be swapped for a closure.
//! - Business failures (`Successful=false`) are data, not errors.

pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod http;
pub mod types;

pub use client::Client;
pub use config::{ClientConfig, Credentials, Endpoints};
pub use error::{ApiError, ApiResult};
pub use filter::{Filter, MatchOperator, Matcher, MatcherItem, MatcherType};
pub use http::{HttpRequest, HttpResponse, Transport, UreqTransport};
pub use types::{Action, BizRequest, BizResponse};
