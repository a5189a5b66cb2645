//! Operation facade for the OpenApi.
//!
//! # Design
//! `Client` holds immutable configuration and a `Transport`, and carries no
//! per-call state, so one instance can serve concurrent callers. Each
//! operation is split into a `build_*` step that produces an `HttpRequest`
//! without I/O, the transport round trip, and `parse_response`. The `build_*`
//! and `parse_response` methods are public for callers that execute the
//! round trip themselves.

use std::io::Read;

use serde::Serialize;
use tracing::debug;

use crate::config::{ClientConfig, Credentials, Endpoints};
use crate::error::{ApiError, ApiResult};
use crate::filter::Filter;
use crate::http::{multipart_file, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::types::{BizRequest, BizResponse};

/// Blocking client for the OpenApi invoke and upload endpoints.
#[derive(Debug, Clone)]
pub struct Client<T = UreqTransport> {
    config: ClientConfig,
    transport: T,
}

impl Client<UreqTransport> {
    /// Client for the vendor endpoints using the default transport.
    pub fn new(engine_code: &str, engine_secret: &str) -> Self {
        Self::with_config(ClientConfig::new(Credentials::new(engine_code, engine_secret)))
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self::with_transport(config, UreqTransport::new())
    }

    /// Client configured from `H3YUN_*` environment variables.
    pub fn from_env() -> ApiResult<Self> {
        ClientConfig::from_env().map(Self::with_config)
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.config.credentials
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.config.endpoints
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Load a single business object. Use `load_biz_objects` rather than
    /// calling this in a loop.
    pub fn load_biz_object(&self, schema_code: &str, biz_object_id: &str) -> ApiResult<BizResponse> {
        self.invoke(&BizRequest::load(schema_code, biz_object_id))
    }

    /// Load business objects matching `filter`, the JSON text of a `Filter`.
    pub fn load_biz_objects(&self, schema_code: &str, filter: &str) -> ApiResult<BizResponse> {
        self.invoke(&BizRequest::load_many(schema_code, filter))
    }

    pub fn load_biz_objects_with(&self, schema_code: &str, filter: &Filter) -> ApiResult<BizResponse> {
        self.load_biz_objects(schema_code, &filter.to_json()?)
    }

    /// Create one business object. `is_submit = false` creates a draft.
    pub fn create_biz_object<B: Serialize + ?Sized>(
        &self,
        schema_code: &str,
        is_submit: bool,
        biz_object: &B,
    ) -> ApiResult<BizResponse> {
        self.invoke(&BizRequest::create(schema_code, is_submit, biz_object)?)
    }

    pub fn create_biz_objects<B: Serialize>(
        &self,
        schema_code: &str,
        is_submit: bool,
        biz_objects: &[B],
    ) -> ApiResult<BizResponse> {
        self.invoke(&BizRequest::create_many(schema_code, is_submit, biz_objects)?)
    }

    pub fn update_biz_object<B: Serialize + ?Sized>(
        &self,
        schema_code: &str,
        biz_object_id: &str,
        biz_object: &B,
    ) -> ApiResult<BizResponse> {
        self.invoke(&BizRequest::update(schema_code, biz_object_id, biz_object)?)
    }

    pub fn remove_biz_object(&self, schema_code: &str, biz_object_id: &str) -> ApiResult<BizResponse> {
        self.invoke(&BizRequest::remove(schema_code, biz_object_id))
    }

    /// Upload `reader`'s contents as an attachment on field
    /// `file_property_name` of an existing object.
    ///
    /// The reader is only borrowed; closing it stays with the caller. A
    /// failed HTTP round trip is returned as `ApiError::Transport`.
    pub fn upload_attachment<R: Read + ?Sized>(
        &self,
        schema_code: &str,
        file_property_name: &str,
        biz_object_id: &str,
        file_name: &str,
        reader: &mut R,
    ) -> ApiResult<BizResponse> {
        let request = self.build_upload(schema_code, file_property_name, biz_object_id, file_name, reader)?;
        debug!(schema_code, file_property_name, biz_object_id, file_name, "uploading attachment");
        let response = self.transport.execute(&request)?;
        self.parse_response(response)
    }

    /// Send a caller-built body to the invoke endpoint unchanged.
    pub fn custom_api<B: Serialize + ?Sized>(&self, body: &B) -> ApiResult<BizResponse> {
        let request = self.build_invoke(body)?;
        debug!(url = %request.url, "invoking custom action");
        let response = self.transport.execute(&request)?;
        self.parse_response(response)
    }

    fn invoke(&self, request: &BizRequest) -> ApiResult<BizResponse> {
        let http_request = self.build_invoke(request)?;
        debug!(
            action = ?request.action(),
            schema_code = request.schema_code(),
            url = %http_request.url,
            "invoking action"
        );
        let response = self.transport.execute(&http_request)?;
        self.parse_response(response)
    }

    // -----------------------------------------------------------------------
    // Build / parse
    // -----------------------------------------------------------------------

    /// JSON POST of `body` to the invoke endpoint.
    pub fn build_invoke<B: Serialize + ?Sized>(&self, body: &B) -> ApiResult<HttpRequest> {
        let body = serde_json::to_vec(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut headers = self.config.credentials.headers().to_vec();
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        Ok(HttpRequest {
            url: self.config.endpoints.invoke_url.clone(),
            headers,
            body,
        })
    }

    /// Multipart POST to the upload endpoint with the target encoded in the
    /// query string.
    pub fn build_upload<R: Read + ?Sized>(
        &self,
        schema_code: &str,
        file_property_name: &str,
        biz_object_id: &str,
        file_name: &str,
        reader: &mut R,
    ) -> ApiResult<HttpRequest> {
        let multipart = multipart_file("file", file_name, reader)?;
        let url = format!(
            "{}?SchemaCode={}&FilePropertyName={}&BizObjectId={}",
            self.config.endpoints.upload_url,
            urlencoding::encode(schema_code),
            urlencoding::encode(file_property_name),
            urlencoding::encode(biz_object_id),
        );
        let mut headers = self.config.credentials.headers().to_vec();
        headers.push(("Content-Type".to_string(), multipart.content_type));
        Ok(HttpRequest {
            url,
            headers,
            body: multipart.bytes,
        })
    }

    /// Decode a response body into the envelope.
    ///
    /// The HTTP status is not inspected: the service reports failures inside
    /// the envelope, and a body that does not decode is an error whatever the
    /// status.
    pub fn parse_response(&self, response: HttpResponse) -> ApiResult<BizResponse> {
        let decoded: BizResponse = serde_json::from_str(&response.body).map_err(|e| {
            ApiError::Deserialization(format!("HTTP {} body is not a response envelope: {e}", response.status))
        })?;
        debug!(
            status = response.status,
            successful = decoded.successful,
            logined = decoded.logined,
            "decoded response"
        );
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::{json, Value};

    use super::*;
    use crate::filter::MatchOperator;

    fn config() -> ClientConfig {
        ClientConfig::new(Credentials::new("CODE", "SECRET")).with_endpoints(Endpoints::with_base_url("http://h3.test"))
    }

    fn ok_body() -> String {
        r#"{"Successful":true,"ErrorMessage":null,"Logined":true,"ReturnData":{},"DataType":0}"#.to_string()
    }

    /// Client whose transport records every request and answers with `body`.
    fn recording_client(
        body: String,
    ) -> (Client<impl Fn(&HttpRequest) -> ApiResult<HttpResponse>>, std::sync::Arc<Mutex<Vec<HttpRequest>>>) {
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let transport = move |req: &HttpRequest| -> ApiResult<HttpResponse> {
            log.lock().unwrap().push(req.clone());
            Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: body.clone(),
            })
        };
        (Client::with_transport(config(), transport), seen)
    }

    fn sent_json(seen: &Mutex<Vec<HttpRequest>>) -> Value {
        let requests = seen.lock().unwrap();
        assert_eq!(requests.len(), 1);
        serde_json::from_slice(&requests[0].body).unwrap()
    }

    #[test]
    fn build_invoke_sets_credential_headers() {
        let client = Client::with_transport(config(), |_: &HttpRequest| -> ApiResult<HttpResponse> {
            unreachable!("build does no I/O")
        });
        let req = client.build_invoke(&BizRequest::remove("S1", "O1")).unwrap();
        assert_eq!(req.url, "http://h3.test/OpenApi/Invoke");
        assert_eq!(req.header("EngineCode"), Some("CODE"));
        assert_eq!(req.header("EngineSecret"), Some("SECRET"));
        assert_eq!(req.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn load_biz_object_sends_exact_envelope() {
        let (client, seen) = recording_client(ok_body());
        let resp = client.load_biz_object("S1", "O1").unwrap();
        assert!(resp.successful);
        let requests = seen.lock().unwrap();
        assert_eq!(
            String::from_utf8(requests[0].body.clone()).unwrap(),
            r#"{"ActionName":"LoadBizObject","SchemaCode":"S1","IsSubmit":false,"BizObjectId":"O1"}"#
        );
    }

    #[test]
    fn load_biz_objects_with_filter_sends_filter_text() {
        let (client, seen) = recording_client(ok_body());
        let filter = Filter::new().rows(0, 9).matching("Status", MatchOperator::Equal, 1);
        client.load_biz_objects_with("S1", &filter).unwrap();

        let body = sent_json(&seen);
        assert_eq!(body["ActionName"], "LoadBizObjects");
        let sent_filter: Filter = serde_json::from_str(body["Filter"].as_str().unwrap()).unwrap();
        assert_eq!(sent_filter, filter);
        assert!(body.get("BizObjectId").is_none());
    }

    #[test]
    fn create_biz_object_serializes_object_and_submit_flag() {
        let (client, seen) = recording_client(ok_body());
        let object = json!({"F0000001": "test", "name": "test"});
        client.create_biz_object("S1", false, &object).unwrap();

        let body = sent_json(&seen);
        assert_eq!(body["ActionName"], "CreateBizObject");
        assert_eq!(body["IsSubmit"], false);
        assert_eq!(body["BizObject"], serde_json::to_string(&object).unwrap());
    }

    #[test]
    fn create_biz_objects_sends_one_entry_per_object() {
        let (client, seen) = recording_client(ok_body());
        client
            .create_biz_objects("S1", true, &[json!({"n": 1}), json!({"n": 2})])
            .unwrap();

        let body = sent_json(&seen);
        assert_eq!(body["ActionName"], "CreateBizObjects");
        assert_eq!(body["IsSubmit"], true);
        assert_eq!(body["BizObjectArray"], json!([r#"{"n":1}"#, r#"{"n":2}"#]));
    }

    #[test]
    fn update_and_remove_carry_object_id() {
        let (client, seen) = recording_client(ok_body());
        client.update_biz_object("S1", "O1", &json!({"F1": "x"})).unwrap();
        let body = sent_json(&seen);
        assert_eq!(body["ActionName"], "UpdateBizObject");
        assert_eq!(body["BizObjectId"], "O1");

        let (client, seen) = recording_client(ok_body());
        client.remove_biz_object("S1", "O1").unwrap();
        let body = sent_json(&seen);
        assert_eq!(body["ActionName"], "RemoveBizObject");
        assert!(body.get("BizObject").is_none());
    }

    #[test]
    fn custom_api_passes_body_through() {
        let (client, seen) = recording_client(ok_body());
        let body = json!({"ActionName": "FenQiDaikuan", "Controller": "ApiController", "AppCode": "D1"});
        client.custom_api(&body).unwrap();
        assert_eq!(sent_json(&seen), body);
    }

    #[test]
    fn upload_targets_upload_endpoint_with_encoded_query() {
        let (client, seen) = recording_client(ok_body());
        let mut file: &[u8] = b"attachment";
        client
            .upload_attachment("S 1", "F0000011", "a&b", "demo.png", &mut file)
            .unwrap();

        let requests = seen.lock().unwrap();
        let req = &requests[0];
        assert_eq!(
            req.url,
            "http://h3.test/OpenApi/UploadAttachment?SchemaCode=S%201&FilePropertyName=F0000011&BizObjectId=a%26b"
        );
        assert_eq!(req.header("EngineCode"), Some("CODE"));
        assert!(req
            .header("Content-Type")
            .unwrap()
            .starts_with("multipart/form-data; boundary="));
    }

    #[test]
    fn business_failure_is_not_an_error() {
        let (client, _) = recording_client(r#"{"Successful":false,"ErrorMessage":"not found"}"#.to_string());
        let resp = client.load_biz_object("S1", "missing").unwrap();
        assert!(!resp.successful);
        assert_eq!(resp.error_text().as_deref(), Some("not found"));
    }

    #[test]
    fn undecodable_body_is_an_error() {
        let (client, _) = recording_client("<html>gateway timeout</html>".to_string());
        let err = client.remove_biz_object("S1", "O1").unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(msg) if msg.contains("HTTP 200")));
    }

    #[test]
    fn transport_failure_propagates_from_upload() {
        let client = Client::with_transport(config(), |_: &HttpRequest| -> ApiResult<HttpResponse> {
            Err(ApiError::Transport("connection refused".to_string()))
        });
        let mut file: &[u8] = b"x";
        let err = client
            .upload_attachment("S1", "F1", "O1", "x.txt", &mut file)
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn attachment_read_failure_is_reported() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk gone"))
            }
        }
        let (client, seen) = recording_client(ok_body());
        let err = client
            .upload_attachment("S1", "F1", "O1", "x.txt", &mut Broken)
            .unwrap_err();
        assert!(matches!(err, ApiError::Attachment(_)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn parse_response_ignores_status() {
        let (client, _) = recording_client(ok_body());
        let resp = client
            .parse_response(HttpResponse {
                status: 500,
                headers: Vec::new(),
                body: r#"{"Successful":false,"ErrorMessage":{"Code":500}}"#.to_string(),
            })
            .unwrap();
        assert!(!resp.successful);
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn default_client_is_send_and_sync() {
        assert_send_sync::<Client>();
    }

    #[test]
    fn one_client_serves_concurrent_calls() {
        let (client, seen) = recording_client(ok_body());
        std::thread::scope(|scope| {
            for i in 0..4 {
                let client = &client;
                scope.spawn(move || {
                    let resp = client.load_biz_object("S1", &format!("O{i}")).unwrap();
                    assert!(resp.successful);
                });
            }
        });
        assert_eq!(seen.lock().unwrap().len(), 4);
    }
}
