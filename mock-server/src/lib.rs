//! In-memory stand-in for the OpenApi invoke and upload endpoints.
//!
//! Like the real service, every reply is HTTP 200 carrying the response
//! envelope; failures are reported through `Successful=false`.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Multipart, Query, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const INVOKE_PATH: &str = "/OpenApi/Invoke";
pub const UPLOAD_PATH: &str = "/OpenApi/UploadAttachment";

/// Stored objects per schema code, in insertion order.
pub type Db = Arc<RwLock<HashMap<String, Vec<Map<String, Value>>>>>;

#[derive(Clone)]
struct AppState {
    db: Db,
    engine_code: Arc<str>,
    engine_secret: Arc<str>,
}

/// Response envelope.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Envelope {
    pub successful: bool,
    pub error_message: Value,
    pub logined: bool,
    pub return_data: Option<Map<String, Value>>,
    pub data_type: i64,
}

impl Envelope {
    fn ok(return_data: Value) -> Self {
        Self {
            successful: true,
            logined: true,
            return_data: match return_data {
                Value::Object(map) => Some(map),
                _ => Some(Map::new()),
            },
            ..Self::default()
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            error_message: Value::String(message.into()),
            logined: true,
            ..Self::default()
        }
    }

    fn unauthorized() -> Self {
        Self {
            error_message: Value::String("EngineCode or EngineSecret is invalid".to_string()),
            ..Self::default()
        }
    }
}

/// Invoke request envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvokeRequest {
    pub action_name: String,
    #[serde(default)]
    pub schema_code: String,
    pub filter: Option<String>,
    pub biz_object: Option<String>,
    pub biz_object_array: Option<Vec<String>>,
    #[serde(default)]
    pub is_submit: bool,
    pub biz_object_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FilterDoc {
    pub from_row_num: usize,
    pub to_row_num: usize,
    pub require_count: bool,
    pub return_items: Vec<String>,
    pub matcher: MatcherDoc,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MatcherDoc {
    #[serde(rename = "Type")]
    pub kind: String,
    pub matchers: Vec<MatcherItemDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MatcherItemDoc {
    pub name: String,
    pub operator: u8,
    #[serde(default)]
    pub value: String,
}

pub fn app(engine_code: &str, engine_secret: &str) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(HashMap::new())),
        engine_code: Arc::from(engine_code),
        engine_secret: Arc::from(engine_secret),
    };
    Router::new()
        .route(INVOKE_PATH, post(invoke))
        .route(UPLOAD_PATH, post(upload_attachment))
        .with_state(state)
}

pub async fn run(listener: TcpListener, engine_code: &str, engine_secret: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app(engine_code, engine_secret)).await
}

fn authorized(state: &AppState, headers: &HeaderMap) -> bool {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    header("EngineCode") == Some(&*state.engine_code) && header("EngineSecret") == Some(&*state.engine_secret)
}

async fn invoke(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Json<Envelope> {
    if !authorized(&state, &headers) {
        return Json(Envelope::unauthorized());
    }
    let request: InvokeRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return Json(Envelope::fail(format!("invalid request body: {e}"))),
    };
    debug!(action = %request.action_name, schema = %request.schema_code, "invoke");

    let mut db = state.db.write().await;
    // Only creates add a schema to the store.
    let envelope = match request.action_name.as_str() {
        "CreateBizObject" => create_one(db.entry(request.schema_code.clone()).or_default(), &request),
        "CreateBizObjects" => create_many(db.entry(request.schema_code.clone()).or_default(), &request),
        action => {
            let mut empty = Vec::new();
            let rows = db.get_mut(&request.schema_code).unwrap_or(&mut empty);
            match action {
                "LoadBizObject" => load_one(rows, &request),
                "LoadBizObjects" => load_many(rows, &request),
                "UpdateBizObject" => update(rows, &request),
                "RemoveBizObject" => remove(rows, &request),
                other => Envelope::fail(format!("unknown ActionName {other}")),
            }
        }
    };
    Json(envelope)
}

fn position(rows: &[Map<String, Value>], id: Option<&str>) -> Option<usize> {
    let id = id?;
    rows.iter().position(|row| row.get("ObjectId").and_then(Value::as_str) == Some(id))
}

fn load_one(rows: &[Map<String, Value>], request: &InvokeRequest) -> Envelope {
    match position(rows, request.biz_object_id.as_deref()) {
        Some(i) => Envelope::ok(json!({ "BizObject": rows[i] })),
        None => Envelope::fail("BizObject not found"),
    }
}

fn load_many(rows: &[Map<String, Value>], request: &InvokeRequest) -> Envelope {
    let filter: FilterDoc = match request.filter.as_deref().map(serde_json::from_str::<FilterDoc>).transpose() {
        Ok(filter) => filter.unwrap_or_default(),
        Err(e) => return Envelope::fail(format!("invalid Filter: {e}")),
    };

    let matched: Vec<&Map<String, Value>> = rows.iter().filter(|row| filter.matcher.accepts(row)).collect();
    let page: Vec<Value> = matched
        .iter()
        .enumerate()
        .filter(|(i, _)| *i >= filter.from_row_num && *i <= filter.to_row_num)
        .map(|(_, row)| Value::Object(project(row, &filter.return_items)))
        .collect();

    let mut data = json!({ "BizObjectArray": page });
    if filter.require_count {
        data["TotalCount"] = json!(matched.len());
    }
    Envelope::ok(data)
}

fn project(row: &Map<String, Value>, items: &[String]) -> Map<String, Value> {
    if items.is_empty() {
        return row.clone();
    }
    row.iter()
        .filter(|(k, _)| items.iter().any(|item| item == *k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl MatcherDoc {
    fn accepts(&self, row: &Map<String, Value>) -> bool {
        if self.kind == "Or" && !self.matchers.is_empty() {
            self.matchers.iter().any(|m| m.accepts(row))
        } else {
            self.matchers.iter().all(|m| m.accepts(row))
        }
    }
}

impl MatcherItemDoc {
    fn accepts(&self, row: &Map<String, Value>) -> bool {
        let field = row.get(&self.name).map(text).unwrap_or_default();
        let ord = compare(&field, &self.value);
        // Range operators take a `;`-separated list of accepted values.
        let in_list = || self.value.split(';').any(|v| v == field);
        match self.operator {
            0 => ord == Ordering::Greater,
            1 => ord != Ordering::Less,
            2 => field == self.value,
            3 => ord != Ordering::Greater,
            4 => ord == Ordering::Less,
            5 => field != self.value,
            6 => in_list(),
            7 => !in_list(),
            8 => field.contains(&self.value),
            _ => false,
        }
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn compare(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

fn insert(rows: &mut Vec<Map<String, Value>>, raw: &str, is_submit: bool) -> Result<String, String> {
    let mut object: Map<String, Value> =
        serde_json::from_str(raw).map_err(|e| format!("BizObject is not a JSON object: {e}"))?;
    let id = Uuid::new_v4().to_string();
    object.insert("ObjectId".to_string(), json!(id));
    object.insert("Status".to_string(), json!(if is_submit { 1 } else { 0 }));
    rows.push(object);
    Ok(id)
}

fn create_one(rows: &mut Vec<Map<String, Value>>, request: &InvokeRequest) -> Envelope {
    let Some(raw) = request.biz_object.as_deref() else {
        return Envelope::fail("BizObject is required");
    };
    match insert(rows, raw, request.is_submit) {
        Ok(id) => Envelope::ok(json!({ "BizObjectId": id })),
        Err(e) => Envelope::fail(e),
    }
}

fn create_many(rows: &mut Vec<Map<String, Value>>, request: &InvokeRequest) -> Envelope {
    let Some(array) = request.biz_object_array.as_deref() else {
        return Envelope::fail("BizObjectArray is required");
    };
    let mut ids = Vec::with_capacity(array.len());
    for raw in array {
        match insert(rows, raw, request.is_submit) {
            Ok(id) => ids.push(id),
            Err(e) => return Envelope::fail(e),
        }
    }
    Envelope::ok(json!({ "BizObjectIdArray": ids }))
}

fn update(rows: &mut [Map<String, Value>], request: &InvokeRequest) -> Envelope {
    let Some(i) = position(rows, request.biz_object_id.as_deref()) else {
        return Envelope::fail("BizObject not found");
    };
    let changes: Map<String, Value> = match request.biz_object.as_deref().map(serde_json::from_str::<Map<String, Value>>) {
        Some(Ok(changes)) => changes,
        Some(Err(e)) => return Envelope::fail(format!("BizObject is not a JSON object: {e}")),
        None => return Envelope::fail("BizObject is required"),
    };
    for (k, v) in changes {
        if k != "ObjectId" {
            rows[i].insert(k, v);
        }
    }
    Envelope::ok(json!({}))
}

fn remove(rows: &mut Vec<Map<String, Value>>, request: &InvokeRequest) -> Envelope {
    match position(rows, request.biz_object_id.as_deref()) {
        Some(i) => {
            rows.remove(i);
            Envelope::ok(json!({}))
        }
        None => Envelope::fail("BizObject not found"),
    }
}

async fn upload_attachment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Json<Envelope> {
    if !authorized(&state, &headers) {
        return Json(Envelope::unauthorized());
    }
    let param = |name: &str| params.get(name).cloned().unwrap_or_default();
    let (schema_code, property, object_id) = (param("SchemaCode"), param("FilePropertyName"), param("BizObjectId"));

    let mut file = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                let file_name = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => file = Some((file_name, bytes.len())),
                    Err(e) => return Json(Envelope::fail(format!("failed to read file part: {e}"))),
                }
            }
            Ok(None) => break,
            Err(e) => return Json(Envelope::fail(format!("malformed multipart body: {e}"))),
        }
    }
    let Some((file_name, size)) = file else {
        return Json(Envelope::fail("multipart body has no file part"));
    };

    let mut db = state.db.write().await;
    let Some(rows) = db.get_mut(&schema_code) else {
        return Json(Envelope::fail("BizObject not found"));
    };
    let Some(i) = position(rows, Some(&object_id)) else {
        return Json(Envelope::fail("BizObject not found"));
    };

    let attachment_id = Uuid::new_v4().to_string();
    let entry = json!({ "AttachmentId": attachment_id, "FileName": file_name, "Size": size });
    match rows[i].get_mut(&property) {
        Some(Value::Array(list)) => list.push(entry),
        _ => {
            rows[i].insert(property.clone(), json!([entry]));
        }
    }
    info!(%object_id, %property, %file_name, size, "attachment stored");
    Json(Envelope::ok(json!({ "AttachmentId": attachment_id })))
}
