//! Request and response envelopes for the OpenApi invoke endpoint.
//!
//! # Design
//! The service exposes one URL for every business action and dispatches on
//! the `ActionName` field. `BizRequest` is that single wire object. Its
//! fields are private and each action has its own constructor, so only the
//! field subset an action documents is ever populated. Unset optional fields
//! are left out of the JSON entirely: the service treats "absent" and
//! "empty" differently.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};

/// Business action dispatched by the invoke endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    LoadBizObject,
    LoadBizObjects,
    CreateBizObject,
    CreateBizObjects,
    UpdateBizObject,
    RemoveBizObject,
}

/// The action-dispatch request envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BizRequest {
    action_name: Action,
    schema_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    biz_object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    biz_object_array: Option<Vec<String>>,
    #[serde(default)]
    is_submit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    biz_object_id: Option<String>,
}

impl BizRequest {
    fn bare(action_name: Action, schema_code: &str) -> Self {
        Self {
            action_name,
            schema_code: schema_code.to_string(),
            filter: None,
            biz_object: None,
            biz_object_array: None,
            is_submit: false,
            biz_object_id: None,
        }
    }

    pub fn load(schema_code: &str, biz_object_id: &str) -> Self {
        Self {
            biz_object_id: Some(biz_object_id.to_string()),
            ..Self::bare(Action::LoadBizObject, schema_code)
        }
    }

    /// `filter` is the JSON text produced by `Filter::to_json`.
    pub fn load_many(schema_code: &str, filter: &str) -> Self {
        Self {
            filter: Some(filter.to_string()),
            ..Self::bare(Action::LoadBizObjects, schema_code)
        }
    }

    pub fn create<T: Serialize + ?Sized>(schema_code: &str, is_submit: bool, biz_object: &T) -> ApiResult<Self> {
        Ok(Self {
            biz_object: Some(to_json_text(biz_object)?),
            is_submit,
            ..Self::bare(Action::CreateBizObject, schema_code)
        })
    }

    pub fn create_many<T: Serialize>(schema_code: &str, is_submit: bool, biz_objects: &[T]) -> ApiResult<Self> {
        let array = biz_objects.iter().map(to_json_text).collect::<ApiResult<Vec<_>>>()?;
        Ok(Self {
            biz_object_array: Some(array),
            is_submit,
            ..Self::bare(Action::CreateBizObjects, schema_code)
        })
    }

    pub fn update<T: Serialize + ?Sized>(schema_code: &str, biz_object_id: &str, biz_object: &T) -> ApiResult<Self> {
        Ok(Self {
            biz_object_id: Some(biz_object_id.to_string()),
            biz_object: Some(to_json_text(biz_object)?),
            ..Self::bare(Action::UpdateBizObject, schema_code)
        })
    }

    pub fn remove(schema_code: &str, biz_object_id: &str) -> Self {
        Self {
            biz_object_id: Some(biz_object_id.to_string()),
            ..Self::bare(Action::RemoveBizObject, schema_code)
        }
    }

    pub fn action(&self) -> Action {
        self.action_name
    }

    pub fn schema_code(&self) -> &str {
        &self.schema_code
    }

    pub fn biz_object_id(&self) -> Option<&str> {
        self.biz_object_id.as_deref()
    }

    pub fn is_submit(&self) -> bool {
        self.is_submit
    }
}

fn to_json_text<T: Serialize + ?Sized>(value: &T) -> ApiResult<String> {
    serde_json::to_string(value).map_err(|e| ApiError::Serialization(e.to_string()))
}

/// The response envelope shared by both endpoints.
///
/// Every field is optional on the wire. A business failure arrives as
/// `successful == false` with details in `error_message`; it is not an
/// `ApiError`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BizResponse {
    pub successful: bool,
    /// Either a plain string or a structured object, depending on the failure.
    pub error_message: Value,
    pub logined: bool,
    pub return_data: Option<Map<String, Value>>,
    pub data_type: i64,
}

impl BizResponse {
    /// Raw JSON of `ReturnData[key]`, re-serialized.
    ///
    /// `None` when there is no `ReturnData` or the key is missing.
    pub fn return_data(&self, key: &str) -> Option<Vec<u8>> {
        let value = self.return_data.as_ref()?.get(key)?;
        serde_json::to_vec(value).ok()
    }

    /// `ReturnData[key]` as a string-keyed map.
    ///
    /// A missing key (or an explicit `null`) yields an empty map. Fails with
    /// `ApiError::NoData` when the response has no `ReturnData`, and with
    /// `ApiError::Deserialization` when the value is not an object.
    pub fn return_data_map(&self, key: &str) -> ApiResult<Map<String, Value>> {
        let data = self.return_data.as_ref().ok_or(ApiError::NoData)?;
        match data.get(key) {
            None | Some(Value::Null) => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(other) => Err(ApiError::Deserialization(format!(
                "ReturnData[{key}] is not an object: {other}"
            ))),
        }
    }

    /// Decode `ReturnData[key]` into `T`. `Ok(None)` when the key is missing.
    pub fn return_data_as<T: DeserializeOwned>(&self, key: &str) -> ApiResult<Option<T>> {
        let data = self.return_data.as_ref().ok_or(ApiError::NoData)?;
        match data.get(key) {
            None => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|e| ApiError::Deserialization(format!("ReturnData[{key}]: {e}"))),
        }
    }

    /// `ErrorMessage` as text; structured messages are rendered as JSON.
    pub fn error_text(&self) -> Option<String> {
        match &self.error_message {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}
