//! JSON reply envelope shared by the HTTP and WebSocket adapters.
//!
//! ```text
//! {"code":0,"data":{...},"tag":"UserService.Get"}
//! {"code":603,"msg":"user not found","tag":"UserService.Get"}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

pub const SUCCESS: i32 = 0;
pub const UNKNOWN: i32 = -1;
pub const READING_REQUEST_ERROR: i32 = 601;
pub const PARSING_REQUEST_ERROR: i32 = 602;
pub const EXECUTE_SERVICE_ERROR: i32 = 603;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ApiResponse {
    pub code: i32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
}

impl ApiResponse {
    pub fn success(data: serde_json::Value, tag: impl Into<String>) -> Self {
        Self {
            code: SUCCESS,
            // `null` results are omitted like any other empty field.
            data: Some(data).filter(|d| !d.is_null()),
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn failure(code: i32, msg: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS
    }

    /// Serialized form. Serializing a `Value` tree cannot fail, the fallback
    /// only guards against a broken custom serializer.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!(r#"{{"code":{}}}"#, UNKNOWN))
    }
}

impl fmt::Display for ApiResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_fields_are_omitted() {
        let ok = ApiResponse::success(json!({"id": 7}), "UserService.Get");
        assert_eq!(ok.to_json(), r#"{"code":0,"data":{"id":7},"tag":"UserService.Get"}"#);

        let unit = ApiResponse::success(serde_json::Value::Null, "");
        assert_eq!(unit.to_json(), r#"{"code":0}"#);

        let failed = ApiResponse::failure(EXECUTE_SERVICE_ERROR, "boom", "S.M");
        assert_eq!(failed.to_json(), r#"{"code":603,"msg":"boom","tag":"S.M"}"#);
        assert!(!failed.is_success());
    }

    #[test]
    fn test_parse_back() {
        let parsed: ApiResponse = serde_json::from_str(r#"{"code":601,"msg":"eof"}"#).unwrap();
        assert_eq!(parsed, ApiResponse::failure(READING_REQUEST_ERROR, "eof", ""));
    }
}
