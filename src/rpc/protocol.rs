use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One remote operation invocation, serialized as a single JSON line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub token: String,
    pub method: String,
    #[serde(default = "empty_params", deserialize_with = "params_or_empty")]
    pub params: Value,
}

/// Reply to exactly the most recently sent request on the same connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn empty_params() -> Value {
    Value::Object(Map::new())
}

fn params_or_empty<'de, D>(deserializer: D) -> std::result::Result<Value, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(if value.is_null() { empty_params() } else { value })
}

impl RequestEnvelope {
    pub fn new(token: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        let params = if params.is_null() {
            empty_params()
        } else {
            params
        };
        Self {
            token: token.into(),
            method: method.into(),
            params,
        }
    }

    /// Single-line JSON form, without the trailing newline.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|err| GraphError::Protocol(format!("encode request: {err}")))
    }
}

impl ResponseEnvelope {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(message.into()),
        }
    }

    pub fn decode(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim_end_matches(['\r', '\n']))
            .map_err(|err| GraphError::Protocol(format!("{err}: {}", preview(line))))
    }

    /// `result` on success (missing result reads as null), `Remote` otherwise.
    pub fn into_result(self) -> Result<Value> {
        if self.ok {
            Ok(self.result.unwrap_or(Value::Null))
        } else {
            Err(GraphError::Remote(self.error.unwrap_or_else(|| {
                "graph RPC request failed without an error message".to_string()
            })))
        }
    }
}

fn preview(line: &str) -> String {
    const MAX: usize = 120;
    let trimmed = line.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        format!("{}...", crate::util::truncate_str_bytes(trimmed, MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_is_one_line_with_object_params() {
        let request = RequestEnvelope::new("t", "file_tree", Value::Null);
        let line = request.encode().unwrap();
        assert!(!line.contains('\n'));
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(
            parsed,
            json!({"token": "t", "method": "file_tree", "params": {}})
        );
    }

    #[test]
    fn request_without_params_decodes_to_empty_object() {
        let request: RequestEnvelope =
            serde_json::from_str(r#"{"token":"t","method":"stats"}"#).unwrap();
        assert_eq!(request.params, json!({}));
        let request: RequestEnvelope =
            serde_json::from_str(r#"{"token":"t","method":"stats","params":null}"#).unwrap();
        assert_eq!(request.params, json!({}));
    }

    #[test]
    fn success_round_trips_result_unchanged() {
        let result = json!([["function_a", 1.5], ["class_b", 0.25]]);
        let line = serde_json::to_string(&ResponseEnvelope::success(result.clone())).unwrap();
        let decoded = ResponseEnvelope::decode(&line).unwrap();
        assert_eq!(decoded.into_result().unwrap(), result);
    }

    #[test]
    fn failure_omits_result_and_carries_message() {
        let line = serde_json::to_string(&ResponseEnvelope::failure("boom")).unwrap();
        assert_eq!(line, r#"{"ok":false,"error":"boom"}"#);
        match ResponseEnvelope::decode(&line).unwrap().into_result() {
            Err(GraphError::Remote(message)) => assert_eq!(message, "boom"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn null_result_is_allowed() {
        let decoded = ResponseEnvelope::decode(r#"{"ok":true,"result":null}"#).unwrap();
        assert_eq!(decoded.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn garbage_is_a_protocol_error() {
        assert!(matches!(
            ResponseEnvelope::decode("not json"),
            Err(GraphError::Protocol(_))
        ));
        assert!(matches!(
            ResponseEnvelope::decode(r#"{"result":1}"#),
            Err(GraphError::Protocol(_))
        ));
    }
}
