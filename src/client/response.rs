//! Response body classification shared by the RPC and REST clients.
//!
//! Bitcoin Core answers JSON-RPC failures with non-200 statuses *and* a JSON
//! error document, so the status code alone cannot decide between a node
//! error and a protocol error. The body is inspected first.

use crate::client::error::{NodeError, NodeResult};
use serde::Deserialize;
use serde_json::Value;

const MAX_STATUS_BODY_CHARS: usize = 256;

/// Outcome of a single successful request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    /// Parsed document (or trimmed text scalar for non-JSON bodies).
    Parsed(Value),
    /// Body was drained without parsing.
    Discarded,
}

impl FetchResult {
    pub fn value(&self) -> Option<&Value> {
        match self {
            FetchResult::Parsed(value) => Some(value),
            FetchResult::Discarded => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            FetchResult::Parsed(value) => Some(value),
            FetchResult::Discarded => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: Option<i64>,
    message: Option<String>,
}

pub(crate) fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// Decodes a fully received body into the value the caller asked for.
pub(crate) fn decode_body(
    status: u16,
    reason: &str,
    is_json: bool,
    body: &[u8],
) -> NodeResult<Value> {
    if status != 200 {
        let error = is_json
            .then(|| serde_json::from_slice::<Value>(body).ok())
            .flatten()
            .and_then(|document| rpc_error(&document));
        return Err(error.unwrap_or_else(|| NodeError::Status {
            status,
            reason: reason.to_owned(),
            body: status_body(is_json, body),
        }));
    }

    let document = if is_json {
        serde_json::from_slice::<Value>(body)
            .map_err(|err| NodeError::malformed(format!("invalid JSON body: {err}")))?
    } else {
        Value::String(String::from_utf8_lossy(body).trim().to_owned())
    };

    if let Some(error) = rpc_error(&document) {
        return Err(error);
    }

    Ok(unwrap_envelope(document))
}

/// Leading text of a non-JSON error body, kept so callers can tell apart
/// responses that share a status code.
fn status_body(is_json: bool, body: &[u8]) -> String {
    if is_json {
        return String::new();
    }
    String::from_utf8_lossy(body)
        .trim()
        .chars()
        .take(MAX_STATUS_BODY_CHARS)
        .collect()
}

fn rpc_error(document: &Value) -> Option<NodeError> {
    let error = document.as_object()?.get("error")?;
    match error {
        Value::Null => None,
        Value::String(message) => Some(NodeError::Rpc {
            code: None,
            message: message.clone(),
        }),
        Value::Object(_) => {
            let parsed = RpcErrorObject::deserialize(error).ok();
            let code = parsed.as_ref().and_then(|object| object.code);
            let message = parsed
                .and_then(|object| object.message)
                .or_else(|| code.map(|code| code.to_string()))
                .unwrap_or_else(|| error.to_string());
            Some(NodeError::Rpc { code, message })
        }
        other => Some(NodeError::Rpc {
            code: None,
            message: other.to_string(),
        }),
    }
}

/// JSON-RPC envelopes resolve to their `result`, whether or not the node
/// echoes `id`; REST documents carry neither key and are returned whole.
fn unwrap_envelope(document: Value) -> Value {
    match document {
        Value::Object(mut object)
            if object.contains_key("result") || object.contains_key("error") =>
        {
            object.remove("result").unwrap_or(Value::Null)
        }
        other => other,
    }
}
