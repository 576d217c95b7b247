//! Typed failures surfaced by node clients. Every variant is fatal to a
//! benchmark run except an out-of-range height, which the chain watcher
//! treats as "not produced yet".

use std::fmt;

/// JSON-RPC error code Bitcoin Core returns for a height above the tip.
pub const RPC_HEIGHT_OUT_OF_RANGE: i64 = -8;

/// Body of the 404 Bitcoin Core's REST interface sends for a height above the tip.
pub const REST_HEIGHT_OUT_OF_RANGE: &str = "Block height out of range";

pub type NodeResult<T> = Result<T, NodeError>;

#[derive(Debug)]
pub enum NodeError {
    /// Connection, DNS or body-stream failure reported by the HTTP client.
    Transport(reqwest::Error),
    /// Non-200 response that did not carry an RPC error document. `body` is
    /// the trimmed text of the response, empty for JSON bodies.
    Status {
        status: u16,
        reason: String,
        body: String,
    },
    /// Body could not be decoded into the expected shape.
    Malformed { reason: String },
    /// Application error reported by the node. `code` is absent for the
    /// legacy `{"status":"error","error":"..."}` shape.
    Rpc { code: Option<i64>, message: String },
    /// A worker asked for a block the node has not produced.
    HeightOutOfRange { height: u64 },
}

impl NodeError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        NodeError::Malformed {
            reason: reason.into(),
        }
    }

    pub fn is_height_out_of_range(&self) -> bool {
        match self {
            NodeError::Rpc { code, .. } => *code == Some(RPC_HEIGHT_OUT_OF_RANGE),
            NodeError::HeightOutOfRange { .. } => true,
            NodeError::Status {
                status: 404, body, ..
            } => body == REST_HEIGHT_OUT_OF_RANGE,
            _ => false,
        }
    }

    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            NodeError::Rpc { code, .. } => *code,
            _ => None,
        }
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::Transport(err) => write!(f, "transport error: {err}"),
            NodeError::Status { status, reason, body } if body.is_empty() => {
                write!(f, "\"{status} {reason}\" is not OK")
            }
            NodeError::Status {
                status,
                reason,
                body,
            } => write!(f, "\"{status} {reason}\" is not OK: {body}"),
            NodeError::Malformed { reason } => write!(f, "malformed response: {reason}"),
            NodeError::Rpc {
                code: Some(code),
                message,
            } => write!(f, "rpc error {code}: {message}"),
            NodeError::Rpc {
                code: None,
                message,
            } => write!(f, "rpc error: {message}"),
            NodeError::HeightOutOfRange { height } => {
                write!(f, "requested height {height} is above the current tip")
            }
        }
    }
}

impl std::error::Error for NodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NodeError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NodeError {
    fn from(err: reqwest::Error) -> Self {
        NodeError::Transport(err)
    }
}
