//! Tool-level errors for the offcache server.
//!
//! Failures inside the router surface as `offcache_core::Error`; these cover
//! bad tool arguments and control requests that come back empty.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid tool arguments (bad URL, unsupported method).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The control loop accepted a message but sent nothing back.
    #[error("NO_REPLY: {0}")]
    NoReply(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let code = match &err {
            ToolError::InvalidInput(_) => -32602,
            ToolError::NoReply(_) => -32016,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_codes() {
        let err: McpError = ToolError::InvalidInput("bad url".into()).into();
        assert_eq!(err.code, ErrorCode(-32602));
        assert_eq!(err.message, "INVALID_INPUT: bad url");

        let err: McpError = ToolError::NoReply("CACHE_STATUS".into()).into();
        assert_eq!(err.code, ErrorCode(-32016));
    }
}
