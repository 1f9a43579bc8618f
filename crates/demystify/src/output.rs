//! JSON output types for `--format json`.
//!
//! Every response carries `status` and `schema_version`. Successful renders
//! include both output styles; errors carry the numeric code that also
//! becomes the process exit code.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use demystify_core::{DemystifyError, ErrorCode, ExceptionGraph};

/// Version of the JSON response schema.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Responses
// ============================================================================

/// Cached trace of one exception after the write-back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTrace {
    pub id: usize,
    pub trace: String,
}

impl NodeTrace {
    /// Collect every cached trace string in the graph, in id order.
    pub fn collect(graph: &ExceptionGraph) -> Vec<NodeTrace> {
        graph
            .ids()
            .filter_map(|id| {
                graph.rendered_trace(id).map(|trace| NodeTrace {
                    id: id.0,
                    trace: trace.to_string(),
                })
            })
            .collect()
    }
}

/// Response for `demystify render`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderResponse {
    pub status: String,
    pub schema_version: String,
    pub root: usize,
    /// Plain text rendering.
    pub plain: String,
    /// Markup rendering.
    pub styled: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traces: Vec<NodeTrace>,
}

impl RenderResponse {
    pub fn new(root: usize, plain: String, styled: String, traces: Vec<NodeTrace>) -> Self {
        RenderResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            root,
            plain,
            styled,
            traces,
        }
    }
}

/// Response for `demystify frame`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameResponse {
    pub status: String,
    pub schema_version: String,
    pub index: usize,
    pub plain: String,
    pub styled: String,
}

impl FrameResponse {
    pub fn new(index: usize, plain: String, styled: String) -> Self {
        FrameResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            index,
            plain,
            styled,
        }
    }
}

/// Error details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: u8,
    pub message: String,
}

impl ErrorInfo {
    pub fn from_error(err: &DemystifyError) -> Self {
        ErrorInfo {
            code: ErrorCode::from(err).code(),
            message: err.to_string(),
        }
    }
}

/// Response emitted when a command fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn from_error(err: &DemystifyError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

/// Emit a response as pretty-printed JSON followed by a newline.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use demystify_core::ExceptionRecord;

    #[test]
    fn render_response_omits_empty_traces() {
        let response = RenderResponse::new(0, "E".to_string(), "[red bold]E[/]".to_string(), vec![]);
        let mut out = Vec::new();
        emit_response(&response, &mut out).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["schema_version"], SCHEMA_VERSION);
        assert_eq!(json["styled"], "[red bold]E[/]");
        assert!(json.get("traces").is_none());
    }

    #[test]
    fn error_response_carries_exit_code() {
        let err = DemystifyError::invalid_args("bad index");
        let response = ErrorResponse::from_error(&err);
        assert_eq!(response.status, "error");
        assert_eq!(response.error.code, 2);
        assert_eq!(response.error.message, "invalid arguments: bad index");
    }

    #[test]
    fn node_traces_skip_uncached_exceptions() {
        let mut graph = ExceptionGraph::new();
        graph.add(ExceptionRecord::new("A", ""));
        graph.add(ExceptionRecord::new("B", "").with_rendered_trace("   at X.Y()"));
        assert_eq!(
            NodeTrace::collect(&graph),
            vec![NodeTrace {
                id: 1,
                trace: "   at X.Y()".to_string()
            }]
        );
    }

    #[test]
    fn emit_ends_with_newline() {
        let response = FrameResponse::new(3, "at A.B()".to_string(), "at A.B()".to_string());
        let mut out = Vec::new();
        emit_response(&response, &mut out).unwrap();
        assert!(out.ends_with(b"}\n"));
    }
}
