//! Tool-call detection for agent output parsing.
//!
//! The loop detector wants to know which tool an agent invoked on each
//! attempt, but agent output is free text. The default extractor is a
//! best-effort regex heuristic over that text; callers with direct
//! instrumentation can swap in their own [`ToolExtractor`] without
//! touching the monitor's control flow.
//!
//! ## Example
//!
//! ```
//! use troupe::orchestration::detection::{RegexToolExtractor, ToolExtractor, GENERIC_TOOL};
//!
//! let extractor = RegexToolExtractor;
//! let call = extractor.extract("Calling WebSearchTool(\"latest AI news\")");
//! assert_eq!(call.tool, "WebSearchTool");
//!
//! let fallback = extractor.extract("done, nothing else to report");
//! assert_eq!(fallback.tool, GENERIC_TOOL);
//! ```

use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;

/// Tool name reported when no tool call is recognized in the output.
pub const GENERIC_TOOL: &str = "generic";

/// How many output characters the parameter summary carries.
const PARAM_EXCERPT_CHARS: usize = 120;

/// Regex for tool invocations like `WebSearchTool(...)` in agent output.
static TOOL_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+Tool)\s*\(").unwrap());

/// A tool invocation recovered from agent output.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Extracted tool name, or [`GENERIC_TOOL`] when nothing matched.
    pub tool: String,
    /// Heuristic parameter summary handed to the loop detector.
    pub params: Value,
}

/// Strategy for recovering tool-call info from raw agent output.
///
/// The monitor runs every successful attempt through the configured
/// extractor before consulting the loop detector, so even outputs with
/// no recognizable tool call produce a record.
pub trait ToolExtractor: Send + Sync {
    /// Extract the tool call described by `output`.
    fn extract(&self, output: &str) -> ToolCall;
}

/// Default extractor: regex match over the textual output.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexToolExtractor;

impl ToolExtractor for RegexToolExtractor {
    fn extract(&self, output: &str) -> ToolCall {
        let tool = TOOL_CALL_RE
            .captures(output)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| GENERIC_TOOL.to_string());

        ToolCall {
            tool,
            params: summarize_params(output),
        }
    }
}

/// Build the parameter summary: an excerpt of the output text.
fn summarize_params(output: &str) -> Value {
    let excerpt: String = output.chars().take(PARAM_EXCERPT_CHARS).collect();
    json!({ "excerpt": excerpt })
}
