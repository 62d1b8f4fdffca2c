//! Identity sidecars: the immutable metadata files that are never diffed.
//!
//! `.agent.json` and `.component.json` pin a directory to a resource id and
//! version; `tests/.tests.json` maps test-case file stems to ids. Everything
//! here is identity, not configuration — the diff engine never sees it.

use serde::{Deserialize, Serialize};

use vox_core::ResponseEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKindTag {
    Voice,
    Chat,
}

/// Contents of `.agent.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub kind: AgentKindTag,
    pub agent_id: String,
    pub version: u64,
    /// The engine reference verbatim, including the websocket URL for
    /// custom-llm engines (it has no id to point at).
    pub response_engine: ResponseEngine,
    /// Version of the engine config serialized beside this agent. Needed to
    /// rebuild the engine's identity when the reference itself does not pin
    /// a version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<u64>,
}

/// Contents of `.component.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentIdentity {
    pub component_id: String,
    pub version: u64,
}

/// One entry of `tests/.tests.json`, keyed by file stem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseIdentity {
    pub test_case_id: String,
    pub version: u64,
}
