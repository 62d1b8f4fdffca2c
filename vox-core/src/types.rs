//! Shared wire-shape types: resource kinds, positions, response engines,
//! flow nodes.
//!
//! Every open-ended object carries a `#[serde(flatten)]` extra-fields map so
//! unknown API fields survive a full write-then-read cycle instead of being
//! silently dropped. Tagged unions (`ResponseEngine`, `FlowNode`,
//! `NodeInstruction`) are serde internally-tagged enums; every site that
//! branches on the tag matches exhaustively.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Resource kinds
// ---------------------------------------------------------------------------

/// The kinds of remote resource the tool manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    VoiceAgent,
    ChatAgent,
    Llm,
    ConversationFlow,
    Component,
    TestCase,
    PhoneNumber,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::VoiceAgent => "voice agent",
            ResourceKind::ChatAgent => "chat agent",
            ResourceKind::Llm => "llm",
            ResourceKind::ConversationFlow => "conversation flow",
            ResourceKind::Component => "component",
            ResourceKind::TestCase => "test case",
            ResourceKind::PhoneNumber => "phone number",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// 2D canvas coordinate attached to flow nodes, components, and the flow
/// begin tag. Excluded from the diffable config; lives in the
/// `.positions.json` sidecar on disk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Coordinates rounded to integers, the on-disk sidecar representation.
    pub fn rounded(&self) -> (i64, i64) {
        (self.x.round() as i64, self.y.round() as i64)
    }
}

// ---------------------------------------------------------------------------
// Response engine
// ---------------------------------------------------------------------------

/// The tagged reference by which an agent names the LLM or flow that drives
/// it. This is the single dependency edge in the model: no other resource
/// type references another by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseEngine {
    #[serde(rename = "retell-llm")]
    RetellLlm {
        llm_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<u64>,
    },
    #[serde(rename = "custom-llm")]
    CustomLlm { llm_websocket_url: String },
    #[serde(rename = "conversation-flow")]
    ConversationFlow {
        conversation_flow_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<u64>,
    },
}

impl ResponseEngine {
    /// Wire value of the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ResponseEngine::RetellLlm { .. } => "retell-llm",
            ResponseEngine::CustomLlm { .. } => "custom-llm",
            ResponseEngine::ConversationFlow { .. } => "conversation-flow",
        }
    }

    /// Id of the referenced engine resource, if the variant carries one.
    pub fn engine_id(&self) -> Option<&str> {
        match self {
            ResponseEngine::RetellLlm { llm_id, .. } => Some(llm_id),
            ResponseEngine::CustomLlm { .. } => None,
            ResponseEngine::ConversationFlow {
                conversation_flow_id,
                ..
            } => Some(conversation_flow_id),
        }
    }

}

// ---------------------------------------------------------------------------
// Flow nodes
// ---------------------------------------------------------------------------

/// An edge out of a flow node. Destinations reference sibling node ids by
/// string, never by object reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_node_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What a conversation node says: a prompt the engine expands, or text
/// spoken verbatim. The `text` of either variant is rich text and is
/// extracted to a markdown file on serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeInstruction {
    Prompt { text: String },
    StaticText { text: String },
}

impl NodeInstruction {
    pub fn text(&self) -> &str {
        match self {
            NodeInstruction::Prompt { text } | NodeInstruction::StaticText { text } => text,
        }
    }

    /// Same variant with the text replaced, used by the extraction transform.
    pub fn with_text(&self, text: String) -> Self {
        match self {
            NodeInstruction::Prompt { .. } => NodeInstruction::Prompt { text },
            NodeInstruction::StaticText { .. } => NodeInstruction::StaticText { text },
        }
    }
}

/// A conversation turn driven by an instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<NodeInstruction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<FlowEdge>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Terminal node; carries no outgoing edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_position: Option<Position>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Conditional split over its edges' transition conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_position: Option<Position>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<FlowEdge>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Inlined reference to a shared component by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<FlowEdge>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Shared shape for the action-style node types (function, transfer_call,
/// press_digit, sms, extract_dynamic_variables, agent_swap, mcp). Their
/// type-specific settings ride in the extra map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_position: Option<Position>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<FlowEdge>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A node in a conversation flow, discriminated by its `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowNode {
    Conversation(ConversationNode),
    End(EndNode),
    Function(ActionNode),
    TransferCall(ActionNode),
    Branch(BranchNode),
    Component(ComponentNode),
    PressDigit(ActionNode),
    Sms(ActionNode),
    ExtractDynamicVariables(ActionNode),
    AgentSwap(ActionNode),
    Mcp(ActionNode),
}

impl FlowNode {
    pub fn id(&self) -> &str {
        match self {
            FlowNode::Conversation(n) => &n.id,
            FlowNode::End(n) => &n.id,
            FlowNode::Branch(n) => &n.id,
            FlowNode::Component(n) => &n.id,
            FlowNode::Function(n)
            | FlowNode::TransferCall(n)
            | FlowNode::PressDigit(n)
            | FlowNode::Sms(n)
            | FlowNode::ExtractDynamicVariables(n)
            | FlowNode::AgentSwap(n)
            | FlowNode::Mcp(n) => &n.id,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            FlowNode::Conversation(n) => n.name.as_deref(),
            FlowNode::End(n) => n.name.as_deref(),
            FlowNode::Branch(n) => n.name.as_deref(),
            FlowNode::Component(n) => n.name.as_deref(),
            FlowNode::Function(n)
            | FlowNode::TransferCall(n)
            | FlowNode::PressDigit(n)
            | FlowNode::Sms(n)
            | FlowNode::ExtractDynamicVariables(n)
            | FlowNode::AgentSwap(n)
            | FlowNode::Mcp(n) => n.name.as_deref(),
        }
    }

    pub fn display_position(&self) -> Option<Position> {
        match self {
            FlowNode::Conversation(n) => n.display_position,
            FlowNode::End(n) => n.display_position,
            FlowNode::Branch(n) => n.display_position,
            FlowNode::Component(n) => n.display_position,
            FlowNode::Function(n)
            | FlowNode::TransferCall(n)
            | FlowNode::PressDigit(n)
            | FlowNode::Sms(n)
            | FlowNode::ExtractDynamicVariables(n)
            | FlowNode::AgentSwap(n)
            | FlowNode::Mcp(n) => n.display_position,
        }
    }

    /// Outgoing edges; empty for terminal nodes.
    pub fn edges(&self) -> &[FlowEdge] {
        match self {
            FlowNode::Conversation(n) => &n.edges,
            FlowNode::End(_) => &[],
            FlowNode::Branch(n) => &n.edges,
            FlowNode::Component(n) => &n.edges,
            FlowNode::Function(n)
            | FlowNode::TransferCall(n)
            | FlowNode::PressDigit(n)
            | FlowNode::Sms(n)
            | FlowNode::ExtractDynamicVariables(n)
            | FlowNode::AgentSwap(n)
            | FlowNode::Mcp(n) => &n.edges,
        }
    }

    /// Copy of this node with `display_position` cleared — the position
    /// extraction transform never mutates the source tree.
    pub fn without_display_position(&self) -> FlowNode {
        let mut node = self.clone();
        match &mut node {
            FlowNode::Conversation(n) => n.display_position = None,
            FlowNode::End(n) => n.display_position = None,
            FlowNode::Branch(n) => n.display_position = None,
            FlowNode::Component(n) => n.display_position = None,
            FlowNode::Function(n)
            | FlowNode::TransferCall(n)
            | FlowNode::PressDigit(n)
            | FlowNode::Sms(n)
            | FlowNode::ExtractDynamicVariables(n)
            | FlowNode::AgentSwap(n)
            | FlowNode::Mcp(n) => n.display_position = None,
        }
        node
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_engine_tag_roundtrip() {
        let engine = ResponseEngine::RetellLlm {
            llm_id: "llm_abc".into(),
            version: Some(3),
        };
        let value = serde_json::to_value(&engine).unwrap();
        assert_eq!(value["type"], "retell-llm");
        assert_eq!(value["llm_id"], "llm_abc");
        let back: ResponseEngine = serde_json::from_value(value).unwrap();
        assert_eq!(back, engine);
    }

    #[test]
    fn custom_llm_has_no_engine_id() {
        let engine = ResponseEngine::CustomLlm {
            llm_websocket_url: "wss://example.test/llm".into(),
        };
        assert_eq!(engine.engine_id(), None);
        assert_eq!(engine.kind(), "custom-llm");
    }

    #[test]
    fn flow_node_preserves_unknown_fields() {
        let raw = json!({
            "type": "conversation",
            "id": "node-1",
            "name": "Greeting",
            "instruction": { "type": "prompt", "text": "Say hello" },
            "skip_response_edge": true,
        });
        let node: FlowNode = serde_json::from_value(raw).unwrap();
        let FlowNode::Conversation(inner) = &node else {
            panic!("expected conversation node");
        };
        assert_eq!(inner.extra["skip_response_edge"], json!(true));

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["type"], "conversation");
        assert_eq!(back["skip_response_edge"], json!(true));
    }

    #[test]
    fn node_type_tags_use_snake_case() {
        let raw = json!({ "id": "n1", "type": "extract_dynamic_variables" });
        let node: FlowNode = serde_json::from_value(raw).unwrap();
        assert!(matches!(node, FlowNode::ExtractDynamicVariables(_)));
        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["type"], "extract_dynamic_variables");
    }

    #[test]
    fn without_display_position_leaves_source_untouched() {
        let node = FlowNode::End(EndNode {
            id: "n9".into(),
            name: None,
            display_position: Some(Position { x: 10.4, y: -3.6 }),
            extra: Map::new(),
        });
        let stripped = node.without_display_position();
        assert_eq!(stripped.display_position(), None);
        assert_eq!(node.display_position(), Some(Position { x: 10.4, y: -3.6 }));
        assert_eq!(Position { x: 10.4, y: -3.6 }.rounded(), (10, -4));
    }

    #[test]
    fn end_node_has_no_edges() {
        let node = FlowNode::End(EndNode {
            id: "n2".into(),
            name: Some("bye".into()),
            display_position: None,
            extra: Map::new(),
        });
        assert!(node.edges().is_empty());
    }
}
