//! Canonical resources and [`CanonicalState`].
//!
//! A canonical resource is an API resource stripped of readonly metadata,
//! keyed by its stable `_id` and API-assigned `_version`. Values are
//! immutable between pipeline stages: diffing, planning, and serialization
//! all derive new values instead of editing a resource in place.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::raw::{
    RawChatAgent, RawComponent, RawConversationFlow, RawLlm, RawTestCase, RawVoiceAgent,
};
use crate::types::{FlowNode, Position, ResponseEngine};

/// Serialized field name of the stable resource id.
pub const ID_FIELD: &str = "_id";
/// Serialized field name of the API-assigned version.
pub const VERSION_FIELD: &str = "_version";

// ---------------------------------------------------------------------------
// Canonical resources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceAgent {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version")]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    pub response_engine: ResponseEngine,
    /// Test cases owned by this agent. Populated from the `tests/` directory
    /// or the test-case endpoint, never from the agent payload itself.
    #[serde(skip)]
    pub test_cases: Vec<TestCase>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAgent {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version")]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    pub response_engine: ResponseEngine,
    #[serde(skip)]
    pub test_cases: Vec<TestCase>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Llm {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version")]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_prompt: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationFlow {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version")]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<FlowNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_tag_display_position: Option<Position>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version")]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<FlowNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_position: Option<Position>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version")]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// CanonicalState
// ---------------------------------------------------------------------------

/// A fully resolved snapshot of everything the tool manages, in a single
/// view (draft, published, or local files).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CanonicalState {
    #[serde(default)]
    pub voice_agents: Vec<VoiceAgent>,
    #[serde(default)]
    pub chat_agents: Vec<ChatAgent>,
    #[serde(default)]
    pub llms: Vec<Llm>,
    #[serde(default)]
    pub conversation_flows: Vec<ConversationFlow>,
    #[serde(default)]
    pub components: Vec<Component>,
}

impl CanonicalState {
    pub fn is_empty(&self) -> bool {
        self.voice_agents.is_empty()
            && self.chat_agents.is_empty()
            && self.llms.is_empty()
            && self.conversation_flows.is_empty()
            && self.components.is_empty()
    }

    pub fn llm(&self, id: &str) -> Option<&Llm> {
        self.llms.iter().find(|l| l.id == id)
    }

    pub fn conversation_flow(&self, id: &str) -> Option<&ConversationFlow> {
        self.conversation_flows.iter().find(|f| f.id == id)
    }
}

// ---------------------------------------------------------------------------
// CanonicalResource
// ---------------------------------------------------------------------------

/// Common surface of a canonical resource: identity and the mutable-field
/// projection used for diffing and partial-update payloads.
pub trait CanonicalResource: Serialize + DeserializeOwned + Clone {
    fn id(&self) -> &str;
    fn version(&self) -> u64;
    /// Human-readable display name, the slug source for directory naming.
    fn display_name(&self) -> Option<&str>;

    /// Mutable fields as a JSON object: the full serialized form minus
    /// `_id`/`_version` and any type-specific immutable fields.
    fn mutable_value(&self) -> Result<Value, serde_json::Error> {
        let mut map = into_object(serde_json::to_value(self)?);
        map.remove(ID_FIELD);
        map.remove(VERSION_FIELD);
        Ok(Value::Object(map))
    }
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Agents keep `response_engine` out of the mutable surface except for the
/// `custom-llm` variant, whose websocket URL is the one mutable sub-field.
fn agent_mutable_value<T: Serialize>(
    agent: &T,
    engine: &ResponseEngine,
) -> Result<Value, serde_json::Error> {
    let mut map = into_object(serde_json::to_value(agent)?);
    map.remove(ID_FIELD);
    map.remove(VERSION_FIELD);
    if !matches!(engine, ResponseEngine::CustomLlm { .. }) {
        map.remove("response_engine");
    }
    Ok(Value::Object(map))
}

/// Positions live in the `.positions.json` sidecar and never in the
/// diffable surface: a canvas drag (or the sidecar's integer rounding) must
/// not read as a configuration change.
fn strip_node_positions(map: &mut Map<String, Value>) {
    let Some(Value::Array(nodes)) = map.get_mut("nodes") else {
        return;
    };
    for node in nodes {
        if let Some(obj) = node.as_object_mut() {
            obj.remove("display_position");
        }
    }
}

impl CanonicalResource for VoiceAgent {
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn display_name(&self) -> Option<&str> {
        self.agent_name.as_deref()
    }
    fn mutable_value(&self) -> Result<Value, serde_json::Error> {
        agent_mutable_value(self, &self.response_engine)
    }
}

impl CanonicalResource for ChatAgent {
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn display_name(&self) -> Option<&str> {
        self.agent_name.as_deref()
    }
    fn mutable_value(&self) -> Result<Value, serde_json::Error> {
        agent_mutable_value(self, &self.response_engine)
    }
}

impl CanonicalResource for Llm {
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn display_name(&self) -> Option<&str> {
        None
    }
}

impl CanonicalResource for ConversationFlow {
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn display_name(&self) -> Option<&str> {
        None
    }
    fn mutable_value(&self) -> Result<Value, serde_json::Error> {
        let mut map = into_object(serde_json::to_value(self)?);
        map.remove(ID_FIELD);
        map.remove(VERSION_FIELD);
        map.remove("begin_tag_display_position");
        strip_node_positions(&mut map);
        Ok(Value::Object(map))
    }
}

impl CanonicalResource for Component {
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn display_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
    fn mutable_value(&self) -> Result<Value, serde_json::Error> {
        let mut map = into_object(serde_json::to_value(self)?);
        map.remove(ID_FIELD);
        map.remove(VERSION_FIELD);
        map.remove("display_position");
        strip_node_positions(&mut map);
        Ok(Value::Object(map))
    }
}

impl CanonicalResource for TestCase {
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn display_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Raw → canonical conversions (readonly metadata dropped by construction)
// ---------------------------------------------------------------------------

impl From<RawVoiceAgent> for VoiceAgent {
    fn from(raw: RawVoiceAgent) -> Self {
        VoiceAgent {
            id: raw.agent_id,
            version: raw.version,
            agent_name: raw.agent_name,
            response_engine: raw.response_engine,
            test_cases: Vec::new(),
            extra: raw.extra,
        }
    }
}

impl From<RawChatAgent> for ChatAgent {
    fn from(raw: RawChatAgent) -> Self {
        ChatAgent {
            id: raw.chat_agent_id,
            version: raw.version,
            agent_name: raw.agent_name,
            response_engine: raw.response_engine,
            test_cases: Vec::new(),
            extra: raw.extra,
        }
    }
}

impl From<RawLlm> for Llm {
    fn from(raw: RawLlm) -> Self {
        Llm {
            id: raw.llm_id,
            version: raw.version,
            general_prompt: raw.general_prompt,
            extra: raw.extra,
        }
    }
}

impl From<RawConversationFlow> for ConversationFlow {
    fn from(raw: RawConversationFlow) -> Self {
        ConversationFlow {
            id: raw.conversation_flow_id,
            version: raw.version,
            global_prompt: raw.global_prompt,
            nodes: raw.nodes,
            begin_tag_display_position: raw.begin_tag_display_position,
            extra: raw.extra,
        }
    }
}

impl From<RawComponent> for Component {
    fn from(raw: RawComponent) -> Self {
        Component {
            id: raw.component_id,
            version: raw.version,
            name: raw.name,
            nodes: raw.nodes,
            display_position: raw.display_position,
            extra: raw.extra,
        }
    }
}

impl From<RawTestCase> for TestCase {
    fn from(raw: RawTestCase) -> Self {
        TestCase {
            id: raw.test_case_id,
            version: raw.version,
            name: raw.name,
            user_prompt: raw.user_prompt,
            extra: raw.extra,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn agent(engine: ResponseEngine) -> VoiceAgent {
        let mut extra = Map::new();
        extra.insert("voice_id".into(), json!("11labs-kate"));
        VoiceAgent {
            id: "agent_1".into(),
            version: 2,
            agent_name: Some("Support".into()),
            response_engine: engine,
            test_cases: Vec::new(),
            extra,
        }
    }

    #[test]
    fn canonical_agent_serializes_identity_fields() {
        let value = serde_json::to_value(agent(ResponseEngine::RetellLlm {
            llm_id: "llm_1".into(),
            version: None,
        }))
        .unwrap();
        assert_eq!(value["_id"], "agent_1");
        assert_eq!(value["_version"], 2);
        assert_eq!(value["voice_id"], "11labs-kate");
    }

    #[test]
    fn mutable_value_excludes_identity_and_engine() {
        let value = agent(ResponseEngine::RetellLlm {
            llm_id: "llm_1".into(),
            version: Some(2),
        })
        .mutable_value()
        .unwrap();
        assert!(value.get("_id").is_none());
        assert!(value.get("_version").is_none());
        assert!(value.get("response_engine").is_none());
        assert_eq!(value["voice_id"], "11labs-kate");
    }

    #[test]
    fn custom_llm_url_stays_in_mutable_surface() {
        let value = agent(ResponseEngine::CustomLlm {
            llm_websocket_url: "wss://example.test/llm".into(),
        })
        .mutable_value()
        .unwrap();
        assert_eq!(
            value["response_engine"]["llm_websocket_url"],
            "wss://example.test/llm"
        );
    }

    #[test]
    fn raw_conversion_strips_readonly_metadata() {
        let raw: RawLlm = serde_json::from_value(json!({
            "llm_id": "llm_1",
            "version": 3,
            "is_published": true,
            "version_title": "v3 rollout",
            "last_modification_timestamp": 1_722_000_000_000_i64,
            "general_prompt": "Be helpful.",
            "model": "gpt-4o",
        }))
        .unwrap();
        let canonical = Llm::from(raw);
        let value = serde_json::to_value(&canonical).unwrap();
        assert!(value.get("is_published").is_none());
        assert!(value.get("version_title").is_none());
        assert!(value.get("last_modification_timestamp").is_none());
        assert_eq!(value["model"], "gpt-4o");
        assert_eq!(value["_version"], 3);
    }

    #[test]
    fn flow_mutable_surface_has_no_positions() {
        let flow: ConversationFlow = serde_json::from_value(json!({
            "_id": "flow_1",
            "_version": 0,
            "global_prompt": "Hi",
            "begin_tag_display_position": { "x": 1.0, "y": 2.0 },
            "nodes": [{
                "type": "end",
                "id": "n1",
                "display_position": { "x": 3.0, "y": 4.0 },
            }],
        }))
        .unwrap();
        let value = flow.mutable_value().unwrap();
        assert!(value.get("begin_tag_display_position").is_none());
        assert!(value["nodes"][0].get("display_position").is_none());
        assert_eq!(value["global_prompt"], "Hi");
    }

    #[test]
    fn test_cases_never_serialize_with_the_agent() {
        let mut a = agent(ResponseEngine::CustomLlm {
            llm_websocket_url: "wss://x".into(),
        });
        a.test_cases.push(TestCase {
            id: "test_1".into(),
            version: 0,
            name: Some("smoke".into()),
            user_prompt: None,
            extra: Map::new(),
        });
        let value = serde_json::to_value(&a).unwrap();
        assert!(value.get("test_cases").is_none());
    }
}
