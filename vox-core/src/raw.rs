//! API-shaped resources, exactly as the list endpoints return them.
//!
//! Each id may appear multiple times in a listing, once per historical
//! version. Readonly metadata (timestamps, publish flags, version title) is
//! typed here so canonicalization strips it by construction; everything else
//! rides in the flattened extra map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{FlowNode, Position, ResponseEngine};

/// An entry in a version-stamped API listing.
pub trait Versioned {
    fn id(&self) -> &str;
    fn version(&self) -> u64;
}

/// A [`Versioned`] entry that also carries the draft/published flag.
pub trait Publishable: Versioned {
    fn is_published(&self) -> bool;
}

macro_rules! impl_versioned {
    ($ty:ty, $id:ident) => {
        impl Versioned for $ty {
            fn id(&self) -> &str {
                &self.$id
            }
            fn version(&self) -> u64 {
                self.version
            }
        }
        impl Publishable for $ty {
            fn is_published(&self) -> bool {
                self.is_published
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVoiceAgent {
    pub agent_id: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modification_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    pub response_engine: ResponseEngine,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChatAgent {
    pub chat_agent_id: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modification_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    pub response_engine: ResponseEngine,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLlm {
    pub llm_id: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modification_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_prompt: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawConversationFlow {
    pub conversation_flow_id: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modification_timestamp: Option<i64>,
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
pub struct RawComponent {
    pub component_id: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modification_timestamp: Option<i64>,
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
pub struct RawTestCase {
    pub test_case_id: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modification_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Phone numbers are not canonicalized or written to disk; they only
/// participate in the publish-time rebinding pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPhoneNumber {
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound_agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound_agent_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound_agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound_agent_version: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_versioned!(RawVoiceAgent, agent_id);
impl_versioned!(RawChatAgent, chat_agent_id);
impl_versioned!(RawLlm, llm_id);
impl_versioned!(RawConversationFlow, conversation_flow_id);
impl_versioned!(RawComponent, component_id);
impl_versioned!(RawTestCase, test_case_id);

/// The raw listings a canonical view is derived from.
#[derive(Debug, Clone, Default)]
pub struct RawListing {
    pub voice_agents: Vec<RawVoiceAgent>,
    pub chat_agents: Vec<RawChatAgent>,
    pub llms: Vec<RawLlm>,
    pub conversation_flows: Vec<RawConversationFlow>,
    pub components: Vec<RawComponent>,
}
