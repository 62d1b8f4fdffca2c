//! # vox-core
//!
//! Canonical data model and canonicalizer for remote agent configuration.
//!
//! Raw API listings ([`raw`]) are version-stamped and carry readonly
//! metadata; [`canonical::canonicalize`] reduces them to one
//! [`state::CanonicalState`] per view (draft or published), which the rest
//! of the workspace diffs, plans against, and maps to disk.

pub mod canonical;
pub mod raw;
pub mod state;
pub mod types;

pub use canonical::{canonicalize, canonicalize_test_cases, keep_latest_version, View};
pub use state::{
    CanonicalResource, CanonicalState, ChatAgent, Component, ConversationFlow, Llm, TestCase,
    VoiceAgent,
};
pub use types::{FlowEdge, FlowNode, NodeInstruction, Position, ResourceKind, ResponseEngine};
