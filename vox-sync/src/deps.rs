//! Dependency resolver: changed resources → transitively affected agents.
//!
//! The dependency graph has exactly one edge kind (agent → llm/flow via the
//! response-engine reference) and is one hop deep, so a single pass over the
//! agents suffices — no fixpoint loop. If the model ever grows
//! engine-to-engine references this must become a closure computation.

use std::collections::BTreeSet;

use vox_core::{CanonicalState, ResponseEngine};

use crate::diff::ChangeSet;

/// The ids of every agent affected by `changes`: those changed directly,
/// plus every agent in `state` whose response engine names a changed LLM or
/// flow.
pub fn find_affected_agent_ids(changes: &ChangeSet, state: &CanonicalState) -> BTreeSet<String> {
    let mut affected: BTreeSet<String> = changes
        .voice_agents
        .iter()
        .chain(changes.chat_agents.iter())
        .map(|c| c.id.clone())
        .collect();

    let changed_llm_ids: BTreeSet<&str> = changes.llms.iter().map(|c| c.id.as_str()).collect();
    let changed_flow_ids: BTreeSet<&str> = changes
        .conversation_flows
        .iter()
        .map(|c| c.id.as_str())
        .collect();

    let agents = state
        .voice_agents
        .iter()
        .map(|a| (a.id.as_str(), &a.response_engine))
        .chain(
            state
                .chat_agents
                .iter()
                .map(|a| (a.id.as_str(), &a.response_engine)),
        );
    for (id, engine) in agents {
        let depends_on_change = match engine {
            ResponseEngine::RetellLlm { llm_id, .. } => changed_llm_ids.contains(llm_id.as_str()),
            ResponseEngine::ConversationFlow {
                conversation_flow_id,
                ..
            } => changed_flow_ids.contains(conversation_flow_id.as_str()),
            ResponseEngine::CustomLlm { .. } => false,
        };
        if depends_on_change {
            affected.insert(id.to_string());
        }
    }
    affected
}
