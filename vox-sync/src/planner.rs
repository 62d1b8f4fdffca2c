//! Change-set planner: diff output → the minimal ordered mutation list.
//!
//! Update payloads are the mutable-field projections the diff already ran
//! on, so identity/version fields and non-custom engine references are
//! stripped by construction. Engines are ordered before the agents that
//! depend on them.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;

use vox_api::Mutation;
use vox_core::raw::RawPhoneNumber;
use vox_core::CanonicalState;

use crate::diff::ChangeSet;

/// One update mutation per changed resource: engines first, then agents,
/// then components and test cases.
pub fn plan_deploy(changes: &ChangeSet) -> Vec<Mutation> {
    let mut mutations = Vec::with_capacity(changes.len());
    for change in &changes.llms {
        mutations.push(Mutation::UpdateLlm {
            id: change.id.clone(),
            payload: change.current.clone(),
        });
    }
    for change in &changes.conversation_flows {
        mutations.push(Mutation::UpdateConversationFlow {
            id: change.id.clone(),
            payload: change.current.clone(),
        });
    }
    for change in &changes.components {
        mutations.push(Mutation::UpdateComponent {
            id: change.id.clone(),
            payload: change.current.clone(),
        });
    }
    for change in &changes.voice_agents {
        mutations.push(Mutation::UpdateVoiceAgent {
            id: change.id.clone(),
            payload: change.current.clone(),
        });
    }
    for change in &changes.chat_agents {
        mutations.push(Mutation::UpdateChatAgent {
            id: change.id.clone(),
            payload: change.current.clone(),
        });
    }
    for change in &changes.test_cases {
        mutations.push(Mutation::UpdateTestCase {
            id: change.id.clone(),
            payload: change.current.clone(),
        });
    }
    mutations
}

/// One publish call per affected agent. `state` decides the agent's kind;
/// ids that name no agent in `state` are dropped.
pub fn plan_publish(affected: &BTreeSet<String>, state: &CanonicalState) -> Vec<Mutation> {
    let mut mutations = Vec::new();
    for id in affected {
        if state.voice_agents.iter().any(|a| &a.id == id) {
            mutations.push(Mutation::PublishVoiceAgent { id: id.clone() });
        } else if state.chat_agents.iter().any(|a| &a.id == id) {
            mutations.push(Mutation::PublishChatAgent { id: id.clone() });
        }
    }
    mutations
}

/// The secondary, publish-dependent change-set: for every phone number with
/// a version-pinned binding to a just-published agent, patch that binding to
/// the agent's highest published version. Unpinned bindings track latest
/// implicitly and are left untouched.
pub fn plan_phone_rebind(
    phone_numbers: &[RawPhoneNumber],
    published_versions: &BTreeMap<String, u64>,
    just_published: &BTreeSet<String>,
) -> Vec<Mutation> {
    let mut mutations = Vec::new();
    for phone in phone_numbers {
        let mut payload = serde_json::Map::new();

        if let (Some(agent_id), Some(pinned)) =
            (&phone.inbound_agent_id, phone.inbound_agent_version)
        {
            if just_published.contains(agent_id) {
                if let Some(&latest) = published_versions.get(agent_id) {
                    if pinned != latest {
                        payload.insert("inbound_agent_version".to_string(), json!(latest));
                    }
                }
            }
        }
        if let (Some(agent_id), Some(pinned)) =
            (&phone.outbound_agent_id, phone.outbound_agent_version)
        {
            if just_published.contains(agent_id) {
                if let Some(&latest) = published_versions.get(agent_id) {
                    if pinned != latest {
                        payload.insert("outbound_agent_version".to_string(), json!(latest));
                    }
                }
            }
        }

        if !payload.is_empty() {
            mutations.push(Mutation::RebindPhoneNumber {
                phone_number: phone.phone_number.clone(),
                payload: serde_json::Value::Object(payload),
            });
        }
    }
    mutations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compute_changes;
    use serde_json::json;
    use vox_core::CanonicalState;

    fn states() -> (CanonicalState, CanonicalState) {
        let reference: CanonicalState = serde_json::from_value(json!({
            "voice_agents": [{
                "_id": "agent_a",
                "_version": 0,
                "agent_name": "A",
                "response_engine": { "type": "retell-llm", "llm_id": "llm_1" },
                "voice_id": "kate",
            }],
            "llms": [{ "_id": "llm_1", "_version": 0, "general_prompt": "A" }],
        }))
        .unwrap();
        let mut source = reference.clone();
        source.llms[0].general_prompt = Some("B".into());
        source.voice_agents[0]
            .extra
            .insert("voice_id".into(), json!("sarah"));
        (source, reference)
    }

    #[test]
    fn deploy_plan_orders_engines_before_agents() {
        let (source, reference) = states();
        let changes = compute_changes(&source, &reference, false).unwrap();
        let plan = plan_deploy(&changes);
        assert_eq!(plan.len(), 2);
        assert!(matches!(plan[0], Mutation::UpdateLlm { .. }));
        assert!(matches!(plan[1], Mutation::UpdateVoiceAgent { .. }));
    }

    #[test]
    fn update_payload_is_the_mutable_projection() {
        let (source, reference) = states();
        let changes = compute_changes(&source, &reference, false).unwrap();
        let plan = plan_deploy(&changes);
        let Mutation::UpdateVoiceAgent { payload, .. } = &plan[1] else {
            panic!("expected agent update");
        };
        assert_eq!(payload["voice_id"], "sarah");
        assert!(payload.get("_id").is_none());
        assert!(payload.get("_version").is_none());
        assert!(payload.get("response_engine").is_none());
    }

    #[test]
    fn publish_plan_matches_agent_kind() {
        let state: CanonicalState = serde_json::from_value(json!({
            "voice_agents": [{
                "_id": "agent_v", "_version": 0,
                "response_engine": { "type": "retell-llm", "llm_id": "llm_1" },
            }],
            "chat_agents": [{
                "_id": "agent_c", "_version": 0,
                "response_engine": { "type": "retell-llm", "llm_id": "llm_2" },
            }],
        }))
        .unwrap();
        let affected = BTreeSet::from(["agent_v".to_string(), "agent_c".to_string()]);
        let plan = plan_publish(&affected, &state);
        assert_eq!(plan.len(), 2);
        assert!(plan
            .iter()
            .any(|m| matches!(m, Mutation::PublishChatAgent { id } if id == "agent_c")));
        assert!(plan
            .iter()
            .any(|m| matches!(m, Mutation::PublishVoiceAgent { id } if id == "agent_v")));
    }

    fn phone(number: &str, inbound: Option<(&str, u64)>, outbound: Option<(&str, u64)>) -> RawPhoneNumber {
        let mut value = json!({ "phone_number": number });
        if let Some((id, v)) = inbound {
            value["inbound_agent_id"] = json!(id);
            value["inbound_agent_version"] = json!(v);
        }
        if let Some((id, v)) = outbound {
            value["outbound_agent_id"] = json!(id);
            value["outbound_agent_version"] = json!(v);
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn rebind_patches_stale_pinned_bindings_only() {
        let phones = vec![
            phone("+15550100", Some(("agent_a", 3)), Some(("agent_b", 7))),
            phone("+15550101", Some(("agent_a", 5)), None),
            phone("+15550102", Some(("agent_x", 1)), None),
        ];
        let published = BTreeMap::from([
            ("agent_a".to_string(), 5u64),
            ("agent_b".to_string(), 7u64),
        ]);
        let just_published = BTreeSet::from(["agent_a".to_string(), "agent_b".to_string()]);

        let plan = plan_phone_rebind(&phones, &published, &just_published);
        assert_eq!(plan.len(), 1);
        let Mutation::RebindPhoneNumber {
            phone_number,
            payload,
        } = &plan[0]
        else {
            panic!("expected rebind");
        };
        assert_eq!(phone_number, "+15550100");
        assert_eq!(payload["inbound_agent_version"], 5);
        assert!(payload.get("outbound_agent_version").is_none());
    }

    #[test]
    fn unpinned_bindings_are_left_alone() {
        let mut p = phone("+15550100", None, None);
        p.inbound_agent_id = Some("agent_a".into());
        let plan = plan_phone_rebind(
            &[p],
            &BTreeMap::from([("agent_a".to_string(), 2u64)]),
            &BTreeSet::from(["agent_a".to_string()]),
        );
        assert!(plan.is_empty());
    }
}
