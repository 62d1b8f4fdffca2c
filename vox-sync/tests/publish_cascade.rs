//! Draft-vs-published comparison driving the publish cascade.
//!
//! Scenario: agent X's draft pins llm L v1, the published snapshot pins
//! L v0, and L's general prompt changed between them. The comparison must
//! report exactly one LLM change, and the affected-agent set must be {X}.

use std::collections::BTreeSet;

use serde_json::json;

use vox_api::Mutation;
use vox_core::raw::RawListing;
use vox_core::{canonicalize, View};
use vox_sync::{compute_changes, find_affected_agent_ids, plan_publish, DiffKind};

fn listing() -> RawListing {
    RawListing {
        voice_agents: vec![
            // Published snapshot of X.
            serde_json::from_value(json!({
                "agent_id": "agent_x",
                "version": 0,
                "is_published": true,
                "agent_name": "X",
                "response_engine": { "type": "retell-llm", "llm_id": "llm_l", "version": 0 },
            }))
            .unwrap(),
            // Current draft of X.
            serde_json::from_value(json!({
                "agent_id": "agent_x",
                "version": 1,
                "is_published": false,
                "agent_name": "X",
                "response_engine": { "type": "retell-llm", "llm_id": "llm_l", "version": 1 },
            }))
            .unwrap(),
        ],
        llms: vec![
            serde_json::from_value(json!({
                "llm_id": "llm_l",
                "version": 0,
                "is_published": true,
                "general_prompt": "A",
            }))
            .unwrap(),
            serde_json::from_value(json!({
                "llm_id": "llm_l",
                "version": 1,
                "is_published": false,
                "general_prompt": "B",
            }))
            .unwrap(),
        ],
        ..Default::default()
    }
}

#[test]
fn prompt_edit_reports_one_llm_change_and_affects_its_agent() {
    let draft = canonicalize(listing(), View::Draft);
    let published = canonicalize(listing(), View::Published);

    assert_eq!(draft.llms[0].version, 1);
    assert_eq!(published.llms[0].version, 0);

    let changes = compute_changes(&draft, &published, true).unwrap();
    assert!(changes.voice_agents.is_empty(), "engine pin is not a diff");
    assert_eq!(changes.llms.len(), 1);

    let llm_change = &changes.llms[0];
    assert_eq!(llm_change.id, "llm_l");
    assert_eq!(llm_change.differences.len(), 1);
    let diff = &llm_change.differences[0];
    assert_eq!(diff.kind, DiffKind::Change);
    assert_eq!(diff.path_string(), "general_prompt");
    assert_eq!(diff.value, Some(json!("B")));
    assert_eq!(diff.old_value, Some(json!("A")));

    let affected = find_affected_agent_ids(&changes, &draft);
    assert_eq!(affected, BTreeSet::from(["agent_x".to_string()]));
}

#[test]
fn publish_plan_covers_exactly_the_affected_agents() {
    let draft = canonicalize(listing(), View::Draft);
    let published = canonicalize(listing(), View::Published);
    let changes = compute_changes(&draft, &published, true).unwrap();
    let affected = find_affected_agent_ids(&changes, &draft);

    let plan = plan_publish(&affected, &draft);
    assert_eq!(
        plan,
        vec![Mutation::PublishVoiceAgent {
            id: "agent_x".to_string()
        }]
    );
}

#[test]
fn never_published_agent_shows_up_as_needing_publish() {
    let mut raw = listing();
    raw.voice_agents.push(
        serde_json::from_value(json!({
            "agent_id": "agent_fresh",
            "version": 0,
            "is_published": false,
            "agent_name": "Fresh",
            "response_engine": { "type": "custom-llm", "llm_websocket_url": "wss://x" },
        }))
        .unwrap(),
    );

    let draft = canonicalize(raw.clone(), View::Draft);
    let published = canonicalize(raw, View::Published);
    let changes = compute_changes(&draft, &published, true).unwrap();

    let fresh = changes
        .voice_agents
        .iter()
        .find(|c| c.id == "agent_fresh")
        .expect("fresh agent change");
    assert_eq!(fresh.differences.len(), 1);
    assert_eq!(fresh.differences[0].kind, DiffKind::Create);
    assert!(fresh.differences[0].path.is_empty());

    let affected = find_affected_agent_ids(&changes, &draft);
    assert!(affected.contains("agent_fresh"));
    assert!(affected.contains("agent_x"));
}
