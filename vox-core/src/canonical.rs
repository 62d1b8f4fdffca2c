//! Canonicalizer: raw version-stamped listings → a normalized
//! [`CanonicalState`] for one view.
//!
//! Pipeline per listing:
//! 1. View selection — draft keeps every id's latest entry; published first
//!    filters to entries flagged published, then keeps the latest.
//! 2. Cross-reference filtering — an LLM/flow survives only if a surviving
//!    agent's response engine names it and agrees on publish state.
//! 3. Readonly stripping — raw → canonical conversion drops timestamps,
//!    publish flags, and version titles by construction.

use std::collections::HashMap;

use serde_json::Value;

use crate::raw::{Publishable, RawListing, RawTestCase, Versioned};
use crate::state::{CanonicalState, TestCase};
use crate::types::ResponseEngine;

/// Which live state of the remote resources a canonical snapshot describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Latest entry per id — always mutable.
    Draft,
    /// Latest entry per id among those flagged published.
    Published,
}

// ---------------------------------------------------------------------------
// Latest-version selection
// ---------------------------------------------------------------------------

/// Single pass over a listing in which each id may appear once per
/// historical version; retains, per id, the entry with the numerically
/// greatest version. Strict greater-than comparison, so the first entry seen
/// wins a version tie. The API does not document `(id, version)` uniqueness;
/// the tie-break lives here and nowhere else.
///
/// Output preserves first-seen id order.
pub fn keep_latest_version<T: Versioned>(items: Vec<T>) -> Vec<T> {
    let mut order: Vec<String> = Vec::new();
    let mut kept: HashMap<String, T> = HashMap::new();
    for item in items {
        match kept.get(item.id()) {
            Some(existing) if item.version() <= existing.version() => {}
            Some(_) => {
                kept.insert(item.id().to_owned(), item);
            }
            None => {
                order.push(item.id().to_owned());
                kept.insert(item.id().to_owned(), item);
            }
        }
    }
    order.into_iter().filter_map(|id| kept.remove(&id)).collect()
}

/// View selection over one listing.
pub fn select_view<T: Publishable>(items: Vec<T>, view: View) -> Vec<T> {
    match view {
        View::Draft => keep_latest_version(items),
        View::Published => {
            keep_latest_version(items.into_iter().filter(|i| i.is_published()).collect())
        }
    }
}

// ---------------------------------------------------------------------------
// Cross-reference filtering
// ---------------------------------------------------------------------------

/// One engine reference held by a surviving agent, with that agent's
/// publish flag.
struct EngineRef {
    id: String,
    version: Option<u64>,
    published: bool,
}

impl EngineRef {
    /// A reference without a version pin matches any version of the id; the
    /// publish states must agree either way.
    fn matches<T: Publishable>(&self, engine: &T) -> bool {
        self.id == engine.id()
            && self.version.map_or(true, |v| v == engine.version())
            && self.published == engine.is_published()
    }
}

fn engine_ref(engine: &ResponseEngine, published: bool) -> Option<(EngineRefKind, EngineRef)> {
    match engine {
        ResponseEngine::RetellLlm { llm_id, version } => Some((
            EngineRefKind::Llm,
            EngineRef {
                id: llm_id.clone(),
                version: *version,
                published,
            },
        )),
        ResponseEngine::CustomLlm { .. } => None,
        ResponseEngine::ConversationFlow {
            conversation_flow_id,
            version,
        } => Some((
            EngineRefKind::Flow,
            EngineRef {
                id: conversation_flow_id.clone(),
                version: *version,
                published,
            },
        )),
    }
}

enum EngineRefKind {
    Llm,
    Flow,
}

// ---------------------------------------------------------------------------
// Canonicalize
// ---------------------------------------------------------------------------

/// Build the canonical snapshot of `raw` for `view`.
pub fn canonicalize(raw: RawListing, view: View) -> CanonicalState {
    let voice_agents = select_view(raw.voice_agents, view);
    let chat_agents = select_view(raw.chat_agents, view);
    let llms = select_view(raw.llms, view);
    let conversation_flows = select_view(raw.conversation_flows, view);
    let components = select_view(raw.components, view);

    let mut llm_refs: Vec<EngineRef> = Vec::new();
    let mut flow_refs: Vec<EngineRef> = Vec::new();
    let agent_engines = voice_agents
        .iter()
        .map(|a| (&a.response_engine, a.is_published()))
        .chain(
            chat_agents
                .iter()
                .map(|a| (&a.response_engine, a.is_published())),
        );
    for (engine, published) in agent_engines {
        match engine_ref(engine, published) {
            Some((EngineRefKind::Llm, r)) => llm_refs.push(r),
            Some((EngineRefKind::Flow, r)) => flow_refs.push(r),
            None => {}
        }
    }

    let llms: Vec<_> = llms
        .into_iter()
        .filter(|llm| llm_refs.iter().any(|r| r.matches(llm)))
        .collect();
    let conversation_flows: Vec<_> = conversation_flows
        .into_iter()
        .filter(|flow| flow_refs.iter().any(|r| r.matches(flow)))
        .collect();

    CanonicalState {
        voice_agents: voice_agents.into_iter().map(Into::into).collect(),
        chat_agents: chat_agents.into_iter().map(Into::into).collect(),
        llms: llms.into_iter().map(Into::into).collect(),
        conversation_flows: conversation_flows.into_iter().map(Into::into).collect(),
        components: components.into_iter().map(Into::into).collect(),
    }
}

/// Canonicalize one agent's test-case listing. Test cases are optional
/// enrichment: an entry that fails its shape is logged and dropped rather
/// than failing the run. Returns the surviving canonical test cases and the
/// number skipped.
pub fn canonicalize_test_cases(entries: Vec<Value>, view: View) -> (Vec<TestCase>, usize) {
    let mut parsed: Vec<RawTestCase> = Vec::new();
    let mut skipped = 0usize;
    for entry in entries {
        match serde_json::from_value::<RawTestCase>(entry) {
            Ok(raw) => parsed.push(raw),
            Err(err) => {
                skipped += 1;
                tracing::warn!("skipping malformed test case: {err}");
            }
        }
    }
    let selected = select_view(parsed, view);
    (selected.into_iter().map(Into::into).collect(), skipped)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{RawLlm, RawVoiceAgent};
    use rstest::rstest;
    use serde_json::json;

    fn raw_llm(id: &str, version: u64, published: bool) -> RawLlm {
        serde_json::from_value(json!({
            "llm_id": id,
            "version": version,
            "is_published": published,
            "general_prompt": format!("prompt v{version}"),
        }))
        .unwrap()
    }

    fn raw_agent(id: &str, version: u64, published: bool, llm: (&str, Option<u64>)) -> RawVoiceAgent {
        let mut engine = json!({ "type": "retell-llm", "llm_id": llm.0 });
        if let Some(v) = llm.1 {
            engine["version"] = json!(v);
        }
        serde_json::from_value(json!({
            "agent_id": id,
            "version": version,
            "is_published": published,
            "agent_name": format!("Agent {id}"),
            "response_engine": engine,
        }))
        .unwrap()
    }

    #[test]
    fn latest_version_survives_regardless_of_order() {
        let items = vec![
            raw_llm("llm_1", 0, false),
            raw_llm("llm_1", 2, false),
            raw_llm("llm_1", 1, false),
        ];
        let kept = keep_latest_version(items);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].version, 2);
    }

    #[test]
    fn version_tie_keeps_first_seen() {
        let mut a = raw_llm("llm_1", 1, false);
        a.general_prompt = Some("first".into());
        let mut b = raw_llm("llm_1", 1, false);
        b.general_prompt = Some("second".into());
        let kept = keep_latest_version(vec![a, b]);
        assert_eq!(kept[0].general_prompt.as_deref(), Some("first"));
    }

    #[test]
    fn keep_latest_preserves_first_seen_id_order() {
        let items = vec![
            raw_llm("llm_b", 0, false),
            raw_llm("llm_a", 0, false),
            raw_llm("llm_b", 3, false),
        ];
        let ids: Vec<_> = keep_latest_version(items)
            .into_iter()
            .map(|l| l.llm_id)
            .collect();
        assert_eq!(ids, vec!["llm_b", "llm_a"]);
    }

    #[rstest]
    #[case(View::Draft, 2)]
    #[case(View::Published, 1)]
    fn view_selects_latest_of_eligible_entries(#[case] view: View, #[case] expected: u64) {
        let items = vec![
            raw_llm("llm_1", 0, true),
            raw_llm("llm_1", 1, true),
            raw_llm("llm_1", 2, false),
        ];
        let kept = select_view(items, view);
        assert_eq!(kept[0].version, expected);
    }

    #[test]
    fn unreferenced_llm_is_dropped() {
        let raw = RawListing {
            voice_agents: vec![raw_agent("agent_1", 0, false, ("llm_used", Some(0)))],
            llms: vec![raw_llm("llm_used", 0, false), raw_llm("llm_orphan", 0, false)],
            ..Default::default()
        };
        let state = canonicalize(raw, View::Draft);
        assert_eq!(state.llms.len(), 1);
        assert_eq!(state.llms[0].id, "llm_used");
    }

    #[test]
    fn draft_engine_does_not_leak_into_published_view() {
        // Published agent pins llm v1; a newer draft llm v2 exists.
        let raw = RawListing {
            voice_agents: vec![
                raw_agent("agent_1", 0, true, ("llm_1", Some(1))),
                raw_agent("agent_1", 1, false, ("llm_1", Some(2))),
            ],
            llms: vec![
                raw_llm("llm_1", 1, true),
                raw_llm("llm_1", 2, false),
            ],
            ..Default::default()
        };

        let published = canonicalize(raw.clone(), View::Published);
        assert_eq!(published.llms.len(), 1);
        assert_eq!(published.llms[0].version, 1);

        let draft = canonicalize(raw, View::Draft);
        assert_eq!(draft.llms.len(), 1);
        assert_eq!(draft.llms[0].version, 2);
    }

    #[test]
    fn unversioned_reference_matches_any_version() {
        let raw = RawListing {
            voice_agents: vec![raw_agent("agent_1", 0, false, ("llm_1", None))],
            llms: vec![raw_llm("llm_1", 5, false)],
            ..Default::default()
        };
        let state = canonicalize(raw, View::Draft);
        assert_eq!(state.llms.len(), 1);
    }

    #[test]
    fn publish_state_mismatch_filters_engine_out() {
        // Draft view: agent's latest entry is a draft, but the llm's only
        // surviving entry is published — states disagree, llm is dropped.
        let raw = RawListing {
            voice_agents: vec![raw_agent("agent_1", 1, false, ("llm_1", Some(3)))],
            llms: vec![raw_llm("llm_1", 3, true)],
            ..Default::default()
        };
        let state = canonicalize(raw, View::Draft);
        assert!(state.llms.is_empty());
    }

    #[test]
    fn malformed_test_case_is_skipped_not_fatal() {
        let entries = vec![
            json!({ "test_case_id": "test_1", "version": 0, "name": "smoke" }),
            json!({ "version": "not-an-id" }),
        ];
        let (cases, skipped) = canonicalize_test_cases(entries, View::Draft);
        assert_eq!(cases.len(), 1);
        assert_eq!(skipped, 1);
        assert_eq!(cases[0].id, "test_1");
    }
}
