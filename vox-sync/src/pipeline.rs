//! The pull / deploy / publish pipelines.
//!
//! Planning is separated from application so callers can print a plan,
//! confirm (or dry-run), and only then dispatch: a user abort at the prompt
//! happens strictly before any remote mutation is issued. Once a batch is
//! dispatched, in-flight calls are allowed to settle.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use vox_api::{dispatch_all, ApiClient, Mutation, MutationOutcome};
use vox_core::raw::{Publishable, RawListing, Versioned};
use vox_core::{canonicalize, canonicalize_test_cases, CanonicalState, View};
use vox_files::{read_state, serialize_state, write_tree, WriteScope, WriteSummary};

use crate::deps::find_affected_agent_ids;
use crate::diff::{compute_changes, ChangeSet};
use crate::error::SyncError;
use crate::planner::{plan_deploy, plan_phone_rebind, plan_publish};

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Which resources a pipeline run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    /// Everything the remote lists / the tree contains.
    All,
    /// An explicit resource-id subset. An id may name an agent, an engine
    /// (selecting its dependent agents), or a component.
    Ids(BTreeSet<String>),
}

impl SyncScope {
    pub fn from_ids(ids: Vec<String>) -> Self {
        if ids.is_empty() {
            SyncScope::All
        } else {
            SyncScope::Ids(ids.into_iter().collect())
        }
    }

    pub fn write_scope(&self) -> WriteScope {
        match self {
            SyncScope::All => WriteScope::Full,
            SyncScope::Ids(_) => WriteScope::Subset,
        }
    }

    /// Restrict a canonical state to the scoped resources. Engines follow
    /// their agents: naming an engine id selects every agent driven by it,
    /// and a kept agent always brings its engine along.
    pub fn filter(&self, state: CanonicalState) -> CanonicalState {
        let SyncScope::Ids(ids) = self else {
            return state;
        };

        let keep_agent = |id: &str, engine_id: Option<&str>| {
            ids.contains(id) || engine_id.map_or(false, |e| ids.contains(e))
        };

        let voice_agents: Vec<_> = state
            .voice_agents
            .into_iter()
            .filter(|a| keep_agent(&a.id, a.response_engine.engine_id()))
            .collect();
        let chat_agents: Vec<_> = state
            .chat_agents
            .into_iter()
            .filter(|a| keep_agent(&a.id, a.response_engine.engine_id()))
            .collect();

        let referenced: BTreeSet<String> = voice_agents
            .iter()
            .map(|a| &a.response_engine)
            .chain(chat_agents.iter().map(|a| &a.response_engine))
            .filter_map(|e| e.engine_id().map(str::to_string))
            .collect();

        CanonicalState {
            llms: state
                .llms
                .into_iter()
                .filter(|l| referenced.contains(&l.id))
                .collect(),
            conversation_flows: state
                .conversation_flows
                .into_iter()
                .filter(|f| referenced.contains(&f.id))
                .collect(),
            components: state
                .components
                .into_iter()
                .filter(|c| ids.contains(&c.id))
                .collect(),
            voice_agents,
            chat_agents,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared fetch stages
// ---------------------------------------------------------------------------

/// All resource-kind listings, fetched concurrently and joined.
async fn fetch_listing(client: &ApiClient) -> Result<RawListing, SyncError> {
    let (voice_agents, chat_agents, llms, conversation_flows, components) = tokio::try_join!(
        client.list_voice_agents(),
        client.list_chat_agents(),
        client.list_llms(),
        client.list_conversation_flows(),
        client.list_components(),
    )?;
    Ok(RawListing {
        voice_agents,
        chat_agents,
        llms,
        conversation_flows,
        components,
    })
}

/// Fetch every agent's test cases concurrently and attach them. Test cases
/// are optional enrichment: a fetch or parse failure skips that agent's
/// cases (named in the log) and the run continues. Returns how many
/// resources were skipped.
async fn attach_test_cases(client: &ApiClient, state: &mut CanonicalState, view: View) -> usize {
    let ids: Vec<String> = state
        .voice_agents
        .iter()
        .map(|a| a.id.clone())
        .chain(state.chat_agents.iter().map(|a| a.id.clone()))
        .collect();

    let fetches = ids.into_iter().map(|id| async move {
        let result = client.list_agent_test_cases(&id).await;
        (id, result)
    });
    let results = futures::future::join_all(fetches).await;

    let mut skipped = 0usize;
    for (id, result) in results {
        match result {
            Ok(values) => {
                let (cases, bad) = canonicalize_test_cases(values, view);
                skipped += bad;
                if let Some(agent) = state.voice_agents.iter_mut().find(|a| a.id == id) {
                    agent.test_cases = cases;
                } else if let Some(agent) = state.chat_agents.iter_mut().find(|a| a.id == id) {
                    agent.test_cases = cases;
                }
            }
            Err(err) => {
                skipped += 1;
                tracing::warn!("skipping test cases for {id}: {err}");
            }
        }
    }
    skipped
}

// ---------------------------------------------------------------------------
// Pull
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct PullOutcome {
    pub state: CanonicalState,
    pub summary: WriteSummary,
    pub skipped_test_cases: usize,
}

/// Remote draft → local tree.
pub async fn pull(
    client: &ApiClient,
    root: &Path,
    scope: &SyncScope,
    dry_run: bool,
) -> Result<PullOutcome, SyncError> {
    let raw = fetch_listing(client).await?;
    let mut state = canonicalize(raw, View::Draft);
    let skipped_test_cases = attach_test_cases(client, &mut state, View::Draft).await;
    let state = scope.filter(state);

    let tree = serialize_state(&state)?;
    let summary = write_tree(root, &tree, scope.write_scope(), dry_run)?;
    Ok(PullOutcome {
        state,
        summary,
        skipped_test_cases,
    })
}

// ---------------------------------------------------------------------------
// Deploy
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct DeployPlan {
    pub changes: ChangeSet,
    pub affected_agents: BTreeSet<String>,
    pub mutations: Vec<Mutation>,
    pub skipped_test_cases: usize,
}

/// Local tree vs. remote draft → update mutations. Nothing is dispatched.
pub async fn plan_deploy_run(
    client: &ApiClient,
    root: &Path,
    scope: &SyncScope,
) -> Result<DeployPlan, SyncError> {
    let local = scope.filter(read_state(root)?);

    let raw = fetch_listing(client).await?;
    let mut remote = canonicalize(raw, View::Draft);
    let skipped_test_cases = attach_test_cases(client, &mut remote, View::Draft).await;
    let remote = scope.filter(remote);

    let changes = compute_changes(&local, &remote, false)?;
    let affected_agents = find_affected_agent_ids(&changes, &local);
    let mutations = plan_deploy(&changes);
    Ok(DeployPlan {
        changes,
        affected_agents,
        mutations,
        skipped_test_cases,
    })
}

// ---------------------------------------------------------------------------
// Publish
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct PublishPlan {
    pub changes: ChangeSet,
    pub affected_agents: BTreeSet<String>,
    pub mutations: Vec<Mutation>,
}

/// Remote draft vs. remote published → publish mutations for every affected
/// agent. Nothing is dispatched.
pub async fn plan_publish_run(
    client: &ApiClient,
    scope: &SyncScope,
) -> Result<PublishPlan, SyncError> {
    let raw = fetch_listing(client).await?;
    let draft = scope.filter(canonicalize(raw.clone(), View::Draft));
    let published = scope.filter(canonicalize(raw, View::Published));

    let changes = compute_changes(&draft, &published, true)?;
    let affected_agents = find_affected_agent_ids(&changes, &draft);
    let mutations = plan_publish(&affected_agents, &draft);
    Ok(PublishPlan {
        changes,
        affected_agents,
        mutations,
    })
}

/// Dispatch a planned batch and wait for every call to settle.
pub async fn apply_mutations(
    client: &ApiClient,
    mutations: Vec<Mutation>,
) -> Vec<MutationOutcome> {
    dispatch_all(client, mutations).await
}

// ---------------------------------------------------------------------------
// Phone-number rebinding
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RebindOutcome {
    pub mutations: Vec<Mutation>,
    pub outcomes: Vec<MutationOutcome>,
}

/// The secondary change-set after a publish batch has settled: repin phone
/// numbers to the highest published version of each just-published agent.
/// Must not be called before every publish call has settled — it depends on
/// their outcome.
pub async fn rebind_phone_numbers(
    client: &ApiClient,
    publish_outcomes: &[MutationOutcome],
) -> Result<RebindOutcome, SyncError> {
    let just_published: BTreeSet<String> = publish_outcomes
        .iter()
        .filter(|o| o.is_ok())
        .filter_map(|o| match &o.mutation {
            Mutation::PublishVoiceAgent { id } | Mutation::PublishChatAgent { id } => {
                Some(id.clone())
            }
            _ => None,
        })
        .collect();
    if just_published.is_empty() {
        return Ok(RebindOutcome::default());
    }

    let (voice, chat, phones) = tokio::try_join!(
        client.list_voice_agents(),
        client.list_chat_agents(),
        client.list_phone_numbers(),
    )?;

    let mut published_versions: BTreeMap<String, u64> = BTreeMap::new();
    let published_entries = voice
        .iter()
        .filter(|a| a.is_published())
        .map(|a| (a.id(), a.version()))
        .chain(
            chat.iter()
                .filter(|a| a.is_published())
                .map(|a| (a.id(), a.version())),
        );
    for (id, version) in published_entries {
        let entry = published_versions.entry(id.to_string()).or_insert(version);
        if version > *entry {
            *entry = version;
        }
    }

    let mutations = plan_phone_rebind(&phones, &published_versions, &just_published);
    let outcomes = if mutations.is_empty() {
        Vec::new()
    } else {
        dispatch_all(client, mutations.clone()).await
    };
    Ok(RebindOutcome {
        mutations,
        outcomes,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> CanonicalState {
        serde_json::from_value(json!({
            "voice_agents": [
                {
                    "_id": "agent_a", "_version": 0, "agent_name": "A",
                    "response_engine": { "type": "retell-llm", "llm_id": "llm_1" },
                },
                {
                    "_id": "agent_b", "_version": 0, "agent_name": "B",
                    "response_engine": { "type": "conversation-flow", "conversation_flow_id": "flow_1" },
                },
            ],
            "llms": [{ "_id": "llm_1", "_version": 0 }],
            "conversation_flows": [{ "_id": "flow_1", "_version": 0 }],
            "components": [{ "_id": "comp_1", "_version": 0, "name": "Shared" }],
        }))
        .unwrap()
    }

    #[test]
    fn all_scope_filters_nothing() {
        let filtered = SyncScope::All.filter(state());
        assert_eq!(filtered, state());
    }

    #[test]
    fn id_scope_keeps_agent_and_its_engine() {
        let scope = SyncScope::from_ids(vec!["agent_a".into()]);
        let filtered = scope.filter(state());
        assert_eq!(filtered.voice_agents.len(), 1);
        assert_eq!(filtered.llms.len(), 1);
        assert!(filtered.conversation_flows.is_empty());
        assert!(filtered.components.is_empty());
    }

    #[test]
    fn engine_id_selects_its_dependent_agent() {
        let scope = SyncScope::from_ids(vec!["flow_1".into()]);
        let filtered = scope.filter(state());
        assert_eq!(filtered.voice_agents.len(), 1);
        assert_eq!(filtered.voice_agents[0].id, "agent_b");
        assert_eq!(filtered.conversation_flows.len(), 1);
        assert!(filtered.llms.is_empty());
    }

    #[test]
    fn component_id_selects_the_component() {
        let scope = SyncScope::from_ids(vec!["comp_1".into()]);
        let filtered = scope.filter(state());
        assert!(filtered.voice_agents.is_empty());
        assert_eq!(filtered.components.len(), 1);
    }

    #[test]
    fn empty_id_list_means_all() {
        assert_eq!(SyncScope::from_ids(Vec::new()), SyncScope::All);
    }
}
