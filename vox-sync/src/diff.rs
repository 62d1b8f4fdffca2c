//! Structural diff engine.
//!
//! Before comparison, every array whose elements all carry a unique string
//! `id` is rewritten into an object keyed by those ids. That makes the diff
//! blind to element order and compare-by-identity instead of
//! compare-by-position — the API and the file reader are free to emit
//! nodes, edges, and tool entries in different orders.
//!
//! Identity/version fields never reach the diff: resources are projected
//! through [`CanonicalResource::mutable_value`], which also keeps
//! `response_engine` out of an agent's surface except for the custom-llm
//! variant.

use serde_json::Value;

use vox_core::{CanonicalResource, CanonicalState};

use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Diff entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Create,
    Change,
    Remove,
}

/// One structural difference between two config trees.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    pub kind: DiffKind,
    pub path: Vec<String>,
    /// Candidate-side value for `Create`/`Change`.
    pub value: Option<Value>,
    /// Reference-side value for `Change`/`Remove`.
    pub old_value: Option<Value>,
}

impl DiffEntry {
    pub fn path_string(&self) -> String {
        self.path.join(".")
    }
}

// ---------------------------------------------------------------------------
// id-keyed rewriting
// ---------------------------------------------------------------------------

/// Recursively rewrite id-carrying arrays into id-keyed objects, dropping
/// the `id` key from each element.
pub fn key_arrays_by_id(value: Value) -> Value {
    match value {
        Value::Array(items) => match try_key_by_id(&items) {
            Some(pairs) => Value::Object(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k, key_arrays_by_id(v)))
                    .collect(),
            ),
            None => Value::Array(items.into_iter().map(key_arrays_by_id).collect()),
        },
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, key_arrays_by_id(v)))
                .collect(),
        ),
        other => other,
    }
}

/// `Some(pairs)` when every element is an object with a unique string `id`.
fn try_key_by_id(items: &[Value]) -> Option<Vec<(String, Value)>> {
    if items.is_empty() {
        return None;
    }
    let mut pairs = Vec::with_capacity(items.len());
    let mut seen = std::collections::BTreeSet::new();
    for item in items {
        let obj = item.as_object()?;
        let id = obj.get("id")?.as_str()?;
        if !seen.insert(id.to_string()) {
            return None;
        }
        let mut rest = obj.clone();
        rest.remove("id");
        pairs.push((id.to_string(), Value::Object(rest)));
    }
    Some(pairs)
}

// ---------------------------------------------------------------------------
// Structural diff
// ---------------------------------------------------------------------------

/// Structural differences between two trees, ordered by traversal of the
/// candidate side. Equal trees produce an empty list.
pub fn diff_values(reference: &Value, candidate: &Value) -> Vec<DiffEntry> {
    let reference = key_arrays_by_id(reference.clone());
    let candidate = key_arrays_by_id(candidate.clone());
    let mut entries = Vec::new();
    diff_into(&reference, &candidate, &mut Vec::new(), &mut entries);
    entries
}

fn diff_into(
    reference: &Value,
    candidate: &Value,
    path: &mut Vec<String>,
    out: &mut Vec<DiffEntry>,
) {
    match (reference, candidate) {
        (Value::Object(r), Value::Object(c)) => {
            for (key, cv) in c {
                path.push(key.clone());
                match r.get(key) {
                    Some(rv) => diff_into(rv, cv, path, out),
                    None => out.push(DiffEntry {
                        kind: DiffKind::Create,
                        path: path.clone(),
                        value: Some(cv.clone()),
                        old_value: None,
                    }),
                }
                path.pop();
            }
            for (key, rv) in r {
                if c.contains_key(key) {
                    continue;
                }
                path.push(key.clone());
                out.push(DiffEntry {
                    kind: DiffKind::Remove,
                    path: path.clone(),
                    value: None,
                    old_value: Some(rv.clone()),
                });
                path.pop();
            }
        }
        _ => {
            if reference != candidate {
                out.push(DiffEntry {
                    kind: DiffKind::Change,
                    path: path.clone(),
                    value: Some(candidate.clone()),
                    old_value: Some(reference.clone()),
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Change sets
// ---------------------------------------------------------------------------

/// One changed resource: its identity, the source-side mutable projection,
/// and the filtered diff list (always non-empty).
#[derive(Debug, Clone)]
pub struct ResourceChange {
    pub id: String,
    pub name: Option<String>,
    pub current: Value,
    pub differences: Vec<DiffEntry>,
}

/// Per-kind changed resources between two canonical states.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub voice_agents: Vec<ResourceChange>,
    pub chat_agents: Vec<ResourceChange>,
    pub llms: Vec<ResourceChange>,
    pub conversation_flows: Vec<ResourceChange>,
    pub components: Vec<ResourceChange>,
    pub test_cases: Vec<ResourceChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.voice_agents.len()
            + self.chat_agents.len()
            + self.llms.len()
            + self.conversation_flows.len()
            + self.components.len()
            + self.test_cases.len()
    }
}

/// Compare `source` against `reference`, per kind and per id.
///
/// `include_new = true` reports a resource present only in `source` as a
/// single synthetic root `Create` (draft vs. published: an
/// unpublished-but-drafted resource must show up). `include_new = false`
/// skips such resources (local vs. remote draft: new-only-locally resources
/// cannot be pushed through update calls).
pub fn compute_changes(
    source: &CanonicalState,
    reference: &CanonicalState,
    include_new: bool,
) -> Result<ChangeSet, SyncError> {
    Ok(ChangeSet {
        voice_agents: diff_collection(&source.voice_agents, &reference.voice_agents, include_new)?,
        chat_agents: diff_collection(&source.chat_agents, &reference.chat_agents, include_new)?,
        llms: diff_collection(&source.llms, &reference.llms, include_new)?,
        conversation_flows: diff_collection(
            &source.conversation_flows,
            &reference.conversation_flows,
            include_new,
        )?,
        components: diff_collection(&source.components, &reference.components, include_new)?,
        test_cases: diff_collection(
            &collect_test_cases(source),
            &collect_test_cases(reference),
            include_new,
        )?,
    })
}

fn diff_collection<T: CanonicalResource>(
    source: &[T],
    reference: &[T],
    include_new: bool,
) -> Result<Vec<ResourceChange>, SyncError> {
    let mut changes = Vec::new();
    for item in source {
        let current = item.mutable_value()?;
        match reference.iter().find(|r| r.id() == item.id()) {
            Some(counterpart) => {
                let differences = diff_values(&counterpart.mutable_value()?, &current);
                if differences.is_empty() {
                    continue;
                }
                changes.push(ResourceChange {
                    id: item.id().to_string(),
                    name: item.display_name().map(str::to_string),
                    current,
                    differences,
                });
            }
            None if include_new => changes.push(ResourceChange {
                id: item.id().to_string(),
                name: item.display_name().map(str::to_string),
                current: current.clone(),
                differences: vec![DiffEntry {
                    kind: DiffKind::Create,
                    path: Vec::new(),
                    value: Some(current),
                    old_value: None,
                }],
            }),
            None => {}
        }
    }
    Ok(changes)
}

/// Test cases live on their owning agents; flatten them for per-id diffing.
fn collect_test_cases(state: &CanonicalState) -> Vec<vox_core::TestCase> {
    let mut cases: Vec<vox_core::TestCase> = Vec::new();
    let all = state
        .voice_agents
        .iter()
        .flat_map(|a| a.test_cases.iter())
        .chain(state.chat_agents.iter().flat_map(|a| a.test_cases.iter()));
    for case in all {
        if cases.iter().all(|c| c.id != case.id) {
            cases.push(case.clone());
        }
    }
    cases
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
