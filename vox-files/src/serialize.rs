//! Canonical state → file map.
//!
//! Produces every file of the managed tree as a `relative path → content`
//! map, without touching the filesystem; the [`crate::writer`] applies a map
//! to disk. Identity lands in hidden JSON sidecars, mutable config in YAML,
//! rich text in markdown, positions in `.positions.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use vox_core::{CanonicalState, Component, ResponseEngine, TestCase};

use crate::error::FileError;
use crate::extract::{
    extract_component, extract_flow, extract_llm, extract_test_case, Extracted,
};
use crate::identity::{AgentIdentity, AgentKindTag, ComponentIdentity, TestCaseIdentity};
use crate::layout::{
    resource_stem, AGENT_IDENTITY_FILE, COMPONENT_IDENTITY_FILE, CONFIG_FILE, FLOW_CONFIG_FILE,
    LLM_CONFIG_FILE, POSITIONS_FILE, TESTS_DIR, TESTS_INDEX_FILE,
};

/// Relative path → file content.
pub type FileMap = BTreeMap<PathBuf, String>;

/// Everything one serialization pass produced.
#[derive(Debug, Clone, Default)]
pub struct SerializedTree {
    pub files: FileMap,
    /// Directory-owning resource id → directory name. Drives the write
    /// manifest and stale-directory cleanup.
    pub resources: BTreeMap<String, String>,
}

/// Serialize a canonical state to its on-disk form.
pub fn serialize_state(state: &CanonicalState) -> Result<SerializedTree, FileError> {
    let mut tree = SerializedTree::default();

    for agent in &state.voice_agents {
        serialize_agent(
            &mut tree,
            state,
            AgentKindTag::Voice,
            &agent.id,
            agent.version,
            agent.agent_name.as_deref(),
            &agent.response_engine,
            agent,
            &agent.test_cases,
        )?;
    }
    for agent in &state.chat_agents {
        serialize_agent(
            &mut tree,
            state,
            AgentKindTag::Chat,
            &agent.id,
            agent.version,
            agent.agent_name.as_deref(),
            &agent.response_engine,
            agent,
            &agent.test_cases,
        )?;
    }
    for component in &state.components {
        serialize_component(&mut tree, component)?;
    }

    Ok(tree)
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn serialize_agent<T: Serialize>(
    tree: &mut SerializedTree,
    state: &CanonicalState,
    kind: AgentKindTag,
    id: &str,
    version: u64,
    name: Option<&str>,
    engine: &ResponseEngine,
    agent: &T,
    test_cases: &[TestCase],
) -> Result<(), FileError> {
    let dir = PathBuf::from(resource_stem(name, id, "agent"));

    let mut engine_version = None;
    match engine {
        ResponseEngine::RetellLlm { llm_id, .. } => {
            if let Some(llm) = state.llm(llm_id) {
                engine_version = Some(llm.version);
                let extracted = extract_llm(llm)?;
                emit_extracted(tree, &dir, LLM_CONFIG_FILE, extracted)?;
            }
        }
        ResponseEngine::ConversationFlow {
            conversation_flow_id,
            ..
        } => {
            if let Some(flow) = state.conversation_flow(conversation_flow_id) {
                engine_version = Some(flow.version);
                let extracted = extract_flow(flow)?;
                emit_extracted(tree, &dir, FLOW_CONFIG_FILE, extracted)?;
            }
        }
        ResponseEngine::CustomLlm { .. } => {}
    }

    let identity = AgentIdentity {
        kind,
        agent_id: id.to_string(),
        version,
        response_engine: engine.clone(),
        engine_version,
    };
    add_file(tree, &dir, AGENT_IDENTITY_FILE, json_content(&identity)?);
    add_file(tree, &dir, CONFIG_FILE, yaml_content(&agent_config_value(agent)?)?);

    serialize_tests(tree, &dir, test_cases)?;

    tree.resources
        .insert(id.to_string(), dir.to_string_lossy().into_owned());
    Ok(())
}

/// Agent config: full serialized form minus identity and the engine
/// reference (which lives complete in `.agent.json`).
fn agent_config_value<T: Serialize>(agent: &T) -> Result<Value, FileError> {
    let mut map = match serde_json::to_value(agent)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    map.remove(vox_core::state::ID_FIELD);
    map.remove(vox_core::state::VERSION_FIELD);
    map.remove("response_engine");
    Ok(Value::Object(map))
}

fn serialize_tests(
    tree: &mut SerializedTree,
    dir: &Path,
    test_cases: &[TestCase],
) -> Result<(), FileError> {
    if test_cases.is_empty() {
        return Ok(());
    }
    let mut index: BTreeMap<String, TestCaseIdentity> = BTreeMap::new();
    for case in test_cases {
        let stem = resource_stem(case.name.as_deref(), &case.id, "test");
        index.insert(
            stem.clone(),
            TestCaseIdentity {
                test_case_id: case.id.clone(),
                version: case.version,
            },
        );
        let extracted = extract_test_case(case, &stem)?;
        add_file(
            tree,
            dir,
            &format!("{TESTS_DIR}/{stem}.yaml"),
            yaml_content(&extracted.config)?,
        );
        for (path, body) in extracted.documents {
            tree.files.insert(dir.join(path), body);
        }
    }
    add_file(
        tree,
        dir,
        &format!("{TESTS_DIR}/{TESTS_INDEX_FILE}"),
        json_content(&index)?,
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

fn serialize_component(tree: &mut SerializedTree, component: &Component) -> Result<(), FileError> {
    let dir = PathBuf::from(resource_stem(
        component.name.as_deref(),
        &component.id,
        "component",
    ));
    let identity = ComponentIdentity {
        component_id: component.id.clone(),
        version: component.version,
    };
    add_file(tree, &dir, COMPONENT_IDENTITY_FILE, json_content(&identity)?);

    let extracted = extract_component(component)?;
    emit_extracted(tree, &dir, CONFIG_FILE, extracted)?;

    tree.resources
        .insert(component.id.clone(), dir.to_string_lossy().into_owned());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn emit_extracted(
    tree: &mut SerializedTree,
    dir: &Path,
    config_name: &str,
    extracted: Extracted,
) -> Result<(), FileError> {
    add_file(tree, dir, config_name, yaml_content(&extracted.config)?);
    for (path, body) in extracted.documents {
        tree.files.insert(dir.join(path), body);
    }
    if !extracted.positions.is_empty() {
        add_file(tree, dir, POSITIONS_FILE, json_content(&extracted.positions)?);
    }
    Ok(())
}

fn add_file(tree: &mut SerializedTree, dir: &Path, name: &str, content: String) {
    tree.files.insert(dir.join(name), content);
}

fn json_content<T: Serialize>(value: &T) -> Result<String, FileError> {
    let mut out = serde_json::to_string_pretty(value)?;
    out.push('\n');
    Ok(out)
}

fn yaml_content<T: Serialize>(value: &T) -> Result<String, FileError> {
    Ok(serde_yaml::to_string(value)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
