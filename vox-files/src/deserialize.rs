//! Directory tree → canonical state.
//!
//! The reverse of [`crate::serialize`]: identity sidecars pin ids and
//! versions, `file://` placeholders are resolved through the config trees,
//! and `.positions.json` entries are merged back onto matching node ids,
//! component names, and the flow root. A missing sidecar or engine file
//! means "field absent"; a dangling placeholder is fatal for its resource.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use vox_core::state::{ID_FIELD, VERSION_FIELD};
use vox_core::{CanonicalState, ChatAgent, Component, Llm, ResponseEngine, TestCase, VoiceAgent};

use crate::error::{io_err, parse_err, FileError};
use crate::extract::{resolve_placeholders, SidecarPosition};
use crate::identity::{AgentIdentity, AgentKindTag, ComponentIdentity, TestCaseIdentity};
use crate::layout::{
    AGENT_IDENTITY_FILE, BEGIN_POSITION_KEY, COMPONENT_IDENTITY_FILE, CONFIG_FILE,
    FLOW_CONFIG_FILE, LLM_CONFIG_FILE, POSITIONS_FILE, TESTS_DIR, TESTS_INDEX_FILE,
};

/// Read every managed resource directory under `root`.
///
/// A directory is managed when it carries an identity sidecar; anything else
/// is ignored. A nonexistent root reads as the empty state.
pub fn read_state(root: &Path) -> Result<CanonicalState, FileError> {
    let mut state = CanonicalState::default();
    if !root.exists() {
        return Ok(state);
    }

    let mut entries: Vec<_> = std::fs::read_dir(root)
        .map_err(|e| io_err(root, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let dir = entry.path();
        if dir.join(AGENT_IDENTITY_FILE).exists() {
            read_agent_dir(&dir, &mut state)?;
        } else if dir.join(COMPONENT_IDENTITY_FILE).exists() {
            read_component_dir(&dir, &mut state)?;
        }
    }
    Ok(state)
}

// ---------------------------------------------------------------------------
// Agent directories
// ---------------------------------------------------------------------------

fn read_agent_dir(dir: &Path, state: &mut CanonicalState) -> Result<(), FileError> {
    let identity: AgentIdentity = read_json(&dir.join(AGENT_IDENTITY_FILE))?;

    let config_path = dir.join(CONFIG_FILE);
    let config = resolve_placeholders(read_yaml_value(&config_path)?, dir)?;
    let mut map = into_object(config, &config_path)?;
    map.insert(ID_FIELD.to_string(), json!(identity.agent_id));
    map.insert(VERSION_FIELD.to_string(), json!(identity.version));
    map.insert(
        "response_engine".to_string(),
        serde_json::to_value(&identity.response_engine)?,
    );
    let test_cases = read_tests(dir)?;

    match identity.kind {
        AgentKindTag::Voice => {
            if state.voice_agents.iter().any(|a| a.id == identity.agent_id) {
                tracing::warn!(
                    "duplicate voice agent {} at {}, keeping first",
                    identity.agent_id,
                    dir.display()
                );
                return Ok(());
            }
            let mut agent: VoiceAgent = from_object(map, &config_path)?;
            agent.test_cases = test_cases;
            state.voice_agents.push(agent);
        }
        AgentKindTag::Chat => {
            if state.chat_agents.iter().any(|a| a.id == identity.agent_id) {
                tracing::warn!(
                    "duplicate chat agent {} at {}, keeping first",
                    identity.agent_id,
                    dir.display()
                );
                return Ok(());
            }
            let mut agent: ChatAgent = from_object(map, &config_path)?;
            agent.test_cases = test_cases;
            state.chat_agents.push(agent);
        }
    }

    read_engine(dir, &identity, state)
}

/// Load the engine config serialized beside an agent, if present. Two agent
/// directories may carry the same shared engine; the first one read wins.
fn read_engine(
    dir: &Path,
    identity: &AgentIdentity,
    state: &mut CanonicalState,
) -> Result<(), FileError> {
    match &identity.response_engine {
        ResponseEngine::RetellLlm { llm_id, version } => {
            let path = dir.join(LLM_CONFIG_FILE);
            if !path.exists() || state.llm(llm_id).is_some() {
                return Ok(());
            }
            let value = resolve_placeholders(read_yaml_value(&path)?, dir)?;
            let mut map = into_object(value, &path)?;
            map.insert(ID_FIELD.to_string(), json!(llm_id));
            map.insert(
                VERSION_FIELD.to_string(),
                json!(identity.engine_version.or(*version).unwrap_or(0)),
            );
            let llm: Llm = from_object(map, &path)?;
            state.llms.push(llm);
        }
        ResponseEngine::ConversationFlow {
            conversation_flow_id,
            version,
        } => {
            let path = dir.join(FLOW_CONFIG_FILE);
            if !path.exists() || state.conversation_flow(conversation_flow_id).is_some() {
                return Ok(());
            }
            let value = resolve_placeholders(read_yaml_value(&path)?, dir)?;
            let positions = read_positions(dir)?;
            let mut map = into_object(value, &path)?;
            merge_node_positions(&mut map, &positions);
            if let Some(begin) = positions.get(BEGIN_POSITION_KEY) {
                map.insert(
                    "begin_tag_display_position".to_string(),
                    position_value(begin),
                );
            }
            map.insert(ID_FIELD.to_string(), json!(conversation_flow_id));
            map.insert(
                VERSION_FIELD.to_string(),
                json!(identity.engine_version.or(*version).unwrap_or(0)),
            );
            let flow = from_object(map, &path)?;
            state.conversation_flows.push(flow);
        }
        ResponseEngine::CustomLlm { .. } => {}
    }
    Ok(())
}

fn read_tests(dir: &Path) -> Result<Vec<TestCase>, FileError> {
    let index_path = dir.join(TESTS_DIR).join(TESTS_INDEX_FILE);
    if !index_path.exists() {
        return Ok(Vec::new());
    }
    let index: BTreeMap<String, TestCaseIdentity> = read_json(&index_path)?;
    let mut cases = Vec::new();
    for (stem, id) in index {
        let yaml_path = dir.join(TESTS_DIR).join(format!("{stem}.yaml"));
        let value = resolve_placeholders(read_yaml_value(&yaml_path)?, dir)?;
        let mut map = into_object(value, &yaml_path)?;
        map.insert(ID_FIELD.to_string(), json!(id.test_case_id));
        map.insert(VERSION_FIELD.to_string(), json!(id.version));
        cases.push(from_object(map, &yaml_path)?);
    }
    Ok(cases)
}

// ---------------------------------------------------------------------------
// Component directories
// ---------------------------------------------------------------------------

fn read_component_dir(dir: &Path, state: &mut CanonicalState) -> Result<(), FileError> {
    let identity: ComponentIdentity = read_json(&dir.join(COMPONENT_IDENTITY_FILE))?;
    if state
        .components
        .iter()
        .any(|c| c.id == identity.component_id)
    {
        tracing::warn!(
            "duplicate component {} at {}, keeping first",
            identity.component_id,
            dir.display()
        );
        return Ok(());
    }

    let config_path = dir.join(CONFIG_FILE);
    let value = resolve_placeholders(read_yaml_value(&config_path)?, dir)?;
    let positions = read_positions(dir)?;
    let mut map = into_object(value, &config_path)?;
    merge_node_positions(&mut map, &positions);

    // The component's own position is keyed by its name, falling back to id.
    let own_key = map
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(&identity.component_id)
        .to_string();
    if let Some(own) = positions.get(&own_key) {
        map.insert("display_position".to_string(), position_value(own));
    }

    map.insert(ID_FIELD.to_string(), json!(identity.component_id));
    map.insert(VERSION_FIELD.to_string(), json!(identity.version));
    let component: Component = from_object(map, &config_path)?;
    state.components.push(component);
    Ok(())
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

fn read_positions(dir: &Path) -> Result<BTreeMap<String, SidecarPosition>, FileError> {
    let path = dir.join(POSITIONS_FILE);
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    read_json(&path)
}

fn merge_node_positions(map: &mut Map<String, Value>, positions: &BTreeMap<String, SidecarPosition>) {
    if positions.is_empty() {
        return;
    }
    let Some(Value::Array(nodes)) = map.get_mut("nodes") else {
        return;
    };
    for node in nodes {
        let Some(obj) = node.as_object_mut() else {
            continue;
        };
        let Some(id) = obj.get("id").and_then(Value::as_str) else {
            continue;
        };
        if let Some(pos) = positions.get(id) {
            let pos = position_value(pos);
            obj.insert("display_position".to_string(), pos);
        }
    }
}

fn position_value(pos: &SidecarPosition) -> Value {
    json!({ "x": pos.x, "y": pos.y })
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, FileError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&contents).map_err(|e| parse_err(path, e))
}

/// Read a YAML file into a JSON value. A missing file reads as an empty
/// object — produced trees always carry the config file, but a hand-pruned
/// tree is still valid.
fn read_yaml_value(path: &Path) -> Result<Value, FileError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str(&contents).map_err(|e| parse_err(path, e)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Value::Object(Map::new())),
        Err(e) => Err(io_err(path, e)),
    }
}

fn into_object(value: Value, path: &Path) -> Result<Map<String, Value>, FileError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(parse_err(
            path,
            format!("expected a mapping, found {other}"),
        )),
    }
}

fn from_object<T: DeserializeOwned>(map: Map<String, Value>, path: &Path) -> Result<T, FileError> {
    serde_json::from_value(Value::Object(map)).map_err(|e| parse_err(path, e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn agent_identity(root: &Path, dir: &str) {
        write(
            root,
            &format!("{dir}/.agent.json"),
            r#"{
  "kind": "voice",
  "agent_id": "agent_1",
  "version": 2,
  "response_engine": { "type": "retell-llm", "llm_id": "llm_1", "version": 2 }
}
"#,
        );
    }

    #[test]
    fn empty_root_reads_as_empty_state() {
        let root = TempDir::new().unwrap();
        let state = read_state(root.path()).unwrap();
        assert!(state.is_empty());
        assert!(read_state(&root.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn agent_dir_rebuilds_identity_and_config() {
        let root = TempDir::new().unwrap();
        agent_identity(root.path(), "support_nt-1");
        write(
            root.path(),
            "support_nt-1/config.yaml",
            "agent_name: Support\nvoice_id: 11labs-kate\n",
        );

        let state = read_state(root.path()).unwrap();
        assert_eq!(state.voice_agents.len(), 1);
        let agent = &state.voice_agents[0];
        assert_eq!(agent.id, "agent_1");
        assert_eq!(agent.version, 2);
        assert_eq!(agent.agent_name.as_deref(), Some("Support"));
        assert_eq!(agent.extra["voice_id"], "11labs-kate");
    }

    #[test]
    fn missing_engine_file_is_field_absent() {
        let root = TempDir::new().unwrap();
        agent_identity(root.path(), "support_nt-1");
        write(root.path(), "support_nt-1/config.yaml", "agent_name: S\n");
        let state = read_state(root.path()).unwrap();
        assert!(state.llms.is_empty());
    }

    #[test]
    fn engine_identity_comes_from_agent_sidecar() {
        let root = TempDir::new().unwrap();
        agent_identity(root.path(), "support_nt-1");
        write(root.path(), "support_nt-1/config.yaml", "agent_name: S\n");
        write(
            root.path(),
            "support_nt-1/llm.yaml",
            "general_prompt: file://prompt.md\nmodel: gpt-4o\n",
        );
        write(root.path(), "support_nt-1/prompt.md", "Be kind.\n");

        let state = read_state(root.path()).unwrap();
        assert_eq!(state.llms.len(), 1);
        assert_eq!(state.llms[0].id, "llm_1");
        assert_eq!(state.llms[0].version, 2);
        assert_eq!(state.llms[0].general_prompt.as_deref(), Some("Be kind."));
    }

    #[test]
    fn positions_sidecar_merges_onto_nodes() {
        let root = TempDir::new().unwrap();
        write(
            root.path(),
            "flowy_nt-1/.agent.json",
            r#"{
  "kind": "voice",
  "agent_id": "agent_1",
  "version": 0,
  "response_engine": { "type": "conversation-flow", "conversation_flow_id": "flow_1", "version": 0 }
}
"#,
        );
        write(root.path(), "flowy_nt-1/config.yaml", "agent_name: Flowy\n");
        write(
            root.path(),
            "flowy_nt-1/conversation-flow.yaml",
            "nodes:\n- type: end\n  id: node-1\n  name: Bye\n",
        );
        write(
            root.path(),
            "flowy_nt-1/.positions.json",
            r#"{ "node-1": { "x": 120, "y": 40 }, "begin": { "x": 1, "y": 2 } }"#,
        );

        let state = read_state(root.path()).unwrap();
        let flow = &state.conversation_flows[0];
        let pos = flow.nodes[0].display_position().unwrap();
        assert_eq!((pos.x, pos.y), (120.0, 40.0));
        let begin = flow.begin_tag_display_position.unwrap();
        assert_eq!((begin.x, begin.y), (1.0, 2.0));
    }

    #[test]
    fn missing_positions_sidecar_is_tolerated() {
        let root = TempDir::new().unwrap();
        write(
            root.path(),
            "flowy_nt-1/.agent.json",
            r#"{
  "kind": "voice",
  "agent_id": "agent_1",
  "version": 0,
  "response_engine": { "type": "conversation-flow", "conversation_flow_id": "flow_1" },
  "engine_version": 4
}
"#,
        );
        write(root.path(), "flowy_nt-1/config.yaml", "agent_name: Flowy\n");
        write(
            root.path(),
            "flowy_nt-1/conversation-flow.yaml",
            "nodes:\n- type: end\n  id: node-1\n",
        );

        let state = read_state(root.path()).unwrap();
        let flow = &state.conversation_flows[0];
        assert_eq!(flow.version, 4);
        assert_eq!(flow.nodes[0].display_position(), None);
        assert!(flow.begin_tag_display_position.is_none());
    }

    #[test]
    fn dangling_placeholder_is_fatal() {
        let root = TempDir::new().unwrap();
        agent_identity(root.path(), "support_nt-1");
        write(root.path(), "support_nt-1/config.yaml", "agent_name: S\n");
        write(
            root.path(),
            "support_nt-1/llm.yaml",
            "general_prompt: file://prompt.md\n",
        );
        let err = read_state(root.path()).unwrap_err();
        assert!(matches!(err, FileError::DanglingPlaceholder { .. }));
    }

    #[test]
    fn tests_directory_attaches_to_agent() {
        let root = TempDir::new().unwrap();
        agent_identity(root.path(), "support_nt-1");
        write(root.path(), "support_nt-1/config.yaml", "agent_name: S\n");
        write(
            root.path(),
            "support_nt-1/tests/.tests.json",
            r#"{ "smoke_test-1": { "test_case_id": "test_1", "version": 0 } }"#,
        );
        write(
            root.path(),
            "support_nt-1/tests/smoke_test-1.yaml",
            "name: smoke\nuser_prompt: file://tests/smoke_test-1_prompt.md\n",
        );
        write(
            root.path(),
            "support_nt-1/tests/smoke_test-1_prompt.md",
            "Ask about billing\n",
        );

        let state = read_state(root.path()).unwrap();
        let cases = &state.voice_agents[0].test_cases;
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].id, "test_1");
        assert_eq!(cases[0].user_prompt.as_deref(), Some("Ask about billing"));
    }

    #[test]
    fn unmanaged_directories_are_ignored() {
        let root = TempDir::new().unwrap();
        write(root.path(), "notes/README.md", "not ours\n");
        let state = read_state(root.path()).unwrap();
        assert!(state.is_empty());
    }
}
