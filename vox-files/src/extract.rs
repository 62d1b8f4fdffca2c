//! Rich-text and position extraction.
//!
//! Extraction is a pure transform: it takes a canonical resource by
//! reference and produces a new config tree with `file://` placeholders, the
//! side documents, and the position sidecar map. The canonical model is
//! never edited in place, so the in-memory state and the about-to-be-written
//! state cannot alias.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use vox_core::{
    CanonicalResource, Component, ConversationFlow, FlowNode, Llm, Position, TestCase,
};

use crate::error::{io_err, FileError};
use crate::frontmatter::{strip_frontmatter, with_frontmatter};
use crate::layout::{
    resource_stem, BEGIN_POSITION_KEY, GLOBAL_PROMPT_FILE, NODES_DIR, PROMPT_FILE, TESTS_DIR,
};

/// Prefix marking a string field as extracted to a side file. The remainder
/// is a path relative to the resource directory.
pub const PLACEHOLDER_PREFIX: &str = "file://";

pub fn placeholder(relative: &str) -> String {
    format!("{PLACEHOLDER_PREFIX}{relative}")
}

/// Integer-rounded coordinate as stored in `.positions.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidecarPosition {
    pub x: i64,
    pub y: i64,
}

impl From<Position> for SidecarPosition {
    fn from(p: Position) -> Self {
        let (x, y) = p.rounded();
        SidecarPosition { x, y }
    }
}

impl From<SidecarPosition> for Position {
    fn from(p: SidecarPosition) -> Self {
        Position {
            x: p.x as f64,
            y: p.y as f64,
        }
    }
}

/// Result of extracting one resource: the placeholder-bearing config tree
/// (mutable fields only), the extracted documents (paths relative to the
/// resource directory), and the position sidecar entries.
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    pub config: Value,
    pub documents: Vec<(PathBuf, String)>,
    pub positions: BTreeMap<String, SidecarPosition>,
}

// ---------------------------------------------------------------------------
// LLM
// ---------------------------------------------------------------------------

pub fn extract_llm(llm: &Llm) -> Result<Extracted, FileError> {
    let mut documents = Vec::new();
    let mut copy = llm.clone();
    if let Some(text) = copy.general_prompt.take() {
        documents.push((PathBuf::from(PROMPT_FILE), document_body(&text)));
        copy.general_prompt = Some(placeholder(PROMPT_FILE));
    }
    Ok(Extracted {
        config: copy.mutable_value()?,
        documents,
        positions: BTreeMap::new(),
    })
}

// ---------------------------------------------------------------------------
// Conversation flow
// ---------------------------------------------------------------------------

pub fn extract_flow(flow: &ConversationFlow) -> Result<Extracted, FileError> {
    let mut documents = Vec::new();
    let mut positions = BTreeMap::new();

    let nodes = extract_nodes(&flow.nodes, &mut documents, &mut positions);

    let mut copy = flow.clone();
    copy.nodes = nodes;
    if let Some(begin) = copy.begin_tag_display_position.take() {
        positions.insert(BEGIN_POSITION_KEY.to_string(), begin.into());
    }
    if let Some(text) = copy.global_prompt.take() {
        documents.push((PathBuf::from(GLOBAL_PROMPT_FILE), document_body(&text)));
        copy.global_prompt = Some(placeholder(GLOBAL_PROMPT_FILE));
    }

    Ok(Extracted {
        config: copy.mutable_value()?,
        documents,
        positions,
    })
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Sidecar key of a component's own position: its name, falling back to id.
pub fn component_position_key(component: &Component) -> String {
    component
        .name
        .clone()
        .unwrap_or_else(|| component.id.clone())
}

pub fn extract_component(component: &Component) -> Result<Extracted, FileError> {
    let mut documents = Vec::new();
    let mut positions = BTreeMap::new();

    let nodes = extract_nodes(&component.nodes, &mut documents, &mut positions);

    let mut copy = component.clone();
    copy.nodes = nodes;
    if let Some(own) = copy.display_position.take() {
        positions.insert(component_position_key(component), own.into());
    }

    Ok(Extracted {
        config: copy.mutable_value()?,
        documents,
        positions,
    })
}

// ---------------------------------------------------------------------------
// Test case
// ---------------------------------------------------------------------------

/// Extraction for one test case; `stem` is the shared file stem under
/// `tests/`.
pub fn extract_test_case(case: &TestCase, stem: &str) -> Result<Extracted, FileError> {
    let mut documents = Vec::new();
    let mut copy = case.clone();
    if let Some(text) = copy.user_prompt.take() {
        let relative = format!("{TESTS_DIR}/{stem}_prompt.md");
        documents.push((PathBuf::from(&relative), document_body(&text)));
        copy.user_prompt = Some(placeholder(&relative));
    }
    Ok(Extracted {
        config: copy.mutable_value()?,
        documents,
        positions: BTreeMap::new(),
    })
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Strip positions and pull conversation-node instruction text into
/// `nodes/*.md`, producing a new node list.
fn extract_nodes(
    nodes: &[FlowNode],
    documents: &mut Vec<(PathBuf, String)>,
    positions: &mut BTreeMap<String, SidecarPosition>,
) -> Vec<FlowNode> {
    nodes
        .iter()
        .map(|node| {
            if let Some(pos) = node.display_position() {
                positions.insert(node.id().to_string(), pos.into());
            }
            let stripped = node.without_display_position();
            match stripped {
                FlowNode::Conversation(mut conv) => {
                    if let Some(instruction) = conv.instruction.take() {
                        let stem = resource_stem(conv.name.as_deref(), &conv.id, "node");
                        let relative = format!("{NODES_DIR}/{stem}.md");
                        let (from, to) = neighbour_names(nodes, &conv.id);
                        let display = conv.name.clone().unwrap_or_else(|| conv.id.clone());
                        documents.push((
                            PathBuf::from(&relative),
                            with_frontmatter(&display, &from, &to, instruction.text()),
                        ));
                        conv.instruction = Some(instruction.with_text(placeholder(&relative)));
                    }
                    FlowNode::Conversation(conv)
                }
                other => other,
            }
        })
        .collect()
}

/// Names of a node's immediate predecessors and successors, for frontmatter.
fn neighbour_names(nodes: &[FlowNode], node_id: &str) -> (Vec<String>, Vec<String>) {
    let display = |id: &str| -> Option<String> {
        nodes
            .iter()
            .find(|n| n.id() == id)
            .map(|n| n.name().unwrap_or(n.id()).to_string())
    };

    let mut from = Vec::new();
    for node in nodes {
        if node
            .edges()
            .iter()
            .any(|e| e.destination_node_id.as_deref() == Some(node_id))
        {
            from.push(node.name().unwrap_or(node.id()).to_string());
        }
    }

    let mut to = Vec::new();
    if let Some(node) = nodes.iter().find(|n| n.id() == node_id) {
        for edge in node.edges() {
            if let Some(dest) = edge.destination_node_id.as_deref() {
                if let Some(name) = display(dest) {
                    to.push(name);
                }
            }
        }
    }
    (from, to)
}

fn document_body(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}

// ---------------------------------------------------------------------------
// Placeholder resolution (read direction)
// ---------------------------------------------------------------------------

/// Resolve every `file://` placeholder in `value`, recursively through
/// objects and arrays, reading targets relative to `dir` and stripping
/// frontmatter from their bodies. A placeholder whose target is missing is a
/// [`FileError::DanglingPlaceholder`].
pub fn resolve_placeholders(value: Value, dir: &Path) -> Result<Value, FileError> {
    match value {
        Value::String(s) => {
            let Some(relative) = s.strip_prefix(PLACEHOLDER_PREFIX) else {
                return Ok(Value::String(s));
            };
            let path = dir.join(relative);
            let text = std::fs::read_to_string(&path).map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    FileError::DanglingPlaceholder {
                        placeholder: s.clone(),
                        path: path.clone(),
                    }
                } else {
                    io_err(&path, e)
                }
            })?;
            Ok(Value::String(
                strip_frontmatter(&text).trim_end().to_string(),
            ))
        }
        Value::Array(items) => items
            .into_iter()
            .map(|v| resolve_placeholders(v, dir))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| Ok((k, resolve_placeholders(v, dir)?)))
            .collect::<Result<Map<String, Value>, FileError>>()
            .map(Value::Object),
        other => Ok(other),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use vox_core::{ConversationFlow, Llm};

    fn flow_with_two_nodes() -> ConversationFlow {
        serde_json::from_value(json!({
            "_id": "flow_1",
            "_version": 0,
            "global_prompt": "Always be brief.",
            "begin_tag_display_position": { "x": 4.6, "y": 9.2 },
            "nodes": [
                {
                    "type": "conversation",
                    "id": "node-greet",
                    "name": "Greeting",
                    "display_position": { "x": 100.0, "y": 50.0 },
                    "instruction": { "type": "prompt", "text": "Say hello" },
                    "edges": [
                        { "id": "edge-1", "destination_node_id": "node-end" }
                    ],
                },
                {
                    "type": "end",
                    "id": "node-end",
                    "name": "Goodbye",
                    "display_position": { "x": 300.0, "y": 50.0 },
                },
            ],
        }))
        .unwrap()
    }

    #[test]
    fn flow_extraction_moves_positions_to_sidecar() {
        let flow = flow_with_two_nodes();
        let extracted = extract_flow(&flow).unwrap();

        assert_eq!(
            extracted.positions.get("node-greet"),
            Some(&SidecarPosition { x: 100, y: 50 })
        );
        assert_eq!(
            extracted.positions.get(BEGIN_POSITION_KEY),
            Some(&SidecarPosition { x: 5, y: 9 })
        );

        let nodes = extracted.config["nodes"].as_array().unwrap();
        for node in nodes {
            assert!(node.get("display_position").is_none());
        }
        // Source flow untouched.
        assert!(flow.begin_tag_display_position.is_some());
    }

    #[test]
    fn instruction_text_becomes_placeholder_and_document() {
        let extracted = extract_flow(&flow_with_two_nodes()).unwrap();
        let nodes = extracted.config["nodes"].as_array().unwrap();
        let instruction = &nodes[0]["instruction"];
        assert_eq!(instruction["type"], "prompt");
        assert_eq!(instruction["text"], "file://nodes/greeting_de-greet.md");

        let (path, body) = &extracted.documents[0];
        assert_eq!(path.to_str().unwrap(), "nodes/greeting_de-greet.md");
        assert!(body.contains("to:\n  - Goodbye\n"));
        assert!(body.ends_with("Say hello\n"));
    }

    #[test]
    fn llm_prompt_extracts_to_prompt_md() {
        let llm: Llm = serde_json::from_value(json!({
            "_id": "llm_1",
            "_version": 2,
            "general_prompt": "Hello\nWorld",
            "model": "gpt-4o",
        }))
        .unwrap();
        let extracted = extract_llm(&llm).unwrap();
        assert_eq!(extracted.config["general_prompt"], "file://prompt.md");
        assert_eq!(extracted.config["model"], "gpt-4o");
        assert!(extracted.config.get("_id").is_none());
        assert_eq!(extracted.documents[0].1, "Hello\nWorld\n");
    }

    #[test]
    fn resolve_restores_extracted_text() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("nodes")).unwrap();
        std::fs::write(
            dir.path().join("nodes/x.md"),
            "---\nnode: x\nfrom: []\nto: []\n---\n\nHello\nWorld\n",
        )
        .unwrap();

        let value = json!({ "deep": [{ "text": "file://nodes/x.md" }] });
        let resolved = resolve_placeholders(value, dir.path()).unwrap();
        assert_eq!(resolved["deep"][0]["text"], "Hello\nWorld");
    }

    #[test]
    fn dangling_placeholder_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = resolve_placeholders(json!("file://missing.md"), dir.path()).unwrap_err();
        assert!(matches!(err, FileError::DanglingPlaceholder { .. }));
    }

    #[test]
    fn non_placeholder_strings_pass_through() {
        let dir = TempDir::new().unwrap();
        let resolved =
            resolve_placeholders(json!("https://example.test/file.md"), dir.path()).unwrap();
        assert_eq!(resolved, json!("https://example.test/file.md"));
    }
}
