//! On-disk layout: directory naming and well-known file names.
//!
//! ```text
//! <slug>_<id-suffix>/                  one directory per agent or component
//!   .agent.json | .component.json      immutable identity, never diffed
//!   config.yaml                        mutable fields, file:// placeholders
//!   llm.yaml | conversation-flow.yaml  nested engine config, if applicable
//!   prompt.md | global_prompt.md       extracted engine prompt text
//!   nodes/<slug>_<id-suffix>.md        extracted node instruction text
//!   .positions.json                    extracted UI coordinates
//!   tests/.tests.json                  test-case identity map
//!   tests/<slug>.yaml                  mutable test-case fields
//!   tests/<slug>_prompt.md             extracted test-case user prompt
//! .vox/manifest.json                   write manifest (hashes + managed dirs)
//! ```
//!
//! Directory names are a pure function of `(slugified display name,
//! fixed-length id suffix)` so paths stay stable across re-pulls even when
//! display names are not unique. Two ids sharing both slug and suffix would
//! collide; that risk is accepted and not defended against.

pub const AGENT_IDENTITY_FILE: &str = ".agent.json";
pub const COMPONENT_IDENTITY_FILE: &str = ".component.json";
pub const CONFIG_FILE: &str = "config.yaml";
pub const LLM_CONFIG_FILE: &str = "llm.yaml";
pub const FLOW_CONFIG_FILE: &str = "conversation-flow.yaml";
pub const POSITIONS_FILE: &str = ".positions.json";
pub const PROMPT_FILE: &str = "prompt.md";
pub const GLOBAL_PROMPT_FILE: &str = "global_prompt.md";
pub const NODES_DIR: &str = "nodes";
pub const TESTS_DIR: &str = "tests";
pub const TESTS_INDEX_FILE: &str = ".tests.json";
pub const MANIFEST_DIR: &str = ".vox";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Key of the flow begin tag in `.positions.json`.
pub const BEGIN_POSITION_KEY: &str = "begin";

/// Length of the id suffix appended to slugs.
pub const ID_SUFFIX_LEN: usize = 8;

/// Lowercase, alphanumeric-and-dash form of a display name. Runs of other
/// characters collapse to a single dash; leading/trailing dashes are
/// trimmed. Returns `fallback` when nothing survives.
pub fn slugify(name: &str, fallback: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}

/// The trailing [`ID_SUFFIX_LEN`] characters of an id (the whole id when
/// shorter).
pub fn id_suffix(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let start = chars.len().saturating_sub(ID_SUFFIX_LEN);
    chars[start..].iter().collect()
}

/// `<slug>_<id-suffix>` — the directory or file-stem name for a resource.
pub fn resource_stem(display_name: Option<&str>, id: &str, fallback: &str) -> String {
    let slug = slugify(display_name.unwrap_or(""), fallback);
    format!("{}_{}", slug, id_suffix(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Support Line", "support-line")]
    #[case("  Fancy -- Name!! ", "fancy-name")]
    #[case("MiXeD_case 42", "mixed-case-42")]
    #[case("日本語", "agent")]
    #[case("", "agent")]
    fn slugify_cases(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(slugify(input, "agent"), expected);
    }

    #[test]
    fn suffix_is_fixed_length() {
        assert_eq!(id_suffix("agent_16b980523634a6dc504898cda492e939"), "a492e939");
        assert_eq!(id_suffix("short"), "short");
    }

    #[test]
    fn stem_is_stable_for_duplicate_names() {
        let a = resource_stem(Some("Support"), "agent_00000000aaaa1111", "agent");
        let b = resource_stem(Some("Support"), "agent_00000000bbbb2222", "agent");
        assert_eq!(a, "support_aaaa1111");
        assert_eq!(b, "support_bbbb2222");
        assert_ne!(a, b);
    }
}
