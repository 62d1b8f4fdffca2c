//! YAML frontmatter on extracted node markdown.
//!
//! The frontmatter names a node's immediate predecessors and successors so a
//! human can navigate `nodes/` without the canvas. It is a navigation aid
//! only: it is not part of the canonical model and is stripped on read.

const FENCE: &str = "---";

/// Render frontmatter + body for a node markdown file.
pub fn with_frontmatter(node_name: &str, from: &[String], to: &[String], body: &str) -> String {
    let mut out = String::new();
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(&format!("node: {}\n", yaml_scalar(node_name)));
    push_name_list(&mut out, "from", from);
    push_name_list(&mut out, "to", to);
    out.push_str(FENCE);
    out.push('\n');
    out.push('\n');
    out.push_str(body);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn push_name_list(out: &mut String, key: &str, names: &[String]) {
    if names.is_empty() {
        out.push_str(&format!("{key}: []\n"));
        return;
    }
    out.push_str(&format!("{key}:\n"));
    for name in names {
        out.push_str(&format!("  - {}\n", yaml_scalar(name)));
    }
}

fn yaml_scalar(s: &str) -> String {
    if s.is_empty() || s.contains(|c: char| ":#\"'\n".contains(c)) {
        format!("{:?}", s)
    } else {
        s.to_string()
    }
}

/// Drop a leading frontmatter block, if any, returning the body.
pub fn strip_frontmatter(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("---\n").or_else(|| text.strip_prefix("---\r\n")) else {
        return text;
    };
    let mut offset = 0usize;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            let body = &rest[offset + line.len()..];
            // One blank separator line after the fence is ours, not content.
            return body
                .strip_prefix('\n')
                .or_else(|| body.strip_prefix("\r\n"))
                .unwrap_or(body);
        }
        offset += line.len();
    }
    // Unterminated fence: treat the whole text as body.
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_strips_what_was_added() {
        let body = "Ask for the caller's account number.";
        let text = with_frontmatter(
            "Collect account",
            &["Greeting".to_string()],
            &["Lookup".to_string(), "Escalate".to_string()],
            body,
        );
        assert!(text.starts_with("---\n"));
        assert!(text.contains("from:\n  - Greeting\n"));
        assert_eq!(strip_frontmatter(&text).trim_end(), body);
    }

    #[test]
    fn empty_neighbour_lists_render_as_flow_sequences() {
        let text = with_frontmatter("Start", &[], &[], "hello");
        assert!(text.contains("from: []\n"));
        assert!(text.contains("to: []\n"));
    }

    #[test]
    fn body_without_frontmatter_is_unchanged() {
        assert_eq!(strip_frontmatter("plain text"), "plain text");
    }

    #[test]
    fn fence_inside_body_is_not_stripped() {
        let text = with_frontmatter("n", &[], &[], "a\n---\nb");
        let body = strip_frontmatter(&text);
        assert_eq!(body.trim_end(), "a\n---\nb");
    }

    #[test]
    fn names_needing_quotes_are_quoted() {
        let text = with_frontmatter("a: b", &[], &[], "x");
        assert!(text.contains("node: \"a: b\"\n"));
    }
}
