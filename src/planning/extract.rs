//! Best-effort JSON extraction from model output.

use serde_json::Value;

/// Pull the first JSON value out of free text.
///
/// Tried in order:
/// 1. the whole text, if it parses as an object or array
/// 2. each fenced code block (```` ```json ... ``` ```` or a bare fence)
/// 3. the first balanced `{...}` span that parses
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Some(value) = parse_container(trimmed) {
        return Some(value);
    }

    if let Some(value) = fenced_blocks(trimmed).find_map(parse_container) {
        return Some(value);
    }

    trimmed
        .match_indices('{')
        .filter_map(|(start, _)| balanced_object(trimmed, start))
        .find_map(|candidate| match serde_json::from_str::<Value>(candidate) {
            Ok(value @ Value::Object(_)) => Some(value),
            _ => None,
        })
}

fn parse_container(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

/// Contents of each ```-fenced block, without the info string.
fn fenced_blocks(text: &str) -> impl Iterator<Item = &str> {
    text.split("```")
        .skip(1)
        .step_by(2)
        .map(|block| match block.split_once('\n') {
            Some((info, body)) if !info.trim_start().starts_with(|c: char| c == '{' || c == '[') => body,
            _ => block,
        })
}

/// The `{...}` span starting at `start`, honouring strings and escapes.
fn balanced_object(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_json() {
        assert_eq!(
            extract_json(" {\"summary\": \"s\", \"questions\": []} "),
            Some(json!({"summary": "s", "questions": []}))
        );
    }

    #[test]
    fn fenced_json_with_prose() {
        let text = "Here is the plan:\n```json\n{\"tasks\": [{\"name\": \"a\"}]}\n```\nGood luck!";
        assert_eq!(extract_json(text), Some(json!({"tasks": [{"name": "a"}]})));

        let bare_fence = "```\n[1, 2]\n```";
        assert_eq!(extract_json(bare_fence), Some(json!([1, 2])));
    }

    #[test]
    fn first_balanced_object_in_prose() {
        let text = "Sure! {not json} then {\"citations\": [{\"title\": \"a } b\", \"url\": \"u\"}]} trailing {\"x\": 1}";
        assert_eq!(
            extract_json(text),
            Some(json!({"citations": [{"title": "a } b", "url": "u"}]}))
        );
    }

    #[test]
    fn nothing_to_extract() {
        assert_eq!(extract_json("Just a friendly reply."), None);
        assert_eq!(extract_json("unbalanced {\"a\": 1"), None);
        assert_eq!(extract_json("\"a string\""), None);
    }
}
