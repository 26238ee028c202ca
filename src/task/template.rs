//! Instruction templates.
//!
//! A task description may reference the pipeline's seed input as
//! `{{input}}` and a declared upstream task's raw output as `{{<task_id>}}`.
//! Whitespace inside the braces is ignored.

use std::sync::OnceLock;

use regex::Regex;

/// Placeholder that always resolves to the seed input.
pub const INPUT_PLACEHOLDER: &str = "input";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unresolved placeholder '{{{{{0}}}}}'")]
    Unresolved(String),
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_\-]+)\s*\}\}").expect("placeholder pattern compiles")
    })
}

/// Whether `name` can appear inside `{{...}}`: non-empty, ASCII letters,
/// digits, `_` and `-` only.
pub fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Placeholder names in order of first appearance, without duplicates.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in placeholder_re().captures_iter(template) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Substitute every placeholder through `lookup`.
///
/// Fails on the first name `lookup` cannot resolve. Text that merely looks
/// like braces (`{ "json": 1 }`) is left alone.
pub fn render<'a, F>(template: &str, lookup: F) -> Result<String, TemplateError>
where
    F: Fn(&str) -> Option<&'a str>,
{
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in placeholder_re().captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        let name = &caps[1];
        let value = lookup(name).ok_or_else(|| TemplateError::Unresolved(name.to_string()))?;
        out.push_str(&template[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&template[last..]);

    Ok(out)
}
