//! services/client/src/adapters/typesetter.rs
//!
//! Markup typesetter for an embedded browser surface that runs KaTeX
//! auto-render. Implements the `MathTypesetter` port.
//!
//! The expression is checked for structural problems KaTeX would choke on,
//! then wrapped in `\( \)` / `\[ \]` delimiters inside a styled element.

use crate::flow::html::escape_html;
use snapsolve_core::domain::DisplayMode;
use snapsolve_core::ports::{MathRenderError, MathTypesetter};

#[derive(Clone, Debug, Default)]
pub struct KatexMarkupTypesetter;

impl KatexMarkupTypesetter {
    pub fn new() -> Self {
        Self
    }
}

impl MathTypesetter for KatexMarkupTypesetter {
    fn typeset(&self, tex: &str, mode: DisplayMode) -> Result<String, MathRenderError> {
        check_structure(tex).map_err(|reason| MathRenderError {
            source_tex: tex.to_string(),
            reason,
        })?;

        let escaped = escape_html(tex);
        Ok(match mode {
            DisplayMode::Inline => format!(r#"<span class="math math-inline">\({}\)</span>"#, escaped),
            DisplayMode::Block => format!(r#"<div class="math math-display">\[{}\]</div>"#, escaped),
        })
    }
}

/// Validates brace balance, `\left`/`\right` pairing and environment nesting.
fn check_structure(tex: &str) -> Result<(), String> {
    let mut depth: usize = 0;
    let mut environments: Vec<String> = Vec::new();
    let mut left_right: i64 = 0;
    let mut rest = tex;

    while let Some(ch) = rest.chars().next() {
        match ch {
            '\\' => {
                let command = control_word(&rest[1..]);
                if command.is_empty() {
                    // `\{`, `\}`, `\\` and friends: skip the escaped character.
                    let skip = rest[1..].chars().next().map_or(0, char::len_utf8);
                    rest = &rest[1 + skip..];
                    continue;
                }
                match command {
                    "left" => left_right += 1,
                    "right" => {
                        left_right -= 1;
                        if left_right < 0 {
                            return Err("\\right without matching \\left".to_string());
                        }
                    }
                    "begin" | "end" => {
                        let after = &rest[1 + command.len()..];
                        let name = environment_name(after)
                            .ok_or_else(|| format!("\\{} is missing an environment name", command))?;
                        if command == "begin" {
                            environments.push(name.to_string());
                        } else if environments.pop().as_deref() != Some(name) {
                            return Err(format!("\\end{{{}}} does not close the open environment", name));
                        }
                    }
                    _ => {}
                }
                rest = &rest[1 + command.len()..];
                continue;
            }
            '{' => depth += 1,
            '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unbalanced closing brace".to_string())?;
            }
            _ => {}
        }
        rest = &rest[ch.len_utf8()..];
    }

    if depth != 0 {
        return Err("unbalanced opening brace".to_string());
    }
    if left_right != 0 {
        return Err("\\left without matching \\right".to_string());
    }
    if let Some(open) = environments.pop() {
        return Err(format!("environment `{}` is never closed", open));
    }
    Ok(())
}

/// The ASCII-alphabetic command name at the start of `s`.
fn control_word(s: &str) -> &str {
    let end = s
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(s.len());
    &s[..end]
}

/// Parses `{name}` (after optional spaces) at the start of `s`.
fn environment_name(s: &str) -> Option<&str> {
    let s = s.trim_start().strip_prefix('{')?;
    let end = s.find('}')?;
    let name = s[..end].trim();
    (!name.is_empty()).then_some(name)
}
