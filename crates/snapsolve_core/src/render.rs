//! crates/snapsolve_core/src/render.rs
//!
//! Splits solution text into plain-text and LaTeX math segments.
//!
//! The whole buffer is re-scanned on every update. An opener with no closer
//! (a currency `$`, or a span the stream has not finished yet) stays plain
//! text and scanning resumes right after it.

use crate::domain::{DisplayMode, RenderedDocument, Segment};

/// Delimiter pairs, most specific first.
const DELIMITERS: [(&str, &str, DisplayMode); 4] = [
    ("$$", "$$", DisplayMode::Block),
    ("\\[", "\\]", DisplayMode::Block),
    ("\\(", "\\)", DisplayMode::Inline),
    ("$", "$", DisplayMode::Inline),
];

/// Renders the accumulated solution text. Never fails.
pub fn render(text: &str) -> RenderedDocument {
    let mut segments = Vec::new();
    let mut plain = String::new();
    let mut rest = text;

    while let Some(ch) = rest.chars().next() {
        let Some((open, close, mode)) = DELIMITERS
            .iter()
            .copied()
            .find(|(open, _, _)| rest.starts_with(open))
        else {
            plain.push(ch);
            rest = &rest[ch.len_utf8()..];
            continue;
        };

        let body = &rest[open.len()..];
        let Some(end) = body.find(close) else {
            plain.push_str(open);
            rest = body;
            continue;
        };

        let expression = body[..end].trim();
        let consumed = open.len() + end + close.len();
        if expression.is_empty() {
            plain.push_str(&rest[..consumed]);
        } else {
            if !plain.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut plain)));
            }
            segments.push(Segment::Math {
                expression: expression.to_string(),
                mode,
            });
        }
        rest = &rest[consumed..];
    }

    if !plain.is_empty() {
        segments.push(Segment::Text(plain));
    }

    RenderedDocument { segments }
}
