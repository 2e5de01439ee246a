//! services/client/src/flow/html.rs
//!
//! Turns a rendered solution into HTML for an embedded browser surface.

use snapsolve_core::domain::{RenderedDocument, Segment};
use snapsolve_core::ports::MathTypesetter;
use tracing::warn;

const KATEX_VERSION: &str = "0.16.11";

/// Escapes text for use in HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Renders the document body. A span that fails to typeset is replaced by
/// its escaped source, marked with the `math-error` class; the rest of the
/// document is unaffected.
pub fn render_html(document: &RenderedDocument, typesetter: &dyn MathTypesetter) -> String {
    let mut html = String::new();
    for segment in &document.segments {
        match segment {
            Segment::Text(text) => html.push_str(&escape_html(text)),
            Segment::Math { expression, mode } => match typesetter.typeset(expression, *mode) {
                Ok(markup) => html.push_str(&markup),
                Err(e) => {
                    warn!(reason = %e.reason, "Falling back to raw source for math span");
                    html.push_str(&format!(
                        r#"<code class="math-error" title="{}">{}</code>"#,
                        escape_html(&e.reason),
                        escape_html(expression)
                    ));
                }
            },
        }
    }
    html
}

/// Wraps a body fragment in a standalone page that typesets math with KaTeX.
pub fn render_page(body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/katex@{v}/dist/katex.min.css">
<script defer src="https://cdn.jsdelivr.net/npm/katex@{v}/dist/katex.min.js"></script>
<script defer src="https://cdn.jsdelivr.net/npm/katex@{v}/dist/contrib/auto-render.min.js"
  onload="renderMathInElement(document.body, {{delimiters: [{{left: '\\[', right: '\\]', display: true}}, {{left: '\\(', right: '\\)', display: false}}], throwOnError: false}});"></script>
<style>
body {{ white-space: pre-wrap; font-family: -apple-system, sans-serif; }}
.math-error {{ color: #c0392b; background: #fdecea; }}
</style>
</head>
<body>{body}</body>
</html>
"#,
        v = KATEX_VERSION,
        body = body
    )
}
