//! HTML-to-text conversion applied to page content before it is stored.

use regex::Regex;

/// Turns raw page markup into storable plain text.
pub trait TextSanitizer: Send + Sync {
    fn sanitize(&self, html: &str) -> String;
}

/// Regex-based stripper: removes tags, decodes the common entities, and
/// collapses whitespace while keeping line structure.
pub struct HtmlStripper {
    tags: Regex,
    spaces: Regex,
    line_edges: Regex,
    blank_lines: Regex,
}

impl HtmlStripper {
    pub fn new() -> Self {
        Self {
            tags: Regex::new(r"<[^>]*>").expect("valid literal pattern"),
            spaces: Regex::new(r"[ \t]+").expect("valid literal pattern"),
            line_edges: Regex::new(r"(?m)^[ \t]+|[ \t]+$").expect("valid literal pattern"),
            blank_lines: Regex::new(r"\n\s*\n").expect("valid literal pattern"),
        }
    }
}

impl Default for HtmlStripper {
    fn default() -> Self {
        Self::new()
    }
}

impl TextSanitizer for HtmlStripper {
    fn sanitize(&self, html: &str) -> String {
        let text = self.tags.replace_all(html, "");

        let text = text
            .replace("&nbsp;", " ")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'");

        let text = self.spaces.replace_all(&text, " ");
        let text = self.line_edges.replace_all(&text, "");
        let text = self.blank_lines.replace_all(&text, "\n");

        text.trim().to_string()
    }
}
