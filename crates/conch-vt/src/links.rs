//! Hyperlink detection over buffer text.

use std::sync::OnceLock;

use regex::Regex;

static URL_REGEX: OnceLock<Regex> = OnceLock::new();

/// The web-links pattern used by xterm-style terminals: an http(s) scheme
/// followed by anything that is not whitespace or an obvious delimiter.
fn url_regex() -> &'static Regex {
    URL_REGEX.get_or_init(|| {
        Regex::new(r#"https?://[^\s"'!*(){}|\\^<>`]*[^\s"':,.!?{}|\\^~\[\]`()<>]"#)
            .expect("Failed to compile URL regex")
    })
}

/// A link found in the buffer. Columns count characters, not bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    pub line: usize,
    pub column: usize,
    pub length: usize,
    pub uri: String,
}

impl Link {
    pub fn contains(&self, line: usize, column: usize) -> bool {
        self.line == line && column >= self.column && column < self.column + self.length
    }
}

/// Finds URLs in buffer lines.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinkDetector;

impl LinkDetector {
    pub fn new() -> Self {
        Self
    }

    /// Links on a single line of text.
    pub fn detect_line(&self, line: usize, text: &str) -> Vec<Link> {
        url_regex()
            .find_iter(text)
            .map(|m| Link {
                line,
                column: text[..m.start()].chars().count(),
                length: m.as_str().chars().count(),
                uri: m.as_str().to_string(),
            })
            .collect()
    }

    /// Links on every line; `lines[i]` is buffer line `i`.
    pub fn detect(&self, lines: &[String]) -> Vec<Link> {
        lines
            .iter()
            .enumerate()
            .flat_map(|(index, text)| self.detect_line(index, text))
            .collect()
    }

    /// The link covering the given buffer cell, if any.
    pub fn link_at(&self, lines: &[String], line: usize, column: usize) -> Option<Link> {
        let text = lines.get(line)?;
        self.detect_line(line, text)
            .into_iter()
            .find(|link| link.contains(line, column))
    }
}
