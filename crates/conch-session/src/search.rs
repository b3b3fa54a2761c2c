//! In-buffer search over a session's scrollback and screen.
//!
//! Positions are `(buffer line, character column)`; buffer line 0 is the
//! oldest scrollback line. Matching is plain text.

use serde::Serialize;

use crate::keys::{Chord, KeyEvent, Modifiers};

/// One occurrence of the query in the buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SearchMatch {
    pub line: usize,
    pub column: usize,
    /// Length in characters.
    pub length: usize,
}

impl SearchMatch {
    pub fn new(line: usize, column: usize, length: usize) -> Self {
        Self {
            line,
            column,
            length,
        }
    }

    fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecorationKind {
    Match,
    ActiveMatch,
}

/// A highlighted range in the rendered buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Decoration {
    #[serde(flatten)]
    pub range: SearchMatch,
    pub kind: DecorationKind,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub whole_word: bool,
    pub case_sensitive: bool,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Lowercase one character without changing the character count.
fn fold(c: char, case_sensitive: bool) -> char {
    if case_sensitive {
        c
    } else {
        c.to_lowercase().next().unwrap_or(c)
    }
}

/// All non-overlapping occurrences of `query` in `lines`, in buffer order.
pub fn find_matches(lines: &[String], query: &str, options: SearchOptions) -> Vec<SearchMatch> {
    let needle: Vec<char> = query
        .chars()
        .map(|c| fold(c, options.case_sensitive))
        .collect();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut matches = Vec::new();
    for (line_idx, line) in lines.iter().enumerate() {
        let original: Vec<char> = line.chars().collect();
        if original.len() < needle.len() {
            continue;
        }
        let haystack: Vec<char> = original
            .iter()
            .map(|&c| fold(c, options.case_sensitive))
            .collect();

        let mut column = 0;
        while column + needle.len() <= haystack.len() {
            if haystack[column..column + needle.len()] != needle[..] {
                column += 1;
                continue;
            }
            if options.whole_word && !is_whole_word(&original, column, needle.len()) {
                column += 1;
                continue;
            }
            matches.push(SearchMatch::new(line_idx, column, needle.len()));
            column += needle.len();
        }
    }
    matches
}

/// The characters on either side of the match are not word characters.
fn is_whole_word(line: &[char], start: usize, len: usize) -> bool {
    let before = start.checked_sub(1).map(|i| line[i]);
    let after = line.get(start + len).copied();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchFocus {
    /// Keys go to the query input.
    Query,
    /// Keys go to the terminal surface.
    #[default]
    Terminal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// What a key pressed inside the query input did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchKeyOutcome {
    Closed,
    Navigated(Option<SearchMatch>),
    /// The search-toggle chord; focus stays on the input.
    Absorbed,
    /// Not a panel key; the input handles it as text.
    Ignored,
}

/// The panel state observers see.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SearchView {
    pub open: bool,
    pub focus: SearchFocus,
    pub query: String,
    pub whole_word: bool,
    pub active: Option<SearchMatch>,
    /// 1-based position of the active match among all matches.
    pub index: Option<usize>,
    pub total: usize,
}

/// Search state of one session.
#[derive(Clone, Debug, Default)]
pub struct SearchPanel {
    open: bool,
    focus: SearchFocus,
    query: String,
    whole_word: bool,
    case_sensitive: bool,
    matches: Vec<SearchMatch>,
    active: Option<SearchMatch>,
    /// Query of the previous search; typing is incremental only while it differs.
    last_query: Option<String>,
}

impl SearchPanel {
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            ..Self::default()
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn focus(&self) -> SearchFocus {
        self.focus
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn whole_word(&self) -> bool {
        self.whole_word
    }

    pub fn active_match(&self) -> Option<SearchMatch> {
        self.active
    }

    pub fn matches(&self) -> &[SearchMatch] {
        &self.matches
    }

    fn options(&self) -> SearchOptions {
        SearchOptions {
            whole_word: self.whole_word,
            case_sensitive: self.case_sensitive,
        }
    }

    /// Show the panel and focus the query input.
    pub fn open(&mut self) {
        self.open = true;
        self.focus = SearchFocus::Query;
    }

    /// Hide the panel, drop all search state, and return focus to the terminal.
    pub fn close(&mut self) {
        self.open = false;
        self.focus = SearchFocus::Terminal;
        self.query.clear();
        self.matches.clear();
        self.active = None;
        self.last_query = None;
    }

    /// The query text changed. Non-empty text searches forward from the
    /// current match, or from `origin` (the top of the viewport) when there
    /// is none. Empty text clears the decorations but keeps the panel open.
    /// Nothing happens while the panel is closed.
    pub fn on_query_change(
        &mut self,
        text: &str,
        lines: &[String],
        origin: usize,
    ) -> Option<SearchMatch> {
        if !self.open {
            return None;
        }
        self.query = text.to_string();
        if text.is_empty() {
            self.matches.clear();
            self.active = None;
            self.last_query = None;
            return None;
        }
        let query = self.query.clone();
        self.search(&query, Direction::Forward, lines, origin)
    }

    /// Move to the next match, wrapping at the end of the buffer.
    pub fn find_next(
        &mut self,
        query: &str,
        whole_word: bool,
        lines: &[String],
        origin: usize,
    ) -> Option<SearchMatch> {
        if !self.open {
            return None;
        }
        self.query = query.to_string();
        self.whole_word = whole_word;
        self.search(query, Direction::Forward, lines, origin)
    }

    /// Move to the previous match, wrapping at the start of the buffer.
    pub fn find_previous(
        &mut self,
        query: &str,
        whole_word: bool,
        lines: &[String],
        origin: usize,
    ) -> Option<SearchMatch> {
        if !self.open {
            return None;
        }
        self.query = query.to_string();
        self.whole_word = whole_word;
        self.search(query, Direction::Backward, lines, origin)
    }

    /// Flip the whole-word constraint and re-run a present query at once.
    pub fn toggle_whole_word(&mut self, lines: &[String], origin: usize) -> Option<SearchMatch> {
        if !self.open {
            return None;
        }
        self.whole_word = !self.whole_word;
        if self.query.is_empty() {
            return None;
        }
        // Re-run in place: stay on the current match if it still qualifies.
        self.last_query = None;
        let query = self.query.clone();
        self.search(&query, Direction::Forward, lines, origin)
    }

    /// Recompute matches after the buffer changed. The active match is kept
    /// if the query still matches at the same place.
    pub fn refresh(&mut self, lines: &[String]) {
        if !self.open || self.query.is_empty() {
            return;
        }
        self.matches = find_matches(lines, &self.query, self.options());
        if let Some(active) = self.active {
            if !self.matches.contains(&active) {
                self.active = None;
            }
        }
    }

    /// Keys pressed while the query input has focus.
    pub fn handle_key(
        &mut self,
        event: &KeyEvent,
        toggle_chord: &Chord,
        lines: &[String],
        origin: usize,
    ) -> SearchKeyOutcome {
        if !event.is_down() {
            return SearchKeyOutcome::Ignored;
        }
        if toggle_chord.matches(event) {
            self.focus = SearchFocus::Query;
            return SearchKeyOutcome::Absorbed;
        }

        let modifiers = event.modifiers;
        match event.key.as_str() {
            "Escape" => {
                self.close();
                SearchKeyOutcome::Closed
            }
            "Enter" if modifiers.contains(Modifiers::SHIFT) => {
                let query = self.query.clone();
                SearchKeyOutcome::Navigated(self.find_previous(&query, self.whole_word, lines, origin))
            }
            "Enter" => {
                let query = self.query.clone();
                SearchKeyOutcome::Navigated(self.find_next(&query, self.whole_word, lines, origin))
            }
            _ => SearchKeyOutcome::Ignored,
        }
    }

    /// Every match, with the active one marked.
    pub fn decorations(&self) -> Vec<Decoration> {
        self.matches
            .iter()
            .map(|&range| Decoration {
                range,
                kind: if Some(range) == self.active {
                    DecorationKind::ActiveMatch
                } else {
                    DecorationKind::Match
                },
            })
            .collect()
    }

    pub fn view(&self) -> SearchView {
        SearchView {
            open: self.open,
            focus: self.focus,
            query: self.query.clone(),
            whole_word: self.whole_word,
            active: self.active,
            index: self
                .active
                .and_then(|a| self.matches.iter().position(|m| *m == a))
                .map(|i| i + 1),
            total: self.matches.len(),
        }
    }

    fn search(
        &mut self,
        query: &str,
        direction: Direction,
        lines: &[String],
        origin: usize,
    ) -> Option<SearchMatch> {
        if query.is_empty() {
            self.matches.clear();
            self.active = None;
            return None;
        }

        let incremental = self.last_query.as_deref() != Some(query);
        self.last_query = Some(query.to_string());
        self.matches = find_matches(lines, query, self.options());

        let anchor = self.active.map(|m| m.position());
        // Without a current match, start at the top of the viewport and
        // treat a match there as "next".
        let (anchor, inclusive) = match anchor {
            Some(pos) => (pos, incremental),
            None => ((origin, 0), direction == Direction::Forward),
        };

        let found = match direction {
            Direction::Forward => self
                .matches
                .iter()
                .find(|m| {
                    let pos = m.position();
                    pos > anchor || (inclusive && pos == anchor)
                })
                .or_else(|| self.matches.first()),
            Direction::Backward => self
                .matches
                .iter()
                .rev()
                .find(|m| {
                    let pos = m.position();
                    pos < anchor || (inclusive && pos == anchor)
                })
                .or_else(|| self.matches.last()),
        };

        self.active = found.copied();
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    fn opts(whole_word: bool) -> SearchOptions {
        SearchOptions {
            whole_word,
            case_sensitive: false,
        }
    }

    #[test]
    fn test_substring_vs_whole_word() {
        let buf = lines(&["fn main() {", "    maintain(main_loop);", "main"]);

        let all = find_matches(&buf, "main", opts(false));
        assert_eq!(
            all,
            vec![
                SearchMatch::new(0, 3, 4),
                SearchMatch::new(1, 4, 4),
                SearchMatch::new(1, 13, 4),
                SearchMatch::new(2, 0, 4),
            ]
        );

        // "maintain" and "main_loop" are excluded; standalone "main" remains.
        let words = find_matches(&buf, "main", opts(true));
        assert_eq!(words, vec![SearchMatch::new(0, 3, 4), SearchMatch::new(2, 0, 4)]);
    }

    #[test]
    fn test_case_insensitive_by_default() {
        let buf = lines(&["Error: ERROR error"]);
        assert_eq!(find_matches(&buf, "error", opts(false)).len(), 3);

        let sensitive = SearchOptions {
            whole_word: false,
            case_sensitive: true,
        };
        assert_eq!(find_matches(&buf, "error", sensitive).len(), 1);
    }

    #[test]
    fn test_columns_count_characters() {
        let buf = lines(&["héllo wörld"]);
        assert_eq!(find_matches(&buf, "wörld", opts(false)), vec![SearchMatch::new(0, 6, 5)]);
    }

    #[test]
    fn test_non_overlapping_matches() {
        let buf = lines(&["aaaa"]);
        assert_eq!(find_matches(&buf, "aa", opts(false)).len(), 2);
    }

    #[test]
    fn test_find_next_wraps_around() {
        let buf = lines(&["foo", "bar foo", "foo"]);
        let mut panel = SearchPanel::new(false);
        panel.open();

        let first = panel.find_next("foo", false, &buf, 0);
        assert_eq!(first, Some(SearchMatch::new(0, 0, 3)));
        assert_eq!(panel.find_next("foo", false, &buf, 0), Some(SearchMatch::new(1, 4, 3)));
        assert_eq!(panel.find_next("foo", false, &buf, 0), Some(SearchMatch::new(2, 0, 3)));
        assert_eq!(panel.find_next("foo", false, &buf, 0), first);
    }

    #[test]
    fn test_find_previous_wraps_around() {
        let buf = lines(&["foo", "foo"]);
        let mut panel = SearchPanel::new(false);
        panel.open();

        panel.find_next("foo", false, &buf, 0);
        assert_eq!(panel.find_previous("foo", false, &buf, 0), Some(SearchMatch::new(1, 0, 3)));
        assert_eq!(panel.find_previous("foo", false, &buf, 0), Some(SearchMatch::new(0, 0, 3)));
    }

    #[test]
    fn test_search_starts_at_viewport_top() {
        let buf = lines(&["foo", "x", "x", "foo", "x"]);
        let mut panel = SearchPanel::new(false);
        panel.open();
        assert_eq!(panel.on_query_change("foo", &buf, 2), Some(SearchMatch::new(3, 0, 3)));
    }

    #[test]
    fn test_typing_stays_on_current_match() {
        let buf = lines(&["mat", "main", "main"]);
        let mut panel = SearchPanel::new(false);
        panel.open();

        assert_eq!(panel.on_query_change("ma", &buf, 0), Some(SearchMatch::new(0, 0, 2)));
        // Extending the query keeps the position if it still matches.
        assert_eq!(panel.on_query_change("mai", &buf, 0), Some(SearchMatch::new(1, 0, 3)));
        assert_eq!(panel.on_query_change("main", &buf, 0), Some(SearchMatch::new(1, 0, 4)));
        // Enter on an unchanged query advances.
        assert_eq!(panel.find_next("main", false, &buf, 0), Some(SearchMatch::new(2, 0, 4)));
    }

    #[test]
    fn test_empty_query_clears_but_keeps_panel() {
        let buf = lines(&["foo"]);
        let mut panel = SearchPanel::new(false);
        panel.open();
        panel.on_query_change("foo", &buf, 0);
        assert_eq!(panel.decorations().len(), 1);

        assert_eq!(panel.on_query_change("", &buf, 0), None);
        assert!(panel.decorations().is_empty());
        assert!(panel.is_open());
    }

    #[test]
    fn test_toggle_whole_word_reruns_query() {
        let buf = lines(&["maintain", "main"]);
        let mut panel = SearchPanel::new(false);
        panel.open();

        assert_eq!(panel.on_query_change("main", &buf, 0), Some(SearchMatch::new(0, 0, 4)));
        assert_eq!(panel.matches().len(), 2);

        assert_eq!(panel.toggle_whole_word(&buf, 0), Some(SearchMatch::new(1, 0, 4)));
        assert!(panel.whole_word());
        assert_eq!(panel.matches(), &[SearchMatch::new(1, 0, 4)]);
    }

    #[test]
    fn test_decorations_mark_active_match() {
        let buf = lines(&["foo foo"]);
        let mut panel = SearchPanel::new(false);
        panel.open();
        panel.on_query_change("foo", &buf, 0);

        let decorations = panel.decorations();
        assert_eq!(decorations.len(), 2);
        assert_eq!(decorations[0].kind, DecorationKind::ActiveMatch);
        assert_eq!(decorations[1].kind, DecorationKind::Match);

        let view = panel.view();
        assert_eq!(view.index, Some(1));
        assert_eq!(view.total, 2);
    }

    #[test]
    fn test_closed_panel_does_not_search() {
        let buf = lines(&["foo foo"]);
        let mut panel = SearchPanel::new(false);

        assert_eq!(panel.find_next("foo", false, &buf, 0), None);
        assert_eq!(panel.find_previous("foo", false, &buf, 0), None);
        assert_eq!(panel.on_query_change("foo", &buf, 0), None);
        assert_eq!(panel.toggle_whole_word(&buf, 0), None);
        assert_eq!(panel.query(), "");
        assert!(!panel.whole_word());
        assert!(panel.matches().is_empty());
        assert!(panel.decorations().is_empty());
    }

    #[test]
    fn test_close_resets_state() {
        let buf = lines(&["foo"]);
        let mut panel = SearchPanel::new(false);
        panel.open();
        assert_eq!(panel.focus(), SearchFocus::Query);
        panel.on_query_change("foo", &buf, 0);

        panel.close();
        assert!(!panel.is_open());
        assert_eq!(panel.focus(), SearchFocus::Terminal);
        assert_eq!(panel.query(), "");
        assert!(panel.active_match().is_none());
        assert!(panel.decorations().is_empty());
    }

    #[test]
    fn test_refresh_keeps_valid_active_match() {
        let mut buf = lines(&["foo", "foo"]);
        let mut panel = SearchPanel::new(false);
        panel.open();
        panel.on_query_change("foo", &buf, 0);
        panel.find_next("foo", false, &buf, 0);
        assert_eq!(panel.active_match(), Some(SearchMatch::new(1, 0, 3)));

        buf.push("foo again".to_string());
        panel.refresh(&buf);
        assert_eq!(panel.active_match(), Some(SearchMatch::new(1, 0, 3)));
        assert_eq!(panel.matches().len(), 3);

        buf[1] = "bar".to_string();
        panel.refresh(&buf);
        assert_eq!(panel.active_match(), None);
    }

    #[test]
    fn test_key_contract() {
        let buf = lines(&["foo", "foo"]);
        let toggle: Chord = "ctrl+f".parse().unwrap();
        let mut panel = SearchPanel::new(false);
        panel.open();
        panel.on_query_change("foo", &buf, 0);

        let enter = KeyEvent::down("Enter", Modifiers::empty());
        assert_eq!(
            panel.handle_key(&enter, &toggle, &buf, 0),
            SearchKeyOutcome::Navigated(Some(SearchMatch::new(1, 0, 3)))
        );

        let shift_enter = KeyEvent::down("Enter", Modifiers::SHIFT);
        assert_eq!(
            panel.handle_key(&shift_enter, &toggle, &buf, 0),
            SearchKeyOutcome::Navigated(Some(SearchMatch::new(0, 0, 3)))
        );

        let chord = KeyEvent::down("f", Modifiers::CTRL);
        assert_eq!(panel.handle_key(&chord, &toggle, &buf, 0), SearchKeyOutcome::Absorbed);
        assert!(panel.is_open());

        let letter = KeyEvent::down("x", Modifiers::empty());
        assert_eq!(panel.handle_key(&letter, &toggle, &buf, 0), SearchKeyOutcome::Ignored);

        let escape = KeyEvent::down("Escape", Modifiers::empty());
        assert_eq!(panel.handle_key(&escape, &toggle, &buf, 0), SearchKeyOutcome::Closed);
        assert!(!panel.is_open());
    }

    #[test]
    fn test_no_matches() {
        let buf = lines(&["nothing here"]);
        let mut panel = SearchPanel::new(false);
        panel.open();
        assert_eq!(panel.on_query_change("zzz", &buf, 0), None);
        assert_eq!(panel.view().total, 0);
    }
}
