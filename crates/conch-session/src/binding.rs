//! Session Binding: one rendering surface wired to one PTY session.
//!
//! A binding walks `Uninitialized → FontLoading → Initializing → Attached`
//! while mounting and ends in `Disposed`. Once attached, input goes to the
//! PTY unmodified, PTY output goes into the surface, and the binding reports
//! what the rest of the window must react to (title changes, bell, exit) as
//! [`BindingEvent`]s.

use std::sync::Arc;

use conch_pty::{OutputSink, OutputSubscription, PtyBridge, PtyOutput, SessionId};
use conch_vt::{ClipboardRequest, FontCache, GridSize, Link, LinkDetector, LoadedFont, VtTerminal};
use serde::Serialize;
use tokio::sync::watch;

use crate::clipboard::Clipboard;
use crate::config::Config;
use crate::frame::{extract_frame, Frame, FrameExtras};
use crate::keys::{Chord, KeyDisposition, KeyEvent, LocalAction, Modifiers};
use crate::layout::Size;
use crate::resize::{GeometryOutcome, ResizeCoordinator};
use crate::search::{SearchFocus, SearchKeyOutcome, SearchMatch, SearchPanel, SearchView};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingState {
    Uninitialized,
    FontLoading,
    Initializing,
    Attached,
    Disposed,
}

/// Per-binding settings, resolved once from the configuration.
#[derive(Clone, Debug)]
pub struct BindingOptions {
    pub scrollback: usize,
    pub padding: f32,
    pub search_chord: Chord,
    pub sidebar_chord: Chord,
    pub case_sensitive: bool,
}

impl Default for BindingOptions {
    fn default() -> Self {
        Self {
            scrollback: 10_000,
            padding: 8.0,
            search_chord: Chord::new("f", Modifiers::CTRL),
            sidebar_chord: Chord::new("b", Modifiers::CTRL),
            case_sensitive: false,
        }
    }
}

impl BindingOptions {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        let chord = |raw: &str, fallback: Chord| match raw.parse::<Chord>() {
            Ok(chord) => chord,
            Err(e) => {
                log::warn!("Ignoring chord '{raw}': {e}, using {fallback}");
                fallback
            }
        };
        Self {
            scrollback: config.terminal.scrollback_lines,
            padding: config.terminal.padding_px,
            search_chord: chord(&config.keys.search_toggle, defaults.search_chord),
            sidebar_chord: chord(&config.keys.sidebar_toggle, defaults.sidebar_chord),
            case_sensitive: config.search.case_sensitive,
        }
    }
}

/// Something the owner of the binding has to act on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindingEvent {
    /// The shell reported a title; goes to the tab store.
    TitleChanged(String),
    Bell,
    Exited(Option<u32>),
}

pub struct SessionBinding {
    id: SessionId,
    state: BindingState,
    bridge: Arc<dyn PtyBridge>,
    options: BindingOptions,
    surface: Option<VtTerminal>,
    font: Option<Arc<LoadedFont>>,
    links: LinkDetector,
    search: SearchPanel,
    resize: ResizeCoordinator,
    subscription: Option<OutputSubscription>,
    spawn_issued: bool,
    /// A process is running behind this binding.
    live: bool,
    ligatures_armed: bool,
    ligatures: bool,
    /// Something on screen changed since the last frame.
    dirty: bool,
    needs_full_frame: bool,
    /// Output arrived while a search was showing; matches are recomputed
    /// once per frame.
    search_stale: bool,
}

impl SessionBinding {
    pub fn new(id: SessionId, bridge: Arc<dyn PtyBridge>, options: BindingOptions) -> Self {
        let search = SearchPanel::new(options.case_sensitive);
        let resize = ResizeCoordinator::new(options.padding);
        Self {
            id,
            state: BindingState::Uninitialized,
            bridge,
            options,
            surface: None,
            font: None,
            links: LinkDetector::new(),
            search,
            resize,
            subscription: None,
            spawn_issued: false,
            live: false,
            ligatures_armed: false,
            ligatures: false,
            dirty: false,
            needs_full_frame: true,
            search_stale: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> BindingState {
        self.state
    }

    pub fn is_attached(&self) -> bool {
        self.state == BindingState::Attached
    }

    /// Attached with a running process.
    pub fn is_live(&self) -> bool {
        self.is_attached() && self.live
    }

    pub fn ligatures_enabled(&self) -> bool {
        self.ligatures
    }

    pub fn surface(&self) -> Option<&VtTerminal> {
        self.surface.as_ref()
    }

    /// Bring the binding up: load the font, build the surface, subscribe to
    /// the session's output and spawn its process.
    ///
    /// Never fails. A spawn error is written into the surface and leaves the
    /// binding attached but inert.
    pub async fn mount(&mut self, fonts: &FontCache, pane: watch::Receiver<Size>, sink: OutputSink) {
        if self.state != BindingState::Uninitialized {
            log::debug!("{} already mounted ({:?})", self.id, self.state);
            return;
        }

        self.state = BindingState::FontLoading;
        let font = fonts.get().await;

        self.state = BindingState::Initializing;
        let current = *pane.borrow();
        let grid = match self.resize.fit(current, font.cell) {
            Ok(grid) => grid,
            Err(e) => {
                log::debug!("Initial fit for {} failed ({e}), using default grid", self.id);
                GridSize::default()
            }
        };
        self.surface = Some(VtTerminal::new(grid, self.options.scrollback));
        self.font = Some(font);

        // Subscribe first so nothing the process prints early is lost.
        self.subscription = match self.bridge.subscribe_output(self.id, sink) {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                log::error!("Failed to subscribe to output of {}: {e}", self.id);
                None
            }
        };
        self.state = BindingState::Attached;

        self.spawn_issued = true;
        match self.bridge.spawn(self.id, grid.cols, grid.rows) {
            Ok(()) => {
                log::info!("Attached {} at {}x{}", self.id, grid.cols, grid.rows);
                self.live = true;
                self.ligatures_armed = true;
            }
            Err(e) => {
                log::error!("Failed to spawn PTY for {}: {e}", self.id);
                if let Some(surface) = self.surface.as_mut() {
                    surface.write(format!("\r\nFailed to start PTY: {e}\r\n").as_bytes());
                }
            }
        }

        self.resize.mark_sent(grid);
        self.resize.observe(pane);
        self.needs_full_frame = true;
    }

    /// Forward raw input to the PTY.
    pub fn write_input(&mut self, data: &[u8]) {
        if !self.is_attached() {
            log::debug!("Dropping input for {} ({:?})", self.id, self.state);
            return;
        }
        if let Some(surface) = self.surface.as_mut() {
            if surface.screen().display_offset() > 0 {
                surface.scroll_to_bottom();
                self.dirty = true;
            }
        }
        if let Err(e) = self.bridge.write(self.id, data) {
            log::warn!("Failed to write to {}: {e}", self.id);
        }
    }

    /// Intercept the binding's local chords. Anything else is left to the
    /// caller, which forwards it to the PTY.
    pub fn handle_key(&mut self, event: &KeyEvent) -> KeyDisposition {
        if !event.is_down() {
            return KeyDisposition::Forward;
        }
        self.on_interaction();

        if self.options.search_chord.matches(event) {
            KeyDisposition::Consumed(LocalAction::ToggleSearch)
        } else if self.options.sidebar_chord.matches(event) {
            KeyDisposition::Consumed(LocalAction::ToggleSidebar)
        } else {
            KeyDisposition::Forward
        }
    }

    /// First user interaction enables ligatures, once.
    pub fn on_interaction(&mut self) -> bool {
        if !self.ligatures_armed {
            return false;
        }
        self.ligatures_armed = false;
        self.ligatures = true;
        self.needs_full_frame = true;
        log::debug!("Ligatures enabled for {}", self.id);
        true
    }

    /// Apply one event from the session's output stream.
    pub fn handle_output(
        &mut self,
        output: PtyOutput,
        clipboard: &mut dyn Clipboard,
    ) -> Vec<BindingEvent> {
        if !self.is_attached() {
            log::debug!("Discarding output for {} ({:?})", self.id, self.state);
            return Vec::new();
        }

        let mut events = Vec::new();
        match output {
            PtyOutput::Data(bytes) => self.apply_data(&bytes, clipboard, &mut events),
            PtyOutput::Title(title) => events.push(BindingEvent::TitleChanged(title)),
            PtyOutput::Exited(code) => {
                log::info!("Process of {} exited with {code:?}", self.id);
                self.live = false;
                self.ligatures_armed = false;
                events.push(BindingEvent::Exited(code));
            }
        }
        events
    }

    fn apply_data(
        &mut self,
        bytes: &[u8],
        clipboard: &mut dyn Clipboard,
        events: &mut Vec<BindingEvent>,
    ) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        surface.write(bytes);
        self.dirty = true;

        for reply in surface.take_pty_writes() {
            if let Err(e) = self.bridge.write(self.id, reply.as_bytes()) {
                log::warn!("Failed to write reply to {}: {e}", self.id);
            }
        }

        for request in surface.take_clipboard_requests() {
            match request {
                ClipboardRequest::Store(text) => {
                    if let Err(e) = clipboard.set_text(&text) {
                        log::warn!("Clipboard store from {} failed: {e}", self.id);
                    }
                }
                ClipboardRequest::Load(format) => match clipboard.get_text() {
                    Ok(text) => {
                        let reply = format(&text);
                        if let Err(e) = self.bridge.write(self.id, reply.as_bytes()) {
                            log::warn!("Failed to write clipboard to {}: {e}", self.id);
                        }
                    }
                    Err(e) => log::warn!("Clipboard load for {} failed: {e}", self.id),
                },
            }
        }

        if let Some(title) = surface.take_title_change() {
            events.push(BindingEvent::TitleChanged(title));
        }
        if surface.has_bell() {
            events.push(BindingEvent::Bell);
        }

        if self.search.is_open() && !self.search.query().is_empty() {
            self.search_stale = true;
        }
    }

    /// Recompute search matches if output arrived since the last call.
    /// Returns `true` when the search view changed.
    pub fn refresh_search(&mut self) -> bool {
        if !std::mem::take(&mut self.search_stale) {
            return false;
        }
        let Some((lines, _)) = self.search_context() else {
            return false;
        };
        let before = self.search.view();
        self.search.refresh(&lines);
        if self.search.view() == before {
            return false;
        }
        self.needs_full_frame = true;
        true
    }

    /// Handle a pane geometry change, if one is pending.
    pub fn poll_geometry(&mut self) -> Option<GridSize> {
        if !self.is_attached() {
            return None;
        }
        let pane = self.resize.poll()?;
        let cell = self.font.as_ref()?.cell;

        match self.resize.on_geometry(pane, cell) {
            GeometryOutcome::Skipped => None,
            GeometryOutcome::Unchanged(grid) => {
                self.resize_surface(grid);
                None
            }
            GeometryOutcome::Resized(grid) => {
                self.resize_surface(grid);
                if let Err(e) = self.bridge.resize(self.id, grid.cols, grid.rows) {
                    log::warn!("Failed to resize {}: {e}", self.id);
                }
                log::debug!("Resized {} to {}x{}", self.id, grid.cols, grid.rows);
                Some(grid)
            }
        }
    }

    fn resize_surface(&mut self, grid: GridSize) {
        if let Some(surface) = self.surface.as_mut() {
            if surface.size() != grid {
                surface.resize(grid);
                self.needs_full_frame = true;
            }
        }
    }

    /// Everything that changed on screen since the previous frame.
    pub fn take_frame(&mut self) -> Option<Frame> {
        if !self.is_attached() {
            return None;
        }
        self.refresh_search();
        if !(self.dirty || self.needs_full_frame) {
            return None;
        }
        let surface = self.surface.as_mut()?;
        let frame = extract_frame(
            self.id,
            surface,
            FrameExtras {
                decorations: self.search.decorations(),
                ligatures: self.ligatures,
                force_full: self.needs_full_frame,
            },
        );
        self.dirty = false;
        self.needs_full_frame = false;
        frame
    }

    // Search

    fn search_context(&self) -> Option<(Vec<String>, usize)> {
        let screen = self.surface.as_ref()?.screen();
        Some((screen.buffer_lines(), screen.viewport_top()))
    }

    fn reveal(&mut self, found: Option<SearchMatch>) -> Option<SearchMatch> {
        if let (Some(m), Some(surface)) = (found, self.surface.as_mut()) {
            surface.scroll_to_line(m.line);
        }
        self.needs_full_frame = true;
        found
    }

    pub fn search_view(&self) -> SearchView {
        self.search.view()
    }

    pub fn search_open(&self) -> bool {
        self.search.is_open()
    }

    /// The search query input has keyboard focus.
    pub fn search_focused(&self) -> bool {
        self.search.is_open() && self.search.focus() == SearchFocus::Query
    }

    pub fn open_search(&mut self) {
        if self.is_attached() {
            self.search.open();
            self.needs_full_frame = true;
        }
    }

    pub fn close_search(&mut self) {
        self.search.close();
        self.search_stale = false;
        self.needs_full_frame = true;
    }

    pub fn toggle_search(&mut self) {
        if self.search.is_open() {
            self.close_search();
        } else {
            self.open_search();
        }
    }

    pub fn search_query(&mut self, text: &str) -> Option<SearchMatch> {
        if !self.search.is_open() {
            return None;
        }
        let (lines, origin) = self.search_context()?;
        let found = self.search.on_query_change(text, &lines, origin);
        self.reveal(found)
    }

    pub fn find_next(&mut self, query: &str, whole_word: bool) -> Option<SearchMatch> {
        if !self.search.is_open() {
            return None;
        }
        let (lines, origin) = self.search_context()?;
        let found = self.search.find_next(query, whole_word, &lines, origin);
        self.reveal(found)
    }

    pub fn find_previous(&mut self, query: &str, whole_word: bool) -> Option<SearchMatch> {
        if !self.search.is_open() {
            return None;
        }
        let (lines, origin) = self.search_context()?;
        let found = self.search.find_previous(query, whole_word, &lines, origin);
        self.reveal(found)
    }

    pub fn toggle_whole_word(&mut self) -> Option<SearchMatch> {
        if !self.search.is_open() {
            return None;
        }
        let (lines, origin) = self.search_context()?;
        let found = self.search.toggle_whole_word(&lines, origin);
        self.reveal(found)
    }

    /// A key pressed while the query input has focus.
    pub fn search_key(&mut self, event: &KeyEvent) -> SearchKeyOutcome {
        let Some((lines, origin)) = self.search_context() else {
            return SearchKeyOutcome::Ignored;
        };
        let outcome = self
            .search
            .handle_key(event, &self.options.search_chord, &lines, origin);
        match outcome {
            SearchKeyOutcome::Navigated(found) => {
                self.reveal(found);
            }
            SearchKeyOutcome::Closed => self.needs_full_frame = true,
            SearchKeyOutcome::Absorbed | SearchKeyOutcome::Ignored => {}
        }
        outcome
    }

    // Links

    /// The link under a viewport cell.
    pub fn link_at(&self, row: u16, col: u16) -> Option<Link> {
        let (lines, top) = self.search_context()?;
        self.links.link_at(&lines, top + row as usize, col as usize)
    }

    /// A click on a viewport cell: counts as interaction and opens a link
    /// under it. Returns the opened link.
    pub fn click(&mut self, row: u16, col: u16) -> Option<Link> {
        self.on_interaction();
        let link = self.link_at(row, col)?;
        self.open_link(&link);
        Some(link)
    }

    fn open_link(&self, link: &Link) {
        log::info!("Opening {}", link.uri);
        if let Err(e) = open::that(&link.uri) {
            log::warn!("Failed to open {}: {e}", link.uri);
        }
    }

    /// Tear the binding down. Every step runs even if an earlier one
    /// failed; calling this again does nothing.
    pub fn dispose(&mut self) {
        if self.state == BindingState::Disposed {
            return;
        }
        log::debug!("Disposing {} ({:?})", self.id, self.state);

        self.resize.disconnect();

        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }

        self.search.close();
        self.ligatures_armed = false;
        self.ligatures = false;
        self.surface = None;

        if self.spawn_issued {
            if let Err(e) = self.bridge.kill(self.id) {
                log::warn!("Failed to kill {}: {e}", self.id);
            }
        }
        self.live = false;
        self.state = BindingState::Disposed;
    }
}

impl Drop for SessionBinding {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::search::DecorationKind;
    use crate::testing::{builtin_font, Call, RecordingBridge};
    use conch_pty::SessionOutput;
    use conch_vt::{fit_grid, PixelBox};
    use tokio::sync::mpsc;

    const PANE: Size = Size::new(816.0, 496.0);

    struct Fixture {
        bridge: Arc<RecordingBridge>,
        fonts: FontCache,
        pane: watch::Sender<Size>,
        sink: OutputSink,
        output: mpsc::UnboundedReceiver<SessionOutput>,
    }

    impl Fixture {
        fn new(bridge: RecordingBridge) -> Self {
            let (pane, _) = watch::channel(PANE);
            let (sink, output) = mpsc::unbounded_channel();
            Self {
                bridge: Arc::new(bridge),
                fonts: FontCache::new(builtin_font()),
                pane,
                sink,
                output,
            }
        }

        fn grid(&self, size: Size) -> GridSize {
            let cell = LoadedFont::builtin(&builtin_font()).cell;
            fit_grid(PixelBox::new(size.width, size.height), 8.0, cell).unwrap()
        }

        async fn mounted(&self, id: u64) -> SessionBinding {
            let mut binding = SessionBinding::new(
                SessionId(id),
                self.bridge.clone(),
                BindingOptions::default(),
            );
            binding
                .mount(&self.fonts, self.pane.subscribe(), self.sink.clone())
                .await;
            binding
        }
    }

    fn data(text: &str) -> PtyOutput {
        PtyOutput::Data(text.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_mount_subscribes_before_spawn() {
        let fx = Fixture::new(RecordingBridge::new());
        let binding = fx.mounted(1).await;
        let grid = fx.grid(PANE);

        assert_eq!(binding.state(), BindingState::Attached);
        assert!(binding.is_live());
        assert_eq!(
            fx.bridge.calls(),
            vec![
                Call::Subscribe(SessionId(1)),
                Call::Spawn(SessionId(1), grid.cols, grid.rows),
            ]
        );
        assert_eq!(binding.surface().unwrap().size(), grid);
    }

    #[tokio::test]
    async fn test_unlaid_pane_falls_back_to_default_grid() {
        let fx = Fixture::new(RecordingBridge::new());
        fx.pane.send_replace(Size::default());
        let binding = fx.mounted(1).await;

        assert_eq!(binding.surface().unwrap().size(), GridSize::default());
        assert!(fx.bridge.calls().contains(&Call::Spawn(SessionId(1), 80, 24)));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_written_inline() {
        let fx = Fixture::new(RecordingBridge::failing_spawn());
        let mut binding = fx.mounted(1).await;

        assert_eq!(binding.state(), BindingState::Attached);
        assert!(!binding.is_live());
        let text = binding.surface().unwrap().screen().buffer_lines().join("\n");
        assert!(text.contains("Failed to start PTY: PTY spawn failed: no such shell"));

        // Input on an inert session is still handed to the bridge.
        binding.write_input(b"ls\r");
        assert_eq!(fx.bridge.written(SessionId(1)), b"ls\r");

        // No ligatures without a process.
        assert!(!binding.on_interaction());
    }

    #[tokio::test]
    async fn test_output_reaches_surface_and_title_is_reported() {
        let fx = Fixture::new(RecordingBridge::new());
        let mut binding = fx.mounted(1).await;
        let mut clipboard = MemoryClipboard::new();

        let events = binding.handle_output(data("\x1b]0;vim notes.txt\x07hello"), &mut clipboard);
        assert_eq!(events, vec![BindingEvent::TitleChanged("vim notes.txt".to_string())]);
        assert_eq!(binding.surface().unwrap().screen().row_text(0), "hello");

        let events = binding.handle_output(PtyOutput::Title("pwsh".to_string()), &mut clipboard);
        assert_eq!(events, vec![BindingEvent::TitleChanged("pwsh".to_string())]);
    }

    #[tokio::test]
    async fn test_bell_and_exit_events() {
        let fx = Fixture::new(RecordingBridge::new());
        let mut binding = fx.mounted(1).await;
        let mut clipboard = MemoryClipboard::new();

        assert_eq!(
            binding.handle_output(data("\x07"), &mut clipboard),
            vec![BindingEvent::Bell]
        );
        assert_eq!(
            binding.handle_output(PtyOutput::Exited(Some(0)), &mut clipboard),
            vec![BindingEvent::Exited(Some(0))]
        );
        assert!(binding.is_attached());
        assert!(!binding.is_live());
    }

    #[tokio::test]
    async fn test_device_status_reply_goes_back_to_pty() {
        let fx = Fixture::new(RecordingBridge::new());
        let mut binding = fx.mounted(1).await;
        fx.bridge.clear();

        binding.handle_output(data("\x1b[6n"), &mut MemoryClipboard::new());
        assert_eq!(fx.bridge.written(SessionId(1)), b"\x1b[1;1R");
    }

    #[tokio::test]
    async fn test_osc52_store_reaches_clipboard() {
        let fx = Fixture::new(RecordingBridge::new());
        let mut binding = fx.mounted(1).await;
        let mut clipboard = MemoryClipboard::new();

        // "copied" in base64.
        let events = binding.handle_output(data("\x1b]52;c;Y29waWVk\x07"), &mut clipboard);
        assert!(events.is_empty());
        assert_eq!(clipboard.get_text().unwrap(), "copied");
    }

    #[tokio::test]
    async fn test_local_chords_are_consumed() {
        let fx = Fixture::new(RecordingBridge::new());
        let mut binding = fx.mounted(1).await;

        assert_eq!(
            binding.handle_key(&KeyEvent::down("f", Modifiers::CTRL)),
            KeyDisposition::Consumed(LocalAction::ToggleSearch)
        );
        assert_eq!(
            binding.handle_key(&KeyEvent::down("b", Modifiers::META)),
            KeyDisposition::Consumed(LocalAction::ToggleSidebar)
        );
        assert_eq!(
            binding.handle_key(&KeyEvent::down("F", Modifiers::CTRL | Modifiers::SHIFT)),
            KeyDisposition::Forward
        );
        assert_eq!(
            binding.handle_key(&KeyEvent::down("a", Modifiers::empty()).with_text("a")),
            KeyDisposition::Forward
        );
    }

    #[tokio::test]
    async fn test_ligatures_enable_once_on_first_interaction() {
        let fx = Fixture::new(RecordingBridge::new());
        let mut binding = fx.mounted(1).await;
        assert!(!binding.ligatures_enabled());

        binding.handle_key(&KeyEvent::down("a", Modifiers::empty()));
        assert!(binding.ligatures_enabled());
        assert!(!binding.on_interaction());

        let frame = binding.take_frame().unwrap();
        assert!(frame.ligatures);
    }

    #[tokio::test]
    async fn test_resize_only_when_grid_changes() {
        let fx = Fixture::new(RecordingBridge::new());
        let mut binding = fx.mounted(1).await;
        fx.bridge.clear();

        // No change yet.
        assert_eq!(binding.poll_geometry(), None);

        // Sub-cell change: same grid, no PTY resize.
        fx.pane.send_replace(Size::new(PANE.width + 1.0, PANE.height + 1.0));
        assert_eq!(binding.poll_geometry(), None);
        assert!(fx.bridge.calls().is_empty());

        let bigger = Size::new(1216.0, 696.0);
        let grid = fx.grid(bigger);
        fx.pane.send_replace(bigger);
        assert_eq!(binding.poll_geometry(), Some(grid));
        assert_eq!(fx.bridge.calls(), vec![Call::Resize(SessionId(1), grid.cols, grid.rows)]);
        assert_eq!(binding.surface().unwrap().size(), grid);

        // Collapsed pane: skipped, nothing sent.
        fx.bridge.clear();
        fx.pane.send_replace(Size::default());
        assert_eq!(binding.poll_geometry(), None);
        assert!(fx.bridge.calls().is_empty());
    }

    #[tokio::test]
    async fn test_search_navigation_and_decorations() {
        let fx = Fixture::new(RecordingBridge::new());
        let mut binding = fx.mounted(1).await;
        let mut clipboard = MemoryClipboard::new();
        binding.handle_output(data("foo bar\r\nfoobar\r\nbar foo\r\n"), &mut clipboard);

        binding.open_search();
        assert!(binding.search_focused());

        let first = binding.search_query("foo");
        assert_eq!(first, Some(SearchMatch::new(0, 0, 3)));
        assert_eq!(binding.search_view().total, 3);

        let next = binding.search_key(&KeyEvent::down("Enter", Modifiers::empty()));
        assert_eq!(next, SearchKeyOutcome::Navigated(Some(SearchMatch::new(1, 0, 3))));

        assert_eq!(binding.toggle_whole_word(), Some(SearchMatch::new(2, 4, 3)));
        assert_eq!(binding.search_view().total, 2);

        let frame = binding.take_frame().unwrap();
        let active: Vec<_> = frame
            .decorations
            .iter()
            .filter(|d| d.kind == DecorationKind::ActiveMatch)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].range, SearchMatch::new(2, 4, 3));

        let outcome = binding.search_key(&KeyEvent::down("Escape", Modifiers::empty()));
        assert_eq!(outcome, SearchKeyOutcome::Closed);
        assert!(!binding.search_focused());
        assert_eq!(binding.search_view().total, 0);
    }

    #[tokio::test]
    async fn test_search_refreshes_on_new_output() {
        let fx = Fixture::new(RecordingBridge::new());
        let mut binding = fx.mounted(1).await;
        let mut clipboard = MemoryClipboard::new();
        binding.handle_output(data("error one\r\n"), &mut clipboard);

        binding.open_search();
        binding.search_query("error");
        assert_eq!(binding.search_view().total, 1);

        // Several chunks cost one rescan, on the next frame.
        binding.handle_output(data("error two\r\n"), &mut clipboard);
        let events = binding.handle_output(data("error three\r\n"), &mut clipboard);
        assert!(events.is_empty());
        assert_eq!(binding.search_view().total, 1);

        assert!(binding.refresh_search());
        assert_eq!(binding.search_view().total, 3);
        assert_eq!(binding.search_view().active, Some(SearchMatch::new(0, 0, 5)));
        assert!(!binding.refresh_search());
    }

    #[tokio::test]
    async fn test_frame_carries_refreshed_matches() {
        let fx = Fixture::new(RecordingBridge::new());
        let mut binding = fx.mounted(1).await;
        let mut clipboard = MemoryClipboard::new();
        binding.handle_output(data("warn\r\n"), &mut clipboard);
        binding.open_search();
        binding.search_query("warn");
        binding.take_frame();

        binding.handle_output(data("warn again\r\n"), &mut clipboard);
        let frame = binding.take_frame().unwrap();
        assert!(frame.full);
        assert_eq!(frame.decorations.len(), 2);
    }

    #[tokio::test]
    async fn test_search_ignored_while_panel_closed() {
        let fx = Fixture::new(RecordingBridge::new());
        let mut binding = fx.mounted(1).await;
        binding.handle_output(data("foo foo\r\n"), &mut MemoryClipboard::new());

        assert_eq!(binding.find_next("foo", false), None);
        assert_eq!(binding.find_previous("foo", false), None);
        assert_eq!(binding.search_query("foo"), None);
        assert_eq!(binding.toggle_whole_word(), None);

        let view = binding.search_view();
        assert!(!view.open);
        assert_eq!(view.active, None);
        let frame = binding.take_frame().unwrap();
        assert!(frame.decorations.is_empty());
    }

    #[tokio::test]
    async fn test_link_at_viewport_cell() {
        let fx = Fixture::new(RecordingBridge::new());
        let mut binding = fx.mounted(1).await;
        binding.handle_output(data("see https://example.com/docs now"), &mut MemoryClipboard::new());

        let link = binding.link_at(0, 10).unwrap();
        assert_eq!(link.uri, "https://example.com/docs");
        assert!(binding.link_at(0, 1).is_none());
    }

    #[tokio::test]
    async fn test_frames_are_full_then_partial() {
        let fx = Fixture::new(RecordingBridge::new());
        let mut binding = fx.mounted(1).await;

        let first = binding.take_frame().unwrap();
        assert!(first.full);
        assert_eq!(first.session, SessionId(1));

        // Nothing new: no frame, even though the cursor row is damaged.
        assert!(binding.take_frame().is_none());

        binding.handle_output(data("x"), &mut MemoryClipboard::new());
        let second = binding.take_frame().unwrap();
        assert!(!second.full);
        assert_eq!(second.lines.len(), 1);
        assert_eq!(second.lines[0].text, "x");
    }

    #[tokio::test]
    async fn test_dispose_is_ordered_and_idempotent() {
        let mut fx = Fixture::new(RecordingBridge::new());
        let mut binding = fx.mounted(1).await;
        fx.bridge.clear();

        binding.dispose();
        assert_eq!(binding.state(), BindingState::Disposed);
        assert!(binding.surface().is_none());
        assert!(!fx.bridge.is_subscribed(SessionId(1)));
        assert_eq!(fx.bridge.calls(), vec![Call::Kill(SessionId(1))]);

        // Late output is neither routed nor applied.
        assert!(!fx.bridge.emit(SessionId(1), data("late")));
        assert!(fx.output.try_recv().is_err());
        assert!(binding
            .handle_output(data("late"), &mut MemoryClipboard::new())
            .is_empty());

        binding.dispose();
        drop(binding);
        assert_eq!(fx.bridge.calls(), vec![Call::Kill(SessionId(1))]);
    }

    #[tokio::test]
    async fn test_dispose_before_mount_does_not_kill() {
        let fx = Fixture::new(RecordingBridge::new());
        let mut binding =
            SessionBinding::new(SessionId(1), fx.bridge.clone(), BindingOptions::default());
        binding.dispose();
        assert!(fx.bridge.calls().is_empty());

        // A disposed binding never mounts.
        binding
            .mount(&fx.fonts, fx.pane.subscribe(), fx.sink.clone())
            .await;
        assert_eq!(binding.state(), BindingState::Disposed);
        assert!(fx.bridge.calls().is_empty());
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.keys.search_toggle = "alt+/".to_string();
        config.keys.sidebar_toggle = "ctrl+a+b".to_string();
        config.terminal.padding_px = 4.0;

        let options = BindingOptions::from_config(&config);
        assert_eq!(options.search_chord, Chord::new("/", Modifiers::ALT));
        assert_eq!(options.sidebar_chord, Chord::new("b", Modifiers::CTRL));
        assert_eq!(options.padding, 4.0);
    }
}
