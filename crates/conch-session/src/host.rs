//! The session host: a single-task actor that owns the tab store, the layout
//! store and every session binding.
//!
//! All triggers (keyboard shortcuts, pointer and drag events, IPC requests)
//! reach the host as [`HostCommand`]s on one channel, so mutations never
//! interleave. PTY output arrives on a second channel, tagged with the
//! session id. Whatever the window has to draw or react to leaves as
//! [`HostEvent`]s.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use conch_pty::{OutputSink, PtyBridge, SessionId, SessionOutput};
use conch_vt::FontCache;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::binding::{BindingEvent, BindingOptions, SessionBinding};
use crate::clipboard::Clipboard;
use crate::config::Config;
use crate::frame::Frame;
use crate::keys::{KeyDisposition, KeyEvent, LocalAction};
use crate::layout::{LayoutSnapshot, LayoutStore, Size};
use crate::search::{SearchKeyOutcome, SearchView};
use crate::shortcuts::{Shortcut, ShortcutMap};
use crate::tabs::{TabSnapshot, TabStore};

/// Requests the host understands.
#[derive(Clone, Debug, PartialEq)]
pub enum HostCommand {
    AddTab,
    RemoveTab(SessionId),
    CloseActiveTab,
    CloseAllTabs,
    CloseOtherTabs,
    ActivateTab(SessionId),
    ReorderTabs { from: usize, to: usize },
    RenameTab { session: SessionId, title: String },
    ToggleSidebar,
    ToggleSearch,
    ToggleFullscreen,
    ToggleShortcutsModal,
    WindowResized(Size),
    HeaderResized(Size),
    SidebarDragStart(f32),
    SidebarDragMove(f32),
    SidebarDragEnd,
    /// A key press in the window; routed to search, shortcuts or the PTY.
    Key(KeyEvent),
    /// Raw input for one session (paste, IME commit).
    Input { session: SessionId, data: Vec<u8> },
    SearchQuery(String),
    SearchNext { query: String, whole_word: bool },
    SearchPrevious { query: String, whole_word: bool },
    SearchToggleWholeWord,
    SearchClose,
    Click { session: SessionId, row: u16, col: u16 },
    Shutdown,
}

/// Notifications for the window.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    TabsChanged(TabSnapshot),
    LayoutChanged(LayoutSnapshot),
    Frame(Frame),
    SearchChanged {
        session: SessionId,
        view: SearchView,
    },
    Bell {
        session: SessionId,
    },
    Exited {
        session: SessionId,
        code: Option<u32>,
    },
    ToggleFullscreen,
}

pub struct SessionHost {
    tabs: TabStore,
    layout: LayoutStore,
    bindings: HashMap<SessionId, SessionBinding>,
    bridge: Arc<dyn PtyBridge>,
    fonts: FontCache,
    clipboard: Box<dyn Clipboard>,
    shortcuts: ShortcutMap,
    options: BindingOptions,
    output_tx: OutputSink,
    output_rx: mpsc::UnboundedReceiver<SessionOutput>,
    events: mpsc::UnboundedSender<HostEvent>,
    tabs_seen: watch::Receiver<TabSnapshot>,
    layout_seen: watch::Receiver<LayoutSnapshot>,
    frame_interval: Duration,
}

impl SessionHost {
    pub fn new(
        config: &Config,
        bridge: Arc<dyn PtyBridge>,
        clipboard: Box<dyn Clipboard>,
        events: mpsc::UnboundedSender<HostEvent>,
    ) -> Self {
        let tabs = TabStore::new(config.default_title.clone());
        let layout = LayoutStore::new(&config.sidebar);
        let tabs_seen = tabs.subscribe();
        let layout_seen = layout.subscribe();
        let (output_tx, output_rx) = mpsc::unbounded_channel();

        Self {
            tabs,
            layout,
            bindings: HashMap::new(),
            bridge,
            fonts: FontCache::new(config.font_spec()),
            clipboard,
            shortcuts: ShortcutMap::from_config(&config.keys),
            options: BindingOptions::from_config(config),
            output_tx,
            output_rx,
            events,
            tabs_seen,
            layout_seen,
            frame_interval: Duration::from_millis(config.terminal.frame_interval_ms.max(1)),
        }
    }

    pub fn tabs(&self) -> &TabStore {
        &self.tabs
    }

    pub fn layout(&self) -> &LayoutStore {
        &self.layout
    }

    pub fn binding(&self, id: SessionId) -> Option<&SessionBinding> {
        self.bindings.get(&id)
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    fn emit(&self, event: HostEvent) {
        if self.events.send(event).is_err() {
            log::debug!("Host event dropped: no listener");
        }
    }

    /// Process commands and output until `Shutdown` or until the command
    /// channel closes, then tear every session down.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<HostCommand>) {
        self.emit(HostEvent::TabsChanged(self.tabs.snapshot()));
        self.emit(HostEvent::LayoutChanged(self.layout.snapshot()));
        self.settle().await;

        let mut ticker = tokio::time::interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(HostCommand::Shutdown) | None => break,
                    Some(command) => {
                        self.apply(command);
                        self.settle().await;
                    }
                },
                Some(output) = self.output_rx.recv() => {
                    self.handle_output(output);
                    self.pump_output();
                }
                _ = ticker.tick() => self.pump_frames(),
            }
        }

        self.shutdown();
    }

    /// Apply one command synchronously. Tabs added by it are mounted by the
    /// next [`settle`](Self::settle).
    pub fn apply(&mut self, command: HostCommand) {
        match command {
            HostCommand::AddTab => {
                self.add_tab();
            }
            HostCommand::RemoveTab(id) => self.remove_tab(id),
            HostCommand::CloseActiveTab => self.remove_tab(self.tabs.active_id()),
            HostCommand::CloseAllTabs => self.remove_all_tabs(),
            HostCommand::CloseOtherTabs => self.remove_other_tabs(self.tabs.active_id()),
            HostCommand::ActivateTab(id) => self.tabs.set_active_tab_id(id),
            HostCommand::ReorderTabs { from, to } => self.tabs.reorder_tabs(from, to),
            HostCommand::RenameTab { session, title } => {
                self.tabs.set_custom_tab_title(session, &title)
            }
            HostCommand::ToggleSidebar => self.toggle_sidebar(),
            HostCommand::ToggleSearch => self.toggle_search(),
            HostCommand::ToggleFullscreen => self.toggle_fullscreen(),
            HostCommand::ToggleShortcutsModal => self.layout.toggle_shortcuts_modal(),
            HostCommand::WindowResized(size) => self.layout.set_window_size(size),
            HostCommand::HeaderResized(size) => self.layout.set_header_size(size),
            HostCommand::SidebarDragStart(x) => self.layout.begin_sidebar_drag(x),
            HostCommand::SidebarDragMove(x) => self.layout.update_sidebar_drag(x),
            HostCommand::SidebarDragEnd => self.layout.end_sidebar_drag(),
            HostCommand::Key(event) => self.handle_key(&event),
            HostCommand::Input { session, data } => match self.bindings.get_mut(&session) {
                Some(binding) => binding.write_input(&data),
                None => log::debug!("Input for unknown {session} dropped"),
            },
            HostCommand::SearchQuery(text) => {
                self.with_active_search(|binding| {
                    binding.search_query(&text);
                });
            }
            HostCommand::SearchNext { query, whole_word } => {
                self.with_active_search(|binding| {
                    binding.find_next(&query, whole_word);
                });
            }
            HostCommand::SearchPrevious { query, whole_word } => {
                self.with_active_search(|binding| {
                    binding.find_previous(&query, whole_word);
                });
            }
            HostCommand::SearchToggleWholeWord => {
                self.with_active_search(|binding| {
                    binding.toggle_whole_word();
                });
            }
            HostCommand::SearchClose => self.with_active_search(SessionBinding::close_search),
            HostCommand::Click { session, row, col } => {
                if let Some(binding) = self.bindings.get_mut(&session) {
                    binding.click(row, col);
                }
            }
            HostCommand::Shutdown => self.shutdown(),
        }

        self.sync_geometry();
        self.publish();
    }

    // Dispatcher operations. All synchronous and safe to call redundantly.

    pub fn add_tab(&mut self) -> SessionId {
        let id = self.tabs.add_tab();
        self.reconcile();
        id
    }

    pub fn remove_tab(&mut self, id: SessionId) {
        self.tabs.remove_tab(id);
        self.reconcile();
    }

    pub fn remove_all_tabs(&mut self) {
        self.tabs.remove_all_tabs();
        self.reconcile();
    }

    pub fn remove_other_tabs(&mut self, id: SessionId) {
        self.tabs.remove_other_tabs(id);
        self.reconcile();
    }

    pub fn toggle_sidebar(&mut self) {
        self.layout.toggle_sidebar();
    }

    pub fn toggle_search(&mut self) {
        self.with_active_search(SessionBinding::toggle_search);
    }

    pub fn toggle_fullscreen(&mut self) {
        self.emit(HostEvent::ToggleFullscreen);
    }

    /// Dispose bindings whose tab is gone.
    fn reconcile(&mut self) {
        let tabs = &self.tabs;
        let removed: Vec<SessionId> = self
            .bindings
            .keys()
            .filter(|id| !tabs.contains(**id))
            .copied()
            .collect();

        for id in removed {
            if let Some(mut binding) = self.bindings.remove(&id) {
                binding.dispose();
            }
        }
    }

    /// Mount a binding for every tab that has none, in tab order.
    pub async fn settle(&mut self) {
        for id in self.tabs.ids() {
            if self.bindings.contains_key(&id) {
                continue;
            }
            let mut binding = SessionBinding::new(id, self.bridge.clone(), self.options.clone());
            binding
                .mount(&self.fonts, self.layout.observe_pane(), self.output_tx.clone())
                .await;
            self.bindings.insert(id, binding);
        }
        self.sync_geometry();
        self.publish();
    }

    fn with_active_search(&mut self, f: impl FnOnce(&mut SessionBinding)) {
        let id = self.tabs.active_id();
        let Some(binding) = self.bindings.get_mut(&id) else {
            return;
        };
        if !binding.search_open() {
            log::debug!("Search command for {id} ignored: panel closed");
            return;
        }
        f(binding);
        let view = binding.search_view();
        self.emit(HostEvent::SearchChanged { session: id, view });
    }

    /// Route a key: the search input first, then the session's local chords,
    /// then the global shortcut table, and finally the PTY.
    fn handle_key(&mut self, event: &KeyEvent) {
        let id = self.tabs.active_id();

        if let Some(binding) = self.bindings.get_mut(&id) {
            if binding.search_focused() {
                let outcome = binding.search_key(event);
                if outcome != SearchKeyOutcome::Ignored {
                    let view = binding.search_view();
                    self.emit(HostEvent::SearchChanged { session: id, view });
                    return;
                }
                // Text typed into the query input never reaches the PTY.
                if let Some(shortcut) = self.shortcuts.lookup(event).cloned() {
                    self.run_shortcut(shortcut);
                }
                return;
            }

            match binding.handle_key(event) {
                KeyDisposition::Consumed(LocalAction::ToggleSearch) => {
                    self.toggle_search();
                    return;
                }
                KeyDisposition::Consumed(LocalAction::ToggleSidebar) => {
                    self.toggle_sidebar();
                    return;
                }
                KeyDisposition::Forward => {}
            }
        }

        if let Some(shortcut) = self.shortcuts.lookup(event).cloned() {
            self.run_shortcut(shortcut);
            return;
        }

        if let (true, Some(text)) = (event.is_down(), event.text.as_deref()) {
            if let Some(binding) = self.bindings.get_mut(&id) {
                binding.write_input(text.as_bytes());
            }
        }
    }

    fn run_shortcut(&mut self, shortcut: Shortcut) {
        log::debug!("Shortcut {shortcut:?}");
        match shortcut {
            Shortcut::ToggleSidebar => self.toggle_sidebar(),
            Shortcut::NewTab => {
                self.add_tab();
            }
            Shortcut::CloseTab => self.remove_tab(self.tabs.active_id()),
            Shortcut::CloseAllTabs => self.remove_all_tabs(),
            Shortcut::CloseOtherTabs => self.remove_other_tabs(self.tabs.active_id()),
            Shortcut::ToggleShortcutsModal => self.layout.toggle_shortcuts_modal(),
            Shortcut::ToggleFullscreen => self.toggle_fullscreen(),
            Shortcut::SendText(text) => {
                let id = self.tabs.active_id();
                if let Some(binding) = self.bindings.get_mut(&id) {
                    binding.write_input(text.as_bytes());
                }
            }
        }
    }

    /// Apply one output event. Events for sessions that no longer exist are
    /// dropped.
    pub fn handle_output(&mut self, output: SessionOutput) {
        let SessionOutput { id, event } = output;
        let Some(binding) = self.bindings.get_mut(&id) else {
            log::debug!("Dropping output for removed {id}");
            return;
        };

        let events = binding.handle_output(event, self.clipboard.as_mut());
        for event in events {
            match event {
                BindingEvent::TitleChanged(title) => self.tabs.update_tab_title(id, &title),
                BindingEvent::Bell => self.emit(HostEvent::Bell { session: id }),
                BindingEvent::Exited(code) => self.emit(HostEvent::Exited { session: id, code }),
            }
        }
        self.publish();
    }

    /// Apply all output that is already queued. Returns how many events
    /// were taken.
    pub fn pump_output(&mut self) -> usize {
        let mut taken = 0;
        while let Ok(output) = self.output_rx.try_recv() {
            self.handle_output(output);
            taken += 1;
        }
        taken
    }

    /// Emit a frame for every session whose screen changed. Searches that
    /// saw new output are recomputed first.
    pub fn pump_frames(&mut self) {
        self.sync_geometry();
        for id in self.tabs.ids() {
            let Some(binding) = self.bindings.get_mut(&id) else {
                continue;
            };
            let search = binding.refresh_search().then(|| binding.search_view());
            let frame = binding.take_frame();
            if let Some(view) = search {
                self.emit(HostEvent::SearchChanged { session: id, view });
            }
            if let Some(frame) = frame {
                self.emit(HostEvent::Frame(frame));
            }
        }
    }

    fn sync_geometry(&mut self) {
        for binding in self.bindings.values_mut() {
            binding.poll_geometry();
        }
    }

    /// Send snapshots of the stores if they changed.
    fn publish(&mut self) {
        if self.tabs_seen.has_changed().unwrap_or(false) {
            let snapshot = self.tabs_seen.borrow_and_update().clone();
            self.emit(HostEvent::TabsChanged(snapshot));
        }
        if self.layout_seen.has_changed().unwrap_or(false) {
            let snapshot = self.layout_seen.borrow_and_update().clone();
            self.emit(HostEvent::LayoutChanged(snapshot));
        }
    }

    /// Dispose every binding, in tab order.
    pub fn shutdown(&mut self) {
        for id in self.tabs.ids() {
            if let Some(mut binding) = self.bindings.remove(&id) {
                binding.dispose();
            }
        }
        for (_, mut binding) in self.bindings.drain() {
            binding.dispose();
        }
        log::info!("Session host stopped");
    }
}
