//! Window layout: sidebar, header and the terminal pane they leave over.
//!
//! The pane geometry is published on its own watch channel; resize
//! coordinators observe it and are the only path by which a layout change
//! reaches a PTY.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::SidebarConfig;

/// A size in logical pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// An in-progress sidebar resize started by a pointer press on the splitter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SidebarDrag {
    start_x: f32,
    start_width: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LayoutSnapshot {
    pub window: Size,
    pub header: Size,
    pub pane: Size,
    pub sidebar_open: bool,
    pub sidebar_width: f32,
    pub shortcuts_modal_open: bool,
    pub dragging: bool,
}

pub struct LayoutStore {
    window: Size,
    header: Size,
    sidebar_open: bool,
    sidebar_width: f32,
    min_sidebar_width: f32,
    max_sidebar_width: f32,
    shortcuts_modal_open: bool,
    drag: Option<SidebarDrag>,
    snapshot: watch::Sender<LayoutSnapshot>,
    pane: watch::Sender<Size>,
}

impl LayoutStore {
    pub fn new(sidebar: &SidebarConfig) -> Self {
        let mut store = Self {
            window: Size::default(),
            header: Size::default(),
            sidebar_open: sidebar.open,
            sidebar_width: sidebar.width_px,
            min_sidebar_width: sidebar.min_width_px,
            max_sidebar_width: sidebar.max_width_px,
            shortcuts_modal_open: false,
            drag: None,
            snapshot: watch::channel(LayoutSnapshot {
                window: Size::default(),
                header: Size::default(),
                pane: Size::default(),
                sidebar_open: sidebar.open,
                sidebar_width: sidebar.width_px,
                shortcuts_modal_open: false,
                dragging: false,
            })
            .0,
            pane: watch::channel(Size::default()).0,
        };
        store.sidebar_width = store.clamp_width(store.sidebar_width);
        store.publish();
        store
    }

    fn clamp_width(&self, width: f32) -> f32 {
        width.clamp(self.min_sidebar_width, self.max_sidebar_width)
    }

    pub fn sidebar_open(&self) -> bool {
        self.sidebar_open
    }

    pub fn sidebar_width(&self) -> f32 {
        self.sidebar_width
    }

    pub fn shortcuts_modal_open(&self) -> bool {
        self.shortcuts_modal_open
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// The pixel area left for terminal surfaces.
    pub fn pane_size(&self) -> Size {
        let sidebar = if self.sidebar_open {
            self.sidebar_width
        } else {
            0.0
        };
        Size {
            width: (self.window.width - sidebar).max(0.0),
            height: (self.window.height - self.header.height).max(0.0),
        }
    }

    pub fn toggle_sidebar(&mut self) {
        self.sidebar_open = !self.sidebar_open;
        if !self.sidebar_open {
            self.drag = None;
        }
        self.publish();
    }

    pub fn toggle_shortcuts_modal(&mut self) {
        self.shortcuts_modal_open = !self.shortcuts_modal_open;
        self.publish();
    }

    pub fn set_window_size(&mut self, size: Size) {
        self.window = size;
        self.publish();
    }

    pub fn set_header_size(&mut self, size: Size) {
        self.header = size;
        self.publish();
    }

    /// Start a drag at pointer position `x`. Ignored while the sidebar is closed.
    pub fn begin_sidebar_drag(&mut self, x: f32) {
        if !self.sidebar_open {
            return;
        }
        self.drag = Some(SidebarDrag {
            start_x: x,
            start_width: self.sidebar_width,
        });
        self.publish();
    }

    /// Follow the pointer; the width stays within the configured bounds.
    pub fn update_sidebar_drag(&mut self, x: f32) {
        let Some(drag) = self.drag else {
            return;
        };
        self.sidebar_width = self.clamp_width(drag.start_width + (x - drag.start_x));
        self.publish();
    }

    pub fn end_sidebar_drag(&mut self) {
        if self.drag.take().is_some() {
            log::debug!("Sidebar resized to {}px", self.sidebar_width);
            self.publish();
        }
    }

    pub fn snapshot(&self) -> LayoutSnapshot {
        LayoutSnapshot {
            window: self.window,
            header: self.header,
            pane: self.pane_size(),
            sidebar_open: self.sidebar_open,
            sidebar_width: self.sidebar_width,
            shortcuts_modal_open: self.shortcuts_modal_open,
            dragging: self.drag.is_some(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LayoutSnapshot> {
        self.snapshot.subscribe()
    }

    /// Observe the pane geometry. Only actual changes are published.
    pub fn observe_pane(&self) -> watch::Receiver<Size> {
        self.pane.subscribe()
    }

    fn publish(&self) {
        let next = self.snapshot();
        let pane = next.pane;
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        self.pane.send_if_modified(|current| {
            if *current == pane {
                return false;
            }
            *current = pane;
            true
        });
    }
}
