//! The Tab Store: ordered tab descriptors and the active-tab pointer.
//!
//! Two invariants hold after every operation: the collection is never
//! empty, and `active_id` names a tab that is in it. Operations on unknown
//! ids or out-of-range indices are no-ops.

use conch_pty::SessionId;
use serde::Serialize;
use tokio::sync::watch;

/// Title used until the shell reports one.
pub const DEFAULT_TAB_TITLE: &str = "PowerShell";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TabDescriptor {
    pub id: SessionId,
    /// Shell-reported title.
    pub title: String,
    /// User override; wins over `title` when set.
    pub custom_title: Option<String>,
}

impl TabDescriptor {
    fn new(id: SessionId, default_title: &str) -> Self {
        Self {
            id,
            title: default_title.to_string(),
            custom_title: None,
        }
    }

    pub fn display_title<'a>(&'a self, default_title: &'a str) -> &'a str {
        match self.custom_title.as_deref() {
            Some(custom) if !custom.is_empty() => custom,
            _ if !self.title.is_empty() => &self.title,
            _ => default_title,
        }
    }
}

/// One tab as observers see it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TabSummary {
    pub id: SessionId,
    pub title: String,
    pub custom: bool,
}

/// The whole collection as observers see it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TabSnapshot {
    pub tabs: Vec<TabSummary>,
    pub active_id: SessionId,
}

pub struct TabStore {
    tabs: Vec<TabDescriptor>,
    active_id: SessionId,
    /// Counter for generating unique session ids.
    next_id: u64,
    default_title: String,
    snapshot: watch::Sender<TabSnapshot>,
}

impl TabStore {
    /// Create a store holding one fresh, active tab.
    pub fn new(default_title: impl Into<String>) -> Self {
        let default_title = default_title.into();
        let first = TabDescriptor::new(SessionId(1), &default_title);
        let active_id = first.id;
        let (snapshot, _) = watch::channel(TabSnapshot {
            tabs: Vec::new(),
            active_id,
        });

        let store = Self {
            tabs: vec![first],
            active_id,
            next_id: 2,
            default_title,
            snapshot,
        };
        store.publish();
        store
    }

    fn fresh_tab(&mut self) -> TabDescriptor {
        let id = SessionId(self.next_id);
        self.next_id += 1;
        TabDescriptor::new(id, &self.default_title)
    }

    fn position(&self, id: SessionId) -> Option<usize> {
        self.tabs.iter().position(|t| t.id == id)
    }

    pub fn tabs(&self) -> &[TabDescriptor] {
        &self.tabs
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.tabs.iter().map(|t| t.id).collect()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    /// Always `false`; the store never holds zero tabs.
    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn active_id(&self) -> SessionId {
        self.active_id
    }

    pub fn get(&self, id: SessionId) -> Option<&TabDescriptor> {
        self.tabs.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.position(id).is_some()
    }

    pub fn default_title(&self) -> &str {
        &self.default_title
    }

    pub fn display_title(&self, id: SessionId) -> Option<&str> {
        self.get(id).map(|t| t.display_title(&self.default_title))
    }

    /// Append a fresh tab and make it active.
    pub fn add_tab(&mut self) -> SessionId {
        let tab = self.fresh_tab();
        let id = tab.id;
        self.tabs.push(tab);
        self.active_id = id;
        log::info!("Added tab {id} (total: {})", self.tabs.len());
        self.publish();
        id
    }

    /// Remove a tab. The last tab is replaced by a fresh one; removing the
    /// active tab activates the tab that is last afterwards.
    pub fn remove_tab(&mut self, id: SessionId) {
        let Some(index) = self.position(id) else {
            return;
        };
        self.tabs.remove(index);
        log::info!("Removed tab {id} (index {index})");

        if self.tabs.is_empty() {
            let tab = self.fresh_tab();
            self.active_id = tab.id;
            self.tabs.push(tab);
        } else if self.active_id == id {
            if let Some(last) = self.tabs.last() {
                self.active_id = last.id;
            }
        }
        self.publish();
    }

    /// Replace every tab with one fresh, active tab.
    pub fn remove_all_tabs(&mut self) {
        let tab = self.fresh_tab();
        self.active_id = tab.id;
        self.tabs = vec![tab];
        log::info!("Removed all tabs, {} is now the only tab", self.active_id);
        self.publish();
    }

    /// Collapse the collection to the tab `id`, which becomes active.
    pub fn remove_other_tabs(&mut self, id: SessionId) {
        if !self.contains(id) {
            return;
        }
        self.tabs.retain(|t| t.id == id);
        self.active_id = id;
        self.publish();
    }

    pub fn set_active_tab_id(&mut self, id: SessionId) {
        if self.active_id == id || !self.contains(id) {
            return;
        }
        self.active_id = id;
        log::debug!("Switched to tab {id}");
        self.publish();
    }

    /// Move the tab at `old_index` to `new_index`, shifting the tabs between.
    pub fn reorder_tabs(&mut self, old_index: usize, new_index: usize) {
        let len = self.tabs.len();
        if old_index >= len || new_index >= len || old_index == new_index {
            return;
        }
        let tab = self.tabs.remove(old_index);
        self.tabs.insert(new_index, tab);
        self.publish();
    }

    /// Set the shell-reported title. Blank titles fall back to the default.
    pub fn update_tab_title(&mut self, id: SessionId, raw_title: &str) {
        let default_title = self.default_title.clone();
        let Some(tab) = self.tabs.iter_mut().find(|t| t.id == id) else {
            return;
        };
        let trimmed = raw_title.trim();
        tab.title = if trimmed.is_empty() {
            default_title
        } else {
            trimmed.to_string()
        };
        self.publish();
    }

    /// Set the user's title override. A blank title clears the override.
    pub fn set_custom_tab_title(&mut self, id: SessionId, raw_title: &str) {
        let Some(tab) = self.tabs.iter_mut().find(|t| t.id == id) else {
            return;
        };
        let trimmed = raw_title.trim();
        tab.custom_title = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self.publish();
    }

    pub fn snapshot(&self) -> TabSnapshot {
        TabSnapshot {
            tabs: self
                .tabs
                .iter()
                .map(|t| TabSummary {
                    id: t.id,
                    title: t.display_title(&self.default_title).to_string(),
                    custom: t.custom_title.is_some(),
                })
                .collect(),
            active_id: self.active_id,
        }
    }

    /// Observe the collection. The receiver sees the state after every change.
    pub fn subscribe(&self) -> watch::Receiver<TabSnapshot> {
        self.snapshot.subscribe()
    }

    fn publish(&self) {
        let next = self.snapshot();
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn store() -> TabStore {
        TabStore::new(DEFAULT_TAB_TITLE)
    }

    fn assert_invariants(store: &TabStore) {
        assert!(!store.tabs().is_empty(), "collection must never be empty");
        assert!(
            store.contains(store.active_id()),
            "active id {} must be in the collection",
            store.active_id()
        );
    }

    #[test]
    fn test_new_store_has_one_active_tab() {
        let store = store();
        assert_eq!(store.len(), 1);
        assert_eq!(store.active_id(), store.tabs()[0].id);
        assert_eq!(store.display_title(store.active_id()), Some(DEFAULT_TAB_TITLE));
    }

    #[test]
    fn test_add_then_remove_scenario() {
        let mut store = store();
        let t0 = store.active_id();

        let t1 = store.add_tab();
        assert_eq!(store.ids(), vec![t0, t1]);
        assert_eq!(store.active_id(), t1);

        store.remove_tab(t0);
        assert_eq!(store.ids(), vec![t1]);
        assert_eq!(store.active_id(), t1);

        store.remove_tab(t1);
        assert_eq!(store.len(), 1);
        let fresh = store.active_id();
        assert_ne!(fresh, t0);
        assert_ne!(fresh, t1);
        assert_eq!(store.ids(), vec![fresh]);
    }

    #[test]
    fn test_remove_active_moves_to_last() {
        let mut store = store();
        let a = store.active_id();
        let b = store.add_tab();
        let c = store.add_tab();
        store.set_active_tab_id(a);

        store.remove_tab(a);
        assert_eq!(store.active_id(), c);
        assert_eq!(store.ids(), vec![b, c]);
    }

    #[test]
    fn test_remove_inactive_keeps_active() {
        let mut store = store();
        let a = store.active_id();
        let b = store.add_tab();
        store.set_active_tab_id(a);

        store.remove_tab(b);
        assert_eq!(store.active_id(), a);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut store = store();
        let before = store.snapshot();
        store.remove_tab(SessionId(999));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_remove_other_tabs() {
        let mut store = store();
        let _a = store.active_id();
        let b = store.add_tab();
        let _c = store.add_tab();
        store.set_active_tab_id(b);

        store.remove_other_tabs(b);
        assert_eq!(store.ids(), vec![b]);
        assert_eq!(store.active_id(), b);

        store.remove_other_tabs(SessionId(999));
        assert_eq!(store.ids(), vec![b]);
    }

    #[test]
    fn test_remove_all_tabs_resets_to_one_fresh_tab() {
        let mut store = store();
        let old: Vec<SessionId> = (0..3).map(|_| store.add_tab()).collect();

        store.remove_all_tabs();
        assert_eq!(store.len(), 1);
        assert!(!old.contains(&store.active_id()));
        assert_invariants(&store);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut store = store();
        let mut seen = vec![store.active_id()];
        for _ in 0..5 {
            let id = store.add_tab();
            assert!(!seen.contains(&id));
            seen.push(id);
            store.remove_tab(id);
        }
        store.remove_all_tabs();
        assert!(!seen.contains(&store.active_id()));
    }

    #[test]
    fn test_set_active_unknown_is_noop() {
        let mut store = store();
        let a = store.active_id();
        store.set_active_tab_id(SessionId(42));
        assert_eq!(store.active_id(), a);
    }

    #[test]
    fn test_reorder_moves_and_shifts() {
        let mut store = store();
        let a = store.active_id();
        let b = store.add_tab();
        let c = store.add_tab();

        store.reorder_tabs(0, 2);
        assert_eq!(store.ids(), vec![b, c, a]);

        store.reorder_tabs(2, 0);
        assert_eq!(store.ids(), vec![a, b, c]);
    }

    #[test]
    fn test_reorder_out_of_range_is_noop() {
        let mut store = store();
        let a = store.active_id();
        let b = store.add_tab();

        store.reorder_tabs(0, 5);
        store.reorder_tabs(7, 0);
        assert_eq!(store.ids(), vec![a, b]);
    }

    #[test]
    fn test_update_tab_title() {
        let mut store = store();
        let id = store.active_id();

        store.update_tab_title(id, "  vim main.rs  ");
        assert_eq!(store.display_title(id), Some("vim main.rs"));

        store.update_tab_title(id, "   ");
        assert_eq!(store.display_title(id), Some(DEFAULT_TAB_TITLE));
        assert!(store.get(id).unwrap().custom_title.is_none());
    }

    #[test]
    fn test_custom_title_overrides_shell_title() {
        let mut store = store();
        let id = store.active_id();
        store.update_tab_title(id, "PowerShell");

        store.set_custom_tab_title(id, " Work ");
        assert_eq!(store.display_title(id), Some("Work"));
        assert_eq!(store.get(id).unwrap().title, "PowerShell");

        // Shell title changes do not touch the override.
        store.update_tab_title(id, "htop");
        assert_eq!(store.display_title(id), Some("Work"));
    }

    #[test]
    fn test_blank_custom_title_clears_override() {
        let mut store = store();
        let id = store.active_id();
        store.update_tab_title(id, "zsh");
        store.set_custom_tab_title(id, "Work");

        store.set_custom_tab_title(id, "  ");
        assert_eq!(store.get(id).unwrap().custom_title, None);
        assert_eq!(store.display_title(id), Some("zsh"));
    }

    #[test]
    fn test_subscribe_sees_changes() {
        let mut store = store();
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());

        let id = store.add_tab();
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.active_id, id);
        assert_eq!(snapshot.tabs.len(), 2);

        // No-ops publish nothing.
        store.set_active_tab_id(SessionId(999));
        assert!(!rx.has_changed().unwrap());
    }

    #[derive(Clone, Debug)]
    enum Op {
        Add,
        Remove(usize),
        RemoveAll,
        RemoveOthers(usize),
        Activate(usize),
        Reorder(usize, usize),
        Title(usize, String),
        Custom(usize, String),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Add),
            (0usize..8).prop_map(Op::Remove),
            Just(Op::RemoveAll),
            (0usize..8).prop_map(Op::RemoveOthers),
            (0usize..8).prop_map(Op::Activate),
            (0usize..8, 0usize..8).prop_map(|(a, b)| Op::Reorder(a, b)),
            (0usize..8, "[ a-z]{0,6}").prop_map(|(i, s)| Op::Title(i, s)),
            (0usize..8, "[ a-z]{0,6}").prop_map(|(i, s)| Op::Custom(i, s)),
        ]
    }

    /// Index into the current ids, or an id that does not exist.
    fn pick(store: &TabStore, index: usize) -> SessionId {
        store
            .ids()
            .get(index)
            .copied()
            .unwrap_or(SessionId(10_000 + index as u64))
    }

    proptest! {
        #[test]
        fn prop_invariants_hold_for_any_sequence(ops in proptest::collection::vec(op(), 0..40)) {
            let mut store = store();
            for op in ops {
                match op {
                    Op::Add => { store.add_tab(); }
                    Op::Remove(i) => { let id = pick(&store, i); store.remove_tab(id); }
                    Op::RemoveAll => store.remove_all_tabs(),
                    Op::RemoveOthers(i) => { let id = pick(&store, i); store.remove_other_tabs(id); }
                    Op::Activate(i) => { let id = pick(&store, i); store.set_active_tab_id(id); }
                    Op::Reorder(a, b) => store.reorder_tabs(a, b),
                    Op::Title(i, s) => { let id = pick(&store, i); store.update_tab_title(id, &s); }
                    Op::Custom(i, s) => { let id = pick(&store, i); store.set_custom_tab_title(id, &s); }
                }
                prop_assert!(!store.is_empty());
                prop_assert!(store.contains(store.active_id()));
                let mut ids = store.ids();
                ids.sort();
                ids.dedup();
                prop_assert_eq!(ids.len(), store.len());
            }
        }

        #[test]
        fn prop_reorder_round_trip(extra in 1usize..6, i in 0usize..7, j in 0usize..7) {
            let mut store = store();
            for _ in 0..extra {
                store.add_tab();
            }
            prop_assume!(i != j && i < store.len() && j < store.len());

            let before = store.ids();
            store.reorder_tabs(i, j);
            store.reorder_tabs(j, i);
            prop_assert_eq!(store.ids(), before);
        }

        #[test]
        fn prop_removing_every_tab_never_empties(extra in 0usize..6, order in proptest::collection::vec(0usize..8, 1..20)) {
            let mut store = store();
            for _ in 0..extra {
                store.add_tab();
            }
            for index in order {
                let id = store.ids()[index % store.len()];
                store.remove_tab(id);
                prop_assert_eq!(store.len() >= 1, true);
                prop_assert!(store.contains(store.active_id()));
            }
        }
    }
}
