//! Registry of observers notified whenever a cell changes.

use std::{
    collections::BTreeMap,
    rc::{Rc, Weak},
};

use strata_core::CellCoord;

/// Observer notified with the coordinate of every changed cell.
///
/// No payload describing the change is passed; the observer re-reads the
/// current cell state itself. Callbacks run inline on the thread driving the
/// terrain and must not block: a replicator should enqueue a delta rather
/// than write to the network.
///
/// Callbacks receive no access to the terrain or its registry, so a listener
/// cannot register or unregister observers while a notification is in
/// flight.
pub trait ChangeListener {
    /// Called once per changed coordinate.
    fn on_tile_changed(&self, cell: CellCoord);
}

/// Handle identifying a registered change listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u32);

impl ListenerId {
    /// Retrieves the numeric representation of the handle.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Registry holding non-owning references to change listeners.
///
/// Identifiers are allocated in increasing order, so iterating the map
/// notifies listeners in registration order.
#[derive(Debug, Default)]
pub(crate) struct ListenerRegistry {
    entries: BTreeMap<ListenerId, Weak<dyn ChangeListener>>,
    next_listener_id: u32,
}

impl ListenerRegistry {
    pub(crate) fn register(&mut self, listener: Weak<dyn ChangeListener>) -> ListenerId {
        self.entries.retain(|_, entry| entry.strong_count() > 0);
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id = self.next_listener_id.wrapping_add(1);
        let _ = self.entries.insert(id, listener);
        id
    }

    /// Removes the listener; unknown handles are ignored.
    pub(crate) fn unregister(&mut self, id: ListenerId) {
        let _ = self.entries.remove(&id);
    }

    /// Captures the live listeners in registration order.
    ///
    /// Cascades notify from the snapshot so the set of observers is fixed for
    /// the duration of one mutation.
    pub(crate) fn snapshot(&self) -> Vec<Rc<dyn ChangeListener>> {
        self.entries.values().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn live_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }
}

/// Notifies every listener in the snapshot about one coordinate.
pub(crate) fn notify(listeners: &[Rc<dyn ChangeListener>], cell: CellCoord) {
    for listener in listeners {
        listener.on_tile_changed(cell);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<CellCoord>>,
    }

    impl ChangeListener for Recorder {
        fn on_tile_changed(&self, cell: CellCoord) {
            self.seen.borrow_mut().push(cell);
        }
    }

    fn downgrade(recorder: &Rc<Recorder>) -> Weak<dyn ChangeListener> {
        let weak = Rc::downgrade(recorder);
        weak
    }

    #[test]
    fn registry_starts_empty() {
        let registry = ListenerRegistry::default();
        assert!(registry.snapshot().is_empty());
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn identifiers_increase_with_registration() {
        let mut registry = ListenerRegistry::default();
        let first = Rc::new(Recorder::default());
        let second = Rc::new(Recorder::default());

        let first_id = registry.register(downgrade(&first));
        let second_id = registry.register(downgrade(&second));

        assert!(first_id < second_id);
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn unregistering_unknown_listener_is_a_no_op() {
        let mut registry = ListenerRegistry::default();
        let recorder = Rc::new(Recorder::default());
        let id = registry.register(downgrade(&recorder));

        registry.unregister(id);
        registry.unregister(id);

        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn dropped_listeners_are_skipped() {
        let mut registry = ListenerRegistry::default();
        let kept = Rc::new(Recorder::default());
        let dropped = Rc::new(Recorder::default());
        let _kept_id = registry.register(downgrade(&kept));
        let _dropped_id = registry.register(downgrade(&dropped));
        drop(dropped);

        notify(&registry.snapshot(), CellCoord::new(1, 2));

        assert_eq!(kept.seen.borrow().as_slice(), &[CellCoord::new(1, 2)]);
        assert_eq!(registry.live_count(), 1);
    }
}
