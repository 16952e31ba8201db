//! Per-device listener registry.
//!
//! A [`ListenerRegistry`] keeps **non-owning** references to listeners. Application
//! code owns each listener through an `Rc<RefCell<_>>` and hands the registry a
//! clone; the registry immediately downgrades it to a `Weak` and never keeps the
//! listener alive on its own.
//!
//! # Semantics
//! - **Set semantics:** registering the same listener (pointer identity) twice
//!   returns the original [`ListenerId`] and does not add a second entry.
//! - **Order:** dispatch visits listeners in registration order.
//! - **Lifetime:** callers should deregister before dropping a listener. A listener
//!   that is dropped while still registered is skipped during dispatch and removed
//!   by [`ListenerRegistry::prune`] (or the next add/remove).
//! - **Re-entrancy:** mutation needs `&mut self` while dispatch borrows `&self`, so a
//!   callback cannot add or remove listeners on the registry that is dispatching to
//!   it. A listener that is already mutably borrowed when its turn comes (e.g. it is
//!   re-entered through a second device) is skipped with a warning.
//! - **Threading:** `Rc`/`Weak` make the registry `!Send`; it lives on the input thread.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Handle identifying one registration within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Raw numeric value (unique per registry, never reused).
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

struct ListenerEntry<L: ?Sized> {
    id: ListenerId,
    listener: Weak<RefCell<L>>,
    enabled: bool,
}

impl<L: ?Sized> ListenerEntry<L> {
    fn is_alive(&self) -> bool {
        self.listener.strong_count() > 0
    }

    fn addr(&self) -> *const () {
        self.listener.as_ptr().cast::<()>()
    }
}

/// Ordered set of weak listener references for one device.
pub struct ListenerRegistry<L: ?Sized> {
    next_id: u64,
    entries: Vec<ListenerEntry<L>>,
}

impl<L: ?Sized> ListenerRegistry<L> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Registers `listener` and returns its id.
    ///
    /// Already-registered listeners keep their original id and position.
    pub fn add_listener(&mut self, listener: Rc<RefCell<L>>) -> ListenerId {
        self.prune();

        let addr = Rc::as_ptr(&listener).cast::<()>();
        if let Some(entry) = self.entries.iter().find(|e| e.addr() == addr) {
            return entry.id;
        }

        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push(ListenerEntry {
            id,
            listener: Rc::downgrade(&listener),
            enabled: true,
        });
        id
    }

    /// Deregisters `listener` by identity. Returns `false` if it was not registered.
    ///
    /// Generic over the pointee so callers can pass their concretely typed handle.
    pub fn remove_listener<T: ?Sized>(&mut self, listener: &Rc<RefCell<T>>) -> bool {
        let addr = Rc::as_ptr(listener).cast::<()>();
        let before = self.entries.len();
        self.entries.retain(|e| e.addr() != addr);
        let removed = self.entries.len() != before;
        self.prune();
        removed
    }

    /// Deregisters by id. Returns `false` if the id is unknown.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        let removed = self.entries.len() != before;
        self.prune();
        removed
    }

    /// Mutes a listener without removing it.
    pub fn disable(&mut self, id: ListenerId) -> bool {
        self.set_enabled(id, false)
    }

    /// Unmutes a previously disabled listener.
    pub fn enable(&mut self, id: ListenerId) -> bool {
        self.set_enabled(id, true)
    }

    fn set_enabled(&mut self, id: ListenerId, enabled: bool) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn contains<T: ?Sized>(&self, listener: &Rc<RefCell<T>>) -> bool {
        let addr = Rc::as_ptr(listener).cast::<()>();
        self.entries.iter().any(|e| e.addr() == addr && e.is_alive())
    }

    /// Id of `listener`, if registered.
    pub fn id_of<T: ?Sized>(&self, listener: &Rc<RefCell<T>>) -> Option<ListenerId> {
        let addr = Rc::as_ptr(listener).cast::<()>();
        self.entries
            .iter()
            .find(|e| e.addr() == addr && e.is_alive())
            .map(|e| e.id)
    }

    /// Drops entries whose listener no longer exists. Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| {
            let alive = e.is_alive();
            if !alive {
                tracing::debug!(id = e.id.0, "pruning listener dropped without deregistering");
            }
            alive
        });
        before - self.entries.len()
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_alive()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls `f` on every live, enabled listener in registration order.
    ///
    /// Returns the number of listeners notified.
    pub fn dispatch(&self, mut f: impl FnMut(&mut L)) -> usize {
        let mut notified = 0;
        for entry in &self.entries {
            if !entry.enabled {
                continue;
            }
            let Some(listener) = entry.listener.upgrade() else {
                tracing::trace!(id = entry.id.0, "skipping dropped listener");
                continue;
            };
            let borrowed = listener.try_borrow_mut();
            match borrowed {
                Ok(mut guard) => {
                    f(&mut *guard);
                    notified += 1;
                }
                Err(_) => {
                    tracing::warn!(
                        id = entry.id.0,
                        "listener is already borrowed (re-entrant dispatch); skipping"
                    );
                }
            };
        }
        notified
    }
}

impl<L: ?Sized> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> fmt::Debug for ListenerRegistry<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("live", &self.len())
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Counter {
        fn hit(&mut self, value: u32);
    }

    #[derive(Default)]
    struct Recorder {
        seen: Vec<u32>,
    }

    impl Counter for Recorder {
        fn hit(&mut self, value: u32) {
            self.seen.push(value);
        }
    }

    fn shared() -> Rc<RefCell<Recorder>> {
        Rc::new(RefCell::new(Recorder::default()))
    }

    #[test]
    fn duplicate_registration_collapses() {
        let mut reg: ListenerRegistry<dyn Counter> = ListenerRegistry::new();
        let a = shared();
        let first = reg.add_listener(a.clone());
        let second = reg.add_listener(a.clone());
        assert_eq!(first, second);
        assert_eq!(reg.len(), 1);

        assert_eq!(reg.dispatch(|l| l.hit(7)), 1);
        assert_eq!(a.borrow().seen, vec![7]);
    }

    #[test]
    fn dispatch_follows_registration_order() {
        let mut reg: ListenerRegistry<dyn Counter> = ListenerRegistry::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        struct Tagged(u32, Rc<RefCell<Vec<u32>>>);
        impl Counter for Tagged {
            fn hit(&mut self, _: u32) {
                self.1.borrow_mut().push(self.0);
            }
        }

        let handles: Vec<_> = (0..4)
            .map(|i| Rc::new(RefCell::new(Tagged(i, order.clone()))))
            .collect();
        for h in handles.iter().rev() {
            reg.add_listener(h.clone());
        }
        reg.dispatch(|l| l.hit(0));
        assert_eq!(*order.borrow(), vec![3, 2, 1, 0]);
    }

    #[test]
    fn removed_listener_gets_nothing() {
        let mut reg: ListenerRegistry<dyn Counter> = ListenerRegistry::new();
        let a = shared();
        let b = shared();
        reg.add_listener(a.clone());
        reg.add_listener(b.clone());

        assert!(reg.remove_listener(&a));
        assert!(!reg.remove_listener(&a));
        for v in 0..3 {
            reg.dispatch(|l| l.hit(v));
        }
        assert!(a.borrow().seen.is_empty());
        assert_eq!(b.borrow().seen, vec![0, 1, 2]);
    }

    #[test]
    fn remove_by_id_and_unknown_id() {
        let mut reg: ListenerRegistry<dyn Counter> = ListenerRegistry::new();
        let a = shared();
        let id = reg.add_listener(a.clone());
        assert!(reg.remove(id));
        assert!(!reg.remove(id));
        assert!(reg.is_empty());
    }

    #[test]
    fn registry_does_not_own_listeners() {
        let mut reg: ListenerRegistry<dyn Counter> = ListenerRegistry::new();
        let a = shared();
        let keep = shared();
        reg.add_listener(a.clone());
        reg.add_listener(keep.clone());
        assert_eq!(Rc::strong_count(&a), 1);

        drop(a);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.dispatch(|l| l.hit(1)), 1);
        assert_eq!(reg.prune(), 1);
        assert_eq!(keep.borrow().seen, vec![1]);
    }

    #[test]
    fn disabled_listener_is_muted_until_enabled() {
        let mut reg: ListenerRegistry<dyn Counter> = ListenerRegistry::new();
        let a = shared();
        let id = reg.add_listener(a.clone());
        assert!(reg.disable(id));
        reg.dispatch(|l| l.hit(1));
        assert!(reg.enable(id));
        reg.dispatch(|l| l.hit(2));
        assert_eq!(a.borrow().seen, vec![2]);
        assert_eq!(reg.id_of(&a), Some(id));

        reg.remove(id);
        assert!(!reg.disable(id));
        assert!(!reg.enable(id));
    }

    #[test]
    fn borrowed_listener_is_skipped() {
        let mut reg: ListenerRegistry<dyn Counter> = ListenerRegistry::new();
        let a = shared();
        reg.add_listener(a.clone());
        let _held = a.borrow_mut();
        assert_eq!(reg.dispatch(|l| l.hit(1)), 0);
    }

    #[test]
    fn ids_are_not_reused() {
        let mut reg: ListenerRegistry<dyn Counter> = ListenerRegistry::new();
        let a = shared();
        let first = reg.add_listener(a.clone());
        reg.remove(first);
        let again = reg.add_listener(a.clone());
        assert_ne!(first, again);
        assert_eq!(reg.id_of(&a), Some(again));
        assert!(reg.contains(&a));
    }
}
