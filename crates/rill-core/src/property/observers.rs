//! Observer bookkeeping for a single notification kind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::Observer;

struct ObserverEntry<T> {
    id: u64,
    active: Arc<AtomicBool>,
    observer: Observer<T>,
}

/// An observer captured for one delivery. The `active` flag is re-checked at
/// delivery time so a queued notification never reaches a disposed observer.
pub(crate) struct Target<T> {
    active: Arc<AtomicBool>,
    observer: Observer<T>,
}

impl<T> Target<T> {
    pub(crate) fn new(active: Arc<AtomicBool>, observer: Observer<T>) -> Self {
        Self { active, observer }
    }

    pub(crate) fn deliver(&self, value: &T) {
        if self.active.load(Ordering::Acquire) {
            (self.observer)(value);
        }
    }
}

/// Registration-ordered observer list.
pub(crate) struct ObserverList<T> {
    next_id: u64,
    entries: Vec<ObserverEntry<T>>,
}

impl<T> ObserverList<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, observer: Observer<T>) -> (u64, Arc<AtomicBool>) {
        let id = self.next_id;
        self.next_id += 1;
        let active = Arc::new(AtomicBool::new(true));
        self.entries.push(ObserverEntry {
            id,
            active: active.clone(),
            observer,
        });
        (id, active)
    }

    pub(crate) fn remove(&mut self, id: u64) {
        self.entries.retain(|entry| entry.id != id);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn targets(&self) -> Vec<Target<T>> {
        self.entries
            .iter()
            .map(|entry| Target::new(entry.active.clone(), entry.observer.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_inactive_target_skips_delivery() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let mut list: ObserverList<u8> = ObserverList::new();
        let (id, active) = list.add(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let targets = list.targets();
        active.store(false, Ordering::Release);
        list.remove(id);

        for target in &targets {
            target.deliver(&1);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(list.len(), 0);
    }
}
