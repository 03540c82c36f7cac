//! Per-category-name mutual exclusion.
//!
//! A caller acquires every name it touches in one step. Acquisition is
//! all-or-nothing, so two callers needing overlapping name sets never hold
//! part of each other's set and cannot deadlock.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};

#[derive(Default)]
pub(crate) struct NameLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

/// Releases its names on drop.
pub(crate) struct NameGuard<'a> {
    locks: &'a NameLocks,
    names: Vec<String>,
}

impl NameLocks {
    /// Blocks until none of `names` is held, then holds all of them.
    ///
    /// Returns `None` when a previous holder panicked and poisoned the set.
    pub(crate) fn acquire<'a>(&'a self, names: &[&str]) -> Option<NameGuard<'a>> {
        let mut wanted: Vec<String> = names.iter().map(|name| (*name).to_string()).collect();
        wanted.sort();
        wanted.dedup();

        let mut held = self.held.lock().ok()?;
        while wanted.iter().any(|name| held.contains(name)) {
            held = self.released.wait(held).ok()?;
        }
        held.extend(wanted.iter().cloned());

        Some(NameGuard {
            locks: self,
            names: wanted,
        })
    }
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for name in &self.names {
            held.remove(name);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::NameLocks;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn disjoint_names_do_not_block() {
        let locks = NameLocks::default();
        let _work = locks.acquire(&["Work"]).unwrap();
        let _home = locks.acquire(&["Home"]).unwrap();
    }

    #[test]
    fn duplicate_names_in_one_request_are_held_once() {
        let locks = NameLocks::default();
        let guard = locks.acquire(&["Work", "Work"]).unwrap();
        assert_eq!(guard.names, vec!["Work".to_string()]);
    }

    #[test]
    fn same_name_is_exclusive() {
        let locks = NameLocks::default();
        let inside = AtomicUsize::new(0);
        let max_inside = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let _guard = locks.acquire(&["Work", "Home"]).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
