use std::{collections::BTreeMap, sync::Arc};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

/// Stable-key memoisation with at-most-one-caller-wins compute.
///
/// For a given key the factory runs at most once across concurrent callers;
/// the others block on the entry's cell until the winner finishes, then
/// observe the same value. A failed computation leaves the cell empty, so a
/// later call retries.
///
/// Backs the compiled-plan store, the implicit-binding store and the
/// converted-constant store.
pub(crate) struct ComputeCache<K, V> {
    entries: Mutex<BTreeMap<K, Arc<OnceCell<V>>>>,
}

impl<K: Ord + Clone, V: Clone> ComputeCache<K, V> {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub(crate) fn get_or_try_create<E>(&self, key: &K, factory: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
        let cell = {
            let mut entries = self.entries.lock();
            entries.entry(key.clone()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };
        cell.get_or_try_init(factory).cloned()
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn get(&self, key: &K) -> Option<V> {
        self.entries.lock().get(key).and_then(|cell| cell.get().cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicU8, Ordering},
        sync::{Arc, Barrier},
        thread,
    };

    use super::ComputeCache;

    #[test]
    fn test_compute_once() {
        let cache = ComputeCache::<u32, u32>::new();
        let calls = AtomicU8::new(0);

        let factory = || -> Result<u32, ()> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(5)
        };

        assert_eq!(cache.get_or_try_create(&1, factory), Ok(5));
        assert_eq!(cache.get_or_try_create(&1, factory), Ok(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(&1), Some(5));
        assert_eq!(cache.get(&2), None);
    }

    #[test]
    fn test_failure_does_not_poison() {
        let cache = ComputeCache::<u32, u32>::new();

        let failed: Result<u32, &str> = cache.get_or_try_create(&1, || Err("boom"));
        assert_eq!(failed, Err("boom"));

        let ok: Result<u32, &str> = cache.get_or_try_create(&1, || Ok(7));
        assert_eq!(ok, Ok(7));
    }

    #[test]
    fn test_single_winner_across_threads() {
        let cache = Arc::new(ComputeCache::<u32, u32>::new());
        let calls = Arc::new(AtomicU8::new(0));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_try_create(&1, || -> Result<u32, ()> {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(9)
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Ok(9));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
