use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use parking_lot::Mutex;

/// Process-wide table of exclusive locks keyed by barrel file path.
///
/// Read-modify-write of a barrel file is not safe for concurrent writers;
/// every writer of the same path serializes through the same mutex, no
/// matter which store instance it goes through.
#[derive(Default)]
pub struct BarrelLocks {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl BarrelLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared table used by every store in this process
    pub fn global() -> &'static BarrelLocks {
        static GLOBAL: OnceLock<BarrelLocks> = OnceLock::new();
        GLOBAL.get_or_init(BarrelLocks::new)
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `f` while holding the exclusive lock for `path`
    pub fn with_lock<T>(&self, path: &Path, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(path);
        let _guard = lock.lock();
        f()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_same_path_is_serialized() {
        let locks = Arc::new(BarrelLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|s| {
            for _ in 0..8 {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_seen = max_seen.clone();
                s.spawn(move || {
                    for _ in 0..50 {
                        locks.with_lock(Path::new("/bolt/0-3999.csv"), || {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                });
            }
        });

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_distinct_paths_get_distinct_locks() {
        let locks = BarrelLocks::new();
        locks.with_lock(Path::new("a"), || {
            // Would deadlock if both paths shared one mutex
            locks.with_lock(Path::new("b"), || {});
        });
        assert_eq!(locks.len(), 2);
    }
}
