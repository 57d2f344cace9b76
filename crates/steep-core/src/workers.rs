//! Bounded fan-out for bulk plugin operations.
//!
//! Bulk checks and upgrade sweeps run one task per plugin, but never
//! more than the requested number at once; results come back in input
//! order regardless of completion order.

use std::sync::{Mutex, MutexGuard};

pub const DEFAULT_PARALLELISM: usize = 4;

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Apply `f` to every item on at most `parallelism` threads.
pub fn map_bounded<T, R, F>(items: Vec<T>, parallelism: usize, f: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    if items.is_empty() {
        return Vec::new();
    }
    let workers = parallelism.clamp(1, items.len());
    if workers == 1 {
        return items.into_iter().map(f).collect();
    }

    // Reversed so popping from the tail dispatches in input order.
    let queue: Mutex<Vec<(usize, T)>> = Mutex::new(items.into_iter().enumerate().rev().collect());
    let results: Mutex<Vec<(usize, R)>> = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let next = lock_ignoring_poison(&queue).pop();
                let Some((index, item)) = next else {
                    break;
                };
                let value = f(item);
                lock_ignoring_poison(&results).push((index, value));
            });
        }
    });

    let mut pairs = results
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    pairs.sort_by_key(|(index, _)| *index);
    pairs.into_iter().map(|(_, value)| value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn preserves_input_order() {
        let items: Vec<usize> = (0..16).collect();
        let doubled = map_bounded(items, 4, |i| {
            // Later items finish first to scramble completion order.
            std::thread::sleep(Duration::from_millis((16 - i) as u64));
            i * 2
        });
        assert_eq!(doubled, (0..16).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn never_exceeds_requested_parallelism() {
        let current = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        map_bounded((0..12).collect::<Vec<_>>(), 3, |i| {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(15));
            current.fetch_sub(1, Ordering::SeqCst);
            i
        });

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn empty_input_spawns_nothing() {
        let results: Vec<u32> = map_bounded(Vec::new(), 8, |i| i);
        assert!(results.is_empty());
    }
}
