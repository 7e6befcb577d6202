///! Library init/finalize, reference-counted so nested `init`/`finalize`
///! pairs from independent callers in the same process are safe. Mirrors
///! the source's `numCliqueInits` global, but as an explicit, thread-safe
///! counter rather than an unguarded global.

use std::sync::atomic::{AtomicUsize, Ordering};

static INIT_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Initialize the library's process-global state (currently: nothing
/// beyond the reference count itself; MPI initialization is the caller's
/// responsibility via the `mpi` crate's own `Universe`, since the
/// `Universe` handle's lifetime already enforces single initialization
/// per process). Safe to call more than once; each call must be matched
/// by a [`finalize`].
pub fn init() {
    INIT_COUNT.fetch_add(1, Ordering::SeqCst);
}

/// Tear down library state initialized by [`init`]. Only the last
/// matching call actually tears anything down; unmatched calls (more
/// `finalize` than `init`) are clamped at zero rather than underflowing.
pub fn finalize() {
    let _ = INIT_COUNT.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
        Some(n.saturating_sub(1))
    });
}

/// Number of unmatched `init` calls outstanding. Exposed for tests.
pub fn init_count() -> usize {
    INIT_COUNT.load(Ordering::SeqCst)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nested_init_finalize_is_reference_counted() {
        let before = init_count();
        init();
        init();
        assert_eq!(init_count(), before + 2);
        finalize();
        assert_eq!(init_count(), before + 1);
        finalize();
        assert_eq!(init_count(), before);
    }

    #[test]
    fn unmatched_finalize_does_not_underflow() {
        // start from a known zero baseline regardless of test run order
        while init_count() > 0 {
            finalize();
        }
        finalize();
        finalize();
        assert_eq!(init_count(), 0);
    }
}
