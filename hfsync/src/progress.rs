//! Progress reporting and interruption.
//!
//! Long-running loops (checksum passes and byte transfers) report through an
//! explicit callback argument and poll an [`InterruptFlag`] once per chunk.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Progress callback: `(bytes_done, bytes_total)`.
///
/// For transfers `bytes_done` includes the resume offset, so a resumed file
/// starts reporting from the bytes already on disk.
pub type Progress<'a> = &'a dyn Fn(u64, u64);

/// Process-level interrupt signal, shared between the signal handler and the
/// chunk loops.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    flag: Arc<AtomicBool>,
}

impl InterruptFlag {
    /// Create a flag in the cleared state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that running loops stop at the next chunk boundary.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether an interrupt was requested.
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Report progress if a callback was supplied.
pub(crate) fn report(progress: Option<Progress<'_>>, done: u64, total: u64) {
    if let Some(cb) = progress {
        cb(done, total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_interrupt_flag_shared_between_clones() {
        let flag = InterruptFlag::new();
        let handler_side = flag.clone();

        assert!(!flag.is_triggered());
        handler_side.trigger();
        assert!(flag.is_triggered());
    }

    #[test]
    fn test_report_invokes_callback() {
        let last = Cell::new((0, 0));
        let cb = |done: u64, total: u64| last.set((done, total));

        report(Some(&cb), 5, 10);
        assert_eq!(last.get(), (5, 10));

        report(None, 7, 10);
        assert_eq!(last.get(), (5, 10));
    }
}
