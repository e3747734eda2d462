//! Scoped acquisition and release of raster buffers.
//!
//! Every coverage obtained from a catalog read during one evaluation is
//! registered with a [`CoverageArena`]. The arena is the single cleanup
//! path: dropping it (or calling [`CoverageArena::dispose`]) releases
//! every still-held buffer exactly once, on success and on every failure
//! path alike. Disposal is idempotent, so an explicit `dispose()`
//! followed by `Drop` never double-releases.

use tracing::debug;

use crate::raster::RasterCoverage;

/// Opaque handle to a coverage held by an arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageHandle(usize);

/// Owns every coverage acquired during one evaluation.
#[derive(Debug, Default)]
pub struct CoverageArena {
    slots: Vec<Option<RasterCoverage>>,
    released: usize,
    disposed: bool,
}

impl CoverageArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a coverage; the arena takes ownership.
    pub fn acquire(&mut self, coverage: RasterCoverage) -> CoverageHandle {
        self.disposed = false;
        self.slots.push(Some(coverage));
        CoverageHandle(self.slots.len() - 1)
    }

    /// Borrow a held coverage.
    #[must_use]
    pub fn get(&self, handle: CoverageHandle) -> Option<&RasterCoverage> {
        self.slots.get(handle.0).and_then(Option::as_ref)
    }

    /// Hand ownership of one coverage back out of the arena. The slot is
    /// counted as released; disposing afterwards will not touch it again.
    pub fn take(&mut self, handle: CoverageHandle) -> Option<RasterCoverage> {
        let taken = self.slots.get_mut(handle.0).and_then(Option::take);
        if taken.is_some() {
            self.released += 1;
        }
        taken
    }

    /// Number of coverages acquired over the arena's lifetime.
    #[must_use]
    pub fn acquired(&self) -> usize {
        self.slots.len()
    }

    /// Number of coverages released so far (taken or disposed).
    #[must_use]
    pub fn released(&self) -> usize {
        self.released
    }

    /// Number of coverages currently held.
    #[must_use]
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Release every still-held coverage. Safe to call multiple times and
    /// safe to call after a partial acquisition.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        let mut count = 0;
        for slot in &mut self.slots {
            if slot.take().is_some() {
                count += 1;
            }
        }
        self.released += count;
        self.disposed = true;
        if count > 0 {
            debug!(released = count, "released raster buffers");
        }
    }
}

impl Drop for CoverageArena {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Envelope, GridGeometry};

    fn coverage(name: &str) -> RasterCoverage {
        let envelope = Envelope::new(4326, 0.0, 0.0, 2.0, 2.0);
        let grid = GridGeometry::from_envelope(&envelope, 1.0, 1.0).unwrap();
        RasterCoverage::constant(name, grid, 1.0)
    }

    #[test]
    fn test_acquire_get_take() {
        let mut arena = CoverageArena::new();
        let handle = arena.acquire(coverage("a"));
        assert_eq!(arena.get(handle).unwrap().name, "a");

        let taken = arena.take(handle).unwrap();
        assert_eq!(taken.name, "a");
        assert!(arena.get(handle).is_none());
        assert!(arena.take(handle).is_none());
        assert_eq!(arena.released(), 1);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut arena = CoverageArena::new();
        arena.acquire(coverage("a"));
        arena.acquire(coverage("b"));

        arena.dispose();
        assert_eq!(arena.released(), 2);
        assert_eq!(arena.live(), 0);

        // second dispose is a no-op, no double release
        arena.dispose();
        assert_eq!(arena.released(), 2);
    }

    #[test]
    fn test_dispose_after_partial_take() {
        let mut arena = CoverageArena::new();
        let a = arena.acquire(coverage("a"));
        arena.acquire(coverage("b"));
        arena.acquire(coverage("c"));

        arena.take(a);
        arena.dispose();
        assert_eq!(arena.acquired(), 3);
        assert_eq!(arena.released(), 3);
    }

    #[test]
    fn test_reuse_after_dispose() {
        let mut arena = CoverageArena::new();
        arena.acquire(coverage("a"));
        arena.dispose();

        let handle = arena.acquire(coverage("b"));
        assert_eq!(arena.live(), 1);
        arena.dispose();
        assert!(arena.get(handle).is_none());
        assert_eq!(arena.released(), 2);
    }
}
