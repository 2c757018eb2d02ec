//! Observable progress model.
//!
//! The orchestrator exposes a single [`ProgressCell`] for its whole run and
//! swaps which observable backs it as phases change; the UI keeps polling
//! the cell. Fractions are in `[0, 1]`, with `-1.0` meaning indeterminate.

use std::sync::Arc;

use parking_lot::RwLock;

pub const INDETERMINATE: f64 = -1.0;

pub trait ProgressObservable: Send + Sync {
    /// Fraction complete in `[0, 1]`, or `-1.0` when unknown.
    fn progress(&self) -> f64;

    /// Short user-facing status line.
    fn status(&self) -> String;
}

/// Fixed snapshot, used for the indeterminate phases between downloads.
pub struct DefaultProgress {
    fraction: f64,
    status: String,
}

impl DefaultProgress {
    pub fn new(fraction: f64, status: impl Into<String>) -> Self {
        Self {
            fraction,
            status: status.into(),
        }
    }

    pub fn indeterminate(status: impl Into<String>) -> Self {
        Self::new(INDETERMINATE, status)
    }
}

impl ProgressObservable for DefaultProgress {
    fn progress(&self) -> f64 {
        self.fraction
    }

    fn status(&self) -> String {
        self.status.clone()
    }
}

/// Linearly maps an inner observable into the sub-range `[lo, hi]` so
/// phase-local progress composes into one overall fraction.
pub struct ProgressFilter {
    inner: Arc<dyn ProgressObservable>,
    lo: f64,
    hi: f64,
}

impl ProgressFilter {
    pub fn between(inner: Arc<dyn ProgressObservable>, lo: f64, hi: f64) -> Self {
        Self { inner, lo, hi }
    }
}

impl ProgressObservable for ProgressFilter {
    fn progress(&self) -> f64 {
        let p = self.inner.progress();
        if p < 0.0 {
            INDETERMINATE
        } else {
            self.lo + p.clamp(0.0, 1.0) * (self.hi - self.lo)
        }
    }

    fn status(&self) -> String {
        self.inner.status()
    }
}

/// Single-writer, many-reader holder for the currently active observable.
#[derive(Clone)]
pub struct ProgressCell {
    current: Arc<RwLock<Arc<dyn ProgressObservable>>>,
}

impl ProgressCell {
    pub fn new(initial: Arc<dyn ProgressObservable>) -> Self {
        Self {
            current: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn set(&self, observable: Arc<dyn ProgressObservable>) {
        *self.current.write() = observable;
    }
}

impl Default for ProgressCell {
    fn default() -> Self {
        Self::new(Arc::new(DefaultProgress::indeterminate("")))
    }
}

impl ProgressObservable for ProgressCell {
    fn progress(&self) -> f64 {
        self.current.read().progress()
    }

    fn status(&self) -> String {
        self.current.read().status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_maps_into_subrange() {
        let inner = Arc::new(DefaultProgress::new(0.5, "half"));
        let filter = ProgressFilter::between(inner, 0.0, 0.98);
        assert!((filter.progress() - 0.49).abs() < 1e-9);
        assert_eq!(filter.status(), "half");
    }

    #[test]
    fn filter_preserves_indeterminate() {
        let inner = Arc::new(DefaultProgress::indeterminate("warming up"));
        let filter = ProgressFilter::between(inner, 0.98, 1.0);
        assert_eq!(filter.progress(), INDETERMINATE);
    }

    #[test]
    fn cell_swaps_between_phases() {
        let cell = ProgressCell::new(Arc::new(DefaultProgress::indeterminate("preparing")));
        assert_eq!(cell.progress(), INDETERMINATE);
        cell.set(Arc::new(DefaultProgress::new(1.0, "done")));
        assert_eq!(cell.progress(), 1.0);
        assert_eq!(cell.status(), "done");
    }
}
