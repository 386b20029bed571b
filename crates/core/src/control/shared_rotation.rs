use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lock-free rotation cell shared between the detection and render loops.
///
/// Stores an `f64` as its bit pattern in an `AtomicU64`, so a reader sees
/// either the previous or the new value, never a mix. Clones share the cell.
#[derive(Clone, Debug)]
pub struct SharedRotation {
    bits: Arc<AtomicU64>,
}

impl SharedRotation {
    pub fn new(initial: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(initial.to_bits())),
        }
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn store(&self, rotation: f64) {
        self.bits.store(rotation.to_bits(), Ordering::Release);
    }
}

impl Default for SharedRotation {
    fn default() -> Self {
        Self::new(0.0)
    }
}
