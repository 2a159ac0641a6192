//! Optimistic-concurrency cell
//!
//! A value paired with a monotonically increasing version. A writer captures
//! the version when it snapshots the value and commits its bookkeeping only
//! if no other write happened in between. This replaces ad hoc comparisons
//! of mutable counters captured in closures.

/// A value with a monotonically increasing version counter
#[derive(Debug, Clone, Default)]
pub struct Versioned<T> {
    value: T,
    version: u64,
}

impl<T> Versioned<T> {
    pub fn new(value: T) -> Self {
        Self { value, version: 0 }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Replace the value, invalidating all captured versions
    pub fn set(&mut self, value: T) {
        self.value = value;
        self.version += 1;
    }

    /// Mutate the value in place, invalidating all captured versions
    pub fn update(&mut self, f: impl FnOnce(&mut T)) {
        f(&mut self.value);
        self.version += 1;
    }

    /// Whether a captured version is still current (no write since capture)
    pub fn is_current(&self, captured: u64) -> bool {
        self.version == captured
    }
}
