//! Graph configuration.

/// Configuration for an [`ObjectGraph`](crate::ObjectGraph).
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Re-check referential symmetry of the whole graph after every mutating
    /// accessor call and panic on a violation. Meant for debugging.
    pub verify_symmetry: bool,
    /// Initial capacity of the object store.
    pub object_capacity: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            verify_symmetry: false,
            object_capacity: 64,
        }
    }
}

impl GraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verify_symmetry(mut self, verify: bool) -> Self {
        self.verify_symmetry = verify;
        self
    }

    pub fn with_object_capacity(mut self, capacity: usize) -> Self {
        self.object_capacity = capacity;
        self
    }
}
