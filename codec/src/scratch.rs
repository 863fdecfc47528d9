//! Reusable scratch buffers for entity decoding.

use crate::field_path::{FieldPath, FieldPathPool};

/// Buffers reused across entity updates within one session.
#[derive(Debug, Default)]
pub struct DecodeScratch {
    pub(crate) pool: FieldPathPool,
    pub(crate) paths: Vec<FieldPath>,
}

impl DecodeScratch {
    /// Creates scratch space with no pre-allocated capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths decoded by the most recent field read.
    #[must_use]
    pub fn paths(&self) -> &[FieldPath] {
        &self.paths
    }
}
