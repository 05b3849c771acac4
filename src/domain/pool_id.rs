//! Type-safe pool identifier.
//!
//! [`PoolId`] wraps the store-assigned `BIGSERIAL` key of a pool row. Its
//! total order is the tie-break used by admission: among pools with room,
//! the smallest id always wins.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a capacity-bounded pool.
///
/// Assigned by the store when the pool is provisioned and immutable
/// thereafter. Ordered, so `BTreeMap<PoolId, _>` iterates pools in the
/// same order the admission query scans them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(i64);

impl PoolId {
    /// Creates a `PoolId` from a raw database key.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw database key.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PoolId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<PoolId> for i64 {
    fn from(id: PoolId) -> Self {
        id.0
    }
}
