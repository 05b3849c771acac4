//! Pool rows as seen by the admission core.

use serde::Serialize;

use super::PoolId;

/// A capacity-bounded cohort.
///
/// Provisioned out-of-band; the admission core only reads a pool and
/// increments its `current_count`. `current_count <= max_capacity` holds
/// for every committed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pool {
    /// Store-assigned identity, also the selection tie-break.
    pub id: PoolId,
    /// Human-readable cohort name (e.g. `"Clan Judah"`).
    pub name: String,
    /// Number of participants admitted so far.
    pub current_count: u32,
    /// Hard upper bound on `current_count`. Always positive.
    pub max_capacity: u32,
    /// Opaque link handed to admitted participants (group chat invite).
    pub contact_link: String,
}

impl Pool {
    /// Returns `true` when the pool can take at least one more participant.
    #[must_use]
    pub const fn has_room(&self) -> bool {
        self.current_count < self.max_capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(current_count: u32, max_capacity: u32) -> Pool {
        Pool {
            id: PoolId::new(1),
            name: "Clan A".to_string(),
            current_count,
            max_capacity,
            contact_link: "https://chat.example/a".to_string(),
        }
    }

    #[test]
    fn has_room_until_full() {
        assert!(pool(0, 1).has_room());
        assert!(pool(4, 5).has_room());
        assert!(!pool(5, 5).has_room());
    }
}
