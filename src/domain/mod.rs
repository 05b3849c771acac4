//! Domain layer: pools, participants, and admission records.
//!
//! Plain data types shared by the store, the capacity allocator, and the
//! notification dispatcher. None of them carry behaviour that touches I/O.

pub mod admission;
pub mod participant;
pub mod pool;
pub mod pool_id;

pub use admission::{Admission, AdmissionOutcome};
pub use participant::{Participant, ParticipantId, ParticipantProfile};
pub use pool::Pool;
pub use pool_id::PoolId;
