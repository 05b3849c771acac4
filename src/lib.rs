//! # cohort-gateway
//!
//! Registration service that admits participants into fixed-capacity
//! cohorts ("pools") without ever over-filling one, even when concurrent
//! registrations race for the last open slot.
//!
//! Every admission is one store transaction: lock the lowest-id pool with
//! room, insert the participant, advance the pool counter, commit. Only
//! after commit is the admission handed to a bounded queue, from which a
//! detached dispatcher sends the confirmation email and the spreadsheet
//! row. Notifications never affect the registration result.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── RegistrationService (service/)
//!     │     └── CapacityAllocator ──► RegistrationStore (persistence/)
//!     │                                 ├── PostgresStore
//!     │                                 └── MemoryStore
//!     │
//!     └── NotificationQueue ──► NotificationDispatcher (notify/)
//!                                 ├── ResendEmailChannel
//!                                 └── SheetsSyncChannel
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod notify;
pub mod persistence;
pub mod service;
