//! Data Transfer Objects for REST request/response serialization.
//!
//! Field names match what the registration form and admin dashboard
//! already send and read, so pools appear as `clan_*` on the wire.

pub mod admin_dto;
pub mod registration_dto;

pub use admin_dto::*;
pub use registration_dto::*;
