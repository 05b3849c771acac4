//! Service layer: business logic orchestration.
//!
//! [`CapacityAllocator`] runs the admission transaction.
//! [`RegistrationService`] wraps it, hands committed admissions to the
//! [`crate::notify::NotificationQueue`], and serves the admin roster reads.

pub mod capacity_allocator;
pub mod registration_service;

pub use capacity_allocator::CapacityAllocator;
pub use registration_service::RegistrationService;
