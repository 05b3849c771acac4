//! Shared application state injected into all Axum handlers.

use std::fmt;
use std::sync::Arc;

use crate::service::RegistrationService;

/// Shared secret guarding the admin endpoints.
///
/// When unset, every admin request is refused.
#[derive(Clone, Default)]
pub struct AdminSecret(Option<Arc<str>>);

impl AdminSecret {
    /// Wraps the configured secret. Blank values count as unset.
    #[must_use]
    pub fn new(secret: Option<&str>) -> Self {
        Self(secret.filter(|s| !s.is_empty()).map(Arc::from))
    }

    /// Returns `true` if `provided` equals the configured secret.
    ///
    /// The comparison time does not depend on where the values differ.
    #[must_use]
    pub fn verify(&self, provided: Option<&str>) -> bool {
        let (Some(expected), Some(provided)) = (self.0.as_deref(), provided) else {
            return false;
        };
        let (a, b) = (expected.as_bytes(), provided.as_bytes());
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }

    /// Returns `true` if a secret is configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = if self.0.is_some() { "<redacted>" } else { "<unset>" };
        f.debug_tuple("AdminSecret").field(&shown).finish()
    }
}

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Registration service for admissions and roster reads.
    pub registration: Arc<RegistrationService>,
    /// Secret expected in the `X-Admin-Secret` header.
    pub admin_secret: AdminSecret,
}
