//! Authentication adapters.
//!
//! Implementations of the `SessionValidator` port:
//!
//! - `firebase` - Production Firebase ID token validation
//! - `mock` - Test implementation that needs no external service

mod firebase;
mod mock;

pub use firebase::{FirebaseConfig, FirebaseSessionValidator, FIREBASE_JWKS_URL};
pub use mock::MockSessionValidator;
