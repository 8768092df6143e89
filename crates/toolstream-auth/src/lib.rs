//! Toolstream Auth Gate
//!
//! Bearer-token validation and per-subject authorization for the broker.
//!
//! ## Authentication Flow
//!
//! ```text
//! Request with `authorization: Bearer <jwt>`
//!     │
//!     ▼
//! ┌─────────────────────────────────┐
//! │ AuthInterceptor                 │
//! │ - extract bearer token          │
//! │ - verify RS256 signature        │
//! │ - check issuer and expiry       │
//! │ - attach Claims to extensions   │
//! └─────────────────────────────────┘
//!     │
//!     ▼
//! Handler calls `authorize(&request, Action::…, subject)`
//! ```
//!
//! In **required** mode a missing token rejects the request with
//! `Unauthenticated`. In **optional** mode requests without a token pass
//! through without claims, but a token that is present must still validate.
//!
//! The RS256 public key is fetched from the secrets store at startup; this
//! crate only consumes the PEM.

pub mod claims;
pub mod error;
pub mod interceptor;
pub mod jwt;

pub use claims::{subject_matches, Action, Claims};
pub use error::{AuthError, Result};
pub use interceptor::{authorize, AuthInterceptor};
pub use jwt::JwtValidator;
