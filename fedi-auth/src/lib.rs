//! # fedi-auth
//!
//! Proves that a user controls an account on a federated (ActivityPub)
//! instance:
//! - direct verification with the account's own credentials and TOTP token
//! - out-of-band verification with a short code sent by private message
//! - Lemmy v3 API client and nodeinfo capability checks
//! - TTL-bound storage for pending codes
//! - the boundary to the authorization interaction (login, consent, abort)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fedi_auth::{
//!     bridge::{LoginRequest, VerificationBridge, VerificationOutcome},
//!     http::HttpClientBuilder,
//!     remote::{lemmy, RemoteSession},
//!     verification::{CodeStore, MemoryStorage},
//! };
//! ```

pub mod bridge;
pub mod error;
pub mod http;
pub mod identity;
pub mod interaction;
pub mod remote;
pub mod verification;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
pub use identity::{IdentityHandle, VerifiedIdentity};
