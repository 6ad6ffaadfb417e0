//! Credential core: storage, hashing and the Basic authentication gate.
//!
//! Provides:
//! - User registration with username/password (PBKDF2-HMAC-SHA256 PHC strings, per-hash salt)
//! - Credential verification with uniform rejections (no user enumeration)
//! - HTTP Basic header parsing and `WWW-Authenticate` challenges
//! - SQLite-backed persistent storage behind the [`CredentialStore`] trait
//!
//! ## Design Decisions
//! - Uniqueness is enforced by the database's UNIQUE constraint, not by a
//!   lookup-then-insert in application code.
//! - Adaptive hashing runs on Tokio's blocking pool behind a semaphore so it
//!   cannot starve request handling.

pub mod basic;
pub mod error;
pub mod gate;
pub mod hashing;
pub mod store;

pub use basic::{encode_basic_credentials, parse_basic_credentials, BasicCredentials};
pub use error::{AuthError, RejectReason, StoreError};
pub use gate::{AuthOutcome, Challenge, Credentials, Gate, Identity, DEFAULT_REALM};
pub use hashing::{HashingPolicy, StoredHash, Verification};
pub use store::{CredentialStore, SqliteCredentialStore, StoredCredential, UserId};
