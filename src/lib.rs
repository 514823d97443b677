//! # Sign-Kit: Detached Signatures from Password-Protected Key Containers
//!
//! `sign-kit` produces a detached signature over an arbitrary byte stream
//! using a private key extracted from a password-protected, alias-indexed
//! key container, and later verifies whether a candidate byte stream matches
//! a previously produced signature under the corresponding public key.
//!
//! It aims to make misuse hard: the signing engine has an explicit
//! bind → consume → finalize lifecycle, passwords and private key material
//! are wiped from memory when dropped, and every failure is a distinct typed
//! error rather than a logged-and-swallowed null.
//!
//! ## Core Concepts
//!
//! - **`SignatureService`**: the session entry point — extract keys once,
//!   then sign, verify and export against them.
//! - **`SignatureEngine`**: the streaming sign/verify state machine, bound
//!   to one named algorithm for its lifetime.
//! - **`KeyContainerReader`** / **`KeyContainerBuilder`**: read and author
//!   the dual-password container format.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sign_kit::prelude::*;
//!
//! fn main() -> Result<(), Error> {
//!     let mut service = SignatureService::new(&SignConfig::default())?;
//!
//!     service.init_keys(
//!         "keys.skc",
//!         "signer",
//!         &SecretString::from("store1".to_string()),
//!         &SecretString::from("key1".to_string()),
//!     )?;
//!
//!     // Sign a file and write the detached signature next to it.
//!     service.sign_to("report.pdf", "report.pdf.sig")?;
//!
//!     // Later: does the file still match?
//!     let intact = service.verify("report.pdf", "report.pdf.sig")?;
//!     println!("intact: {intact}");
//!     Ok(())
//! }
//! ```

pub mod algorithm;
pub mod common;
pub mod engine;
pub mod error;
pub mod keys;
pub mod service;
pub mod storage;

pub use algorithm::SignatureAlgorithm;
pub use engine::SignatureEngine;
pub use error::Error;
pub use keys::{KeyPair, PrivateKeyMaterial, PublicKeyExporter, PublicKeyMaterial};
pub use service::SignatureService;
pub use storage::{Certificate, KeyContainerBuilder, KeyContainerReader};

// --- Prelude ---
// A collection of the most commonly used types.
pub mod prelude {
    pub use crate::algorithm::SignatureAlgorithm;
    pub use crate::common::config::{KdfConfig, SignConfig};
    pub use crate::engine::SignatureEngine;
    pub use crate::error::Error;
    pub use crate::keys::{KeyPair, PrivateKeyMaterial, PublicKeyExporter, PublicKeyMaterial};
    pub use crate::service::SignatureService;
    pub use crate::storage::{Certificate, KeyContainerBuilder, KeyContainerReader};
    pub use secrecy::SecretString;
}

/// The version of the `sign-kit` crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
