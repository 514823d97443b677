//! Key material wrappers and the public key exporter.
//!
//! Keys travel through the crate as DER blobs: PKCS#8 for private keys and
//! SubjectPublicKeyInfo for public keys. Parsing into `rsa` types happens at
//! the point of use, so a key extracted from a container is only rejected as
//! incompatible when it is actually bound to an engine.

use crate::common::utils::ZeroizingVec;
use crate::error::Error;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fs;
use std::path::Path;

/// Private key material, held as PKCS#8 DER with automatic memory wiping.
///
/// Never serialized and never exported; the container is the only persistent
/// home of private keys.
#[derive(Debug, Clone)]
pub struct PrivateKeyMaterial(ZeroizingVec);

impl PrivateKeyMaterial {
    /// Wraps PKCS#8 DER bytes. No validation happens here; parsing is
    /// deferred until the key is bound to an engine.
    pub fn from_pkcs8_der(der: Vec<u8>) -> Self {
        Self(ZeroizingVec(der))
    }

    /// Parses the DER into an RSA private key.
    pub(crate) fn to_rsa(&self) -> Result<RsaPrivateKey, Error> {
        RsaPrivateKey::from_pkcs8_der(&self.0)
            .map_err(|e| Error::InvalidKey(format!("not an RSA private key: {e}")))
    }
}

/// Public key material, held as SubjectPublicKeyInfo DER.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicKeyMaterial(Vec<u8>);

impl PublicKeyMaterial {
    /// Wraps SPKI DER bytes.
    pub fn from_spki_der(der: Vec<u8>) -> Self {
        Self(der)
    }

    /// The raw SPKI DER as stored.
    pub fn as_der(&self) -> &[u8] {
        &self.0
    }

    /// Parses the DER into an RSA public key.
    pub(crate) fn to_rsa(&self) -> Result<RsaPublicKey, Error> {
        RsaPublicKey::from_public_key_der(&self.0)
            .map_err(|e| Error::InvalidKey(format!("not an RSA public key: {e}")))
    }
}

/// A private/public key pair extracted from one container alias.
///
/// The public half always comes from the certificate stored with the alias,
/// not from the private key.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub private: PrivateKeyMaterial,
    pub public: PublicKeyMaterial,
}

/// Serializes public keys to their canonical encoded form.
pub struct PublicKeyExporter;

impl PublicKeyExporter {
    /// Encodes the public key as canonical SubjectPublicKeyInfo DER.
    ///
    /// The key is parsed and re-encoded rather than copied, so the output is
    /// canonical and deterministic regardless of how the stored DER was
    /// produced.
    pub fn encode(public_key: &PublicKeyMaterial) -> Result<Vec<u8>, Error> {
        let key = public_key.to_rsa()?;
        let der = key
            .to_public_key_der()
            .map_err(|e| Error::InvalidKey(format!("public key encoding failed: {e}")))?;
        Ok(der.as_bytes().to_vec())
    }

    /// Encodes the public key as PEM (`PUBLIC KEY` block).
    pub fn encode_pem(public_key: &PublicKeyMaterial) -> Result<String, Error> {
        let key = public_key.to_rsa()?;
        key.to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::InvalidKey(format!("public key encoding failed: {e}")))
    }

    /// Writes the canonical DER encoding to a file.
    pub fn write_der<P: AsRef<Path>>(public_key: &PublicKeyMaterial, path: P) -> Result<(), Error> {
        let der = Self::encode(public_key)?;
        fs::write(path, der)?;
        Ok(())
    }
}
