//! Extraction of key pairs from container files.

use crate::error::Error;
use crate::keys::{KeyPair, PrivateKeyMaterial, PublicKeyMaterial};
use crate::storage::container::{ContainerError, KeyContainerFile, KeyEntry};
use secrecy::SecretString;
use std::path::Path;
use tracing::debug;

/// Reads password-protected key containers and extracts named key pairs.
pub struct KeyContainerReader;

impl KeyContainerReader {
    /// Extracts the key pair stored under `alias`.
    ///
    /// The store password unlocks the container index; the entry password
    /// unseals the private key material. The public half of the returned
    /// pair is taken from the certificate stored with the alias, not derived
    /// from the private key. The file handle is scoped to this call and
    /// released on every path.
    pub fn extract<P: AsRef<Path>>(
        path: P,
        alias: &str,
        store_password: &SecretString,
        entry_password: &SecretString,
    ) -> Result<KeyPair, Error> {
        let path = path.as_ref();

        // 1. Open and unlock the container index.
        let container = KeyContainerFile::open(path)?;
        let index = container.unlock(store_password)?;

        // 2. Resolve the alias to a private-key entry.
        let entry = index
            .get(alias)
            .ok_or_else(|| ContainerError::AliasNotFound(alias.to_string()))?;
        let (key, certificate) = match entry {
            KeyEntry::PrivateKey { key, certificate } => (key, certificate),
            KeyEntry::TrustedCert { .. } => {
                return Err(ContainerError::NotAPrivateKey(alias.to_string()).into());
            }
        };

        // 3. Unseal the key material and pair it with the certificate's
        //    public key.
        let pkcs8_der = key.open(entry_password)?;
        let private = PrivateKeyMaterial::from_pkcs8_der(pkcs8_der.to_vec());
        let public = PublicKeyMaterial::from_spki_der(certificate.spki_der()?);

        debug!(alias, container = %path.display(), "extracted key pair");
        Ok(KeyPair { private, public })
    }
}
