//! The password-protected, alias-indexed key container format.
//!
//! A container is a JSON envelope with two layers of protection. The outer
//! layer holds an alias → entry index encrypted under the store password:
//! Argon2id derives a wrapping key from the password, and AES-256-GCM
//! encrypts and authenticates the serialized index. Each private-key entry
//! wraps its PKCS#8 key material a second time, under the entry password,
//! with the same KDF+AEAD scheme and its own salt. The authenticated cipher
//! makes a wrong password indistinguishable from tampering; both surface as
//! the password-rejected failure for their layer.
//!
//! Containers are provisioned with [`KeyContainerBuilder`] and consumed by
//! [`KeyContainerReader`](crate::storage::reader::KeyContainerReader); the
//! reader side never writes.

use crate::common::config::KdfConfig;
use crate::error::Error;
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use argon2::Argon2;
use base64::{Engine as _, engine::general_purpose};
use chrono::Utc;
use rand_core::{OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::{fs, io};
use thiserror::Error as ThisError;
use zeroize::Zeroizing;

/// Format tag carried by every container file.
pub const CONTAINER_FORMAT: &str = "sign-kit-container";
/// Current container format version.
pub const CONTAINER_VERSION: u32 = 1;

const WRAPPING_KEY_SIZE: usize = 32;
const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;

/// Errors raised while opening or authoring a key container.
///
/// Each failure the reader can hit is a distinct kind; callers match on the
/// variant to tell a missing file from a rejected password from a malformed
/// container.
#[derive(Debug, ThisError)]
pub enum ContainerError {
    #[error("key container not found at {0}")]
    NotFound(PathBuf),

    #[error("key container unreadable")]
    Unreadable(#[source] io::Error),

    #[error("store password rejected")]
    BadStorePassword,

    #[error("entry password rejected")]
    BadEntryPassword,

    #[error("alias not found: {0}")]
    AliasNotFound(String),

    #[error("entry '{0}' does not hold a private key")]
    NotAPrivateKey(String),

    #[error("unsupported container format: {0}")]
    UnsupportedFormat(String),

    #[error("decoding from Base64 failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("key derivation failed: {0}")]
    Kdf(argon2::Error),

    #[error("container sealing failed")]
    Sealing,
}

/// Argon2id parameters plus the salt they were applied with, as stored.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct KdfParams {
    /// Base64-encoded salt.
    salt: String,
    /// Memory cost in KiB.
    #[serde(default = "default_memory_cost")]
    memory_cost: u32,
    /// Number of iterations.
    #[serde(default = "default_time_cost")]
    time_cost: u32,
    /// Degree of parallelism.
    #[serde(default = "default_parallelism_cost")]
    parallelism_cost: u32,
}

fn default_memory_cost() -> u32 {
    19456 // 19 MiB
}
fn default_time_cost() -> u32 {
    2
}
fn default_parallelism_cost() -> u32 {
    1
}

impl KdfParams {
    fn generate(config: &KdfConfig) -> Self {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        Self {
            salt: general_purpose::STANDARD.encode(salt),
            memory_cost: config.memory_cost,
            time_cost: config.time_cost,
            parallelism_cost: config.parallelism_cost,
        }
    }

    fn derive_key(
        &self,
        password: &SecretString,
    ) -> Result<Zeroizing<[u8; WRAPPING_KEY_SIZE]>, ContainerError> {
        let salt = general_purpose::STANDARD.decode(&self.salt)?;
        let params = argon2::Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism_cost,
            Some(WRAPPING_KEY_SIZE),
        )
        .map_err(ContainerError::Kdf)?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; WRAPPING_KEY_SIZE]);
        argon2
            .hash_password_into(password.expose_secret().as_bytes(), &salt, &mut *key)
            .map_err(ContainerError::Kdf)?;
        Ok(key)
    }
}

fn aead_seal(
    key: &[u8; WRAPPING_KEY_SIZE],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), ContainerError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut nonce = vec![0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| ContainerError::Sealing)?;
    Ok((nonce, ciphertext))
}

/// Returns `None` on any authentication failure; the caller maps that to the
/// password-rejected kind for its layer.
fn aead_open(key: &[u8; WRAPPING_KEY_SIZE], nonce: &[u8], ciphertext: &[u8]) -> Option<Vec<u8>> {
    if nonce.len() != NONCE_SIZE {
        return None;
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()
}

/// A byte blob sealed under a password with its own KDF parameters.
///
/// This is the entry-password layer around private key material.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SealedBlob {
    kdf: KdfParams,
    /// Base64-encoded AES-GCM nonce.
    nonce: String,
    /// Base64-encoded ciphertext.
    ciphertext: String,
}

impl SealedBlob {
    pub(crate) fn seal(
        password: &SecretString,
        plaintext: &[u8],
        config: &KdfConfig,
    ) -> Result<Self, ContainerError> {
        let kdf = KdfParams::generate(config);
        let key = kdf.derive_key(password)?;
        let (nonce, ciphertext) = aead_seal(&key, plaintext)?;
        Ok(Self {
            kdf,
            nonce: general_purpose::STANDARD.encode(nonce),
            ciphertext: general_purpose::STANDARD.encode(ciphertext),
        })
    }

    pub(crate) fn open(&self, password: &SecretString) -> Result<Zeroizing<Vec<u8>>, ContainerError> {
        let nonce = general_purpose::STANDARD.decode(&self.nonce)?;
        let ciphertext = general_purpose::STANDARD.decode(&self.ciphertext)?;
        let key = self.kdf.derive_key(password)?;
        aead_open(&key, &nonce, &ciphertext)
            .map(Zeroizing::new)
            .ok_or(ContainerError::BadEntryPassword)
    }
}

/// Certificate stored alongside a key entry: the subject, the algorithm the
/// key was provisioned for, and the SubjectPublicKeyInfo of the public key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Certificate {
    pub subject: String,
    pub algorithm_id: String,
    /// Base64-encoded SPKI DER.
    spki: String,
}

impl Certificate {
    pub fn new(subject: &str, algorithm_id: &str, spki_der: &[u8]) -> Self {
        Self {
            subject: subject.to_string(),
            algorithm_id: algorithm_id.to_string(),
            spki: general_purpose::STANDARD.encode(spki_der),
        }
    }

    /// Decodes the stored SubjectPublicKeyInfo DER.
    pub fn spki_der(&self) -> Result<Vec<u8>, ContainerError> {
        Ok(general_purpose::STANDARD.decode(&self.spki)?)
    }
}

/// One alias slot in the container index.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum KeyEntry {
    /// Private key material (sealed under the entry password) plus the
    /// certificate carrying its public half.
    PrivateKey {
        key: SealedBlob,
        certificate: Certificate,
    },
    /// A certificate with no private key behind it.
    TrustedCert { certificate: Certificate },
}

/// The decrypted alias → entry index of a container.
pub type ContainerIndex = HashMap<String, KeyEntry>;

/// The on-disk container envelope.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct KeyContainerFile {
    format: String,
    version: u32,
    /// Creation timestamp in ISO 8601 format.
    created_at: String,
    kdf: KdfParams,
    /// Base64-encoded AES-GCM nonce for the index.
    nonce: String,
    /// Base64-encoded encrypted index.
    encrypted_index: String,
}

impl KeyContainerFile {
    /// Reads and parses a container file, without unlocking it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ContainerError> {
        let path = path.as_ref();
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ContainerError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(ContainerError::Unreadable(e)),
        };

        let file: Self = serde_json::from_str(&json)
            .map_err(|e| ContainerError::UnsupportedFormat(format!("not a key container: {e}")))?;
        if file.format != CONTAINER_FORMAT {
            return Err(ContainerError::UnsupportedFormat(format!(
                "unknown format tag '{}'",
                file.format
            )));
        }
        if file.version != CONTAINER_VERSION {
            return Err(ContainerError::UnsupportedFormat(format!(
                "unsupported container version {}",
                file.version
            )));
        }
        Ok(file)
    }

    /// Decrypts the index with the store password.
    pub fn unlock(&self, store_password: &SecretString) -> Result<ContainerIndex, ContainerError> {
        let nonce = general_purpose::STANDARD.decode(&self.nonce)?;
        let ciphertext = general_purpose::STANDARD.decode(&self.encrypted_index)?;
        let key = self.kdf.derive_key(store_password)?;

        let plaintext = Zeroizing::new(
            aead_open(&key, &nonce, &ciphertext).ok_or(ContainerError::BadStorePassword)?,
        );
        serde_json::from_slice(&plaintext)
            .map_err(|e| ContainerError::UnsupportedFormat(format!("corrupt container index: {e}")))
    }

    fn seal_index(
        index: &ContainerIndex,
        store_password: &SecretString,
        config: &KdfConfig,
    ) -> Result<Self, Error> {
        let plaintext = serde_json::to_vec(index)?;
        let kdf = KdfParams::generate(config);
        let key = kdf.derive_key(store_password)?;
        let (nonce, ciphertext) = aead_seal(&key, &plaintext)?;

        Ok(Self {
            format: CONTAINER_FORMAT.to_string(),
            version: CONTAINER_VERSION,
            created_at: Utc::now().to_rfc3339(),
            kdf,
            nonce: general_purpose::STANDARD.encode(nonce),
            encrypted_index: general_purpose::STANDARD.encode(ciphertext),
        })
    }

    /// Writes the container to disk. An atomic write is performed to prevent
    /// data corruption.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let json = serde_json::to_string(self)?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

/// Authors key containers for provisioning and test fixtures.
///
/// Key material is sealed the moment it is added; the builder never holds a
/// plaintext private key.
#[derive(Default)]
pub struct KeyContainerBuilder {
    entries: ContainerIndex,
    kdf: KdfConfig,
}

impl KeyContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses custom KDF costs for every layer of this container.
    pub fn with_kdf(kdf: KdfConfig) -> Self {
        Self {
            entries: ContainerIndex::new(),
            kdf,
        }
    }

    /// Adds a private-key entry under `alias`, sealing the PKCS#8 DER with
    /// the entry password. An existing entry under the same alias is
    /// replaced.
    pub fn add_private_key(
        mut self,
        alias: &str,
        pkcs8_der: &[u8],
        certificate: Certificate,
        entry_password: &SecretString,
    ) -> Result<Self, Error> {
        let key = SealedBlob::seal(entry_password, pkcs8_der, &self.kdf)?;
        self.entries
            .insert(alias.to_string(), KeyEntry::PrivateKey { key, certificate });
        Ok(self)
    }

    /// Adds a certificate-only entry under `alias`.
    pub fn add_trusted_certificate(mut self, alias: &str, certificate: Certificate) -> Self {
        self.entries
            .insert(alias.to_string(), KeyEntry::TrustedCert { certificate });
        self
    }

    /// Seals the index under the store password and writes the container.
    pub fn write_to<P: AsRef<Path>>(
        self,
        path: P,
        store_password: &SecretString,
    ) -> Result<(), Error> {
        let file = KeyContainerFile::seal_index(&self.entries, store_password, &self.kdf)?;
        file.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn password(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn test_certificate() -> Certificate {
        Certificate::new("CN=test", "SHA256withRSA", b"fake-spki-der")
    }

    fn write_container(path: &Path) {
        KeyContainerBuilder::new()
            .add_private_key(
                "signer",
                b"this-is-a-secret-key",
                test_certificate(),
                &password("key1"),
            )
            .unwrap()
            .write_to(path, &password("store1"))
            .unwrap();
    }

    #[test]
    fn container_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.skc");
        write_container(&path);

        let file = KeyContainerFile::open(&path).unwrap();
        let index = file.unlock(&password("store1")).unwrap();

        match index.get("signer").unwrap() {
            KeyEntry::PrivateKey { key, certificate } => {
                let der = key.open(&password("key1")).unwrap();
                assert_eq!(&der[..], b"this-is-a-secret-key");
                assert_eq!(certificate.subject, "CN=test");
                assert_eq!(certificate.spki_der().unwrap(), b"fake-spki-der");
            }
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[test]
    fn wrong_store_password_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.skc");
        write_container(&path);

        let file = KeyContainerFile::open(&path).unwrap();
        let result = file.unlock(&password("wrong"));
        assert!(matches!(result, Err(ContainerError::BadStorePassword)));
    }

    #[test]
    fn wrong_entry_password_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.skc");
        write_container(&path);

        let index = KeyContainerFile::open(&path)
            .unwrap()
            .unlock(&password("store1"))
            .unwrap();
        let KeyEntry::PrivateKey { key, .. } = index.get("signer").unwrap() else {
            panic!("expected private key entry");
        };

        let result = key.open(&password("wrong"));
        assert!(matches!(result, Err(ContainerError::BadEntryPassword)));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.skc");
        let result = KeyContainerFile::open(&path);
        assert!(matches!(result, Err(ContainerError::NotFound(p)) if p == path));
    }

    #[test]
    fn garbage_file_is_unsupported_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.skc");
        fs::write(&path, "not json at all").unwrap();

        let result = KeyContainerFile::open(&path);
        assert!(matches!(result, Err(ContainerError::UnsupportedFormat(_))));
    }

    #[test]
    fn foreign_format_tag_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.skc");
        write_container(&path);

        let mut value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        value["format"] = serde_json::json!("someone-elses-container");
        fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

        let result = KeyContainerFile::open(&path);
        assert!(matches!(result, Err(ContainerError::UnsupportedFormat(_))));
    }

    #[test]
    fn future_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.skc");
        write_container(&path);

        let mut value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        value["version"] = serde_json::json!(CONTAINER_VERSION + 1);
        fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

        let result = KeyContainerFile::open(&path);
        assert!(matches!(result, Err(ContainerError::UnsupportedFormat(_))));
    }

    #[test]
    fn custom_kdf_costs_are_applied() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.skc");

        let kdf = KdfConfig {
            memory_cost: 4096,
            time_cost: 3,
            parallelism_cost: 2,
        };
        KeyContainerBuilder::with_kdf(kdf)
            .add_private_key("k", b"key-bytes", test_certificate(), &password("entry"))
            .unwrap()
            .write_to(&path, &password("store"))
            .unwrap();

        let file = KeyContainerFile::open(&path).unwrap();
        assert_eq!(file.kdf.memory_cost, 4096);
        assert_eq!(file.kdf.time_cost, 3);
        assert_eq!(file.kdf.parallelism_cost, 2);

        // The cheaper costs still unlock correctly.
        let index = file.unlock(&password("store")).unwrap();
        assert!(index.contains_key("k"));
    }

    #[test]
    fn builder_replaces_duplicate_alias() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.skc");

        KeyContainerBuilder::new()
            .add_private_key("a", b"old", test_certificate(), &password("p"))
            .unwrap()
            .add_private_key("a", b"new", test_certificate(), &password("p"))
            .unwrap()
            .write_to(&path, &password("store"))
            .unwrap();

        let index = KeyContainerFile::open(&path)
            .unwrap()
            .unlock(&password("store"))
            .unwrap();
        assert_eq!(index.len(), 1);
        let KeyEntry::PrivateKey { key, .. } = index.get("a").unwrap() else {
            panic!("expected private key entry");
        };
        assert_eq!(&key.open(&password("p")).unwrap()[..], b"new");
    }
}
