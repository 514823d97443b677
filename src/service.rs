//! The signature service: end-to-end sign, verify and export operations over
//! files, with session key state sourced from a key container.

use crate::common::config::SignConfig;
use crate::engine::SignatureEngine;
use crate::error::Error;
use crate::keys::{KeyPair, PublicKeyExporter, PublicKeyMaterial};
use crate::storage::reader::KeyContainerReader;
use secrecy::SecretString;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

/// Orchestrates container extraction and the signature engine behind three
/// operations: sign a file to a detached signature, verify a file against
/// one, and export the session public key.
///
/// A service instance is a session: `init_keys` populates the key pair and
/// every subsequent operation uses it until `init_keys` replaces it. The
/// type is not thread-safe; every mutating operation takes `&mut self` and
/// no internal locking is performed, so concurrent use requires external
/// serialization.
pub struct SignatureService {
    engine: SignatureEngine,
    keys: Option<KeyPair>,
    chunk_size: usize,
}

impl SignatureService {
    /// Builds a service from configuration, resolving the algorithm and
    /// provider eagerly.
    pub fn new(config: &SignConfig) -> Result<Self, Error> {
        let engine = SignatureEngine::new(&config.algorithm, config.provider.as_deref())?;
        Ok(Self {
            engine,
            keys: None,
            chunk_size: config.chunk_size.max(1),
        })
    }

    /// Wraps an already-constructed engine, with the default chunk size.
    pub fn with_engine(engine: SignatureEngine) -> Self {
        Self {
            engine,
            keys: None,
            chunk_size: SignConfig::default().chunk_size,
        }
    }

    /// Extracts the key pair stored under `alias` and installs it as the
    /// session key pair. Idempotent: calling again replaces the pair. On
    /// failure the previous session keys, if any, are left untouched.
    pub fn init_keys<P: AsRef<Path>>(
        &mut self,
        container: P,
        alias: &str,
        store_password: &SecretString,
        entry_password: &SecretString,
    ) -> Result<(), Error> {
        let pair = KeyContainerReader::extract(&container, alias, store_password, entry_password)?;
        self.keys = Some(pair);
        debug!(alias, "session keys initialized");
        Ok(())
    }

    /// Signs the file at `input`, returning the detached signature bytes.
    ///
    /// Fails with a precondition error before touching the input when no
    /// session keys are bound.
    pub fn sign<P: AsRef<Path>>(&mut self, input: P) -> Result<Vec<u8>, Error> {
        let keys = self
            .keys
            .as_ref()
            .ok_or(Error::Precondition("no key bound; call init_keys first"))?;
        self.engine.bind_for_signing(&keys.private)?;

        let input = input.as_ref();
        match stream_file(&mut self.engine, input, self.chunk_size) {
            Ok(total) => {
                let signature = self.engine.finalize_sign()?;
                debug!(input = %input.display(), bytes = total, "produced detached signature");
                Ok(signature)
            }
            Err(e) => {
                self.engine.reset();
                Err(e)
            }
        }
    }

    /// Signs the file at `input` and writes the raw signature bytes to
    /// `signature`.
    pub fn sign_to<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        input: P,
        signature: Q,
    ) -> Result<(), Error> {
        let bytes = self.sign(input)?;
        fs::write(signature, bytes)?;
        Ok(())
    }

    /// Verifies the file at `input` against the detached signature at
    /// `signature`.
    ///
    /// A mismatching signature is `Ok(false)`; an `Err` means verification
    /// could not be attempted at all.
    pub fn verify<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        input: P,
        signature: Q,
    ) -> Result<bool, Error> {
        let keys = self
            .keys
            .as_ref()
            .ok_or(Error::Precondition("no key bound; call init_keys first"))?;

        let candidate = fs::read(signature)?;
        self.engine.bind_for_verification(&keys.public)?;

        let input = input.as_ref();
        match stream_file(&mut self.engine, input, self.chunk_size) {
            Ok(_) => {
                let verified = self.engine.finalize_verify(&candidate)?;
                debug!(input = %input.display(), verified, "verified detached signature");
                Ok(verified)
            }
            Err(e) => {
                self.engine.reset();
                Err(e)
            }
        }
    }

    /// Writes the canonical SPKI DER encoding of the session public key.
    pub fn export_public_key<P: AsRef<Path>>(&self, output: P) -> Result<(), Error> {
        let keys = self
            .keys
            .as_ref()
            .ok_or(Error::Precondition("no key bound; call init_keys first"))?;
        PublicKeyExporter::write_der(&keys.public, output)
    }

    /// The session public key, if `init_keys` has succeeded.
    pub fn public_key(&self) -> Option<&PublicKeyMaterial> {
        self.keys.as_ref().map(|k| &k.public)
    }
}

/// Feeds a file through the engine in fixed-size chunks, returning the
/// number of bytes consumed.
fn stream_file(engine: &mut SignatureEngine, path: &Path, chunk_size: usize) -> Result<u64, Error> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut buffer = vec![0u8; chunk_size];
    let mut total = 0u64;
    loop {
        let len = reader.read(&mut buffer)?;
        if len == 0 {
            break;
        }
        engine.consume(&buffer[..len])?;
        total += len as u64;
    }
    Ok(total)
}
