//! The signature engine: an explicit bind → consume → finalize lifecycle
//! around a fixed digest-then-sign scheme.
//!
//! An engine is constructed once per algorithm and then moves through a
//! three-state machine: `Unbound` → bound for signing or verification →
//! `Unbound` again when a result is produced or consumed. Splitting bind,
//! consume and finalize keeps an instance single-use per direction per key;
//! signing state can never leak across unrelated messages. Rebinding is
//! allowed once a result has been taken, not mid-stream.

use crate::algorithm::SignatureAlgorithm;
use crate::error::Error;
use crate::keys::{PrivateKeyMaterial, PublicKeyMaterial};
use rand_core::OsRng;
use rsa::signature::{DigestSigner, DigestVerifier, RandomizedDigestSigner, SignatureEncoding};
use rsa::{RsaPrivateKey, RsaPublicKey, pkcs1v15, pss};
use sha2::{Digest, Sha256, Sha384, Sha512};

/// Streaming signer/verifier bound to one [`SignatureAlgorithm`].
pub struct SignatureEngine {
    algorithm: SignatureAlgorithm,
    state: EngineState,
}

enum EngineState {
    Unbound,
    Signing(SignContext),
    Verifying(VerifyContext),
}

/// Per-scheme signing state: the prepared key plus the running digest.
enum SignContext {
    Pkcs1v15Sha256 {
        key: pkcs1v15::SigningKey<Sha256>,
        digest: Sha256,
    },
    Pkcs1v15Sha384 {
        key: pkcs1v15::SigningKey<Sha384>,
        digest: Sha384,
    },
    Pkcs1v15Sha512 {
        key: pkcs1v15::SigningKey<Sha512>,
        digest: Sha512,
    },
    PssSha256 {
        key: pss::SigningKey<Sha256>,
        digest: Sha256,
    },
    PssSha512 {
        key: pss::SigningKey<Sha512>,
        digest: Sha512,
    },
}

enum VerifyContext {
    Pkcs1v15Sha256 {
        key: pkcs1v15::VerifyingKey<Sha256>,
        digest: Sha256,
    },
    Pkcs1v15Sha384 {
        key: pkcs1v15::VerifyingKey<Sha384>,
        digest: Sha384,
    },
    Pkcs1v15Sha512 {
        key: pkcs1v15::VerifyingKey<Sha512>,
        digest: Sha512,
    },
    PssSha256 {
        key: pss::VerifyingKey<Sha256>,
        digest: Sha256,
    },
    PssSha512 {
        key: pss::VerifyingKey<Sha512>,
        digest: Sha512,
    },
}

impl SignContext {
    fn new(algorithm: SignatureAlgorithm, key: RsaPrivateKey) -> Self {
        match algorithm {
            SignatureAlgorithm::Sha256Pkcs1v15 => Self::Pkcs1v15Sha256 {
                key: pkcs1v15::SigningKey::new(key),
                digest: Sha256::new(),
            },
            SignatureAlgorithm::Sha384Pkcs1v15 => Self::Pkcs1v15Sha384 {
                key: pkcs1v15::SigningKey::new(key),
                digest: Sha384::new(),
            },
            SignatureAlgorithm::Sha512Pkcs1v15 => Self::Pkcs1v15Sha512 {
                key: pkcs1v15::SigningKey::new(key),
                digest: Sha512::new(),
            },
            SignatureAlgorithm::Sha256Pss => Self::PssSha256 {
                key: pss::SigningKey::new(key),
                digest: Sha256::new(),
            },
            SignatureAlgorithm::Sha512Pss => Self::PssSha512 {
                key: pss::SigningKey::new(key),
                digest: Sha512::new(),
            },
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            Self::Pkcs1v15Sha256 { digest, .. } => digest.update(chunk),
            Self::Pkcs1v15Sha384 { digest, .. } => digest.update(chunk),
            Self::Pkcs1v15Sha512 { digest, .. } => digest.update(chunk),
            Self::PssSha256 { digest, .. } => digest.update(chunk),
            Self::PssSha512 { digest, .. } => digest.update(chunk),
        }
    }

    fn finish(self) -> Result<Vec<u8>, Error> {
        let result = match self {
            Self::Pkcs1v15Sha256 { key, digest } => {
                key.try_sign_digest(digest).map(|s| s.to_vec())
            }
            Self::Pkcs1v15Sha384 { key, digest } => {
                key.try_sign_digest(digest).map(|s| s.to_vec())
            }
            Self::Pkcs1v15Sha512 { key, digest } => {
                key.try_sign_digest(digest).map(|s| s.to_vec())
            }
            Self::PssSha256 { key, digest } => key
                .try_sign_digest_with_rng(&mut OsRng, digest)
                .map(|s| s.to_vec()),
            Self::PssSha512 { key, digest } => key
                .try_sign_digest_with_rng(&mut OsRng, digest)
                .map(|s| s.to_vec()),
        };
        result.map_err(|e| Error::Signature(format!("signing failed: {e}")))
    }
}

impl VerifyContext {
    fn new(algorithm: SignatureAlgorithm, key: RsaPublicKey) -> Self {
        match algorithm {
            SignatureAlgorithm::Sha256Pkcs1v15 => Self::Pkcs1v15Sha256 {
                key: pkcs1v15::VerifyingKey::new(key),
                digest: Sha256::new(),
            },
            SignatureAlgorithm::Sha384Pkcs1v15 => Self::Pkcs1v15Sha384 {
                key: pkcs1v15::VerifyingKey::new(key),
                digest: Sha384::new(),
            },
            SignatureAlgorithm::Sha512Pkcs1v15 => Self::Pkcs1v15Sha512 {
                key: pkcs1v15::VerifyingKey::new(key),
                digest: Sha512::new(),
            },
            SignatureAlgorithm::Sha256Pss => Self::PssSha256 {
                key: pss::VerifyingKey::new(key),
                digest: Sha256::new(),
            },
            SignatureAlgorithm::Sha512Pss => Self::PssSha512 {
                key: pss::VerifyingKey::new(key),
                digest: Sha512::new(),
            },
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            Self::Pkcs1v15Sha256 { digest, .. } => digest.update(chunk),
            Self::Pkcs1v15Sha384 { digest, .. } => digest.update(chunk),
            Self::Pkcs1v15Sha512 { digest, .. } => digest.update(chunk),
            Self::PssSha256 { digest, .. } => digest.update(chunk),
            Self::PssSha512 { digest, .. } => digest.update(chunk),
        }
    }

    /// Checks the candidate against the consumed bytes. Malformed candidate
    /// bytes count as a mismatch, not an error: the candidate is an opaque
    /// blob and anything that does not verify is simply not a signature over
    /// this input.
    fn finish(self, candidate: &[u8]) -> bool {
        match self {
            Self::Pkcs1v15Sha256 { key, digest } => match pkcs1v15::Signature::try_from(candidate) {
                Ok(sig) => key.verify_digest(digest, &sig).is_ok(),
                Err(_) => false,
            },
            Self::Pkcs1v15Sha384 { key, digest } => match pkcs1v15::Signature::try_from(candidate) {
                Ok(sig) => key.verify_digest(digest, &sig).is_ok(),
                Err(_) => false,
            },
            Self::Pkcs1v15Sha512 { key, digest } => match pkcs1v15::Signature::try_from(candidate) {
                Ok(sig) => key.verify_digest(digest, &sig).is_ok(),
                Err(_) => false,
            },
            Self::PssSha256 { key, digest } => match pss::Signature::try_from(candidate) {
                Ok(sig) => key.verify_digest(digest, &sig).is_ok(),
                Err(_) => false,
            },
            Self::PssSha512 { key, digest } => match pss::Signature::try_from(candidate) {
                Ok(sig) => key.verify_digest(digest, &sig).is_ok(),
                Err(_) => false,
            },
        }
    }
}

impl SignatureEngine {
    /// Creates an engine for the named algorithm and optional provider.
    ///
    /// Unknown names and providers fail here, at construction, never later.
    pub fn new(name: &str, provider: Option<&str>) -> Result<Self, Error> {
        Ok(Self::with_algorithm(SignatureAlgorithm::parse(
            name, provider,
        )?))
    }

    /// Creates an engine for an already-resolved algorithm.
    pub fn with_algorithm(algorithm: SignatureAlgorithm) -> Self {
        Self {
            algorithm,
            state: EngineState::Unbound,
        }
    }

    /// The algorithm this engine was constructed with.
    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Binds a private key for signing. Valid only when unbound.
    pub fn bind_for_signing(&mut self, key: &PrivateKeyMaterial) -> Result<(), Error> {
        if !matches!(self.state, EngineState::Unbound) {
            return Err(Error::Precondition("engine is already bound"));
        }
        let rsa_key = key.to_rsa()?;
        self.state = EngineState::Signing(SignContext::new(self.algorithm, rsa_key));
        Ok(())
    }

    /// Binds a public key for verification. Valid only when unbound.
    pub fn bind_for_verification(&mut self, key: &PublicKeyMaterial) -> Result<(), Error> {
        if !matches!(self.state, EngineState::Unbound) {
            return Err(Error::Precondition("engine is already bound"));
        }
        let rsa_key = key.to_rsa()?;
        self.state = EngineState::Verifying(VerifyContext::new(self.algorithm, rsa_key));
        Ok(())
    }

    /// Feeds input bytes. May be called zero or more times between bind and
    /// finalize; all bytes must arrive in order.
    pub fn consume(&mut self, chunk: &[u8]) -> Result<(), Error> {
        match &mut self.state {
            EngineState::Signing(ctx) => {
                ctx.update(chunk);
                Ok(())
            }
            EngineState::Verifying(ctx) => {
                ctx.update(chunk);
                Ok(())
            }
            EngineState::Unbound => Err(Error::Precondition("engine is not bound")),
        }
    }

    /// Produces the signature over the consumed bytes and returns the engine
    /// to the unbound state, on success and on failure alike.
    pub fn finalize_sign(&mut self) -> Result<Vec<u8>, Error> {
        match std::mem::replace(&mut self.state, EngineState::Unbound) {
            EngineState::Signing(ctx) => ctx.finish(),
            EngineState::Verifying(_) | EngineState::Unbound => {
                Err(Error::Precondition("engine is not bound for signing"))
            }
        }
    }

    /// Discards any bound state, returning the engine to `Unbound` without
    /// producing a result. Used when input consumption is abandoned
    /// mid-stream, e.g. after an I/O failure.
    pub fn reset(&mut self) {
        self.state = EngineState::Unbound;
    }

    /// Checks a candidate signature over the consumed bytes and returns the
    /// engine to the unbound state regardless of the outcome.
    pub fn finalize_verify(&mut self, candidate: &[u8]) -> Result<bool, Error> {
        match std::mem::replace(&mut self.state, EngineState::Unbound) {
            EngineState::Verifying(ctx) => Ok(ctx.finish(candidate)),
            EngineState::Signing(_) | EngineState::Unbound => {
                Err(Error::Precondition("engine is not bound for verification"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};

    fn setup_keys() -> (PrivateKeyMaterial, PublicKeyMaterial) {
        let key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let private_der = key.to_pkcs8_der().unwrap().as_bytes().to_vec();
        let public_der = key.to_public_key().to_public_key_der().unwrap().into_vec();
        (
            PrivateKeyMaterial::from_pkcs8_der(private_der),
            PublicKeyMaterial::from_spki_der(public_der),
        )
    }

    fn sign_all(engine: &mut SignatureEngine, key: &PrivateKeyMaterial, data: &[u8]) -> Vec<u8> {
        engine.bind_for_signing(key).unwrap();
        engine.consume(data).unwrap();
        engine.finalize_sign().unwrap()
    }

    fn verify_all(
        engine: &mut SignatureEngine,
        key: &PublicKeyMaterial,
        data: &[u8],
        signature: &[u8],
    ) -> bool {
        engine.bind_for_verification(key).unwrap();
        engine.consume(data).unwrap();
        engine.finalize_verify(signature).unwrap()
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let (private, public) = setup_keys();
        let mut engine = SignatureEngine::with_algorithm(SignatureAlgorithm::Sha256Pkcs1v15);
        assert_eq!(engine.algorithm(), SignatureAlgorithm::Sha256Pkcs1v15);
        let data = b"data to be signed";

        let signature = sign_all(&mut engine, &private, data);
        assert!(!signature.is_empty());
        assert!(verify_all(&mut engine, &public, data, &signature));
    }

    #[test]
    fn test_pss_roundtrip() {
        let (private, public) = setup_keys();
        let mut engine = SignatureEngine::with_algorithm(SignatureAlgorithm::Sha256Pss);
        let data = b"pss signed data";

        let signature = sign_all(&mut engine, &private, data);
        assert!(verify_all(&mut engine, &public, data, &signature));
    }

    #[test]
    fn test_chunked_consumption_matches_whole_input() {
        let (private, public) = setup_keys();
        let mut engine = SignatureEngine::with_algorithm(SignatureAlgorithm::Sha512Pkcs1v15);
        let data = b"a message fed to the engine in several pieces";

        engine.bind_for_signing(&private).unwrap();
        for chunk in data.chunks(7) {
            engine.consume(chunk).unwrap();
        }
        let signature = engine.finalize_sign().unwrap();

        assert!(verify_all(&mut engine, &public, data, &signature));
    }

    #[test]
    fn test_verify_tampered_data_fails() {
        let (private, public) = setup_keys();
        let mut engine = SignatureEngine::with_algorithm(SignatureAlgorithm::Sha256Pkcs1v15);

        let signature = sign_all(&mut engine, &private, b"some important data");
        assert!(!verify_all(
            &mut engine,
            &public,
            b"some tampered data",
            &signature
        ));
    }

    #[test]
    fn test_malformed_signature_is_mismatch_not_error() {
        let (private, public) = setup_keys();
        let mut engine = SignatureEngine::with_algorithm(SignatureAlgorithm::Sha256Pkcs1v15);
        let data = b"whatever";
        let _ = sign_all(&mut engine, &private, data);

        engine.bind_for_verification(&public).unwrap();
        engine.consume(data).unwrap();
        // Too short to even be an RSA signature.
        assert!(!engine.finalize_verify(b"garbage").unwrap());
    }

    #[test]
    fn test_empty_input_is_signable() {
        let (private, public) = setup_keys();
        let mut engine = SignatureEngine::with_algorithm(SignatureAlgorithm::Sha256Pkcs1v15);

        engine.bind_for_signing(&private).unwrap();
        let signature = engine.finalize_sign().unwrap();

        engine.bind_for_verification(&public).unwrap();
        assert!(engine.finalize_verify(&signature).unwrap());
    }

    #[test]
    fn consume_unbound_fails() {
        let mut engine = SignatureEngine::with_algorithm(SignatureAlgorithm::Sha256Pkcs1v15);
        assert!(matches!(
            engine.consume(b"data"),
            Err(Error::Precondition(_))
        ));
    }

    #[test]
    fn rebind_mid_stream_fails() {
        let (private, public) = setup_keys();
        let mut engine = SignatureEngine::with_algorithm(SignatureAlgorithm::Sha256Pkcs1v15);

        engine.bind_for_signing(&private).unwrap();
        assert!(matches!(
            engine.bind_for_verification(&public),
            Err(Error::Precondition(_))
        ));
        assert!(matches!(
            engine.bind_for_signing(&private),
            Err(Error::Precondition(_))
        ));
    }

    #[test]
    fn finalize_wrong_direction_fails() {
        let (private, _) = setup_keys();
        let mut engine = SignatureEngine::with_algorithm(SignatureAlgorithm::Sha256Pkcs1v15);

        engine.bind_for_signing(&private).unwrap();
        assert!(matches!(
            engine.finalize_verify(b"sig"),
            Err(Error::Precondition(_))
        ));

        // The failed finalize reset the engine, so a fresh bind is allowed.
        engine.bind_for_signing(&private).unwrap();
        engine.finalize_sign().unwrap();
    }

    #[test]
    fn reset_discards_bound_state() {
        let (private, _) = setup_keys();
        let mut engine = SignatureEngine::with_algorithm(SignatureAlgorithm::Sha256Pkcs1v15);

        engine.bind_for_signing(&private).unwrap();
        engine.consume(b"partial input").unwrap();
        engine.reset();

        assert!(matches!(
            engine.finalize_sign(),
            Err(Error::Precondition(_))
        ));
        engine.bind_for_signing(&private).unwrap();
    }

    #[test]
    fn test_engine_is_reusable_sequentially() {
        let (private, public) = setup_keys();
        let mut engine = SignatureEngine::with_algorithm(SignatureAlgorithm::Sha256Pkcs1v15);

        let first = sign_all(&mut engine, &private, b"first message");
        let second = sign_all(&mut engine, &private, b"second message");

        assert!(verify_all(&mut engine, &public, b"first message", &first));
        assert!(verify_all(&mut engine, &public, b"second message", &second));
        assert!(!verify_all(&mut engine, &public, b"second message", &first));
    }

    #[test]
    fn bind_non_rsa_key_fails() {
        let mut engine = SignatureEngine::with_algorithm(SignatureAlgorithm::Sha256Pkcs1v15);
        let bogus = PrivateKeyMaterial::from_pkcs8_der(vec![0x30, 0x03, 0x02, 0x01, 0x00]);
        assert!(matches!(
            engine.bind_for_signing(&bogus),
            Err(Error::InvalidKey(_))
        ));
        // A failed bind leaves the engine unbound.
        assert!(matches!(
            engine.consume(b"data"),
            Err(Error::Precondition(_))
        ));
    }
}
