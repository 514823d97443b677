//! Signature algorithm selection.
//!
//! Algorithms are selected by name at engine construction, in the JCA style
//! the container vocabulary also uses (`"SHA256withRSA"`), together with an
//! optional provider selector. The single built-in provider is
//! [`BUILTIN_PROVIDER`]; naming any other provider is an error. The selection
//! is immutable for the lifetime of an engine.

use crate::error::Error;

/// The provider name implemented by this crate.
pub const BUILTIN_PROVIDER: &str = "rustcrypto";

/// A digest-then-sign scheme supported by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5 over SHA-256.
    Sha256Pkcs1v15,
    /// RSASSA-PKCS1-v1_5 over SHA-384.
    Sha384Pkcs1v15,
    /// RSASSA-PKCS1-v1_5 over SHA-512.
    Sha512Pkcs1v15,
    /// RSASSA-PSS over SHA-256.
    Sha256Pss,
    /// RSASSA-PSS over SHA-512.
    Sha512Pss,
}

impl SignatureAlgorithm {
    /// Resolves an algorithm from `(name, provider)` strings.
    ///
    /// Names are matched case-insensitively. An unknown name or an unknown
    /// provider is reported as [`Error::UnsupportedAlgorithm`], eagerly at
    /// construction time rather than at first use.
    pub fn parse(name: &str, provider: Option<&str>) -> Result<Self, Error> {
        let unsupported = || Error::UnsupportedAlgorithm {
            name: name.to_string(),
            provider: provider.map(str::to_string),
        };

        if let Some(p) = provider {
            if !p.eq_ignore_ascii_case(BUILTIN_PROVIDER) {
                return Err(unsupported());
            }
        }

        match name.to_ascii_uppercase().as_str() {
            "SHA256WITHRSA" => Ok(Self::Sha256Pkcs1v15),
            "SHA384WITHRSA" => Ok(Self::Sha384Pkcs1v15),
            "SHA512WITHRSA" => Ok(Self::Sha512Pkcs1v15),
            "SHA256WITHRSA/PSS" => Ok(Self::Sha256Pss),
            "SHA512WITHRSA/PSS" => Ok(Self::Sha512Pss),
            _ => Err(unsupported()),
        }
    }

    /// The canonical name of this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256Pkcs1v15 => "SHA256withRSA",
            Self::Sha384Pkcs1v15 => "SHA384withRSA",
            Self::Sha512Pkcs1v15 => "SHA512withRSA",
            Self::Sha256Pss => "SHA256withRSA/PSS",
            Self::Sha512Pss => "SHA512withRSA/PSS",
        }
    }
}

impl std::fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
