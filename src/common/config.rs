//!
//! # 通用配置模块
//!
//! Core configuration structures for the signing service and the key
//! container format: algorithm selection, streaming behavior and the
//! Argon2 cost parameters used when sealing container entries.
//!

use serde::{Deserialize, Serialize};

/// Argon2id cost parameters used when deriving wrapping keys from passwords.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct KdfConfig {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_cost")]
    pub memory_cost: u32,
    /// Number of iterations.
    #[serde(default = "default_time_cost")]
    pub time_cost: u32,
    /// Degree of parallelism.
    #[serde(default = "default_parallelism_cost")]
    pub parallelism_cost: u32,
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

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            memory_cost: default_memory_cost(),
            time_cost: default_time_cost(),
            parallelism_cost: default_parallelism_cost(),
        }
    }
}

/// Configuration for a [`SignatureService`](crate::service::SignatureService).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SignConfig {
    /// Signature algorithm name, e.g. `"SHA256withRSA"` or `"SHA256withRSA/PSS"`.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Optional provider selector. `None` selects the built-in provider.
    #[serde(default)]
    pub provider: Option<String>,
    /// Read chunk size used when streaming input files into the engine.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// KDF costs applied when authoring key containers.
    #[serde(default)]
    pub kdf: KdfConfig,
}

fn default_algorithm() -> String {
    "SHA256withRSA".to_string()
}
fn default_chunk_size() -> usize {
    1024
}

impl Default for SignConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            provider: None,
            chunk_size: default_chunk_size(),
            kdf: KdfConfig::default(),
        }
    }
}
