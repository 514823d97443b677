pub mod config;
pub mod utils;

pub use config::{KdfConfig, SignConfig};
pub use utils::ZeroizingVec;
