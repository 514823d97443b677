pub mod container;
pub mod reader;

pub use container::{
    Certificate, ContainerError, KeyContainerBuilder, KeyContainerFile, KeyEntry, SealedBlob,
};
pub use reader::KeyContainerReader;
