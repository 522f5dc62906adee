// Core types for pinning mutable references to immutable identifiers

pub mod digest;
pub mod error;
pub mod reference;
pub mod types;

pub use digest::Digest;
pub use error::{CoreError, CoreResult};
pub use reference::{Identifier, ImageReference, DEFAULT_REGISTRY, DEFAULT_TAG};
pub use types::*;
