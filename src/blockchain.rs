//! Blocks and the base chain shared by every layer of the hierarchy.

pub mod core;
pub use self::core::*;
