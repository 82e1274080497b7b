//! Block payloads: the closed action set, profiles and event kinds, plus the
//! stateless checks applied before a payload is sealed.

pub mod types;
pub mod validation;

pub use types::*;
