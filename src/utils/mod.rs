//! Shared helpers

pub mod duration;
pub mod redact;
