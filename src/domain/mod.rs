//! Domain layer types.

pub mod content;
