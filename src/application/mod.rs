//! Application services layer.

pub mod paths;
pub mod purge;
