// aide-common: shared types and utilities for the aide workspace registry

pub mod detect;
pub mod path;
pub mod protocol;
pub mod types;
