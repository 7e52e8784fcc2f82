// aide-daemon library entry point: the workspace registry and its RPC surface.

pub mod capability;
pub mod config;
pub mod error;
pub mod fs_ops;
pub mod git;
pub mod reconcile;
pub mod registry;
pub mod rpc;
pub mod runtime;
pub mod scaffold;
pub mod security;
pub mod session;
pub mod startup;
pub mod store;

pub use error::{ErrorCode, RegistryError};
pub use registry::{OpenOutcome, RegistryOptions, WorkspaceRegistry};
