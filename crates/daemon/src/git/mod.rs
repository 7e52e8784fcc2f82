// Git info extraction for newly registered workspaces.

pub mod worker;

pub use worker::{CommandExecutor, GitInspector, ProcessCommandExecutor};
