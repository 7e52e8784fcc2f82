// Wire protocol shared by the daemon and the CLI.

pub mod jsonrpc;
pub mod rpc_methods;
