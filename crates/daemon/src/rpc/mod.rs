// JSON-RPC server: method dispatch over the daemon's Unix socket.

pub mod methods;
pub mod unix;
