// Consistent exit codes for the aide CLI.
//
//   0  = success
//   1  = general error
//   2  = usage/argument error
//   10 = daemon not reachable
//   11 = directory access denied or cancelled
//   12 = workspace or entry gone
//   13 = daemon timed out

use std::process;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    DaemonDown = 10,
    Access = 11,
    Gone = 12,
    Network = 13,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(rpc_err) = cause.downcast_ref::<RpcError>() {
                return Self::from_rpc_code(rpc_err.code.as_str());
            }
            if cause.is::<crate::client::DaemonUnavailable>() {
                return Self::DaemonDown;
            }
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
                return match io_err.kind() {
                    std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::NotFound => {
                        Self::DaemonDown
                    }
                    std::io::ErrorKind::TimedOut => Self::Network,
                    _ => Self::Error,
                };
            }
        }

        let msg = format!("{err:#}");
        if msg.contains("timed out") {
            return Self::Network;
        }
        if msg.contains("daemon") && (msg.contains("connect") || msg.contains("socket")) {
            return Self::DaemonDown;
        }

        Self::Error
    }

    /// Map a registry error code to an exit code.
    pub fn from_rpc_code(code: &str) -> Self {
        match code {
            "PERMISSION_DENIED" | "ABORTED" => Self::Access,
            "NOT_FOUND" | "MISMATCH" | "CORRUPT" | "UNREACHABLE" => Self::Gone,
            "VALIDATION_FAILED" | "INVALID_PARAMS" => Self::Usage,
            _ => Self::Error,
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}

/// A typed RPC error that can be embedded in an `anyhow::Error` chain.
#[derive(Debug)]
pub struct RpcError {
    pub code: String,
    pub message: String,
    /// What the user can do about it, when the daemon said.
    pub action: Option<String>,
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}
