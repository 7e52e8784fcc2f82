// RPC method name constants: derived from contracts/jsonrpc-methods.json.

// ── Daemon-internal ────────────────────────────────────────────────
pub const RPC_PING: &str = "rpc.ping";
pub const DAEMON_SHUTDOWN: &str = "daemon.shutdown";

// ── Workspace ──────────────────────────────────────────────────────
pub const WORKSPACE_LIST: &str = "workspace.list";
pub const WORKSPACE_CREATE: &str = "workspace.create";
pub const WORKSPACE_IMPORT: &str = "workspace.import";
pub const WORKSPACE_OPEN: &str = "workspace.open";
pub const WORKSPACE_UPDATE: &str = "workspace.update";
pub const WORKSPACE_DELETE: &str = "workspace.delete";

// ── Files ──────────────────────────────────────────────────────────
pub const FILES_LIST: &str = "files.list";
pub const FILES_READ: &str = "files.read";
pub const FILES_WRITE: &str = "files.write";
pub const FILES_MKDIR: &str = "files.mkdir";
pub const FILES_DELETE: &str = "files.delete";

/// All methods the daemon currently dispatches.
pub const IMPLEMENTED_METHODS: &[&str] = &[
    RPC_PING,
    DAEMON_SHUTDOWN,
    WORKSPACE_LIST,
    WORKSPACE_CREATE,
    WORKSPACE_IMPORT,
    WORKSPACE_OPEN,
    WORKSPACE_UPDATE,
    WORKSPACE_DELETE,
    FILES_LIST,
    FILES_READ,
    FILES_WRITE,
    FILES_MKDIR,
    FILES_DELETE,
];

/// Methods acknowledged in the contract as planned but not yet implemented.
pub const PLANNED_METHODS: &[&str] = &["files.move", "workspace.refresh_git"];
