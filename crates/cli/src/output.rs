// Output format auto-detection for the CLI.
//
// TTY → human-readable text. Piped/redirected → structured JSON.
// `--json` flag forces JSON output regardless of terminal.

use serde::Serialize;
use std::io::{self, IsTerminal, Write};

use crate::client::DaemonUnavailable;
use crate::exit_code::RpcError;

const ANSI_RED: &str = "\x1b[31m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RESET: &str = "\x1b[0m";

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Human,
    /// Machine-readable JSON (one object per response).
    Json,
}

impl OutputFormat {
    /// Auto-detect format: JSON if `--json` was passed or stdout is not a TTY.
    pub fn detect(json_flag: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        Self::detect_from_terminal(io::stdout().is_terminal())
    }

    /// Testable variant that takes an explicit `is_tty` flag.
    pub fn detect_from_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }
}

/// Write a value to stdout in the selected format.
pub fn print_output<T, F>(format: OutputFormat, value: &T, human_fn: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    write_output(&mut io::stdout().lock(), format, value, human_fn)
}

/// Write a value to a provided writer (useful for testing).
pub fn write_output<W, T, F>(
    writer: &mut W,
    format: OutputFormat,
    value: &T,
    human_fn: F,
) -> io::Result<()>
where
    W: Write,
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => {
            writeln!(writer, "{}", human_fn(value))
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *writer, value).map_err(io::Error::other)?;
            writeln!(writer)
        }
    }
}

/// Write an error to stderr in the selected format.
pub fn print_error(format: OutputFormat, code: &str, message: &str) {
    let mut err = io::stderr().lock();
    match format {
        OutputFormat::Human => {
            let line =
                render_human_stderr_line("error", message, io::stderr().is_terminal(), ANSI_RED);
            let _ = writeln!(err, "{line}");
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "error": {
                    "code": code,
                    "message": message,
                }
            });
            let _ = serde_json::to_writer(&mut err, &obj);
            let _ = writeln!(err);
        }
    }
}

/// Write a warning to stderr in the selected format.
pub fn print_warning(format: OutputFormat, code: &str, message: &str) {
    let mut err = io::stderr().lock();
    match format {
        OutputFormat::Human => {
            let line = render_human_stderr_line(
                "warning",
                message,
                io::stderr().is_terminal(),
                ANSI_YELLOW,
            );
            let _ = writeln!(err, "{line}");
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "warning": {
                    "code": code,
                    "message": message,
                }
            });
            let _ = serde_json::to_writer(&mut err, &obj);
            let _ = writeln!(err);
        }
    }
}

/// Print a mapped, actionable error for a command failure.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error) {
    let (code, message) = actionable_error(error);
    print_error(format, &code, &message);
}

fn actionable_error(error: &anyhow::Error) -> (String, String) {
    for cause in error.chain() {
        if let Some(rpc) = cause.downcast_ref::<RpcError>() {
            let message = match &rpc.action {
                Some(action) => format!("{}. Next: {action}", rpc.message),
                None => rpc.message.clone(),
            };
            return (rpc.code.clone(), message);
        }
        if cause.downcast_ref::<DaemonUnavailable>().is_some() {
            return (
                "DAEMON_NOT_RUNNING".to_string(),
                "Daemon is not running. Start it with: aided".to_string(),
            );
        }
    }

    let message = format!("{error:#}");
    let lower = message.to_ascii_lowercase();

    if lower.contains("daemon")
        && lower.contains("socket")
        && (lower.contains("connection refused") || lower.contains("failed to connect"))
    {
        return (
            "DAEMON_NOT_RUNNING".to_string(),
            "Daemon is not running. Start it with: aided".to_string(),
        );
    }

    if lower.contains("timed out") {
        return (
            "NETWORK_TIMEOUT".to_string(),
            "Could not reach daemon. Check if aided is running: ps aux | grep aided".to_string(),
        );
    }

    ("RPC_ERROR".to_string(), message)
}

fn render_human_stderr_line(label: &str, message: &str, is_tty: bool, color: &str) -> String {
    if is_tty {
        format!("{color}{label}:{ANSI_RESET} {message}")
    } else {
        format!("{label}: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_tty_returns_human() {
        assert_eq!(
            OutputFormat::detect_from_terminal(true),
            OutputFormat::Human
        );
    }

    #[test]
    fn detect_pipe_returns_json() {
        assert_eq!(
            OutputFormat::detect_from_terminal(false),
            OutputFormat::Json
        );
    }

    #[test]
    fn detect_json_flag_overrides_tty() {
        assert_eq!(OutputFormat::detect(true), OutputFormat::Json);
    }

    #[test]
    fn write_output_human_format() {
        #[derive(Serialize)]
        struct Info {
            name: String,
        }
        let info = Info {
            name: "notes".into(),
        };
        let mut buf = Vec::new();
        let human = |i: &Info| format!("Name: {}", i.name);
        write_output(&mut buf, OutputFormat::Human, &info, human).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "Name: notes\n");
    }

    #[test]
    fn write_output_json_format() {
        #[derive(Serialize)]
        struct Info {
            name: String,
            count: u32,
        }
        let info = Info {
            name: "bob".into(),
            count: 42,
        };
        let mut buf = Vec::new();
        write_output(&mut buf, OutputFormat::Json, &info, |_| {
            unreachable!("human_fn should not be called in JSON mode")
        })
        .unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(parsed["name"], "bob");
        assert_eq!(parsed["count"], 42);
    }

    #[test]
    fn print_error_does_not_panic() {
        print_error(OutputFormat::Human, "TEST_ERR", "something broke");
        print_error(OutputFormat::Json, "TEST_ERR", "something broke");
        print_warning(OutputFormat::Json, "WARN", "heads up");
    }

    #[test]
    fn render_human_error_uses_color_for_tty() {
        let line = render_human_stderr_line("error", "boom", true, ANSI_RED);
        assert!(line.contains(ANSI_RED));
        assert!(line.contains(ANSI_RESET));
        assert!(line.contains("boom"));
    }

    #[test]
    fn render_human_warning_without_tty_is_plain() {
        let line = render_human_stderr_line("warning", "careful", false, ANSI_YELLOW);
        assert_eq!(line, "warning: careful");
    }

    #[test]
    fn actionable_error_uses_daemon_action() {
        let err = anyhow::Error::new(RpcError {
            code: "MISMATCH".into(),
            message: "selected directory `b` does not match workspace directory `a`".into(),
            action: Some("this workspace was removed; import the folder again".into()),
        })
        .context("failed to open workspace");
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "MISMATCH");
        assert!(message.contains("does not match"));
        let next = "Next: this workspace was removed; import the folder again";
        assert!(message.ends_with(next));
    }

    #[test]
    fn actionable_error_daemon_not_running_message() {
        let err = anyhow::anyhow!("failed to connect to daemon socket: connection refused");
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "DAEMON_NOT_RUNNING");
        assert!(message.contains("aided"));
    }

    #[test]
    fn actionable_error_timeout_message() {
        let err = anyhow::anyhow!("timed out waiting for json-rpc response");
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "NETWORK_TIMEOUT");
        assert!(message.contains("ps aux | grep aided"));
    }

    #[test]
    fn actionable_error_falls_back_to_message() {
        let err = anyhow::anyhow!("something odd");
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "RPC_ERROR");
        assert_eq!(message, "something odd");
    }
}
