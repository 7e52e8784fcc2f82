use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use aide_common::protocol::jsonrpc::{Request, RequestId, Response, INVALID_PARAMS};
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[cfg(unix)]
use tokio::net::UnixStream;
#[cfg(unix)]
use tokio::time::timeout;

use crate::exit_code::RpcError;

const SOCKET_RELATIVE_PATH: &str = ".ai-ide/daemon.sock";
// Listing can wait on per-workspace validation, which the daemon caps at 30s.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug)]
pub struct DaemonUnavailable {
    socket_path: PathBuf,
    source: io::Error,
}

impl DaemonUnavailable {
    fn new(socket_path: PathBuf, source: io::Error) -> Self {
        Self {
            socket_path,
            source,
        }
    }
}

impl fmt::Display for DaemonUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let socket = self.socket_path.display();
        write!(f, "daemon is not running (socket `{socket}`)")
    }
}

impl std::error::Error for DaemonUnavailable {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[derive(Debug)]
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
    next_request_id: AtomicU64,
}

impl Default for DaemonClient {
    fn default() -> Self {
        Self::new(default_socket_path())
    }
}

impl DaemonClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            next_request_id: AtomicU64::new(1),
        }
    }

    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params =
            serde_json::to_value(params).context("failed to serialize json-rpc params")?;
        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);

        match self.call_once(id, method, params.clone()).await {
            Ok(response) => Ok(response),
            // The daemon answered; repeating the call would repeat its effect.
            Err(error) if is_daemon_answer(&error) => Err(error),
            Err(first_error) => {
                // Retry once for transient socket drops / daemon restarts.
                self.call_once(id, method, params).await.map_err(|second_error| {
                    second_error.context(format!(
                        "json-rpc call failed after retry; first error: {first_error:#}"
                    ))
                })
            }
        }
    }

    async fn call_once<R>(&self, id: u64, method: &str, params: serde_json::Value) -> Result<R>
    where
        R: DeserializeOwned,
    {
        #[cfg(unix)]
        {
            let id = i64::try_from(id).context("request id overflow")?;
            let request = Request::new(method, Some(params), RequestId::Number(id));
            let mut payload =
                serde_json::to_vec(&request).context("failed to serialize json-rpc request")?;
            payload.push(b'\n');

            let stream = timeout(self.timeout, UnixStream::connect(&self.socket_path))
                .await
                .context("timed out connecting to daemon socket")?
                .map_err(|err| {
                    if is_daemon_unavailable_kind(err.kind()) {
                        anyhow!(DaemonUnavailable::new(self.socket_path.clone(), err))
                    } else {
                        anyhow!(err)
                    }
                })
                .with_context(|| {
                    let socket = self.socket_path.display();
                    format!("failed to connect to daemon socket `{socket}`")
                })?;

            let (read_half, mut write_half) = stream.into_split();
            timeout(self.timeout, write_half.write_all(&payload))
                .await
                .context("timed out writing json-rpc request")?
                .context("failed writing json-rpc request to daemon socket")?;
            timeout(self.timeout, write_half.flush())
                .await
                .context("timed out flushing json-rpc request")?
                .context("failed flushing json-rpc request to daemon socket")?;

            let mut reader = BufReader::new(read_half);
            let mut response_line = Vec::new();
            timeout(self.timeout, reader.read_until(b'\n', &mut response_line))
                .await
                .context("timed out waiting for json-rpc response")?
                .context("failed reading json-rpc response from daemon socket")?;

            if response_line.is_empty() {
                anyhow::bail!("daemon returned an empty json-rpc response");
            }

            let response: Response = serde_json::from_slice(&response_line)
                .context("failed to decode daemon json-rpc response")?;

            if let Some(error) = response.error {
                let data = error.data.unwrap_or_default();
                let code = match data.get("code").and_then(|value| value.as_str()) {
                    Some(code) => code.to_string(),
                    None if error.code == INVALID_PARAMS => "INVALID_PARAMS".to_string(),
                    None => format!("JSONRPC_{}", error.code),
                };
                let message = match data.get("reason").and_then(|value| value.as_str()) {
                    Some(reason) => format!("{}: {reason}", error.message),
                    None => error.message,
                };
                let action = data
                    .get("action")
                    .and_then(|value| value.as_str())
                    .map(str::to_string);
                return Err(anyhow!(RpcError {
                    code,
                    message,
                    action,
                }));
            }

            let result = response
                .result
                .context("daemon json-rpc response missing `result` field")?;
            return serde_json::from_value(result)
                .with_context(|| format!("failed to decode `{method}` result"));
        }

        #[cfg(not(unix))]
        {
            let _ = (id, method, params);
            anyhow::bail!("the daemon transport requires unix domain sockets")
        }
    }
}

fn is_daemon_answer(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| cause.downcast_ref::<RpcError>().is_some())
}

fn default_socket_path() -> PathBuf {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(SOCKET_RELATIVE_PATH)
}

fn is_daemon_unavailable_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
    )
}
