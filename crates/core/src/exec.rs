//! Restricted subprocess execution.
//!
//! Provides [`run_tool`], the single code path through which the panel runs
//! external commands. Commands are always spawned from a resolved absolute
//! path with an argument list (never a shell string), a restricted
//! environment, piped output capture, and a timeout.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::env::restricted_env;

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Output exceeding this limit is truncated to prevent memory exhaustion
/// from runaway commands.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Default command timeout when the caller does not override it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Exit code reported when the command was killed on timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Captured result of a finished (or timed out) command.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl ExecResult {
    /// Whether the command exited successfully.
    pub fn ok(&self) -> bool {
        !self.timed_out && self.code == 0
    }

    /// Summary suitable for structured log details.
    pub fn to_details(&self) -> serde_json::Value {
        serde_json::json!({
            "exit_code": self.code,
            "stdout": self.stdout.trim(),
            "stderr": self.stderr.trim(),
            "timed_out": self.timed_out,
        })
    }
}

/// Run `program` with `args` under the restricted environment.
///
/// The program should be an absolute path produced by the tool resolver.
/// stdin is closed; stdout/stderr are captured. On timeout the child is
/// killed (`kill_on_drop`) and the result carries [`TIMEOUT_EXIT_CODE`]
/// with `timed_out` set, mirroring the conventional shell timeout code.
///
/// Returns `Err` only for spawn-level I/O failures (missing binary,
/// permission denied). A non-zero exit is a successful `Ok` with the code
/// recorded, so callers can attach full output to their own diagnostics.
pub async fn run_tool(
    program: &str,
    args: &[String],
    timeout: Option<Duration>,
) -> Result<ExecResult, std::io::Error> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .env_clear()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    for (key, value) in restricted_env() {
        cmd.env(key, value);
    }

    let start = Instant::now();
    let mut child = cmd.spawn()?;

    // Read stdout/stderr in spawned tasks so `child.wait()` can proceed.
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    let limit = timeout.unwrap_or(DEFAULT_TIMEOUT);
    let wait_result = tokio::time::timeout(limit, child.wait()).await;

    match wait_result {
        Ok(Ok(status)) => {
            let stdout_bytes = stdout_task.await.unwrap_or_default();
            let stderr_bytes = stderr_task.await.unwrap_or_default();
            Ok(ExecResult {
                code: status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                timed_out: false,
                duration_ms: start.elapsed().as_millis() as u64,
            })
        }
        Ok(Err(e)) => Err(e),
        Err(_elapsed) => {
            // Timeout expired. Dropping `child` kills the process because
            // `kill_on_drop(true)` is set.
            drop(child);
            Ok(ExecResult {
                code: TIMEOUT_EXIT_CODE,
                stdout: String::new(),
                stderr: String::new(),
                timed_out: true,
                duration_ms: start.elapsed().as_millis() as u64,
            })
        }
    }
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let result = run_tool("/bin/echo", &["hello".to_string()], None)
            .await
            .unwrap();
        assert_eq!(result.code, 0);
        assert!(result.ok());
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_ok_with_code() {
        let result = run_tool(
            "/bin/sh",
            &["-c".to_string(), "exit 3".to_string()],
            None,
        )
        .await
        .unwrap();
        assert_eq!(result.code, 3);
        assert!(!result.ok());
    }

    #[tokio::test]
    async fn timeout_kills_and_reports_124() {
        let result = run_tool(
            "/bin/sleep",
            &["5".to_string()],
            Some(Duration::from_millis(100)),
        )
        .await
        .unwrap();
        assert!(result.timed_out);
        assert_eq!(result.code, TIMEOUT_EXIT_CODE);
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let result = run_tool("/nonexistent/binary", &[], None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn child_env_is_restricted() {
        std::env::set_var("EXEC_TEST_SHOULD_NOT_LEAK", "1");
        let result = run_tool(
            "/bin/sh",
            &["-c".to_string(), "echo ${EXEC_TEST_SHOULD_NOT_LEAK:-absent}".to_string()],
            None,
        )
        .await
        .unwrap();
        std::env::remove_var("EXEC_TEST_SHOULD_NOT_LEAK");
        assert_eq!(result.stdout.trim(), "absent");
    }
}
