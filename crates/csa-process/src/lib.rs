//! Process supervision for the control loop's RUN/INDEF/CHECK/RESTART/RAW
//! actions (spec §4.2): spawning, wall-clock timeout enforcement, output
//! capture, compound-command splitting, and the background process table.

pub mod compound;
pub mod process_tree;
pub mod supervisor;

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::warn;

pub use supervisor::Supervisor;

/// Controls whether stdout is forwarded to stderr in real-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamMode {
    /// Only buffer stdout; do not forward.
    BufferOnly,
    /// Buffer stdout AND forward each line to stderr with `[stdout] ` prefix (default).
    #[default]
    TeeToStderr,
}

/// Result of executing a foreground command to completion.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub output: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr_output: String,
    /// Last non-empty line, or truncated output (max 200 chars).
    pub summary: String,
    /// Exit code (-1 on timeout kill, spec §8; 1 if signal-killed with no other code).
    pub exit_code: i32,
}

/// Default foreground RUN timeout (spec §4.2 "RUN").
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_STDIN_WRITE_TIMEOUT_SECS: u64 = 30;
const DEADLINE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Spawn a command detached into its own process group, without waiting.
///
/// Stdout/stderr are piped; stdin is piped only when `stdin_data` is
/// supplied. `kill_on_drop` is set so an early-dropped handle does not
/// leak an orphan.
pub async fn spawn_tool(
    mut cmd: Command,
    stdin_data: Option<Vec<u8>>,
) -> Result<tokio::process::Child> {
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.stdin(if stdin_data.is_some() {
        std::process::Stdio::piped()
    } else {
        std::process::Stdio::null()
    });
    cmd.kill_on_drop(true);

    // SAFETY: setsid() is async-signal-safe and runs before exec.
    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let mut child = cmd.spawn().context("failed to spawn command")?;

    if let Some(data) = stdin_data {
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                let write_timeout = Duration::from_secs(DEFAULT_STDIN_WRITE_TIMEOUT_SECS);
                match tokio::time::timeout(write_timeout, async {
                    stdin.write_all(&data).await?;
                    stdin.shutdown().await?;
                    Ok::<_, std::io::Error>(())
                })
                .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("stdin write error: {e}"),
                    Err(_) => warn!("stdin write timed out after {}s", write_timeout.as_secs()),
                }
            });
        }
    }

    Ok(child)
}

/// Wait for a spawned child, enforcing an absolute wall-clock `timeout`
/// from launch (spec §4.2 "Enforces a timeout ... via an alarm signal that
/// kills the process on expiry") and capturing combined output. Unlike an
/// idle timeout, output on the command's stdout/stderr never resets the
/// deadline — a command that logs every few seconds for longer than
/// `timeout` is still killed.
pub async fn wait_and_capture_with_timeout(
    mut child: tokio::process::Child,
    stream_mode: StreamMode,
    timeout: Duration,
) -> Result<ExecutionResult> {
    let stdout = child.stdout.take().context("failed to capture stdout")?;
    let stderr = child.stderr.take();

    const READ_BUF_SIZE: usize = 4096;
    let mut stdout_reader = BufReader::new(stdout);
    let mut output = String::new();
    let mut stdout_line_buf = String::new();
    let mut stderr_output = String::new();
    let started_at = Instant::now();
    let mut timed_out = false;
    let timeout_note = format!("timeout: process still running after {}s; killed", timeout.as_secs());

    let mut stderr_reader = stderr.map(BufReader::new);
    let mut stderr_line_buf = String::new();
    let mut stdout_buf = [0u8; READ_BUF_SIZE];
    let mut stderr_buf = [0u8; READ_BUF_SIZE];
    let mut stdout_done = false;
    let mut stderr_done = stderr_reader.is_none();

    while !stdout_done || !stderr_done {
        tokio::select! {
            result = stdout_reader.read(&mut stdout_buf), if !stdout_done => {
                match result {
                    Ok(0) => {
                        flush_line_buf(&mut stdout_line_buf, &mut output, stream_mode);
                        stdout_done = true;
                    }
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&stdout_buf[..n]);
                        accumulate_and_flush_lines(&chunk, &mut stdout_line_buf, &mut output, stream_mode);
                    }
                    Err(_) => {
                        flush_line_buf(&mut stdout_line_buf, &mut output, stream_mode);
                        stdout_done = true;
                    }
                }
            }
            result = async { stderr_reader.as_mut().unwrap().read(&mut stderr_buf).await }, if !stderr_done => {
                match result {
                    Ok(0) => {
                        flush_stderr_buf(&mut stderr_line_buf, &mut stderr_output);
                        stderr_done = true;
                    }
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&stderr_buf[..n]);
                        accumulate_and_flush_stderr(&chunk, &mut stderr_line_buf, &mut stderr_output);
                    }
                    Err(_) => {
                        flush_stderr_buf(&mut stderr_line_buf, &mut stderr_output);
                        stderr_done = true;
                    }
                }
            }
            _ = tokio::time::sleep(DEADLINE_POLL_INTERVAL) => {
                if started_at.elapsed() >= timeout {
                    timed_out = true;
                    warn!(timeout_secs = timeout.as_secs(), "killing child: exceeded timeout");
                    kill_child_process_group(&mut child);
                    break;
                }
            }
        }
    }

    let status = child.wait().await.context("failed to wait for command")?;
    let mut exit_code = status.code().unwrap_or_else(|| {
        warn!("process terminated by signal, using exit code 1");
        1
    });
    if timed_out {
        exit_code = -1;
        if !stderr_output.is_empty() && !stderr_output.ends_with('\n') {
            stderr_output.push('\n');
        }
        stderr_output.push_str(&timeout_note);
        stderr_output.push('\n');
    }

    let summary = if timed_out {
        timeout_note
    } else if exit_code == 0 {
        extract_summary(&output)
    } else {
        failure_summary(&output, &stderr_output, exit_code)
    };

    Ok(ExecutionResult {
        output,
        stderr_output,
        summary,
        exit_code,
    })
}

/// Run a command to completion with the default RUN timeout (spec §4.2).
pub async fn run_and_capture(cmd: Command, stdin_data: Option<Vec<u8>>) -> Result<ExecutionResult> {
    run_and_capture_with_timeout(cmd, stdin_data, Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS)).await
}

pub async fn run_and_capture_with_timeout(
    cmd: Command,
    stdin_data: Option<Vec<u8>>,
    timeout: Duration,
) -> Result<ExecutionResult> {
    let child = spawn_tool(cmd, stdin_data).await?;
    wait_and_capture_with_timeout(child, StreamMode::TeeToStderr, timeout).await
}

fn accumulate_and_flush_lines(chunk: &str, line_buf: &mut String, output: &mut String, stream_mode: StreamMode) {
    line_buf.push_str(chunk);
    while let Some(newline_pos) = line_buf.find('\n') {
        let line: String = line_buf.drain(..=newline_pos).collect();
        if stream_mode == StreamMode::TeeToStderr {
            eprint!("[stdout] {line}");
        }
        output.push_str(&line);
    }
}

fn flush_line_buf(line_buf: &mut String, output: &mut String, stream_mode: StreamMode) {
    if !line_buf.is_empty() {
        if stream_mode == StreamMode::TeeToStderr {
            eprint!("[stdout] {line_buf}");
        }
        output.push_str(line_buf);
        line_buf.clear();
    }
}

fn accumulate_and_flush_stderr(chunk: &str, line_buf: &mut String, stderr_output: &mut String) {
    line_buf.push_str(chunk);
    while let Some(newline_pos) = line_buf.find('\n') {
        let line: String = line_buf.drain(..=newline_pos).collect();
        eprint!("{line}");
        stderr_output.push_str(&line);
    }
}

fn flush_stderr_buf(line_buf: &mut String, stderr_output: &mut String) {
    if !line_buf.is_empty() {
        eprint!("{line_buf}");
        stderr_output.push_str(line_buf);
        line_buf.clear();
    }
}

/// Kill a child's entire process group via `SIGKILL`.
///
/// Falls back to killing just the child handle if the PID is unavailable
/// (already reaped).
pub(crate) fn kill_child_process_group(child: &mut tokio::process::Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: kill() is async-signal-safe; negative PID targets the group.
            unsafe {
                libc::kill(-(pid as i32), libc::SIGKILL);
            }
            return;
        }
    }
    let _ = child.start_kill();
}

fn extract_summary(output: &str) -> String {
    truncate_line(last_non_empty_line(output), 200)
}

fn failure_summary(stdout: &str, stderr: &str, exit_code: i32) -> String {
    let stdout_line = last_non_empty_line(stdout);
    if !stdout_line.is_empty() {
        return truncate_line(stdout_line, 200);
    }
    let stderr_line = last_non_empty_line(stderr);
    if !stderr_line.is_empty() {
        return truncate_line(stderr_line, 200);
    }
    format!("exit code {exit_code}")
}

fn last_non_empty_line(text: &str) -> &str {
    text.lines().rev().find(|line| !line.trim().is_empty()).unwrap_or("")
}

fn truncate_line(line: &str, max_chars: usize) -> String {
    if line.chars().nth(max_chars).is_none() {
        line.to_string()
    } else {
        let truncated: String = line.chars().take(max_chars - 3).collect();
        format!("{truncated}...")
    }
}

/// Build a `tokio::process::Command` for a resolved shell command, applying
/// an optional working-directory override (from a `cd X && Y` split).
pub fn build_command(program_and_args: &[String], cwd: Option<&Path>) -> Command {
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(program_and_args.join(" "));
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_line_short() {
        assert_eq!(truncate_line("hello", 200), "hello");
    }

    #[test]
    fn test_truncate_line_long() {
        let long = "a".repeat(250);
        let t = truncate_line(&long, 200);
        assert_eq!(t.len(), 200);
        assert!(t.ends_with("..."));
    }

    #[test]
    fn test_last_non_empty_line_skips_trailing_blank() {
        assert_eq!(last_non_empty_line("first\nsecond\n\n"), "second");
    }

    #[test]
    fn test_last_non_empty_line_empty_input() {
        assert_eq!(last_non_empty_line(""), "");
    }

    #[test]
    fn test_failure_summary_prefers_stdout() {
        let s = failure_summary("stdout line", "stderr line", 1);
        assert_eq!(s, "stdout line");
    }

    #[test]
    fn test_failure_summary_falls_back_to_stderr() {
        let s = failure_summary("", "stderr line", 1);
        assert_eq!(s, "stderr line");
    }

    #[test]
    fn test_failure_summary_falls_back_to_exit_code() {
        let s = failure_summary("", "", 42);
        assert_eq!(s, "exit code 42");
    }

    #[tokio::test]
    async fn test_run_and_capture_simple_echo() {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg("echo hello");
        let result = run_and_capture(cmd, None).await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("hello"));
    }

    #[tokio::test]
    async fn test_run_and_capture_nonzero_exit() {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg("exit 7");
        let result = run_and_capture(cmd, None).await.unwrap();
        assert_eq!(result.exit_code, 7);
    }

    #[tokio::test]
    async fn test_timeout_kills_hanging_process() {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg("sleep 5");
        let child = spawn_tool(cmd, None).await.unwrap();
        let result =
            wait_and_capture_with_timeout(child, StreamMode::BufferOnly, Duration::from_millis(100))
                .await
                .unwrap();
        assert_eq!(result.exit_code, -1);
        assert!(result.summary.contains("timeout"));
    }

    #[tokio::test]
    async fn test_timeout_kills_process_with_periodic_output() {
        // Keeps producing output well past the deadline; an idle-reset timeout
        // would never fire here, but the absolute deadline must still kill it.
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg("for i in 1 2 3 4 5 6 7 8 9 10; do echo tick; sleep 0.2; done");
        let child = spawn_tool(cmd, None).await.unwrap();
        let result =
            wait_and_capture_with_timeout(child, StreamMode::BufferOnly, Duration::from_millis(300))
                .await
                .unwrap();
        assert_eq!(result.exit_code, -1);
    }
}
