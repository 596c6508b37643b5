//! Pre-flight environment check for `RUN` (spec §4.5): "if the main
//! command is `go` or `python(3)`, invoke `<cmd> <version-flag>` with a
//! 10 s timeout; failure short-circuits the run."
//!
//! The spawn/poll/timeout/kill loop mirrors the synchronous guard-script
//! runner's pattern of polling `try_wait()` against a deadline rather
//! than blocking on `wait()`.

use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const ENV_CHECK_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Returns the version-flag invocation to run for `main_command`, or
/// `None` if this command doesn't need an environment check.
fn version_probe(main_command: &str) -> Option<(&'static str, &'static str)> {
    match main_command {
        "go" => Some(("go", "version")),
        "python" | "python3" => Some((main_command_to_static(main_command), "--version")),
        _ => None,
    }
}

fn main_command_to_static(s: &str) -> &'static str {
    match s {
        "python" => "python",
        "python3" => "python3",
        _ => unreachable!(),
    }
}

/// Runs the version probe for the compound command's leading token, if
/// any. `Ok(true)` means the check passed or didn't apply; `Ok(false)`
/// means the probe ran and failed (non-zero exit, spawn error, or
/// timeout) and the caller should short-circuit the `RUN`.
pub fn check_environment(main_command: &str) -> bool {
    let Some((cmd, flag)) = version_probe(main_command) else {
        return true;
    };
    let ok = run_with_timeout(cmd, flag, ENV_CHECK_TIMEOUT);
    if !ok {
        tracing::warn!(command = %cmd, "environment check failed, short-circuiting RUN");
    }
    ok
}

fn run_with_timeout(cmd: &str, flag: &str, timeout: Duration) -> bool {
    let mut child = match Command::new(cmd)
        .arg(flag)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(_) => return false,
    };

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status.success(),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return false;
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(_) => return false,
        }
    }
}

/// Extracts the leading token of a command string, the same way the
/// compound-command parser identifies "the main command".
pub fn leading_token(command: &str) -> &str {
    command.trim().split_whitespace().next().unwrap_or("")
}
