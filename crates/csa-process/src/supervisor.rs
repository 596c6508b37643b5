//! Background process table backing the INDEF/CHECK/RESTART actions
//! (spec §4.2). Entries are keyed by a *derived* key, not the literal
//! command text: for `npm run` commands the key is the script name,
//! otherwise the last whitespace-separated token of the run-part (after
//! `cd X &&` splitting). This lets `CHECK`/`RESTART` address an entry with
//! an abbreviated or flag-extended form of the command that started it.

use crate::{build_command, compound::split_compound_command, kill_child_process_group};
use csa_core::AppError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

/// Max buffered output lines per background process before the oldest
/// lines are dropped (FIFO).
const OUTPUT_QUEUE_CAPACITY: usize = 2000;
/// Grace period between SIGTERM and SIGKILL on restart/shutdown.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);
/// Delay after terminating an entry before relaunching it, so the OS has
/// time to release any port the old process held (spec §4.2 "INDEF").
const PORT_RELEASE_DELAY: Duration = Duration::from_secs(2);

type OutputQueue = Arc<Mutex<VecDeque<String>>>;

struct Entry {
    child: tokio::process::Child,
    output: OutputQueue,
    started_at: Instant,
    /// The literal command text `start` was first called with, kept so
    /// `restart` can relaunch it even if the `RESTART` argument that
    /// located this entry was an abbreviated form.
    command: String,
}

/// Derives the table key for `command` (spec §4.2 "Status check (CHECK)"):
/// for commands beginning with `npm run`, the script name; otherwise the
/// last token of the run-part once any leading `cd X &&` is stripped.
fn derive_key(command: &str) -> String {
    let split = split_compound_command(command);
    let run_part = split.command.trim();
    if let Some(script) = run_part.strip_prefix("npm run ") {
        return script.split_whitespace().next().unwrap_or(script).to_string();
    }
    run_part.split_whitespace().last().unwrap_or(run_part).to_string()
}

/// A snapshot returned by [`Supervisor::check`].
pub struct CheckReport {
    pub running: bool,
    pub exit_code: Option<i32>,
    pub recent_output: Vec<String>,
    pub uptime: Duration,
}

/// Owns every background process started via INDEF for the lifetime of a
/// session. Safe to share across the control loop via `Arc`.
#[derive(Default)]
pub struct Supervisor {
    entries: Mutex<HashMap<String, Entry>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `command` in the background, keyed by its derived key (see
    /// module docs). If an entry for that key already exists, spec §4.2
    /// "INDEF" requires terminating it (root PID + every captured
    /// descendant PID) and sleeping 2s for port release before relaunching.
    pub async fn start(&self, command: &str) -> anyhow::Result<()> {
        let key = derive_key(command);
        if self.entries.lock().unwrap().contains_key(&key) {
            self.terminate_one(&key).await?;
            tokio::time::sleep(PORT_RELEASE_DELAY).await;
        }
        self.launch(key, command).await
    }

    async fn launch(&self, key: String, command: &str) -> anyhow::Result<()> {
        let split = split_compound_command(command);
        let cmd = build_command(&[split.command.clone()], split.cwd.as_deref());
        let mut child = crate::spawn_tool(cmd, None).await?;

        let output: OutputQueue = Arc::new(Mutex::new(VecDeque::with_capacity(64)));
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, Arc::clone(&output));
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, Arc::clone(&output));
        }

        self.entries.lock().unwrap().insert(
            key,
            Entry { child, output, started_at: Instant::now(), command: command.to_string() },
        );
        Ok(())
    }

    /// Reports liveness, exit status (if it already exited), and the
    /// tail of captured output for a previously started command, located
    /// by the derived key (spec §4.2 "Status check (CHECK)").
    pub async fn check(&self, command: &str) -> Result<CheckReport, AppError> {
        let key = derive_key(command);
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .get_mut(&key)
            .ok_or_else(|| AppError::NoSuchProcess(command.to_string()))?;

        let exit_code = match entry.child.try_wait() {
            Ok(Some(status)) => Some(status.code().unwrap_or(1)),
            Ok(None) => None,
            Err(_) => None,
        };

        let recent_output: Vec<String> = entry.output.lock().unwrap().iter().cloned().collect();
        Ok(CheckReport {
            running: exit_code.is_none(),
            exit_code,
            recent_output,
            uptime: entry.started_at.elapsed(),
        })
    }

    /// Terminates the entry located by `command`'s derived key (SIGTERM,
    /// then SIGKILL after a grace period if it hasn't exited), waits the
    /// same port-release delay `start` uses, then relaunches the entry's
    /// original command text under the same key.
    pub async fn restart(&self, command: &str) -> Result<(), AppError> {
        let key = derive_key(command);
        let raw_command = self
            .entries
            .lock()
            .unwrap()
            .get(&key)
            .map(|e| e.command.clone())
            .ok_or_else(|| AppError::NoSuchProcess(command.to_string()))?;

        self.terminate_one(&key).await?;
        tokio::time::sleep(PORT_RELEASE_DELAY).await;
        self.launch(key, &raw_command)
            .await
            .map_err(|e| AppError::CommandFailed(e.to_string()))
    }

    async fn terminate_one(&self, key: &str) -> Result<(), AppError> {
        let mut child = {
            let mut entries = self.entries.lock().unwrap();
            match entries.remove(key) {
                Some(entry) => entry.child,
                None => return Ok(()),
            }
        };

        let descendants = child.id().map(crate::process_tree::descendant_pids).unwrap_or_default();

        if let Some(pid) = child.id() {
            // SAFETY: kill() is async-signal-safe; negative PID targets the group.
            unsafe {
                libc::kill(-(pid as i32), libc::SIGTERM);
            }
        }
        match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                warn!(key, "process did not exit after SIGTERM, sending SIGKILL");
                kill_child_process_group(&mut child);
                let _ = child.wait().await;
            }
        }

        // Backstop for grandchildren that escaped the process group (e.g. a
        // tool that calls setsid() itself) and so weren't reached above.
        for pid in descendants {
            // SAFETY: kill() is async-signal-safe.
            unsafe {
                libc::kill(pid as i32, libc::SIGKILL);
            }
        }
        Ok(())
    }

    /// Kills every tracked background process. Called on control-loop exit
    /// (spec §5 "Exit cleanup") so nothing outlives the session.
    pub async fn kill_all(&self) {
        let keys: Vec<String> = self.entries.lock().unwrap().keys().cloned().collect();
        for key in keys {
            if let Err(e) = self.terminate_one(&key).await {
                warn!(key, error = %e, "failed to terminate background process during shutdown");
            }
        }
    }

    pub fn is_tracked(&self, command: &str) -> bool {
        self.entries.lock().unwrap().contains_key(&derive_key(command))
    }

    /// The original command text of every entry currently in the table,
    /// for the control loop to poll with [`Supervisor::check`] each
    /// iteration (spec §4.6 "poll supervisor: drop terminated entries,
    /// collect status + tail").
    pub fn tracked_commands(&self) -> Vec<String> {
        self.entries.lock().unwrap().values().map(|e| e.command.clone()).collect()
    }
}

fn spawn_reader<R>(reader: R, output: OutputQueue)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let mut queue = output.lock().unwrap();
                    if queue.len() >= OUTPUT_QUEUE_CAPACITY {
                        queue.pop_front();
                    }
                    queue.push_back(line);
                }
                Ok(None) | Err(_) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_and_check_running_process() {
        let sup = Supervisor::new();
        sup.start("sleep 2").await.unwrap();
        let report = sup.check("sleep 2").await.unwrap();
        assert!(report.running);
        sup.kill_all().await;
    }

    #[tokio::test]
    async fn test_check_unknown_command_errors() {
        let sup = Supervisor::new();
        let err = sup.check("nonexistent").await.unwrap_err();
        matches!(err, AppError::NoSuchProcess(_));
    }

    #[tokio::test]
    async fn test_check_captures_output() {
        let sup = Supervisor::new();
        sup.start("echo background-output").await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let report = sup.check("echo background-output").await.unwrap();
        assert!(report.recent_output.iter().any(|l| l.contains("background-output")));
    }

    #[tokio::test]
    async fn test_restart_replaces_process() {
        let sup = Supervisor::new();
        sup.start("sleep 5").await.unwrap();
        sup.restart("sleep 5").await.unwrap();
        assert!(sup.is_tracked("sleep 5"));
        sup.kill_all().await;
    }

    #[tokio::test]
    async fn test_kill_all_clears_table() {
        let sup = Supervisor::new();
        sup.start("sleep 5").await.unwrap();
        sup.kill_all().await;
        assert!(!sup.is_tracked("sleep 5"));
    }

    #[tokio::test]
    async fn test_tracked_commands_lists_started_entries() {
        let sup = Supervisor::new();
        sup.start("sleep 5").await.unwrap();
        assert_eq!(sup.tracked_commands(), vec!["sleep 5".to_string()]);
        sup.kill_all().await;
        assert!(sup.tracked_commands().is_empty());
    }

    #[test]
    fn test_derive_key_npm_run_takes_script_name() {
        assert_eq!(derive_key("npm run dev -- --host 0.0.0.0"), "dev");
    }

    #[test]
    fn test_derive_key_falls_back_to_last_token() {
        assert_eq!(derive_key("go run cmd/api/main.go"), "main.go");
    }

    #[test]
    fn test_derive_key_strips_leading_cd() {
        assert_eq!(derive_key("cd server && npm run dev"), "dev");
    }

    #[tokio::test]
    async fn test_check_finds_entry_by_npm_run_script_name_with_extra_args() {
        let sup = Supervisor::new();
        sup.start("npm run devserver").await.unwrap();
        let report = sup.check("npm run devserver -- --host 0.0.0.0").await.unwrap();
        assert!(report.uptime.as_secs() < 5);
        sup.kill_all().await;
    }

    #[tokio::test]
    async fn test_check_finds_entry_by_last_token_despite_cd_prefix() {
        let sup = Supervisor::new();
        sup.start("go run cmd/api/main.go").await.unwrap();
        let report = sup.check("cd . && go run cmd/api/main.go").await.unwrap();
        assert!(report.uptime.as_secs() < 5);
        sup.kill_all().await;
    }

    #[tokio::test]
    async fn test_restart_with_abbreviated_argument_relaunches_original_command() {
        let sup = Supervisor::new();
        sup.start("npm run devserver -- --port 4000").await.unwrap();
        sup.restart("npm run devserver").await.unwrap();
        assert!(sup.is_tracked("npm run devserver -- --port 4000"));
        sup.kill_all().await;
    }
}
