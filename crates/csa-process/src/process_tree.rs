//! Enumerates descendant PIDs via `/proc`, used by the control loop's
//! exit-cleanup guard to make sure nothing spawned by a background action
//! outlives the session (spec §5 "Exit cleanup").
//!
//! Linux-only: returns an empty result on other platforms or on any error,
//! since the supervisor's own process-group tracking is the primary kill
//! path and this is a best-effort backstop.

const MAX_SCAN_DEPTH: usize = 8;

/// Returns every PID descended from `root_pid`, scanning `/proc` for
/// processes whose stat `ppid` field chains back to it.
///
/// Depth is bounded to avoid pathological recursion on a `/proc` snapshot
/// that changes mid-scan (a PID reparented during the walk).
pub fn descendant_pids(root_pid: u32) -> Vec<u32> {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return Vec::new();
    };

    let mut parent_of = std::collections::HashMap::new();
    for entry in entries.flatten() {
        let Ok(pid) = entry.file_name().to_string_lossy().parse::<u32>() else {
            continue;
        };
        if let Some(ppid) = read_ppid(pid) {
            parent_of.insert(pid, ppid);
        }
    }

    let mut descendants = Vec::new();
    for (&pid, _) in parent_of.iter() {
        if is_descendant_of(pid, root_pid, &parent_of, MAX_SCAN_DEPTH) {
            descendants.push(pid);
        }
    }
    descendants
}

fn is_descendant_of(
    pid: u32,
    root_pid: u32,
    parent_of: &std::collections::HashMap<u32, u32>,
    max_depth: usize,
) -> bool {
    let mut current = pid;
    for _ in 0..max_depth {
        let Some(&ppid) = parent_of.get(&current) else {
            return false;
        };
        if ppid == root_pid {
            return true;
        }
        if ppid <= 1 {
            return false;
        }
        current = ppid;
    }
    false
}

fn read_ppid(pid: u32) -> Option<u32> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    let idx = stat.rfind(')')?;
    let after_comm = stat.get(idx + 2..)?;
    after_comm.split_whitespace().nth(1)?.parse().ok()
}
