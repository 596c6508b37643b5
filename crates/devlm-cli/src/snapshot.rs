//! Project structure snapshot (spec §3 "Project workspace"): a simplified
//! directory tree, skipping dotfiles, `node_modules`, and common build
//! output, cached to `project_structure.json` and only regenerated when
//! missing or stale (`SPEC_FULL.md` §3 supplement, grounded in
//! `original_source/bootstrap.py`'s `get_project_structure`).

use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Directory and build-output names never descended into.
const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    ".git",
    ".devlm",
    "__pycache__",
    ".venv",
    "venv",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirNode {
    pub files: Vec<String>,
    pub directories: BTreeMap<String, DirNode>,
}

impl DirNode {
    fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty()
    }
}

/// Builds a `DirNode` tree rooted at `path`, skipping dotfiles and
/// [`SKIP_DIRS`]. Missing or unreadable subdirectories are treated as empty
/// rather than failing the whole scan.
pub fn scan(path: &Path) -> DirNode {
    let mut node = DirNode::default();
    let Ok(entries) = std::fs::read_dir(path) else {
        return node;
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if SKIP_DIRS.contains(&name.as_str()) {
                continue;
            }
            node.directories.insert(name, scan(&entry.path()));
        } else if file_type.is_file() {
            node.files.push(name);
        }
    }
    node.files.sort();
    node
}

/// Returns `true` when `cache_path` is missing or older than the newest
/// modification time anywhere under `project_path`.
pub fn is_stale(project_path: &Path, cache_path: &Path) -> bool {
    let cache_mtime = match std::fs::metadata(cache_path).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return true,
    };
    newest_mtime(project_path) > cache_mtime
}

fn newest_mtime(path: &Path) -> SystemTime {
    let mut newest = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let Ok(entries) = std::fs::read_dir(path) else {
        return newest;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if SKIP_DIRS.contains(&name.as_str()) {
                continue;
            }
            let child = newest_mtime(&entry.path());
            if child > newest {
                newest = child;
            }
        } else if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            if modified > newest {
                newest = modified;
            }
        }
    }
    newest
}

/// Loads the cached snapshot if present and fresh, otherwise rescans
/// `project_path` and rewrites `cache_path`.
pub fn load_or_regenerate(project_path: &Path, cache_path: &Path) -> Result<DirNode> {
    if cache_path.exists() && !is_stale(project_path, cache_path) {
        let raw = std::fs::read_to_string(cache_path)
            .with_context(|| format!("reading {}", cache_path.display()))?;
        if let Ok(node) = serde_json::from_str(&raw) {
            return Ok(node);
        }
    }

    let node = scan(project_path);
    let raw = serde_json::to_string_pretty(&node)?;
    std::fs::write(cache_path, raw)
        .with_context(|| format!("writing {}", cache_path.display()))?;
    Ok(node)
}

/// Renders the tree as an indented whitelist listing for the prompt
/// assembler's "whitelisted directory tree" field (spec §4.7).
pub fn render_tree(node: &DirNode) -> String {
    let mut out = String::new();
    render_into(node, 0, &mut out);
    out
}

fn render_into(node: &DirNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for (name, child) in &node.directories {
        out.push_str(&format!("{indent}{name}/\n"));
        render_into(child, depth + 1, out);
    }
    for file in &node.files {
        out.push_str(&format!("{indent}{file}\n"));
    }
}
