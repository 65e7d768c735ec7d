//! Checkpoint written right before the assistant compacts its context.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use vybe_core::{now_rfc3339, RoleResolution, RoleStatus, TaskState};
use vybe_store::{file_key, write_atomic, FileStore};

use crate::config::HookConfig;
use crate::deps::load_graph;
use crate::parse::{get_str, parse_hook_stdin};

/// Feature specs live under `.vybe/specs/<feature>/tasks.md`.
const SPECS_DIR: &str = ".vybe/specs";

// ── Input ──

#[derive(Debug, Clone)]
pub struct PrecompactInput {
    pub session_id: String,
    pub transcript_path: Option<PathBuf>,
    /// `auto` or `manual`.
    pub trigger: String,
}

impl PrecompactInput {
    pub fn from_stdin(stdin: &str) -> Self {
        let raw = parse_hook_stdin(stdin);
        let session_id = Some(get_str(&raw, "session_id"))
            .filter(|s| !s.is_empty())
            .or_else(|| std::env::var("CLAUDE_SESSION_ID").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(crate::parse::time_derived_session_id);
        let transcript_path = Some(get_str(&raw, "transcript_path"))
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let trigger = Some(get_str(&raw, "trigger"))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "auto".to_string());
        Self {
            session_id,
            transcript_path,
            trigger,
        }
    }
}

// ── Checkpoint ──

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub has_changes: bool,
    #[serde(default)]
    pub modified_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub session_id: String,
    pub timestamp: String,
    pub trigger: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<String>,
    /// `None` outside a git work tree or when git is unavailable.
    #[serde(default)]
    pub git_state: Option<GitState>,
    /// Graph nodes currently `in_progress`.
    #[serde(default)]
    pub active_tasks: Vec<String>,
    /// Feature specs whose task list mentions `in_progress`.
    #[serde(default)]
    pub active_specs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_role: Option<String>,
    pub member_status: RoleStatus,
}

/// Files produced for one checkpoint.
#[derive(Debug, Clone)]
pub struct CheckpointFiles {
    pub checkpoint: PathBuf,
    pub instructions: PathBuf,
    pub diff: Option<PathBuf>,
    pub transcript: Option<PathBuf>,
}

/// Collect state, write the checkpoint artifacts, and return the
/// continuation instructions.
pub fn save_checkpoint(
    config: &HookConfig,
    input: &PrecompactInput,
    role: &RoleResolution,
) -> anyhow::Result<(Checkpoint, CheckpointFiles, String)> {
    let paths = config.paths();
    let dir = paths.precompact_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating {}", dir.display()))?;
    let key = file_key(&input.session_id);

    let git_state = detect_git_state(&config.project_root);
    let mut diff = None;
    if git_state.is_some() {
        if let Some(patch) = git(&config.project_root, &["diff"]) {
            let path = dir.join(format!("diff-{key}.patch"));
            write_atomic(&path, patch.as_bytes())?;
            diff = Some(path);
        }
    }

    let active_tasks = match load_graph(&FileStore::new(&paths.root)) {
        Ok(Some(graph)) => graph
            .tasks
            .iter()
            .filter(|t| t.state == TaskState::InProgress)
            .map(|t| t.id.clone())
            .collect(),
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, "dependency graph unreadable; checkpoint has no tasks");
            Vec::new()
        }
    };

    let mut transcript = None;
    if let Some(src) = input.transcript_path.as_deref().filter(|p| p.is_file()) {
        let dest = dir.join(format!("transcript-{key}.txt"));
        std::fs::copy(src, &dest)
            .with_context(|| format!("copying transcript {}", src.display()))?;
        transcript = Some(dest);
    }

    let checkpoint = Checkpoint {
        session_id: input.session_id.clone(),
        timestamp: now_rfc3339(),
        trigger: input.trigger.clone(),
        transcript_path: input
            .transcript_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned()),
        git_state,
        active_tasks,
        active_specs: active_specs(&config.project_root.join(SPECS_DIR)),
        member_role: role.role_label(),
        member_status: role.status(),
    };

    let checkpoint_path = dir.join(format!("checkpoint-{key}.json"));
    write_atomic(
        &checkpoint_path,
        serde_json::to_string_pretty(&checkpoint)?.as_bytes(),
    )?;

    let instructions = render_instructions(&checkpoint, &key);
    let instructions_path = dir.join(format!("instructions-{key}.md"));
    write_atomic(&instructions_path, instructions.as_bytes())?;

    tracing::info!(session_id = %checkpoint.session_id, path = %checkpoint_path.display(), "precompact checkpoint saved");
    Ok((
        checkpoint,
        CheckpointFiles {
            checkpoint: checkpoint_path,
            instructions: instructions_path,
            diff,
            transcript,
        },
        instructions,
    ))
}

/// Markdown shown to the assistant after compaction.
pub fn render_instructions(checkpoint: &Checkpoint, key: &str) -> String {
    let mut out = vec![
        "# Context Restored After Compaction".to_string(),
        String::new(),
        format!(
            "Session {} was saved before compaction ({}).",
            checkpoint.session_id, checkpoint.trigger
        ),
        String::new(),
    ];

    if let Some(role) = &checkpoint.member_role {
        if checkpoint.member_status == RoleStatus::Assigned {
            out.push("## Member".to_string());
            out.push(format!("You are working as **{role}**. Keep VYBE_MEMBER={role} set."));
            out.push(String::new());
        }
    }

    if !checkpoint.active_tasks.is_empty() {
        out.push("## In-Progress Tasks".to_string());
        out.extend(checkpoint.active_tasks.iter().map(|t| format!("- {t}")));
        out.push(String::new());
        out.push("Inspect the graph with `vybe deps show`.".to_string());
        out.push(String::new());
    }

    if !checkpoint.active_specs.is_empty() {
        out.push("## Active Features".to_string());
        out.extend(checkpoint.active_specs.iter().map(|s| format!("- {s}")));
        out.push(String::new());
    }

    if let Some(git) = &checkpoint.git_state {
        if git.has_changes {
            out.push("## Git Status".to_string());
            out.push(format!(
                "{} uncommitted file(s) on {}. Run `git status` to review.",
                git.modified_files.len(),
                git.branch.as_deref().unwrap_or("a detached HEAD")
            ));
            out.push(String::new());
        }
    }

    out.push("## Context Recovery".to_string());
    out.push("Saved under `.vybe/context/precompact/`:".to_string());
    out.push(format!("- Checkpoint: `checkpoint-{key}.json`"));
    if checkpoint.git_state.is_some() {
        out.push(format!("- Git diff: `diff-{key}.patch`"));
    }
    if checkpoint.transcript_path.is_some() {
        out.push(format!("- Transcript: `transcript-{key}.txt`"));
    }
    out.join("\n") + "\n"
}

// ── Collectors ──

fn git(root: &Path, args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .current_dir(root)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
}

fn non_empty_trimmed(s: String) -> Option<String> {
    let s = s.trim().to_string();
    (!s.is_empty()).then_some(s)
}

/// Branch, commit and dirty files, or `None` outside a work tree.
pub fn detect_git_state(root: &Path) -> Option<GitState> {
    let inside = git(root, &["rev-parse", "--is-inside-work-tree"])?;
    if inside.trim() != "true" {
        return None;
    }
    let modified_files: Vec<String> = git(root, &["status", "--porcelain"])
        .unwrap_or_default()
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(String::from)
        .collect();
    Some(GitState {
        branch: git(root, &["rev-parse", "--abbrev-ref", "HEAD"]).and_then(non_empty_trimmed),
        commit: git(root, &["rev-parse", "HEAD"]).and_then(non_empty_trimmed),
        has_changes: !modified_files.is_empty(),
        modified_files,
    })
}

/// Names of spec directories whose `tasks.md` mentions `in_progress`, sorted.
fn active_specs(specs_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(specs_dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter(|e| {
            std::fs::read_to_string(e.path().join("tasks.md"))
                .is_ok_and(|content| content.contains("in_progress"))
        })
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
