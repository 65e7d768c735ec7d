//! Relay of externally produced conflict records.
//!
//! Conflict records are written by an analysis process outside this crate and
//! are only ever read here.

use serde::Deserialize;
use vybe_core::{now_rfc3339, RoleResolution};
use vybe_store::{get_json, ContextPaths, KvStore};

/// Accepted shapes of a conflict record document. An object must carry a
/// `warnings` list; any other object is rejected as malformed.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConflictRecord {
    Warnings(Vec<String>),
    Tagged {
        #[serde(default)]
        role: Option<String>,
        warnings: Vec<String>,
    },
}

impl ConflictRecord {
    pub fn warnings(&self) -> &[String] {
        match self {
            Self::Warnings(w) => w,
            Self::Tagged { warnings, .. } => warnings,
        }
    }

    pub fn role(&self) -> Option<&str> {
        match self {
            Self::Warnings(_) => None,
            Self::Tagged { role, .. } => role.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConflictReport {
    pub role: Option<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

impl ConflictReport {
    pub fn has_conflicts(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Multi-line warning for stderr, or `None` when there is nothing to report.
    pub fn render(&self) -> Option<String> {
        if !self.has_conflicts() {
            return None;
        }
        let mut lines = vec![format!(
            "vybe: possible conflicts for {}:",
            self.role.as_deref().unwrap_or("this member")
        )];
        lines.extend(self.warnings.iter().map(|w| format!("  - {w}")));
        lines.push("  coordinate with:".to_string());
        lines.extend(self.suggestions.iter().map(|s| format!("    {s}")));
        Some(lines.join("\n"))
    }
}

fn coordination_commands(role: &str) -> Vec<String> {
    vec![
        "/vybe:status members".to_string(),
        format!("/vybe:discuss \"{role}: resolve overlapping work before continuing\""),
        "git fetch && git log --oneline HEAD..@{u}".to_string(),
    ]
}

pub struct ConflictDetector<'a, S: KvStore + ?Sized> {
    records: &'a S,
    paths: &'a ContextPaths,
}

impl<'a, S: KvStore + ?Sized> ConflictDetector<'a, S> {
    pub fn new(records: &'a S, paths: &'a ContextPaths) -> Self {
        Self { records, paths }
    }

    /// Read the session's conflict record (only for an assigned role) and
    /// append an audit line to the role's log in every case.
    pub fn detect(
        &self,
        resolution: &RoleResolution,
        session_id: &str,
        tool_name: &str,
    ) -> anyhow::Result<ConflictReport> {
        let role_label = resolution
            .role_label()
            .unwrap_or_else(|| "unassigned".to_string());

        let mut report = ConflictReport {
            role: Some(role_label.clone()),
            ..ConflictReport::default()
        };
        let mut read_error = None;
        if resolution.assigned_role().is_some() {
            match get_json::<ConflictRecord, _>(self.records, session_id) {
                Ok(Some(record)) if record.role().is_some_and(|owner| owner != role_label) => {
                    tracing::warn!(
                        owner = record.role(),
                        role = %role_label,
                        session_id,
                        "ignoring conflict record tagged for another role"
                    );
                }
                Ok(Some(record)) => {
                    report.warnings = record
                        .warnings()
                        .iter()
                        .filter(|w| !w.trim().is_empty())
                        .cloned()
                        .collect();
                }
                Ok(None) => {}
                Err(e) => read_error = Some(e),
            }
        }
        if report.has_conflicts() {
            report.suggestions = coordination_commands(&role_label);
        }

        let audit = format!(
            "{} session={} tool={} status={} conflicts={}",
            now_rfc3339(),
            session_id,
            tool_name,
            resolution.status(),
            report.warnings.len()
        );
        vybe_store::append_line(&self.paths.member_log(&role_label), &audit)?;

        match read_error {
            Some(e) => Err(e.context(format!("reading conflict record for {session_id}"))),
            None => Ok(report),
        }
    }
}
