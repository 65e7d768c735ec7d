//! Readiness check of the hook layer itself.
//!
//! Every check returns `Result<(), CheckError>`; the overall verdict is the
//! maximum severity across checks. Hook scripts are only executed (smoke
//! tests) when nothing fatal was found first.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use vybe_core::{ReadyStatus, Severity};

use crate::admin::{host_registration, HostRegistration};
use crate::config::HookConfig;
use crate::probe::CommandProbe;

// ── Manual hooks flag ──

static MANUAL_HOOKS: AtomicBool = AtomicBool::new(false);

/// Switch this process to manual hook invocation.
pub fn enable_manual_hooks() {
    MANUAL_HOOKS.store(true, Ordering::SeqCst);
}

/// True when the process flag is set or `VYBE_MANUAL_HOOKS` is truthy.
pub fn manual_hooks_enabled() -> bool {
    MANUAL_HOOKS.load(Ordering::SeqCst)
        || std::env::var("VYBE_MANUAL_HOOKS")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
}

// ── Check model ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    Required,
    Optional,
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::Optional => write!(f, "optional"),
        }
    }
}

/// External commands the hook scripts rely on. The scripts exec `vybe`.
const EXTERNAL_COMMANDS: &[(&str, Criticality)] = &[
    ("vybe", Criticality::Required),
    ("jq", Criticality::Required),
    ("git", Criticality::Optional),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    #[error("{hook} script missing")]
    MissingArtifact { hook: &'static str, path: PathBuf },
    #[error("{hook} script not executable")]
    Permission { hook: &'static str, path: PathBuf },
    #[error("{criticality} command `{tool}` not found")]
    MissingDependency {
        tool: String,
        criticality: Criticality,
    },
    #[error("context directory {} not writable: {reason}", .path.display())]
    ContextNotWritable { path: PathBuf, reason: String },
    #[error("{0}")]
    HostConfig(String),
    #[error("{hook} script smoke test failed: {detail}")]
    RuntimeFailure { hook: &'static str, detail: String },
}

impl CheckError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingArtifact { .. } | Self::ContextNotWritable { .. } => Severity::Fatal,
            Self::MissingDependency {
                criticality: Criticality::Required,
                ..
            } => Severity::Fatal,
            Self::Permission { .. }
            | Self::MissingDependency { .. }
            | Self::HostConfig(_)
            | Self::RuntimeFailure { .. } => Severity::Degraded,
        }
    }

    pub fn recommendation(&self) -> Option<String> {
        match self {
            Self::MissingArtifact { .. } => Some("run `vybe install` to create the hook scripts".into()),
            Self::Permission { path, .. } => Some(format!("chmod +x {}", path.display())),
            Self::MissingDependency { tool, .. } => {
                Some(format!("install `{tool}` and make sure it is on PATH"))
            }
            Self::ContextNotWritable { path, .. } => {
                Some(format!("check permissions of {}", path.display()))
            }
            Self::HostConfig(_) => Some("run `vybe install` to register the hooks".into()),
            Self::RuntimeFailure { hook, .. } => Some(format!(
                "run the {hook} script by hand to see its error output"
            )),
        }
    }
}

/// Outcome of one named check.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub name: String,
    pub result: Result<(), CheckError>,
}

impl CheckOutcome {
    fn new(name: impl Into<String>, result: Result<(), CheckError>) -> Self {
        Self {
            name: name.into(),
            result,
        }
    }

    pub fn severity(&self) -> Severity {
        match &self.result {
            Ok(()) => Severity::Ok,
            Err(e) => e.severity(),
        }
    }
}

/// Overall verdict: the maximum severity of the outcomes.
pub fn aggregate(outcomes: &[CheckOutcome]) -> ReadyStatus {
    ReadyStatus::dominant(outcomes.iter().map(CheckOutcome::severity))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateMode {
    Full,
    StatusOnly,
    FallbackForce,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub mode: ValidateMode,
    pub status: ReadyStatus,
    pub checks: Vec<CheckOutcome>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub manual_hooks: bool,
}

impl ValidationReport {
    fn from_outcomes(mode: ValidateMode, checks: Vec<CheckOutcome>) -> Self {
        let status = aggregate(&checks);
        let mut issues = Vec::new();
        let mut recommendations = Vec::new();
        for outcome in &checks {
            if let Err(e) = &outcome.result {
                issues.push(e.to_string());
                if let Some(rec) = e.recommendation() {
                    if !recommendations.contains(&rec) {
                        recommendations.push(rec);
                    }
                }
            }
        }
        Self {
            mode,
            status,
            checks,
            issues,
            recommendations,
            manual_hooks: false,
        }
    }
}

// ── Hook runner ──

/// Executes a hook script for smoke testing. Returns the exit code.
pub trait HookRunner {
    fn run(&self, script: &Path, session_id: &str) -> anyhow::Result<i32>;
}

/// Runs scripts as child processes with a throwaway context directory, so
/// smoke tests leave no session records behind.
#[derive(Debug, Default, Clone)]
pub struct ScriptRunner {
    path: Option<OsString>,
}

impl ScriptRunner {
    /// Run scripts with `PATH` replaced instead of inherited.
    pub fn with_path(path: impl Into<OsString>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

impl HookRunner for ScriptRunner {
    fn run(&self, script: &Path, session_id: &str) -> anyhow::Result<i32> {
        let scratch = tempfile::tempdir()?;
        let mut command = std::process::Command::new(script);
        if let Some(path) = &self.path {
            command.env("PATH", path);
        }
        let status = command
            .env("CLAUDE_SESSION_ID", session_id)
            .env("CLAUDE_TOOL_NAME", "vybe-validate")
            .env("CLAUDE_TOOL_EXIT_CODE", "0")
            .env("VYBE_CONTEXT_DIR", scratch.path())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()?;
        Ok(status.code().unwrap_or(-1))
    }
}

// ── Validator ──

const SMOKE_SESSION_ID: &str = "vybe-validate-smoke";

pub struct Validator<'a> {
    config: &'a HookConfig,
    probe: &'a dyn CommandProbe,
    runner: &'a dyn HookRunner,
}

impl<'a> Validator<'a> {
    pub fn new(
        config: &'a HookConfig,
        probe: &'a dyn CommandProbe,
        runner: &'a dyn HookRunner,
    ) -> Self {
        Self {
            config,
            probe,
            runner,
        }
    }

    fn hook_scripts(&self) -> [(&'static str, PathBuf); 2] {
        [
            ("pre-tool", self.config.pre_hook_script()),
            ("post-tool", self.config.post_hook_script()),
        ]
    }

    pub fn validate(&self, mode: ValidateMode) -> ValidationReport {
        match mode {
            ValidateMode::FallbackForce => {
                enable_manual_hooks();
                tracing::info!("manual hooks forced");
                let mut report = ValidationReport::from_outcomes(mode, Vec::new());
                report.manual_hooks = true;
                report
            }
            ValidateMode::StatusOnly => {
                let checks = self
                    .hook_scripts()
                    .into_iter()
                    .map(|(hook, path)| CheckOutcome::new(hook, check_script(hook, &path)))
                    .collect();
                ValidationReport::from_outcomes(mode, checks)
            }
            ValidateMode::Full => self.validate_full(),
        }
    }

    fn validate_full(&self) -> ValidationReport {
        let mut checks: Vec<CheckOutcome> = self
            .hook_scripts()
            .into_iter()
            .map(|(hook, path)| CheckOutcome::new(hook, check_script(hook, &path)))
            .collect();
        checks.push(CheckOutcome::new(
            "context-dir",
            check_context_dir(&self.config.context_dir),
        ));
        for (tool, criticality) in EXTERNAL_COMMANDS {
            checks.push(CheckOutcome::new(
                format!("command:{tool}"),
                self.check_command(tool, *criticality),
            ));
        }
        checks.push(CheckOutcome::new("host-config", check_host_config(self.config)));

        if aggregate(&checks) != ReadyStatus::Failed && self.config.smoke_tests {
            for (hook, path) in self.hook_scripts() {
                // A script that failed its static check would only fail again.
                let runnable = checks.iter().any(|c| c.name == hook && c.result.is_ok());
                if runnable {
                    checks.push(CheckOutcome::new(
                        format!("smoke:{hook}"),
                        self.smoke_test(hook, &path),
                    ));
                }
            }
        }

        let mut report = ValidationReport::from_outcomes(ValidateMode::Full, checks);
        if report.status != ReadyStatus::Ready {
            enable_manual_hooks();
            report.manual_hooks = true;
            tracing::warn!(status = %report.status, "hook layer not ready; manual hooks enabled");
        }
        report
    }

    fn check_command(&self, tool: &str, criticality: Criticality) -> Result<(), CheckError> {
        let report = self.probe.probe(tool);
        tracing::debug!(tool, present = report.present, path = ?report.path, "probed command");
        if report.present {
            Ok(())
        } else {
            Err(CheckError::MissingDependency {
                tool: tool.to_string(),
                criticality,
            })
        }
    }

    fn smoke_test(&self, hook: &'static str, script: &Path) -> Result<(), CheckError> {
        match self.runner.run(script, SMOKE_SESSION_ID) {
            Ok(0) => Ok(()),
            Ok(code) => Err(CheckError::RuntimeFailure {
                hook,
                detail: format!("exit status {code}"),
            }),
            Err(e) => Err(CheckError::RuntimeFailure {
                hook,
                detail: e.to_string(),
            }),
        }
    }
}

fn check_script(hook: &'static str, path: &Path) -> Result<(), CheckError> {
    if !path.is_file() {
        return Err(CheckError::MissingArtifact {
            hook,
            path: path.to_path_buf(),
        });
    }
    if !is_executable(path) {
        return Err(CheckError::Permission {
            hook,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Create the context directory if needed and prove it accepts writes.
fn check_context_dir(dir: &Path) -> Result<(), CheckError> {
    let fail = |reason: String| CheckError::ContextNotWritable {
        path: dir.to_path_buf(),
        reason,
    };
    std::fs::create_dir_all(dir).map_err(|e| fail(e.to_string()))?;
    let probe = dir.join(".vybe-write-test");
    vybe_store::write_atomic(&probe, b"ok").map_err(|e| fail(e.to_string()))?;
    let _ = std::fs::remove_file(&probe);
    Ok(())
}

fn check_host_config(config: &HookConfig) -> Result<(), CheckError> {
    match host_registration(config) {
        HostRegistration::Registered => Ok(()),
        HostRegistration::SettingsMissing => Err(CheckError::HostConfig(
            "no .claude settings file found; hooks are not registered".into(),
        )),
        HostRegistration::Unreadable(detail) => Err(CheckError::HostConfig(format!(
            "could not parse claude settings ({detail})"
        ))),
        HostRegistration::Missing(events) => Err(CheckError::HostConfig(format!(
            "hooks not registered for {}",
            events.join(", ")
        ))),
    }
}
