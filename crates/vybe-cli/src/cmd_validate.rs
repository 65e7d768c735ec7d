use std::path::Path;

use vybe_core::Severity;
use vybe_bridge::{
    manual_hooks_enabled, HookConfig, PathProbe, ScriptRunner, ValidateMode, ValidationReport,
    Validator,
};

/// `vybe validate`. Returns the process exit code.
pub fn execute(repo_root: &Path, silent: bool, fallback: bool, status: bool) -> anyhow::Result<i32> {
    let config = HookConfig::load(repo_root).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config unreadable; validating with defaults");
        HookConfig::from_map(repo_root, &serde_json::Map::new())
    });
    let probe = PathProbe;
    let runner = ScriptRunner::default();
    let mode = select_mode(fallback, status);
    let report = Validator::new(&config, &probe, &runner).validate(mode);
    if !silent {
        print!("{}", render(&report));
    }
    Ok(report.status.exit_code())
}

/// `--fallback` takes precedence over `--status`.
fn select_mode(fallback: bool, status: bool) -> ValidateMode {
    if fallback {
        ValidateMode::FallbackForce
    } else if status {
        ValidateMode::StatusOnly
    } else {
        ValidateMode::Full
    }
}

fn render(report: &ValidationReport) -> String {
    let mut out = String::new();
    for check in &report.checks {
        let tag = match check.severity() {
            Severity::Ok => "OK",
            Severity::Degraded => "WARN",
            Severity::Fatal => "FAIL",
        };
        let detail = match &check.result {
            Ok(()) => String::new(),
            Err(e) => format!(": {e}"),
        };
        out.push_str(&format!("[{tag}] {}{detail}\n", check.name));
    }
    out.push_str(&format!("status: {}\n", report.status));

    if !report.recommendations.is_empty() {
        out.push_str("\nRecommendations:\n");
        for rec in &report.recommendations {
            out.push_str(&format!("  - {rec}\n"));
        }
    }
    if report.manual_hooks || manual_hooks_enabled() {
        out.push_str(
            "\nManual hooks enabled: run `vybe hook pre` / `vybe hook post` around each tool call.\n",
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use vybe_bridge::probe::StaticProbe;
    use vybe_bridge::validator::HookRunner;

    struct Passing;

    impl HookRunner for Passing {
        fn run(&self, _script: &Path, _session_id: &str) -> anyhow::Result<i32> {
            Ok(0)
        }
    }

    #[test]
    fn render_lists_failures_and_recommendations() {
        let tmp = tempfile::tempdir().unwrap();
        let config = HookConfig::load(tmp.path()).unwrap();
        let probe = StaticProbe::with(&["jq", "git", "vybe"]);
        let report = Validator::new(&config, &probe, &Passing).validate(ValidateMode::StatusOnly);
        let text = render(&report);
        assert!(text.contains("[FAIL] pre-tool: pre-tool script missing"));
        assert!(text.contains("status: FAILED"));
        assert!(text.contains("vybe install"));
    }

    #[test]
    fn fallback_wins_over_status() {
        assert_eq!(select_mode(true, true), ValidateMode::FallbackForce);
        assert_eq!(select_mode(false, true), ValidateMode::StatusOnly);
        assert_eq!(select_mode(false, false), ValidateMode::Full);
    }
}
