use std::fs;
use std::path::{Path, PathBuf};

use vybe_core::now_rfc3339;

use crate::config::{HookConfig, POST_HOOK_SCRIPT, PRE_HOOK_SCRIPT};

// ── Install / Uninstall ──

/// Hook events vybe registers, with the script each one runs.
const HOOK_EVENTS: &[(&str, &str, &str)] = &[
    ("PreToolUse", PRE_HOOK_SCRIPT, "pre"),
    ("PostToolUse", POST_HOOK_SCRIPT, "post"),
];

/// Settings files the assistant reads hooks from, in precedence order.
const SETTINGS_FILES: &[&str] = &["settings.local.json", "settings.json"];

fn settings_path(project_root: &Path) -> PathBuf {
    project_root.join(".claude").join(SETTINGS_FILES[0])
}

/// `vybe hook` itself always exits 0, so a non-zero status from the script
/// means the binary is missing or crashed. `vybe validate` smoke tests rely on
/// that.
fn script_body(phase: &str) -> String {
    format!(
        "#!/bin/sh\n\
         # Installed by `vybe install`.\n\
         command -v vybe >/dev/null 2>&1 || {{ echo \"vybe: binary not found on PATH\" >&2; exit 127; }}\n\
         exec vybe hook {phase}\n"
    )
}

/// Command string registered in settings for a script.
fn script_command(config: &HookConfig, script: &str) -> String {
    let path = config.hooks_dir.join(script);
    path.strip_prefix(&config.project_root)
        .unwrap_or(&path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Check if a matcher group runs the given hook script.
fn matcher_group_runs(group: &serde_json::Value, script: &str) -> bool {
    if let Some(hooks_arr) = group.get("hooks").and_then(|h| h.as_array()) {
        return hooks_arr.iter().any(|hook| {
            hook.get("command")
                .and_then(|c| c.as_str())
                .is_some_and(|cmd| cmd.contains(script))
        });
    }
    group.as_str().is_some_and(|s| s.contains(script))
}

#[derive(Debug, Default)]
pub struct InstallSummary {
    pub scripts: Vec<PathBuf>,
    pub settings: PathBuf,
    pub backup: Option<PathBuf>,
}

/// Write the hook scripts and register them in `.claude/settings.local.json`.
/// Existing scripts are left as they are; foreign hook groups are preserved.
pub fn install(config: &HookConfig) -> anyhow::Result<InstallSummary> {
    let mut summary = InstallSummary {
        settings: settings_path(&config.project_root),
        ..InstallSummary::default()
    };

    fs::create_dir_all(&config.hooks_dir)?;
    for (_, script, phase) in HOOK_EVENTS {
        let path = config.hooks_dir.join(script);
        if !path.exists() {
            vybe_store::write_atomic(&path, script_body(phase).as_bytes())?;
        }
        make_executable(&path)?;
        summary.scripts.push(path);
    }

    let path = &summary.settings;
    let mut settings: serde_json::Value = if path.exists() {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({}))
    } else {
        serde_json::json!({})
    };

    if path.exists() {
        let ts = now_rfc3339().replace(':', "-");
        let backup = path.with_extension(format!("json.vybe.bak.{ts}"));
        fs::copy(path, &backup)?;
        summary.backup = Some(backup);
    }

    let hooks_obj = settings
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("settings is not an object"))?
        .entry("hooks")
        .or_insert_with(|| serde_json::json!({}))
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("hooks is not an object"))?;

    for (event_name, script, _) in HOOK_EVENTS {
        let group = serde_json::json!({
            "matcher": "",
            "hooks": [
                {
                    "type": "command",
                    "command": script_command(config, script)
                }
            ]
        });
        let mut groups: Vec<serde_json::Value> = hooks_obj
            .get(*event_name)
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|g| !matcher_group_runs(g, script))
            .collect();
        groups.push(group);
        hooks_obj.insert(event_name.to_string(), serde_json::Value::Array(groups));
    }

    let output = serde_json::to_string_pretty(&settings)?;
    vybe_store::write_atomic(path, output.as_bytes())?;
    Ok(summary)
}

/// Remove vybe hook groups from `.claude/settings.local.json`.
/// Scripts are left on disk. Returns false if there was no settings file.
pub fn uninstall(config: &HookConfig) -> anyhow::Result<bool> {
    let path = settings_path(&config.project_root);
    if !path.exists() {
        return Ok(false);
    }
    let content = fs::read_to_string(&path)?;
    let mut settings: serde_json::Value = serde_json::from_str(&content)?;

    if let Some(hooks) = settings
        .as_object_mut()
        .and_then(|obj| obj.get_mut("hooks"))
        .and_then(|h| h.as_object_mut())
    {
        for (event_name, script, _) in HOOK_EVENTS {
            if let Some(arr) = hooks.get(*event_name).and_then(|v| v.as_array()).cloned() {
                let kept: Vec<serde_json::Value> = arr
                    .into_iter()
                    .filter(|g| !matcher_group_runs(g, script))
                    .collect();
                if kept.is_empty() {
                    hooks.remove(*event_name);
                } else {
                    hooks.insert(event_name.to_string(), serde_json::Value::Array(kept));
                }
            }
        }
    }

    let output = serde_json::to_string_pretty(&settings)?;
    vybe_store::write_atomic(&path, output.as_bytes())?;
    Ok(true)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

// ── Host configuration heuristic ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRegistration {
    Registered,
    SettingsMissing,
    Unreadable(String),
    /// Hook events with no group running the vybe script.
    Missing(Vec<&'static str>),
}

/// Best-effort check that the assistant settings register both hook scripts.
pub fn host_registration(config: &HookConfig) -> HostRegistration {
    let claude_dir = config.project_root.join(".claude");
    let mut documents = Vec::new();
    for name in SETTINGS_FILES {
        let path = claude_dir.join(name);
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(doc) => documents.push(doc),
            Err(e) => return HostRegistration::Unreadable(format!("{}: {e}", path.display())),
        }
    }
    if documents.is_empty() {
        return HostRegistration::SettingsMissing;
    }

    let missing: Vec<&'static str> = HOOK_EVENTS
        .iter()
        .filter(|(event_name, script, _)| {
            !documents.iter().any(|doc| {
                doc.get("hooks")
                    .and_then(|h| h.get(*event_name))
                    .and_then(|v| v.as_array())
                    .is_some_and(|groups| groups.iter().any(|g| matcher_group_runs(g, script)))
            })
        })
        .map(|(event_name, _, _)| *event_name)
        .collect();
    if missing.is_empty() {
        HostRegistration::Registered
    } else {
        HostRegistration::Missing(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &Path) -> HookConfig {
        HookConfig::from_file(root).unwrap()
    }

    #[test]
    fn install_writes_scripts_and_settings() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        assert_eq!(host_registration(&cfg), HostRegistration::SettingsMissing);

        let summary = install(&cfg).unwrap();
        assert_eq!(summary.scripts.len(), 2);
        assert!(summary.backup.is_none());
        let body = fs::read_to_string(cfg.pre_hook_script()).unwrap();
        assert!(body.contains("exec vybe hook pre"));
        assert!(body.contains("exit 127"));
        assert!(!body.contains("|| true"));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(cfg.post_hook_script()).unwrap().permissions().mode();
            assert_ne!(mode & 0o111, 0);
        }

        let settings: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&summary.settings).unwrap()).unwrap();
        assert_eq!(
            settings["hooks"]["PreToolUse"][0]["hooks"][0]["command"],
            ".claude/hooks/pre-tool.sh"
        );
        assert_eq!(host_registration(&cfg), HostRegistration::Registered);
    }

    #[test]
    fn install_preserves_foreign_groups_and_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        let claude = tmp.path().join(".claude");
        fs::create_dir_all(&claude).unwrap();
        fs::write(
            claude.join("settings.local.json"),
            r#"{"hooks":{"PreToolUse":[{"matcher":"Bash","hooks":[{"type":"command","command":"lint.sh"}]}]},"model":"x"}"#,
        )
        .unwrap();

        let summary = install(&cfg).unwrap();
        assert!(summary.backup.is_some());
        install(&cfg).unwrap();

        let settings: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&summary.settings).unwrap()).unwrap();
        let pre = settings["hooks"]["PreToolUse"].as_array().unwrap();
        assert_eq!(pre.len(), 2);
        assert_eq!(settings["model"], "x");

        assert!(uninstall(&cfg).unwrap());
        let settings: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&summary.settings).unwrap()).unwrap();
        assert_eq!(settings["hooks"]["PreToolUse"].as_array().unwrap().len(), 1);
        assert!(settings["hooks"].get("PostToolUse").is_none());
        assert_eq!(
            host_registration(&cfg),
            HostRegistration::Missing(vec!["PreToolUse", "PostToolUse"])
        );
    }

    #[test]
    fn install_keeps_existing_scripts() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        fs::create_dir_all(&cfg.hooks_dir).unwrap();
        fs::write(cfg.pre_hook_script(), "#!/bin/sh\necho custom\n").unwrap();
        install(&cfg).unwrap();
        assert!(fs::read_to_string(cfg.pre_hook_script()).unwrap().contains("custom"));
    }

    #[test]
    fn unreadable_settings_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());
        let claude = tmp.path().join(".claude");
        fs::create_dir_all(&claude).unwrap();
        fs::write(claude.join("settings.json"), "{oops").unwrap();
        assert!(matches!(host_registration(&cfg), HostRegistration::Unreadable(_)));
    }

    #[test]
    fn uninstall_without_settings() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!uninstall(&config(tmp.path())).unwrap());
    }
}
