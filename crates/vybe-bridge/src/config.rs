//! Project configuration: `.vybe/config.json` plus environment overrides.

use std::path::{Path, PathBuf};

use vybe_store::{ContextPaths, DEFAULT_CONTEXT_DIR};

/// Location of the config file relative to the project root.
pub const CONFIG_FILE: &str = ".vybe/config.json";

/// Default hook script directory relative to the project root.
pub const DEFAULT_HOOKS_DIR: &str = ".claude/hooks";

pub const PRE_HOOK_SCRIPT: &str = "pre-tool.sh";
pub const POST_HOOK_SCRIPT: &str = "post-tool.sh";

/// Highest member count the fixed role set supports (`dev-1`..`dev-5`).
const MAX_MEMBERS: u64 = 5;

/// Effective configuration for one hook or validator run.
#[derive(Debug, Clone)]
pub struct HookConfig {
    pub project_root: PathBuf,
    pub hooks_dir: PathBuf,
    pub context_dir: PathBuf,
    /// Declared member roles. Empty means solo mode.
    pub members: Vec<String>,
    /// Whether `validate` invokes the hook scripts.
    pub smoke_tests: bool,
}

impl HookConfig {
    /// Load from `.vybe/config.json` and apply `VYBE_CONTEXT_DIR`.
    pub fn load(project_root: &Path) -> anyhow::Result<Self> {
        let mut cfg = Self::from_file(project_root)?;
        if let Some(dir) = std::env::var("VYBE_CONTEXT_DIR")
            .ok()
            .filter(|v| !v.is_empty())
        {
            cfg.context_dir = project_root.join(dir);
        }
        Ok(cfg)
    }

    /// Load from `.vybe/config.json` only. Missing file → defaults.
    pub fn from_file(project_root: &Path) -> anyhow::Result<Self> {
        let map = read_config(&project_root.join(CONFIG_FILE))?;
        Ok(Self::from_map(project_root, &map))
    }

    pub fn from_map(
        project_root: &Path,
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let hooks_dir = map
            .get("hooks_dir")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_HOOKS_DIR);
        let context_dir = map
            .get("context_dir")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_CONTEXT_DIR);
        let smoke_tests = map
            .get("smoke_tests")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        Self {
            project_root: project_root.to_path_buf(),
            hooks_dir: project_root.join(hooks_dir),
            context_dir: project_root.join(context_dir),
            members: declared_members(map.get("members")),
            smoke_tests,
        }
    }

    pub fn pre_hook_script(&self) -> PathBuf {
        self.hooks_dir.join(PRE_HOOK_SCRIPT)
    }

    pub fn post_hook_script(&self) -> PathBuf {
        self.hooks_dir.join(POST_HOOK_SCRIPT)
    }

    pub fn multi_member(&self) -> bool {
        !self.members.is_empty()
    }

    pub fn paths(&self) -> ContextPaths {
        ContextPaths::new(&self.context_dir)
    }
}

/// `members` may be a list of role names or a member count.
/// A count below 2 declares no members; counts above 5 are capped.
fn declared_members(value: Option<&serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(serde_json::Value::Number(n)) => match n.as_u64() {
            Some(count) if count >= 2 => (1..=count.min(MAX_MEMBERS))
                .map(|i| format!("dev-{i}"))
                .collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

// ── Config file I/O ──

/// Read `.vybe/config.json`. Returns empty map if the file doesn't exist.
pub fn read_config(path: &Path) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
    if !path.exists() {
        return Ok(serde_json::Map::new());
    }
    let content = std::fs::read_to_string(path)?;
    let val: serde_json::Value = serde_json::from_str(&content)?;
    match val {
        serde_json::Value::Object(map) => Ok(map),
        _ => Ok(serde_json::Map::new()),
    }
}

pub fn write_config(
    path: &Path,
    config: &serde_json::Map<String, serde_json::Value>,
) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&config)?;
    vybe_store::write_atomic(path, json.as_bytes())
}

/// Parse a CLI string into a JSON value (bool/number/list/string).
/// Comma-separated input becomes a list of strings.
pub fn parse_value(s: &str) -> serde_json::Value {
    match s {
        "true" => serde_json::Value::Bool(true),
        "false" => serde_json::Value::Bool(false),
        _ if s.contains(',') => serde_json::Value::Array(
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| serde_json::Value::String(p.to_string()))
                .collect(),
        ),
        _ => {
            if let Ok(n) = s.parse::<i64>() {
                serde_json::Value::Number(n.into())
            } else {
                serde_json::Value::String(s.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = HookConfig::from_file(tmp.path()).unwrap();
        assert!(cfg.members.is_empty());
        assert!(!cfg.multi_member());
        assert!(cfg.smoke_tests);
        assert_eq!(cfg.pre_hook_script(), tmp.path().join(".claude/hooks/pre-tool.sh"));
        assert_eq!(cfg.context_dir, tmp.path().join(".vybe/context"));
    }

    #[test]
    fn members_from_list_and_count() {
        let tmp = tempfile::tempdir().unwrap();
        let map = serde_json::json!({"members": ["dev-1", "dev-3"]});
        let cfg = HookConfig::from_map(tmp.path(), map.as_object().unwrap());
        assert_eq!(cfg.members, vec!["dev-1", "dev-3"]);

        let map = serde_json::json!({"members": 3});
        let cfg = HookConfig::from_map(tmp.path(), map.as_object().unwrap());
        assert_eq!(cfg.members, vec!["dev-1", "dev-2", "dev-3"]);

        let map = serde_json::json!({"members": 9});
        let cfg = HookConfig::from_map(tmp.path(), map.as_object().unwrap());
        assert_eq!(cfg.members.len(), 5);

        let map = serde_json::json!({"members": 1});
        let cfg = HookConfig::from_map(tmp.path(), map.as_object().unwrap());
        assert!(!cfg.multi_member());
    }

    #[test]
    fn config_file_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        let mut map = serde_json::Map::new();
        map.insert("members".into(), parse_value("dev-1,dev-2"));
        map.insert("smoke_tests".into(), parse_value("false"));
        map.insert("hooks_dir".into(), parse_value("hooks"));
        write_config(&path, &map).unwrap();

        let cfg = HookConfig::from_file(tmp.path()).unwrap();
        assert_eq!(cfg.members, vec!["dev-1", "dev-2"]);
        assert!(!cfg.smoke_tests);
        assert_eq!(cfg.post_hook_script(), tmp.path().join("hooks/post-tool.sh"));
    }

    #[test]
    fn parse_value_types() {
        assert_eq!(parse_value("true"), serde_json::json!(true));
        assert_eq!(parse_value("4"), serde_json::json!(4));
        assert_eq!(parse_value("a, b,"), serde_json::json!(["a", "b"]));
        assert_eq!(parse_value(".vybe/ctx"), serde_json::json!(".vybe/ctx"));
    }
}
