use serde::{Deserialize, Serialize};

// ── Hook input ──

/// Everything a hook run needs from its environment and stdin.
#[derive(Debug, Clone, Default)]
pub struct HookInput {
    pub session_id: String,
    pub tool_name: String,
    pub exit_code: i32,
    pub tool_args: Option<String>,
    /// Raw member selection (`VYBE_MEMBER`), unvalidated.
    pub member: Option<String>,
}

impl HookInput {
    /// Read from the process environment, falling back to the stdin payload.
    pub fn from_env(stdin: &str) -> Self {
        Self::from_sources(|key| std::env::var(key).ok(), stdin)
    }

    /// Environment variables win over the stdin JSON payload. A missing
    /// session id is derived from the current time.
    pub fn from_sources<F>(env: F, stdin: &str) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.is_empty());
        let raw = parse_hook_stdin(stdin);

        let session_id = env("CLAUDE_SESSION_ID")
            .or_else(|| non_empty(get_str(&raw, "session_id")))
            .unwrap_or_else(time_derived_session_id);
        let tool_name = env("CLAUDE_TOOL_NAME")
            .or_else(|| non_empty(get_str(&raw, "tool_name")))
            .unwrap_or_else(|| "unknown".to_string());
        let exit_code = env("CLAUDE_TOOL_EXIT_CODE")
            .and_then(|v| v.trim().parse().ok())
            .or_else(|| stdin_exit_code(&raw))
            .unwrap_or(0);
        let tool_args = env("CLAUDE_TOOL_ARGS").or_else(|| {
            raw.get("tool_input")
                .or_else(|| raw.get("toolInput"))
                .filter(|v| !v.is_null())
                .map(|v| v.to_string())
        });

        Self {
            session_id,
            tool_name,
            exit_code,
            tool_args,
            member: env("VYBE_MEMBER"),
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

fn stdin_exit_code(raw: &serde_json::Value) -> Option<i32> {
    let resp = raw.get("tool_response").or_else(|| raw.get("toolResponse"))?;
    resp.get("exit_code")
        .or_else(|| resp.get("exitCode"))
        .and_then(|v| v.as_i64())
        .and_then(|v| i32::try_from(v).ok())
}

/// `session-<unix seconds>`, used when no session id is supplied.
pub fn time_derived_session_id() -> String {
    format!(
        "session-{}",
        time::OffsetDateTime::now_utc().unix_timestamp()
    )
}

// ── Hook stdin parsing ──

/// Parse the hook stdin JSON. Empty or malformed input yields `Null`.
pub(crate) fn parse_hook_stdin(stdin: &str) -> serde_json::Value {
    if stdin.trim().is_empty() {
        return serde_json::Value::Null;
    }
    match serde_json::from_str(stdin) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring malformed hook stdin");
            serde_json::Value::Null
        }
    }
}

/// Get a string field from JSON, trying snake_case first then camelCase.
pub(crate) fn get_str(v: &serde_json::Value, snake_key: &str) -> String {
    if let Some(s) = v.get(snake_key).and_then(|x| x.as_str()) {
        return s.to_string();
    }
    let camel = snake_to_camel(snake_key);
    v.get(&camel)
        .and_then(|x| x.as_str())
        .unwrap_or("")
        .to_string()
}

pub(crate) fn snake_to_camel(s: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = false;
    for ch in s.chars() {
        if ch == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.extend(ch.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(ch);
        }
    }
    result
}

// ── Session log ──

/// One line of the global append-only session log.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionLogEntry {
    pub ts: String,
    pub event: String,
    pub session_id: String,
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_status: Option<vybe_core::RoleStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

pub(crate) fn append_session_log(
    paths: &vybe_store::ContextPaths,
    entry: &SessionLogEntry,
) -> anyhow::Result<()> {
    let line = serde_json::to_string(entry)?;
    vybe_store::append_line(&paths.session_log(), &line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn snake_to_camel_converts_correctly() {
        assert_eq!(snake_to_camel("session_id"), "sessionId");
        assert_eq!(snake_to_camel("tool_name"), "toolName");
        assert_eq!(snake_to_camel("cwd"), "cwd");
    }

    #[test]
    fn env_wins_over_stdin() {
        let env = env_of(&[
            ("CLAUDE_SESSION_ID", "env-sid"),
            ("CLAUDE_TOOL_NAME", "Bash"),
            ("CLAUDE_TOOL_EXIT_CODE", "2"),
            ("VYBE_MEMBER", "dev-1"),
        ]);
        let input = HookInput::from_sources(
            env,
            r#"{"session_id":"stdin-sid","tool_name":"Edit"}"#,
        );
        assert_eq!(input.session_id, "env-sid");
        assert_eq!(input.tool_name, "Bash");
        assert_eq!(input.exit_code, 2);
        assert_eq!(input.member.as_deref(), Some("dev-1"));
    }

    #[test]
    fn stdin_fallback_including_camel_case() {
        let input = HookInput::from_sources(
            env_of(&[]),
            r#"{"sessionId":"abc","toolName":"Write","tool_input":{"file_path":"a.rs"},"tool_response":{"exit_code":1}}"#,
        );
        assert_eq!(input.session_id, "abc");
        assert_eq!(input.tool_name, "Write");
        assert_eq!(input.exit_code, 1);
        assert!(input.tool_args.unwrap().contains("a.rs"));
        assert!(input.member.is_none());
    }

    #[test]
    fn missing_everything_uses_defaults() {
        let input = HookInput::from_sources(env_of(&[("VYBE_MEMBER", "")]), "not json");
        assert!(input.session_id.starts_with("session-"));
        assert_eq!(input.tool_name, "unknown");
        assert_eq!(input.exit_code, 0);
        assert!(input.tool_args.is_none());
        assert!(input.member.is_none());
    }

    #[test]
    fn bad_exit_code_env_falls_back() {
        let input = HookInput::from_sources(env_of(&[("CLAUDE_TOOL_EXIT_CODE", "abc")]), "");
        assert_eq!(input.exit_code, 0);
    }
}
