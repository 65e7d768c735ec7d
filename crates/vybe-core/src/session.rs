use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::role::RoleStatus;

/// Keys written by the post-hook. A post-hook merge touches these and nothing else.
pub const POST_HOOK_FIELDS: &[&str] = &["post_timestamp", "exit_code", "completed"];

/// Per-session lifecycle record.
///
/// Unknown keys (written by other tools or newer versions) are kept in
/// `extra` and written back unchanged.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionRecord {
    pub session_id: String,
    #[serde(default)]
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_status: Option<RoleStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub post_hook_only: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SessionRecord {
    pub fn new(session_id: &str, tool_name: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            tool_name: tool_name.to_string(),
            pre_timestamp: None,
            post_timestamp: None,
            exit_code: None,
            member_role: None,
            member_status: None,
            tool_args: None,
            completed: false,
            post_hook_only: false,
            extra: serde_json::Map::new(),
        }
    }

    /// Overwrite the post-hook fields only.
    pub fn merge_post(&mut self, post_timestamp: String, exit_code: i32) {
        self.post_timestamp = Some(post_timestamp);
        self.exit_code = Some(exit_code);
        self.completed = true;
    }
}

/// Write the post-hook fields into a stored record document. Every other key,
/// including explicit nulls, is left exactly as stored.
pub fn merge_post_into(doc: &mut Map<String, Value>, post_timestamp: &str, exit_code: i32) {
    doc.insert(POST_HOOK_FIELDS[0].into(), Value::from(post_timestamp));
    doc.insert(POST_HOOK_FIELDS[1].into(), Value::from(exit_code));
    doc.insert(POST_HOOK_FIELDS[2].into(), Value::Bool(true));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_are_preserved() {
        let doc = r#"{"session_id":"s1","tool_name":"Bash","pre_timestamp":"t0","feature":"upload","task":3}"#;
        let mut rec: SessionRecord = serde_json::from_str(doc).unwrap();
        rec.merge_post("t1".into(), 0);
        let out = serde_json::to_value(&rec).unwrap();
        assert_eq!(out["feature"], "upload");
        assert_eq!(out["task"], 3);
        assert_eq!(out["pre_timestamp"], "t0");
        assert_eq!(out["post_timestamp"], "t1");
        assert_eq!(out["completed"], true);
    }

    #[test]
    fn merge_touches_only_post_fields() {
        let mut rec = SessionRecord::new("s1", "build");
        rec.pre_timestamp = Some("t0".into());
        rec.member_role = Some("dev-1".into());
        rec.member_status = Some(RoleStatus::Assigned);
        let before = serde_json::to_value(&rec).unwrap();

        rec.merge_post("t1".into(), 3);
        let after = serde_json::to_value(&rec).unwrap();

        for (key, value) in before.as_object().unwrap() {
            if POST_HOOK_FIELDS.contains(&key.as_str()) {
                continue;
            }
            assert_eq!(&after[key], value, "field {key} changed");
        }
        assert_eq!(after["exit_code"], 3);
    }

    #[test]
    fn document_merge_keeps_nulls_and_false_flags() {
        let mut doc = serde_json::json!({
            "session_id": "s1",
            "member_role": null,
            "post_hook_only": false,
            "exit_code": null,
        });
        let doc = doc.as_object_mut().unwrap();
        merge_post_into(doc, "t1", 2);
        assert_eq!(doc["member_role"], Value::Null);
        assert_eq!(doc["post_hook_only"], false);
        assert_eq!(doc["exit_code"], 2);
        assert_eq!(doc["post_timestamp"], "t1");
        assert_eq!(doc["completed"], true);
        assert_eq!(doc.len(), 6);
    }

    #[test]
    fn post_hook_only_omitted_when_false() {
        let rec = SessionRecord::new("s1", "Read");
        let out = serde_json::to_value(&rec).unwrap();
        assert!(out.get("post_hook_only").is_none());
    }
}
