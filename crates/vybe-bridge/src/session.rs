//! Per-session lifecycle records.
//!
//! Each session id maps to its own key, so sessions never contend with each
//! other. Repeated calls for the same session rely on `atomic_put`: the record
//! is computed in full, then replaced in one step.

use anyhow::Context;
use serde_json::{Map, Value};
use vybe_core::session::merge_post_into;
use vybe_core::{now_rfc3339, RoleResolution, SessionRecord};
use vybe_store::{get_json, put_json, KvStore};

use crate::redact::redact_tool_args;

type Document = Map<String, Value>;

pub struct SessionStore<S: KvStore> {
    store: S,
}

impl<S: KvStore> SessionStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn load(&self, session_id: &str) -> anyhow::Result<Option<SessionRecord>> {
        get_json(&self.store, session_id)
            .with_context(|| format!("reading session record {session_id}"))
    }

    /// Stored records are rewritten as raw documents so keys the typed record
    /// would normalize away (nulls, `false` flags) are kept byte-for-byte.
    fn load_document(&self, session_id: &str) -> anyhow::Result<Option<Document>> {
        get_json(&self.store, session_id)
            .with_context(|| format!("reading session record {session_id}"))
    }

    fn save(&self, session_id: &str, doc: &Document) -> anyhow::Result<()> {
        put_json(&self.store, session_id, doc)
            .with_context(|| format!("writing session record {session_id}"))
    }

    /// Create the record if absent. An existing record only gains pre-hook
    /// fields that are missing or null.
    pub fn touch_pre(
        &self,
        session_id: &str,
        tool_name: &str,
        role: &RoleResolution,
        tool_args: Option<&str>,
    ) -> anyhow::Result<SessionRecord> {
        let existing = self.load_document(session_id)?;
        let created = existing.is_none();
        let mut doc = existing.unwrap_or_default();

        let mut fresh = SessionRecord::new(session_id, tool_name);
        fresh.pre_timestamp = Some(now_rfc3339());
        fresh.member_status = Some(role.status());
        fresh.member_role = role.role_label();
        fresh.tool_args = tool_args.map(redact_tool_args);
        let mut fresh = to_document(&fresh)?;
        // Role label and status are recorded together or not at all.
        if is_set(&doc, "member_status") {
            fresh.remove("member_status");
            fresh.remove("member_role");
        }

        let changed = fill_unset(&mut doc, fresh);
        if created || changed {
            self.save(session_id, &doc)?;
            tracing::debug!(session_id, tool_name, created, "pre-hook session record written");
        }
        to_record(doc)
    }

    /// Merge post-hook fields into the record, or synthesize a
    /// `post_hook_only` record when no pre-hook ran for this session.
    pub fn touch_post(
        &self,
        session_id: &str,
        tool_name: &str,
        exit_code: i32,
    ) -> anyhow::Result<SessionRecord> {
        let mut doc = match self.load_document(session_id)? {
            Some(doc) => doc,
            None => {
                tracing::debug!(session_id, "post-hook without matching pre-hook");
                let mut record = SessionRecord::new(session_id, tool_name);
                record.post_hook_only = true;
                to_document(&record)?
            }
        };
        merge_post_into(&mut doc, &now_rfc3339(), exit_code);
        self.save(session_id, &doc)?;
        to_record(doc)
    }
}

fn is_set(doc: &Document, key: &str) -> bool {
    doc.get(key).is_some_and(|v| !v.is_null())
}

/// Insert every key of `fresh` that `doc` lacks or holds as null.
fn fill_unset(doc: &mut Document, fresh: Document) -> bool {
    let mut changed = false;
    for (key, value) in fresh {
        if !is_set(doc, &key) {
            doc.insert(key, value);
            changed = true;
        }
    }
    changed
}

fn to_document(record: &SessionRecord) -> anyhow::Result<Document> {
    match serde_json::to_value(record)? {
        Value::Object(doc) => Ok(doc),
        other => anyhow::bail!("session record serialized as {other}"),
    }
}

fn to_record(doc: Document) -> anyhow::Result<SessionRecord> {
    serde_json::from_value(Value::Object(doc)).context("session record has an unexpected shape")
}
