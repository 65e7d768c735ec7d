use clap::Subcommand;
use std::path::Path;

use vybe_bridge::{HookConfig, SessionStore};
use vybe_core::SessionRecord;
use vybe_store::FileStore;

#[derive(Subcommand)]
pub enum SessionCmd {
    /// Print one session record as JSON
    Show {
        /// Session id
        id: String,
    },
    /// List recorded sessions
    List,
}

pub fn run(cmd: SessionCmd, repo_root: &Path) -> anyhow::Result<()> {
    let config = HookConfig::load(repo_root)?;
    let store = FileStore::new(config.paths().sessions_dir());
    match cmd {
        SessionCmd::Show { id } => show(store, &id),
        SessionCmd::List => list(&store),
    }
}

fn show(store: FileStore, id: &str) -> anyhow::Result<()> {
    match SessionStore::new(store).load(id)? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => anyhow::bail!("no session record for {id}"),
    }
    Ok(())
}

fn list(store: &FileStore) -> anyhow::Result<()> {
    let stems = store.stems()?;
    if stems.is_empty() {
        println!("No sessions recorded.");
        return Ok(());
    }
    for stem in stems {
        match read_stem(store, &stem) {
            Ok(Some(r)) => println!("{}", summary_line(&r)),
            Ok(None) => {}
            Err(e) => println!("{stem:<32} (unreadable: {e})"),
        }
    }
    Ok(())
}

fn read_stem(store: &FileStore, stem: &str) -> anyhow::Result<Option<SessionRecord>> {
    match store.get_stem(stem)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn summary_line(r: &SessionRecord) -> String {
    let state = if r.completed {
        match r.exit_code {
            Some(0) | None => "done".to_string(),
            Some(code) => format!("exit {code}"),
        }
    } else {
        "running".to_string()
    };
    let started = r
        .pre_timestamp
        .as_deref()
        .or(r.post_timestamp.as_deref())
        .unwrap_or("-");
    format!(
        "{:<32} {:<12} {:<10} {:<8} {started}",
        r.session_id,
        r.tool_name,
        r.member_role.as_deref().unwrap_or("-"),
        state,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_line_states() {
        let mut r = SessionRecord::new("s1", "build");
        assert!(summary_line(&r).contains("running"));
        r.merge_post("2026-01-01T00:00:00Z".into(), 3);
        let line = summary_line(&r);
        assert!(line.contains("exit 3"));
        assert!(line.contains("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn listed_stems_resolve_for_digested_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        vybe_store::put_json(&store, "a/b c", &SessionRecord::new("a/b c", "build")).unwrap();
        let stems = store.stems().unwrap();
        assert_eq!(stems.len(), 1);
        assert!(stems[0].starts_with('~'));
        let record = read_stem(&store, &stems[0]).unwrap().unwrap();
        assert_eq!(record.session_id, "a/b c");
    }
}
