//! Project-local context store with atomic writes.
//!
//! All shared state lives under the context directory (`.vybe/context/` by
//! default). Documents are replaced atomically; logs are append-only. There is
//! no locking: concurrent writers to the same document resolve as last writer
//! wins.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Default context directory, relative to the project root.
pub const DEFAULT_CONTEXT_DIR: &str = ".vybe/context";

// ── Layout ──

/// Resolved locations inside a context directory.
#[derive(Debug, Clone)]
pub struct ContextPaths {
    pub root: PathBuf,
}

impl ContextPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub fn conflicts_dir(&self) -> PathBuf {
        self.root.join("conflicts")
    }

    pub fn members_dir(&self) -> PathBuf {
        self.root.join("members")
    }

    pub fn precompact_dir(&self) -> PathBuf {
        self.root.join("precompact")
    }

    /// Global append-only session log.
    pub fn session_log(&self) -> PathBuf {
        self.root.join("session.log")
    }

    /// Per-role append-only audit log.
    pub fn member_log(&self, role: &str) -> PathBuf {
        self.members_dir().join(format!("{}.log", file_key(role)))
    }

    /// Ensure the context root and its subdirectories exist.
    pub fn ensure_dirs(&self) -> anyhow::Result<()> {
        for dir in [
            self.root.clone(),
            self.sessions_dir(),
            self.conflicts_dir(),
            self.members_dir(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

const DIGEST_PREFIX: char = '~';

/// Map a logical key to a file stem.
///
/// Filename-safe keys (ASCII alphanumerics, `-`, `_`, `.`, not starting with
/// `.`) are used as-is; anything else becomes `~` plus a 32-char blake3 hex
/// digest. `~` never appears in a safe key, so the two forms cannot collide.
pub fn file_key(key: &str) -> String {
    let safe = !key.is_empty()
        && key.len() <= 128
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if safe {
        key.to_string()
    } else {
        format!("{DIGEST_PREFIX}{}", &blake3::hash(key.as_bytes()).to_hex()[..32])
    }
}

// ── Atomic write / append ──

/// Atomic write: write to temp file in same dir, then rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// Append one line to a log file, creating it (and its parent) if needed.
pub fn append_line(path: &Path, line: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

// ── Key-value store ──

/// Document store keyed by logical name.
///
/// `atomic_put` must replace the value in one step: a concurrent `get`
/// observes either the old value or the new one, never a partial write.
pub trait KvStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn atomic_put(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;
}

/// Read and deserialize a JSON document. Missing key → `Ok(None)`.
pub fn get_json<T, S>(store: &S, key: &str) -> anyhow::Result<Option<T>>
where
    T: serde::de::DeserializeOwned,
    S: KvStore + ?Sized,
{
    match store.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Serialize and atomically store a JSON document.
pub fn put_json<T, S>(store: &S, key: &str, value: &T) -> anyhow::Result<()>
where
    T: serde::Serialize,
    S: KvStore + ?Sized,
{
    let data = serde_json::to_vec_pretty(value)?;
    store.atomic_put(key, &data)
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_key(key)))
    }

    /// File stems currently stored. A stem equals its key unless the key was
    /// digested; read stems back with [`FileStore::get_stem`].
    pub fn stems(&self) -> anyhow::Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut stems: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_suffix(".json").map(String::from)
            })
            .collect();
        stems.sort();
        Ok(stems)
    }

    pub fn get_stem(&self, stem: &str) -> anyhow::Result<Option<Vec<u8>>> {
        read_optional(&self.dir.join(format!("{stem}.json")))
    }
}

fn read_optional(path: &Path) -> anyhow::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        read_optional(&self.path_for(key))
    }

    fn atomic_put(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        write_atomic(&self.path_for(key), value)
    }
}

/// In-process store, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn atomic_put(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_key_passes_safe_names() {
        assert_eq!(file_key("s1"), "s1");
        assert_eq!(file_key("dev-1"), "dev-1");
        assert_eq!(file_key("abc_DEF.2"), "abc_DEF.2");
    }

    #[test]
    fn file_key_hashes_unsafe_names() {
        for raw in ["../etc/passwd", "a/b", "", ".hidden", "sp ace"] {
            let k = file_key(raw);
            let hex = k.strip_prefix('~').unwrap();
            assert_eq!(hex.len(), 32, "{raw}");
            assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        }
        assert_eq!(file_key("a/b"), file_key("a/b"));
        assert_ne!(file_key("a/b"), file_key("a/c"));
    }

    #[test]
    fn write_atomic_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("test.txt");
        write_atomic(&path, b"hello world").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello world");
        write_atomic(&path, b"replaced").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "replaced");
    }

    #[test]
    fn write_atomic_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("doc.json");
        for i in 0..5 {
            write_atomic(&path, format!("{i}").as_bytes()).unwrap();
        }
        let count = fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(count, 1);
    }

    #[test]
    fn append_line_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("logs").join("dev-1.log");
        append_line(&path, "first").unwrap();
        append_line(&path, "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn file_store_get_missing_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path().join("sessions"));
        assert!(store.get("nope").unwrap().is_none());
        assert!(store.stems().unwrap().is_empty());
    }

    #[test]
    fn file_store_json_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        put_json(&store, "s1", &serde_json::json!({"a": 1})).unwrap();
        let v: serde_json::Value = get_json(&store, "s1").unwrap().unwrap();
        assert_eq!(v["a"], 1);
        assert!(store.path_for("s1").ends_with("s1.json"));
        assert_eq!(store.stems().unwrap(), vec!["s1".to_string()]);
    }

    #[test]
    fn digest_keys_never_shadow_hex_ids() {
        let unsafe_id = "team/session 7";
        let digest = file_key(unsafe_id);
        // A session id that happens to be the bare hex digest stays distinct.
        let hex_id = digest.trim_start_matches('~').to_string();
        assert_eq!(file_key(&hex_id), hex_id);
        assert_ne!(file_key(&hex_id), digest);

        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        store.atomic_put(unsafe_id, b"unsafe").unwrap();
        store.atomic_put(&hex_id, b"hex").unwrap();
        assert_eq!(store.get(unsafe_id).unwrap().unwrap(), b"unsafe");
        assert_eq!(store.get(&hex_id).unwrap().unwrap(), b"hex");
        assert_eq!(store.stems().unwrap().len(), 2);
        assert_eq!(store.get_stem(&digest).unwrap().unwrap(), b"unsafe");
    }

    #[test]
    fn memory_store_behaves_like_file_store() {
        let store = MemoryStore::new();
        assert!(store.get("k").unwrap().is_none());
        store.atomic_put("k", b"v1").unwrap();
        store.atomic_put("k", b"v2").unwrap();
        assert_eq!(store.get("k").unwrap().unwrap(), b"v2");
    }

    #[test]
    fn context_paths_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = ContextPaths::new(tmp.path().join(".vybe").join("context"));
        paths.ensure_dirs().unwrap();
        assert!(paths.sessions_dir().is_dir());
        assert!(paths.conflicts_dir().is_dir());
        assert!(paths.members_dir().is_dir());
        assert!(paths.member_log("dev-2").ends_with("members/dev-2.log"));
        assert!(paths.session_log().ends_with("session.log"));
    }
}
