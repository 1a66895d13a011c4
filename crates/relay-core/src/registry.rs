//! Durable ticket → origin mapping.
//!
//! One JSON object keyed by the string-encoded ticket id, rewritten wholesale
//! on every mutation. A missing or corrupt file reads as empty.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::{error, warn};

use crate::{
    domain::{CommentId, MonitorEntry, TicketId},
    Result,
};

pub type Entries = BTreeMap<TicketId, MonitorEntry>;

/// File-backed monitor registry.
///
/// Read-modify-write sequences run under an internal lock, since monitors
/// mutate the registry from a multi-threaded runtime.
#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Registry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Entries {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read_entries()
    }

    pub fn add(&self, id: TicketId, entry: MonitorEntry) -> Result<()> {
        self.mutate(|entries| {
            entries.insert(id, entry);
            true
        })
        .map(|_| ())
    }

    pub fn remove(&self, id: TicketId) -> Result<()> {
        self.mutate(|entries| entries.remove(&id).is_some())
            .map(|_| ())
    }

    /// Remember the newest comment acted on. Returns `false` if the ticket is
    /// no longer registered.
    pub fn record_last_comment(&self, id: TicketId, comment: CommentId) -> Result<bool> {
        self.mutate(|entries| match entries.get_mut(&id) {
            Some(entry) if entry.last_comment_id != Some(comment) => {
                entry.last_comment_id = Some(comment);
                true
            }
            _ => false,
        })
    }

    /// Apply `f` and persist when it reports a change.
    fn mutate(&self, f: impl FnOnce(&mut Entries) -> bool) -> Result<bool> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.read_entries();
        let changed = f(&mut entries);
        if changed {
            self.write_entries(&entries)?;
        }
        Ok(changed)
    }

    fn read_entries(&self) -> Entries {
        let txt = match fs::read_to_string(&self.path) {
            Ok(txt) => txt,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Entries::new(),
            Err(e) => {
                error!(path = %self.path.display(), "failed to read monitor registry: {e}");
                return Entries::new();
            }
        };
        if txt.trim().is_empty() {
            return Entries::new();
        }

        let raw: BTreeMap<String, MonitorEntry> = match serde_json::from_str(&txt) {
            Ok(v) => v,
            Err(e) => {
                error!(path = %self.path.display(), "failed to parse monitor registry: {e}");
                return Entries::new();
            }
        };

        raw.into_iter()
            .filter_map(|(key, entry)| match key.trim().parse::<u64>() {
                Ok(id) => Some((TicketId(id), entry)),
                Err(_) => {
                    warn!(key = %key, "skipping registry entry with non-numeric ticket id");
                    None
                }
            })
            .collect()
    }

    fn write_entries(&self, entries: &Entries) -> Result<()> {
        let raw: BTreeMap<String, &MonitorEntry> = entries
            .iter()
            .map(|(id, entry)| (id.0.to_string(), entry))
            .collect();
        let txt = serde_json::to_string_pretty(&raw)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, txt)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatId, MessageId, UserId};

    fn entry(chat: i64, msg: i32) -> MonitorEntry {
        MonitorEntry {
            user_id: UserId(7),
            chat_id: ChatId(chat),
            message_id: MessageId(msg),
            last_comment_id: None,
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let reg = Registry::new(dir.path().join("state.json"));
        assert!(reg.load().is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        let reg = Registry::new(&path);
        assert!(reg.load().is_empty());
    }

    #[test]
    fn add_and_remove_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let reg = Registry::new(&path);
        reg.add(TicketId(10), entry(-100, 1)).unwrap();
        reg.add(TicketId(11), entry(-200, 2)).unwrap();
        reg.remove(TicketId(10)).unwrap();

        let reopened = Registry::new(&path);
        let entries = reopened.load();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[&TicketId(11)], entry(-200, 2));
    }

    #[test]
    fn file_uses_string_keys_and_snake_case_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let reg = Registry::new(&path);
        reg.add(TicketId(42), entry(-100, 9)).unwrap();

        let v: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            v,
            serde_json::json!({ "42": { "user_id": 7, "chat_id": -100, "message_id": 9 } })
        );
    }

    #[test]
    fn legacy_file_without_last_comment_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"5": {"user_id": 1, "chat_id": 2, "message_id": 3}, "oops": {"user_id": 1, "chat_id": 2, "message_id": 3}}"#,
        )
        .unwrap();
        let entries = Registry::new(&path).load();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[&TicketId(5)].last_comment_id, None);
    }

    #[test]
    fn last_comment_is_recorded_only_for_registered_tickets() {
        let dir = tempfile::tempdir().unwrap();
        let reg = Registry::new(dir.path().join("state.json"));
        reg.add(TicketId(1), entry(-1, 1)).unwrap();

        assert!(reg.record_last_comment(TicketId(1), CommentId(99)).unwrap());
        assert!(!reg.record_last_comment(TicketId(1), CommentId(99)).unwrap());
        assert!(!reg.record_last_comment(TicketId(2), CommentId(99)).unwrap());
        assert_eq!(
            reg.load()[&TicketId(1)].last_comment_id,
            Some(CommentId(99))
        );
    }
}
