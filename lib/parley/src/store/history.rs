use hashbrown::HashMap;
use murmur::logging;
use murmur::time;
use parking_lot::Mutex;
use serde_derive::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One retained message: sender, short local timestamp, text. Serializes as
/// a three-element array both on the wire and on disk.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryEntry(pub String, pub String, pub String);

/// A canonicalized unordered username pair, or the empty pair for the
/// broadcast stream.
type ConversationKey = (String, String);

/// Persistent conversation-key -> message-list store backed by
/// `history.dat`.
pub struct HistoryStore {
    history: Mutex<HashMap<ConversationKey, Vec<HistoryEntry>>>,
    path: PathBuf,
    log: logging::Logger,
}

impl HistoryStore {
    /// Opens the store under `dir`. A missing or undecodable file yields an
    /// empty store.
    pub fn open<P: AsRef<Path>>(dir: P, log: &logging::Logger) -> HistoryStore {
        let path = dir.as_ref().join("history.dat");
        let log = log.new(logging::o!("store" => "history"));

        let history = match serdeconv::from_msgpack_file(&path) {
            Ok(history) => history,
            Err(_) => {
                logging::warn!(log, "starting with an empty history store";
                               "path" => %path.display());
                HashMap::new()
            }
        };

        HistoryStore {
            history: Mutex::new(history),
            path,
            log,
        }
    }

    /// Appends a message under the canonical conversation key and persists
    /// the store. The mutex spans both the mutation and the disk write so
    /// readers never observe a partially written generation.
    pub fn append(&self, sender: &str, receiver: &str, text: &str) {
        let mut history = self.history.lock();

        let key = Self::conversation_key(&history, sender, receiver);
        let entry = HistoryEntry(sender.to_string(), time::short_stamp(), text.to_string());

        history.entry(key).or_insert_with(Vec::new).push(entry);

        self.save(&history);
    }

    /// Entries for the conversation in insertion order; empty when the pair
    /// has never spoken. Never creates an entry.
    pub fn get(&self, sender: &str, receiver: &str) -> Vec<HistoryEntry> {
        let history = self.history.lock();

        let key = Self::conversation_key(&history, sender, receiver);

        history.get(&key).cloned().unwrap_or_default()
    }

    /// Broadcasts live under the empty pair. Direct conversations reuse
    /// whichever ordering of the pair was stored first; otherwise the
    /// incoming order wins.
    fn conversation_key(
        history: &HashMap<ConversationKey, Vec<HistoryEntry>>,
        sender: &str,
        receiver: &str,
    ) -> ConversationKey {
        if receiver.is_empty() {
            return (String::new(), String::new());
        }

        let reversed = (receiver.to_string(), sender.to_string());
        if history.contains_key(&reversed) {
            reversed
        } else {
            (sender.to_string(), receiver.to_string())
        }
    }

    /// Rewrites the backing file. Callers hold the store mutex.
    fn save(&self, history: &HashMap<ConversationKey, Vec<HistoryEntry>>) {
        if let Err(err) = serdeconv::to_msgpack_file(history, &self.path) {
            logging::error!(self.log, "history store write failed";
                            "path" => %self.path.display(), "error" => %err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discard_log() -> logging::Logger {
        logging::Logger::root(logging::Discard, logging::o!())
    }

    fn open_store(dir: &tempfile::TempDir) -> HistoryStore {
        HistoryStore::open(dir.path(), &discard_log())
    }

    #[test]
    fn test_append_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.append("alice", "bob", "hi");
        store.append("bob", "alice", "hello");

        let entries = store.get("alice", "bob");

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "alice");
        assert_eq!(entries[0].2, "hi");
        assert_eq!(entries[1].0, "bob");
        assert_eq!(entries[1].2, "hello");
    }

    #[test]
    fn test_pairing_is_symmetric() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.append("alice", "bob", "hi");

        assert_eq!(store.get("alice", "bob"), store.get("bob", "alice"));
        assert_eq!(store.get("bob", "alice").len(), 1);
    }

    #[test]
    fn test_first_seen_ordering_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        // bob speaks first, so the stored key is (bob, alice); alice's later
        // messages must land in the same list.
        store.append("bob", "alice", "one");
        store.append("alice", "bob", "two");
        store.append("bob", "alice", "three");

        let entries = store.get("alice", "bob");

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].0, "alice");
    }

    #[test]
    fn test_broadcast_key_is_the_empty_pair() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.append("alice", "", "to everyone");
        store.append("bob", "", "me too");

        let entries = store.get("carol", "");

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "alice");
        assert_eq!(entries[1].0, "bob");
    }

    #[test]
    fn test_get_does_not_create_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        assert!(store.get("alice", "bob").is_empty());

        store.append("alice", "bob", "hi");

        assert!(store.get("alice", "carol").is_empty());
        assert_eq!(store.get("alice", "bob").len(), 1);
    }

    #[test]
    fn test_entries_carry_short_stamps() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.append("alice", "bob", "hi");

        let stamp = &store.get("alice", "bob")[0].1;

        assert_eq!(stamp.len(), 11);
        assert_eq!(&stamp[2..3], "/");
        assert_eq!(&stamp[8..9], ":");
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = open_store(&dir);
            store.append("alice", "bob", "hi");
            store.append("carol", "", "everyone");
        }

        let store = open_store(&dir);

        assert_eq!(store.get("bob", "alice").len(), 1);
        assert_eq!(store.get("", "").len(), 1);
    }
}
