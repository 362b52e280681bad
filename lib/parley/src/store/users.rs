use hashbrown::HashMap;
use murmur::logging;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long `register` waits for the store mutex before giving up.
const LOCK_DEADLINE: Duration = Duration::from_secs(5);

/// Persistent username -> password credential store.
///
/// Passwords are compared verbatim and persisted as given; the on-disk form
/// is a MessagePack map rewritten on every mutation.
pub struct UserStore {
    users: Mutex<HashMap<String, String>>,
    path: PathBuf,
    log: logging::Logger,
}

impl UserStore {
    /// Opens the store backed by `users.dat` under `dir`. A missing or
    /// undecodable file yields an empty store.
    pub fn open<P: AsRef<Path>>(dir: P, log: &logging::Logger) -> UserStore {
        let path = dir.as_ref().join("users.dat");
        let log = log.new(logging::o!("store" => "users"));

        let users = match serdeconv::from_msgpack_file(&path) {
            Ok(users) => users,
            Err(_) => {
                logging::warn!(log, "starting with an empty user store";
                               "path" => %path.display());
                HashMap::new()
            }
        };

        UserStore {
            users: Mutex::new(users),
            path,
            log,
        }
    }

    /// Registers a new user and persists the store. Returns false when the
    /// username is taken or the store mutex could not be acquired in time.
    pub fn register(&self, username: &str, password: &str) -> bool {
        let mut users = match self.users.try_lock_for(LOCK_DEADLINE) {
            Some(users) => users,
            None => {
                logging::error!(self.log, "store lock deadline exceeded"; "op" => "register");
                return false;
            }
        };

        if users.contains_key(username) {
            return false;
        }

        users.insert(username.to_string(), password.to_string());
        self.save(&users);
        true
    }

    /// True iff an entry exists and its password matches exactly.
    pub fn validate(&self, username: &str, password: &str) -> bool {
        let users = self.users.lock();
        users.get(username).map_or(false, |stored| stored == password)
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.users.lock().len()
    }

    /// Rewrites the backing file from the in-memory map. Callers hold the
    /// store mutex; a disk failure leaves the in-memory state authoritative.
    fn save(&self, users: &HashMap<String, String>) {
        if let Err(err) = serdeconv::to_msgpack_file(users, &self.path) {
            logging::error!(self.log, "user store write failed";
                            "path" => %self.path.display(), "error" => %err);
        }
    }
}
