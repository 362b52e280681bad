use crate::wire::frame::Framed;
use crate::wire::message::Event;
use crate::wire::support::WireResult;
use hashbrown::HashMap;
use murmur::logging;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;

/// Registry-resident half of a connected client: the remote address, the
/// shared write side of the socket and the pending file-offer slot.
pub struct Peer {
    addr: SocketAddr,
    framed: Framed,
    file_peer: Mutex<String>,
}

impl Peer {
    #[inline]
    pub fn new(addr: SocketAddr, framed: Framed) -> Arc<Peer> {
        Arc::new(Peer {
            addr,
            framed,
            file_peer: Mutex::new(String::new()),
        })
    }

    /// IP of the remote end, handed to file-transfer counterparties.
    #[inline]
    pub fn ip(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Records `username` as the sender of the file offer this peer now
    /// holds. A later offer overwrites an unanswered one.
    #[inline]
    pub fn set_file_peer(&self, username: &str) {
        *self.file_peer.lock() = username.to_string();
    }

    /// Clears the offer slot iff it currently holds `expected`; returns
    /// whether it matched. Stale or unsolicited responses leave the slot
    /// untouched and are dropped by the caller.
    pub fn clear_file_peer_if(&self, expected: &str) -> bool {
        let mut slot = self.file_peer.lock();

        if *slot == expected {
            slot.clear();
            true
        } else {
            false
        }
    }

    /// Writes one event on this peer's socket.
    #[inline]
    pub fn send(&self, event: &Event) -> WireResult<()> {
        self.framed.send(event)
    }
}

/// Process-wide map of authenticated usernames to their peer handles.
///
/// Every operation, fan-out sends included, runs under the registry mutex,
/// so all observers see presence events and broadcasts in one total order.
/// A slow recipient momentarily blocks the registry; that trade is accepted
/// for the ordering guarantee.
pub struct Registry {
    clients: Mutex<HashMap<String, Arc<Peer>>>,
    log: logging::Logger,
}

impl Registry {
    pub fn new(log: &logging::Logger) -> Registry {
        Registry {
            clients: Mutex::new(HashMap::new()),
            log: log.new(logging::o!()),
        }
    }

    /// Inserts the peer unless the username is already registered. Each
    /// username maps to at most one live session.
    pub fn insert(&self, username: &str, peer: Arc<Peer>) -> bool {
        let mut clients = self.clients.lock();

        if clients.contains_key(username) {
            return false;
        }

        clients.insert(username.to_string(), peer);
        true
    }

    /// Removes the entry; true when it was present.
    pub fn remove(&self, username: &str) -> bool {
        self.clients.lock().remove(username).is_some()
    }

    /// Usernames currently registered, `exclude` excepted.
    pub fn roster(&self, exclude: &str) -> Vec<String> {
        let clients = self.clients.lock();

        clients
            .keys()
            .filter(|username| username.as_str() != exclude)
            .cloned()
            .collect()
    }

    /// Runs `op` on the named peer's handle under the registry mutex.
    /// `None` when the user is not connected.
    pub fn with_peer<R>(&self, username: &str, op: impl FnOnce(&Peer) -> R) -> Option<R> {
        let clients = self.clients.lock();

        clients.get(username).map(|peer| op(peer))
    }

    /// Sends the event to every registered session, `exclude` excepted.
    /// Individual send failures are logged and skipped; a dying peer is
    /// reaped by its own worker.
    pub fn fan_out(&self, event: &Event, exclude: Option<&str>) {
        let clients = self.clients.lock();

        for (username, peer) in clients.iter() {
            if exclude == Some(username.as_str()) {
                continue;
            }

            if let Err(err) = peer.send(event) {
                logging::debug!(self.log, "fan-out send failed";
                                "peer" => username.as_str(), "error" => ?err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::net::{TcpListener, TcpStream};

    fn discard_log() -> logging::Logger {
        logging::Logger::root(logging::Discard, logging::o!())
    }

    /// A connected (server-side peer, client-side framed) pair.
    fn peer_pair() -> (Arc<Peer>, Framed) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let client = TcpStream::connect(addr).unwrap();
        let (server, server_addr) = listener.accept().unwrap();

        (
            Peer::new(server_addr, Framed::new(server)),
            Framed::new(client),
        )
    }

    #[test]
    fn test_insert_is_unique_per_username() {
        let registry = Registry::new(&discard_log());
        let (first, _first_client) = peer_pair();
        let (second, _second_client) = peer_pair();

        assert!(registry.insert("alice", first));
        assert!(!registry.insert("alice", second));

        assert!(registry.remove("alice"));
        assert!(!registry.remove("alice"));
    }

    #[test]
    fn test_roster_excludes_requester() {
        let registry = Registry::new(&discard_log());
        let (alice, _ac) = peer_pair();
        let (bob, _bc) = peer_pair();

        registry.insert("alice", alice);
        registry.insert("bob", bob);

        let mut roster = registry.roster("alice");
        roster.sort();

        assert_eq!(roster, vec!["bob".to_string()]);
        assert_eq!(registry.roster("carol").len(), 2);
    }

    #[test]
    fn test_fan_out_reaches_everyone_but_excluded() {
        let registry = Registry::new(&discard_log());
        let (alice, alice_client) = peer_pair();
        let (bob, bob_client) = peer_pair();

        registry.insert("alice", alice);
        registry.insert("bob", bob);

        registry.fan_out(
            &Event::BroadcastMessage {
                peer: "alice".to_string(),
                message: "hello".to_string(),
            },
            Some("alice"),
        );
        registry.fan_out(
            &Event::PeerLeft {
                peer: "carol".to_string(),
            },
            None,
        );

        // Bob sees both events in fan-out order.
        let first: Value = bob_client.recv().unwrap();
        assert_eq!(first["type"], "broadcast_message");
        let second: Value = bob_client.recv().unwrap();
        assert_eq!(second["type"], "peer_left");

        // Alice was excluded from the broadcast.
        let only: Value = alice_client.recv().unwrap();
        assert_eq!(only["type"], "peer_left");
    }

    #[test]
    fn test_with_peer_on_absent_user() {
        let registry = Registry::new(&discard_log());

        assert!(registry.with_peer("ghost", |_| ()).is_none());
    }

    #[test]
    fn test_file_peer_slot_scoping() {
        let (peer, _client) = peer_pair();

        peer.set_file_peer("alice");

        assert!(!peer.clear_file_peer_if("bob"));
        assert!(peer.clear_file_peer_if("alice"));

        // Cleared: a repeated response no longer matches.
        assert!(!peer.clear_file_peer_if("alice"));
    }
}
