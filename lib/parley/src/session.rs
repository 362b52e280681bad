use crate::registry::{Peer, Registry};
use crate::store::history::HistoryStore;
use crate::store::users::UserStore;
use crate::wire::frame::Framed;
use crate::wire::message::{Command, Event};
use crate::wire::support::WireError;
use murmur::{choose, logging};
use serde_json::Value;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;

/// Shared server-side state handed to every session worker.
pub struct RelayCtx {
    pub registry: Registry,
    pub users: UserStore,
    pub history: HistoryStore,
}

/// Per-connection state machine. One worker thread owns the session for the
/// lifetime of its connection; the write half of the socket also lives in
/// the registry once the session authenticates, so fan-out paths can reach
/// it.
pub struct Session {
    ctx: Arc<RelayCtx>,
    peer: Arc<Peer>,
    framed: Framed,
    username: String,
    authed: bool,
    log: logging::Logger,
}

impl Session {
    pub fn new(
        ctx: Arc<RelayCtx>,
        stream: TcpStream,
        addr: SocketAddr,
        log: &logging::Logger,
    ) -> Session {
        let framed = Framed::new(stream);
        let peer = Peer::new(addr, framed.clone());

        Session {
            ctx,
            peer,
            framed,
            username: String::new(),
            authed: false,
            log: log.new(logging::o!("addr" => addr.to_string())),
        }
    }

    /// Drives the connection to completion: frame loop, dispatch, teardown.
    /// Frame-level failures terminate the session; command-level failures
    /// are logged and survived.
    pub fn run(mut self) {
        logging::info!(self.log, "connection accepted");

        loop {
            let document = match self.framed.recv::<Value>() {
                Ok(document) => document,
                Err(WireError::Closed) => {
                    logging::info!(self.log, "connection closed by client");
                    break;
                }
                Err(err) => {
                    logging::warn!(self.log, "terminating session on receive failure";
                                   "error" => ?err);
                    break;
                }
            };

            logging::debug!(self.log, "frame received";
                            "command" => Command::claimed_name(&document));

            let command = match Command::parse(document) {
                Some(command) => command,
                None => {
                    logging::warn!(self.log, "unknown or malformed command ignored";
                                   "user" => self.username.as_str());
                    continue;
                }
            };

            let closing = if self.authed {
                self.dispatch_authed(command)
            } else {
                self.dispatch_unauthed(command)
            };

            if closing {
                break;
            }
        }

        self.finish();
    }

    /// Commands accepted before authentication. Everything else is noise.
    fn dispatch_unauthed(&mut self, command: Command) -> bool {
        match command {
            Command::Login { username, password } => self.handle_login(username, password),
            Command::Register { username, password } => self.handle_register(username, password),
            other => {
                logging::warn!(self.log, "command requires authentication";
                               "command" => other.name());
            }
        }

        false
    }

    /// Commands accepted once authenticated. `close` is the only one that
    /// ends the session.
    fn dispatch_authed(&mut self, command: Command) -> bool {
        match command {
            Command::GetUsers => self.handle_get_users(),
            Command::GetHistory { peer } => self.handle_get_history(peer),
            Command::Chat { peer, message } => self.handle_chat(peer, message),
            Command::FileRequest {
                peer,
                filename,
                size,
                md5,
            } => self.handle_file_request(peer, filename, size, md5),
            Command::FileResponse { peer, response } => self.handle_file_response(peer, response),
            Command::Close => {
                logging::info!(self.log, "close requested"; "user" => self.username.as_str());
                return true;
            }
            other => {
                logging::warn!(self.log, "command not valid after authentication";
                               "command" => other.name(), "user" => self.username.as_str());
            }
        }

        false
    }

    fn handle_login(&mut self, username: String, password: String) {
        if !self.ctx.users.validate(&username, &password) {
            logging::info!(self.log, "login rejected"; "user" => username.as_str());
            self.reply(&Event::LoginResult {
                username,
                response: "fail".to_string(),
                reason: Some("Incorrect username or password!".to_string()),
            });
            return;
        }

        // One live session per username: a second login for a connected
        // name is refused outright rather than displacing the first.
        if !self.ctx.registry.insert(&username, self.peer.clone()) {
            logging::warn!(self.log, "login rejected, name already connected";
                           "user" => username.as_str());
            self.reply(&Event::LoginResult {
                username,
                response: "fail".to_string(),
                reason: Some("User already logged in!".to_string()),
            });
            return;
        }

        self.username = username;
        self.authed = true;

        logging::info!(self.log, "login accepted"; "user" => self.username.as_str());

        self.reply(&Event::LoginResult {
            username: self.username.clone(),
            response: "ok".to_string(),
            reason: None,
        });

        // Everyone hears about the arrival, the newcomer included.
        self.ctx.registry.fan_out(
            &Event::PeerJoined {
                peer: self.username.clone(),
            },
            None,
        );
    }

    fn handle_register(&mut self, username: String, password: String) {
        let registered = !username.is_empty() && self.ctx.users.register(&username, &password);

        logging::debug!(self.log, "registration processed";
                        "user" => username.as_str(), "ok" => registered);

        let reason = if registered {
            None
        } else if username.is_empty() {
            Some("Invalid username!".to_string())
        } else {
            Some("Username already exists!".to_string())
        };

        self.reply(&Event::RegisterResult {
            username,
            response: choose!(registered => "ok", "fail").to_string(),
            reason,
        });
    }

    fn handle_get_users(&self) {
        let data = self.ctx.registry.roster(&self.username);
        self.reply(&Event::GetUsers { data });
    }

    fn handle_get_history(&self, peer: String) {
        let data = self.ctx.history.get(&self.username, &peer);
        self.reply(&Event::GetHistory { peer, data });
    }

    fn handle_chat(&self, peer: String, message: String) {
        if peer.is_empty() {
            // The sender keeps their own local copy; only the others hear it.
            self.ctx.registry.fan_out(
                &Event::BroadcastMessage {
                    peer: self.username.clone(),
                    message: message.clone(),
                },
                Some(&self.username),
            );
        } else {
            let event = Event::PrivateMessage {
                peer: self.username.clone(),
                message: message.clone(),
            };

            // Absent recipients drop the message; history still retains it.
            if self
                .ctx
                .registry
                .with_peer(&peer, |target| target.send(&event))
                .is_none()
            {
                logging::debug!(self.log, "private message to offline peer dropped";
                                "peer" => peer.as_str());
            }
        }

        self.ctx.history.append(&self.username, &peer, &message);
    }

    fn handle_file_request(&self, peer: String, filename: String, size: String, md5: String) {
        let event = Event::FileRequest {
            peer: self.username.clone(),
            filename,
            size,
            md5,
        };

        // Marking the recipient and forwarding happen in one registry
        // critical section, so the offer slot always matches the frame the
        // recipient sees.
        let delivered = self.ctx.registry.with_peer(&peer, |target| {
            target.set_file_peer(&self.username);
            target.send(&event)
        });

        if delivered.is_none() {
            logging::info!(self.log, "file offer to absent peer refused";
                           "user" => self.username.as_str(), "peer" => peer.as_str());
            self.reply(&Event::FileResponse {
                peer: None,
                response: "error".to_string(),
                ip: None,
                reason: Some("Peer not found or not connected".to_string()),
            });
        }
    }

    fn handle_file_response(&self, peer: String, response: String) {
        // Only the response to the offer currently held may pass; anything
        // else is stale or unsolicited and dies here.
        if !self.peer.clear_file_peer_if(&peer) {
            logging::warn!(self.log, "file response without matching offer";
                           "user" => self.username.as_str(), "peer" => peer.as_str());
            return;
        }

        // An accepting responder discloses its IP so the requester can open
        // the direct transfer connection.
        let ip = choose!(response == "accept" => Some(self.peer.ip()), None);

        let event = Event::FileResponse {
            peer: Some(self.username.clone()),
            response,
            ip,
            reason: None,
        };

        drop(self.ctx.registry.with_peer(&peer, |target| target.send(&event)));
    }

    /// Replies on this session's own socket. A failed reply surfaces as a
    /// read error on the next loop iteration, so it is only logged here.
    fn reply(&self, event: &Event) {
        if let Err(err) = self.framed.send(event) {
            logging::warn!(self.log, "reply failed"; "error" => ?err);
        }
    }

    /// Teardown, run exactly once per session: deregister and tell the
    /// remaining sessions the user left.
    fn finish(&mut self) {
        logging::info!(self.log, "client disconnected"; "user" => self.username.as_str());

        if !self.authed {
            return;
        }
        self.authed = false;

        if self.ctx.registry.remove(&self.username) {
            logging::info!(self.log, "removed from connected clients";
                           "user" => self.username.as_str());
        }

        self.ctx.registry.fan_out(
            &Event::PeerLeft {
                peer: self.username.clone(),
            },
            None,
        );
    }
}
