use crate::registry::Registry;
use crate::session::{RelayCtx, Session};
use crate::store::history::HistoryStore;
use crate::store::users::UserStore;
use murmur::logging;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// The relay server: owns the listening socket and the shared context, and
/// spawns one worker thread per accepted connection.
pub struct Relay {
    listener: TcpListener,
    ctx: Arc<RelayCtx>,
    shutdown: Arc<AtomicBool>,
    log: logging::Logger,
}

impl Relay {
    /// Binds the relay on `address` and opens the stores under
    /// `storage_dir`.
    pub fn bind<P: AsRef<Path>>(
        address: &str,
        storage_dir: P,
        log: &logging::Logger,
    ) -> io::Result<Relay> {
        let listener = TcpListener::bind(address)?;
        let log = log.new(logging::o!());
        let storage_dir = storage_dir.as_ref();

        let ctx = Arc::new(RelayCtx {
            registry: Registry::new(&log),
            users: UserStore::open(storage_dir, &log),
            history: HistoryStore::open(storage_dir, &log),
        });

        Ok(Relay {
            listener,
            ctx,
            shutdown: Arc::new(AtomicBool::new(false)),
            log,
        })
    }

    /// Address the relay actually bound; useful when binding port 0.
    #[inline]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle for requesting shutdown from another thread or a signal
    /// handler.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: self.shutdown.clone(),
            addr: self
                .listener
                .local_addr()
                .expect("Listener must have a local address"),
        }
    }

    /// Accept loop. Every connection gets an independent worker thread that
    /// owns its session until the connection dies. Returns once the
    /// shutdown flag is observed; in-flight workers keep running and exit
    /// on their next read error.
    pub fn run(&self) -> io::Result<()> {
        let address = self.local_addr()?;
        logging::info!(self.log, "relay listening"; "address" => %address);

        for incoming in self.listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let stream = match incoming {
                Ok(stream) => stream,
                Err(err) => {
                    logging::warn!(self.log, "accept failed"; "error" => %err);
                    continue;
                }
            };

            let addr = match stream.peer_addr() {
                Ok(addr) => addr,
                Err(err) => {
                    logging::warn!(self.log, "connection vanished before setup"; "error" => %err);
                    continue;
                }
            };

            let ctx = self.ctx.clone();
            let log = self.log.clone();
            let worker = thread::Builder::new()
                .name(format!("session-{}", addr))
                .spawn(move || Session::new(ctx, stream, addr, &log).run());

            if let Err(err) = worker {
                logging::error!(self.log, "worker spawn failed"; "error" => %err);
            }
        }

        logging::info!(self.log, "relay stopped accepting");
        Ok(())
    }
}

/// Raises the relay's shutdown flag and unblocks the accept loop. Safe to
/// trigger from a signal handler thread.
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl ShutdownHandle {
    /// Requests shutdown: sets the flag, then pokes the listener with a
    /// throwaway connection so a blocked accept observes it.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);

        let mut poke = self.addr;
        if poke.ip().is_unspecified() {
            poke.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
        }

        drop(TcpStream::connect_timeout(&poke, Duration::from_secs(1)));
    }
}
