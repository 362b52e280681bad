//! The relay engine behind the parley chat service: the framed wire
//! protocol shared by both ends, the persistent user and history stores,
//! the connected-client registry and the per-connection session workers.

pub mod registry;
pub mod server;
pub mod session;
pub mod store;
pub mod transfer;
pub mod wire;
