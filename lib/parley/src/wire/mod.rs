//! The wire modules handle framing, payload obfuscation and the structured
//! message documents exchanged between clients and the relay.

pub mod frame;
pub mod message;
pub mod support;
