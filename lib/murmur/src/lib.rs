//! Shared infrastructure for the parley chat relay: structured logging,
//! the frame obfuscation keystream and clock helpers.

pub mod logging;
pub mod obfuscate;
pub mod time;

mod util;
