//! Persistent server-side state: the credential store and the per
//! conversation chat history. Each store owns a single mutex and rewrites
//! its backing file under that mutex on every mutation.

pub mod history;
pub mod users;
