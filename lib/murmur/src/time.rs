use chrono::Local;

/// Short local-time stamp in the `MM/DD HH:MM` form retained alongside
/// chat history entries.
#[inline]
pub fn short_stamp() -> String {
    Local::now().format("%m/%d %H:%M").to_string()
}
