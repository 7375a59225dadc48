//! Small filesystem helpers shared by the bugsnarf crates: atomic JSON
//! persistence for the tracker configuration and path-segment sanitizing
//! for the new-bug marker store.

pub mod atomic_io;
pub mod path_utils;

pub use atomic_io::{write_json_atomic, write_text_atomic};
pub use path_utils::sanitize_path_segment;
