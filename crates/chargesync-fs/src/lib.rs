//! Durable file primitives for chargesync
//!
//! Provides atomic whole-file replacement, durable line appends and the
//! canonical checksum format shared by the journal and its confirmation log.

pub mod checksum;
pub mod error;
pub mod io;

pub use checksum::{compute_content_checksum, frame_line, split_line, verify_content_checksum};
pub use error::{Error, Result};
pub use io::{append_line_durable, count_lines, remove_if_exists, write_atomic};
