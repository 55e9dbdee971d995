//! # Utility Modules
//!
//! Common helpers used throughout the wmbus-rs crate: hex encoding and
//! decoding for telegram input, and rate-limited logging.

pub mod hex;
pub mod logging;

pub use hex::{decode_hex, encode_hex, format_hex_compact, hex_to_bytes};
pub use logging::{log_frame_hex, LogThrottle};
