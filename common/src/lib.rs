#![deny(missing_docs)]

//! Code shared between the emulated systems: hex helpers, rom hashing and battery backed storage.

pub mod storage;

pub use storage::{PersistentStorage, StorageError};

/// Convert a single hex digit into its value. Returns None for anything that is not a hex digit.
pub fn hex_value(d: char) -> Option<u8> {
    match d {
        '0'..='9' => Some(d as u8 - b'0'),
        'A'..='F' => Some(d as u8 - b'A' + 10),
        'a'..='f' => Some(d as u8 - b'a' + 10),
        _ => None,
    }
}

/// Returns true when every character of the string is a hex digit.
pub fn all_hex(s: &str) -> bool {
    s.chars().all(|c| hex_value(c).is_some())
}

/// Calculate the sha256 of a chunk of data, and return it in a hex encoded string.
pub fn calc_sha256(data: &[u8]) -> String {
    let mut context = ring::digest::Context::new(&ring::digest::SHA256);
    context.update(data);
    let digest = context.finish();
    data_encoding::HEXLOWER.encode(digest.as_ref())
}
