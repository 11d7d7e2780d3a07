use std::path::Path;

use tokio::{
    fs::File,
    io::{self, AsyncWriteExt},
};

const STORE_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// Converts a store key into a file name that is valid on every platform. Log type names are
/// user-provided, so everything except lowercase ASCII letters, digits, `-`, `_` and space is
/// percent-encoded byte by byte.
///
/// Uppercase letters are encoded too. File systems of macOS and Windows ignore case, and keys
/// differing only by case must still map to different files.
pub fn key_to_file_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + STORE_EXTENSION.len() + 1);
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b' ' => name.push(byte as char),
            _ => name.push_str(&format!("%{byte:02X}")),
        }
    }
    name.push('.');
    name.push_str(STORE_EXTENSION);
    name
}

/// Reverse of [key_to_file_name]. Returns `None` for files that don't belong to the store.
pub fn file_name_to_key(file_name: &str) -> Option<String> {
    let encoded = file_name.strip_suffix(&format!(".{STORE_EXTENSION}"))?;
    let mut bytes = Vec::with_capacity(encoded.len());
    let mut iter = encoded.bytes();
    while let Some(byte) = iter.next() {
        if byte == b'%' {
            let high = iter.next()?;
            let low = iter.next()?;
            let hex = [high, low];
            let hex = std::str::from_utf8(&hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
        } else {
            bytes.push(byte);
        }
    }
    String::from_utf8(bytes).ok()
}

/// Writes `contents` next to `path` first and renames the result over `path`, so readers never
/// observe a half written value.
pub async fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), io::Error> {
    let temp_path = path.with_extension(TEMP_EXTENSION);
    let mut file = File::create(&temp_path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&temp_path, path).await
}
