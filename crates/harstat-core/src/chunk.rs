//! Splitting of payload text into bounded pieces.

/// Default upper bound on the characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 40_000;

/// Split `text` into consecutive pieces of `max_len` characters.
///
/// Splits happen on character boundaries only, so a multi-byte code point
/// is never cut in half. Every piece but the last holds exactly `max_len`
/// characters. Empty input yields no pieces; a `max_len` of zero is treated
/// as one.
pub fn chunk(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in text.char_indices() {
        if count == max_len {
            chunks.push(text[start..offset].to_string());
            start = offset;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(text[start..].to_string());
    }
    chunks
}
