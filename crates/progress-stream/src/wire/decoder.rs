use std::borrow::Cow;

use tracing::debug;

/// Decodes `chunk` prefixed by the bytes carried over from the previous call.
///
/// Returns the decoded text plus the new carry: the 0-3 trailing bytes of a
/// multi-byte sequence that this chunk did not complete. Invalid sequences in
/// the middle of the input are replaced with U+FFFD instead of failing.
pub fn decode_chunk(chunk: &[u8], carry: &[u8]) -> (String, Vec<u8>) {
    let joined: Cow<'_, [u8]> = if carry.is_empty() {
        Cow::Borrowed(chunk)
    } else {
        let mut bytes = Vec::with_capacity(carry.len() + chunk.len());
        bytes.extend_from_slice(carry);
        bytes.extend_from_slice(chunk);
        Cow::Owned(bytes)
    };

    let mut text = String::with_capacity(joined.len());
    let mut rest: &[u8] = &joined;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                text.push_str(valid);
                return (text, Vec::new());
            }
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&rest[..valid_up_to]));
                match err.error_len() {
                    Some(invalid_len) => {
                        debug!(invalid_len, "replacing invalid UTF-8 sequence");
                        text.push(char::REPLACEMENT_CHARACTER);
                        rest = &rest[valid_up_to + invalid_len..];
                    }
                    // Incomplete sequence at the end of the input: hold it back.
                    None => return (text, rest[valid_up_to..].to_vec()),
                }
            }
        }
    }
}

/// Stateful wrapper around [`decode_chunk`] that owns the carry bytes.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    /// Decodes the next chunk, keeping an incomplete trailing sequence for
    /// the following call.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let (text, carry) = decode_chunk(chunk, &self.carry);
        self.carry = carry;
        text
    }

    /// Bytes currently held back waiting for the rest of a character.
    pub fn pending(&self) -> &[u8] {
        &self.carry
    }

    /// Flushes leftover carry bytes at end of input.
    ///
    /// A truncated sequence can never be completed at this point, so it is
    /// decoded lossily (as U+FFFD).
    pub fn finish(&mut self) -> String {
        if self.carry.is_empty() {
            return String::new();
        }
        let carry = std::mem::take(&mut self.carry);
        debug!(bytes = carry.len(), "stream ended inside a multi-byte sequence");
        String::from_utf8_lossy(&carry).into_owned()
    }
}
