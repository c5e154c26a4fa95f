//! Streaming UTF-8 decoding.
//!
//! PTY reads can split a multi-byte sequence across buffer boundaries, so
//! the decoder keeps the trailing partial sequence and prepends it to the
//! next chunk. Invalid bytes decode to U+FFFD.

/// A UTF-8 decoder that tolerates partial sequences at buffer boundaries.
#[derive(Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk, carrying any trailing incomplete sequence over to the
    /// next call.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut buffer = std::mem::take(&mut self.pending);
        buffer.extend_from_slice(bytes);

        let mut output = String::with_capacity(buffer.len());
        let mut rest = buffer.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    output.push_str(valid);
                    return output;
                }
                Err(error) => {
                    let (valid, invalid) = rest.split_at(error.valid_up_to());
                    // SAFETY-free: valid_up_to guarantees this slice parses.
                    output.push_str(std::str::from_utf8(valid).unwrap_or(""));
                    match error.error_len() {
                        Some(len) => {
                            output.push(char::REPLACEMENT_CHARACTER);
                            rest = &invalid[len..];
                        }
                        None => {
                            // Incomplete trailing sequence: hold it back.
                            self.pending = invalid.to_vec();
                            return output;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ascii() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"hello"), "hello");
    }

    #[test]
    fn test_split_sequence() {
        let mut decoder = Utf8StreamDecoder::new();
        let euro = "\u{20ac}".as_bytes();
        assert_eq!(decoder.decode(&euro[..1]), "");
        assert_eq!(decoder.decode(&euro[1..]), "\u{20ac}");
    }

    #[test]
    fn test_split_four_byte_sequence() {
        let mut decoder = Utf8StreamDecoder::new();
        let hwair = "\u{10348}".as_bytes();
        assert_eq!(decoder.decode(&hwair[..2]), "");
        assert_eq!(decoder.decode(&hwair[2..3]), "");
        assert_eq!(decoder.decode(&hwair[3..]), "\u{10348}");
    }

    #[test]
    fn test_invalid_byte_replaced() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{fffd}b");
    }
}
