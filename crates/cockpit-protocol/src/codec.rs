//! Streaming line framing for the serial link
//!
//! Serial reads return arbitrary chunks; `LineCodec` buffers them and yields
//! complete lines with the delimiter (and any trailing `\r`) removed.

use crate::message::LINE_DELIMITER;

/// Longest line the panel is expected to produce
pub const MAX_LINE_LEN: usize = 256;

/// Buffers raw bytes and splits them on the line delimiter
#[derive(Debug, Default)]
pub struct LineCodec {
    buffer: Vec<u8>,
}

impl LineCodec {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_LINE_LEN),
        }
    }

    /// Append received bytes
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // A peer that never sends a delimiter must not grow the buffer forever
        if self.buffer.len() > MAX_LINE_LEN * 4 && !self.buffer.contains(&(LINE_DELIMITER as u8)) {
            let start = self.buffer.len() - MAX_LINE_LEN;
            tracing::warn!("Discarding {} bytes of unterminated input", start);
            self.buffer.drain(..start);
        }
    }

    /// Next complete line, without its delimiter
    pub fn next_line(&mut self) -> Option<String> {
        let end = self
            .buffer
            .iter()
            .position(|&b| b == LINE_DELIMITER as u8)?;
        let raw: Vec<u8> = self.buffer.drain(..=end).collect();
        let mut line = &raw[..raw.len() - 1];
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }
        Some(String::from_utf8_lossy(line).into_owned())
    }

    /// Bytes waiting for a delimiter
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_across_chunks() {
        let mut codec = LineCodec::new();
        codec.push_bytes(b"MSFS");
        assert_eq!(codec.next_line(), None);
        codec.push_bytes(b"CP0\r\nK1");
        assert_eq!(codec.next_line().as_deref(), Some("MSFSCP0"));
        assert_eq!(codec.next_line(), None);
        codec.push_bytes(b"5\n");
        assert_eq!(codec.next_line().as_deref(), Some("K15"));
        assert_eq!(codec.pending(), 0);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut codec = LineCodec::new();
        codec.push_bytes(b"P\n\nEoops\n");
        assert_eq!(codec.next_line().as_deref(), Some("P"));
        assert_eq!(codec.next_line().as_deref(), Some(""));
        assert_eq!(codec.next_line().as_deref(), Some("Eoops"));
        assert_eq!(codec.next_line(), None);
    }

    #[test]
    fn test_unterminated_input_is_bounded() {
        let mut codec = LineCodec::new();
        codec.push_bytes(&[b'x'; MAX_LINE_LEN * 5]);
        assert_eq!(codec.pending(), MAX_LINE_LEN);
        codec.clear();
        assert_eq!(codec.pending(), 0);
    }
}
