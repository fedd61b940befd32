//! Reassembly of newline-delimited records from raw stdout chunks.

/// Accumulates raw stdout bytes and yields complete lines.
///
/// The provider writes one JSON record per line, but chunk boundaries land
/// anywhere, including inside multi-byte characters. Bytes are buffered until
/// a line feed arrives; the unterminated tail stays buffered until the next
/// chunk or the final flush at process close.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every newly completed line, trimmed, with
    /// empty lines filtered out.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).take(pos).collect();
            let text = String::from_utf8_lossy(&line);
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
        lines
    }

    /// Flush the retained tail as one final line. The provider may omit the
    /// trailing newline on its last record.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(&self.buffer).trim().to_string();
        self.buffer.clear();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDS: &str = "{\"a\":1}\n{\"b\":2}\n{\"c\":3}\n";

    fn assemble_chunked(input: &str, chunk_size: usize) -> Vec<String> {
        let mut assembler = LineAssembler::new();
        let mut lines = Vec::new();
        for chunk in input.as_bytes().chunks(chunk_size) {
            lines.extend(assembler.push(chunk));
        }
        lines.extend(assembler.finish());
        lines
    }

    #[test]
    fn yields_same_lines_for_every_chunking() {
        let whole = assemble_chunked(RECORDS, RECORDS.len());
        assert_eq!(whole, vec!["{\"a\":1}", "{\"b\":2}", "{\"c\":3}"]);
        for chunk_size in 1..RECORDS.len() {
            assert_eq!(assemble_chunked(RECORDS, chunk_size), whole, "chunk_size={chunk_size}");
        }
    }

    #[test]
    fn retains_partial_line_across_chunks() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.push(b"{\"type\":\"sys").is_empty());
        let lines = assembler.push(b"tem\"}\n");
        assert_eq!(lines, vec!["{\"type\":\"system\"}"]);
        assert_eq!(assembler.finish(), None);
    }

    #[test]
    fn flushes_unterminated_tail_on_finish() {
        let mut assembler = LineAssembler::new();
        assert!(assembler.push(b"{\"last\":true}").is_empty());
        assert_eq!(assembler.finish(), Some("{\"last\":true}".to_string()));
        assert_eq!(assembler.finish(), None);
    }

    #[test]
    fn filters_blank_and_whitespace_lines() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push(b"\n  \n{\"x\":1}\r\n\n");
        assert_eq!(lines, vec!["{\"x\":1}"]);
    }

    #[test]
    fn multibyte_utf8_split_across_chunks_survives() {
        let input = "{\"text\":\"héllo→world\"}\n";
        let bytes = input.as_bytes();
        // Split inside the two-byte 'é' sequence.
        let split = input.find('é').map(|i| i + 1).unwrap_or(1);
        let mut assembler = LineAssembler::new();
        let mut lines = assembler.push(&bytes[..split]);
        lines.extend(assembler.push(&bytes[split..]));
        assert_eq!(lines, vec!["{\"text\":\"héllo→world\"}"]);
    }
}
