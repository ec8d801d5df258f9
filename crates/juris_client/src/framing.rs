//! Line framing for the response body. Chunk boundaries from the transport do
//! not line up with event boundaries, so bytes are buffered until a newline.

#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
    /// Bytes of `buf` already known to hold no newline.
    scanned: usize,
}

impl LineDecoder {
    /// Append a chunk and return every complete line it finishes, without the
    /// terminator (`\n` or `\r\n`). Blank lines are dropped.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            let idx = self.scanned + offset;
            let mut line: Vec<u8> = self.buf.drain(..=idx).collect();
            self.scanned = 0;
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !is_blank(&line) {
                lines.push(line);
            }
        }
        self.scanned = self.buf.len();
        lines
    }

    /// Take the trailing unterminated line once the body has ended.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        let mut rest = std::mem::take(&mut self.buf);
        self.scanned = 0;
        if rest.last() == Some(&b'\r') {
            rest.pop();
        }
        (!is_blank(&rest)).then_some(rest)
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}
