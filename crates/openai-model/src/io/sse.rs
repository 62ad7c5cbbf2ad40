use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading server-sent events from a chunk stream.
///
/// Only the `data` field is collected; comments and the other fields
/// (`event`, `id`, `retry`) are skipped. Multiple `data` lines of one event
/// are joined with a line feed.
pub struct Sse {
    buf: Vec<u8>,
    data: Option<String>,
    chunks: Chunks,
    eof: bool,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            data: None,
            chunks,
            eof: false,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Consume every complete line in the buffer first.
            while let Some(line) = self.take_line() {
                let line = String::from_utf8(line)
                    .map_err(|_| Error::InvalidPayload)?;
                if let Some(event) = self.process_line(&line)? {
                    return Ok(Some(event));
                }
            }

            if self.eof {
                // An event without the trailing blank line is incomplete,
                // and is discarded.
                return Ok(None);
            }
            match self.chunks.next_chunk().await.map_err(Error::ChunksError)? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.eof = true,
            }
        }
    }

    /// Takes a line ending with `\n`, `\r\n`, or a lone `\r`, without the
    /// line terminator.
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let idx = self.buf.iter().position(|&b| b == b'\n' || b == b'\r')?;
        let term_len = if self.buf[idx] == b'\r' {
            match self.buf.get(idx + 1) {
                Some(b'\n') => 2,
                Some(_) => 1,
                // `\r` may be followed by `\n` in the next chunk.
                None if !self.eof => return None,
                None => 1,
            }
        } else {
            1
        };
        let mut line: Vec<u8> = self.buf.drain(..idx + term_len).collect();
        line.truncate(idx);
        Some(line)
    }

    fn process_line(&mut self, line: &str) -> Result<Option<String>, Error> {
        if line.is_empty() {
            return Ok(self.data.take());
        }
        if line.starts_with(':') {
            return Ok(None);
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => {
                (field, value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };
        match field {
            "data" => {
                let data = self.data.get_or_insert_default();
                if !data.is_empty() {
                    data.push('\n');
                }
                data.push_str(value);
            }
            "event" | "id" | "retry" => {}
            _ => {
                warn!("unexpected sse field: {field}");
                return Err(Error::InvalidPayload);
            }
        }
        Ok(None)
    }
}
