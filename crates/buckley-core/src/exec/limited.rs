//! Capped output capture
//!
//! Child stdout/stderr are drained into limited buffers. Bytes beyond the
//! cap are dropped, not buffered, so a chatty child cannot balloon memory;
//! the writer still reports every byte as accepted to keep pipe draining
//! honest. A cap of zero means unlimited.

/// Append-only byte sink with a maximum size and a truncation flag.
#[derive(Debug, Default)]
pub struct LimitedBuffer {
    buf: Vec<u8>,
    cap: usize,
    truncated: bool,
}

impl LimitedBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            buf: Vec::new(),
            cap,
            truncated: false,
        }
    }

    /// Accept `chunk`, keeping at most the capped prefix. Returns the full
    /// chunk length so callers never see a short write.
    pub fn write(&mut self, chunk: &[u8]) -> usize {
        if self.cap == 0 {
            self.buf.extend_from_slice(chunk);
            return chunk.len();
        }
        let room = self.cap.saturating_sub(self.buf.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.buf.extend_from_slice(&chunk[..room.min(chunk.len())]);
        chunk.len()
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the buffer as lossy UTF-8 text.
    pub fn into_string(self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }
}
