//! Frame reassembly for the chat wire protocol
//!
//! A logical message arrives as one or more text frames followed by a
//! terminator frame holding only the sentinel character:
//!
//! ```text
//! "Hel"  ──> Chunk { Complete, "Hel" }   (starts a message)
//! "lo"   ──> Chunk { Partial,  "lo"  }   (continues it)
//! "\0"   ──> None                        (terminator, next frame starts fresh)
//! ```
//!
//! There is no length field and no size limit at this layer. Stray
//! terminators are silently ignored.

/// Default terminator character
pub const DEFAULT_SENTINEL: char = '\0';

/// Position of a chunk inside its logical message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// First chunk of a new message (not "fully received")
    Complete,
    /// Additional chunk of the current message
    Partial,
}

/// Decoded content frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub kind: ChunkKind,
    pub text: String,
}

/// Stateful decoder turning raw frames into message chunks
#[derive(Debug, Clone)]
pub struct FrameReassembler {
    sentinel: char,
    awaiting_continuation: bool,
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::with_sentinel(DEFAULT_SENTINEL)
    }

    pub fn with_sentinel(sentinel: char) -> Self {
        Self {
            sentinel,
            awaiting_continuation: false,
        }
    }

    /// Feed one raw frame
    ///
    /// # Returns
    /// * `Some(chunk)` - the frame carried content
    /// * `None` - the frame was a terminator
    pub fn on_frame(&mut self, raw: &str) -> Option<Chunk> {
        if self.is_terminator(raw) {
            self.awaiting_continuation = false;
            return None;
        }

        let kind = if self.awaiting_continuation {
            ChunkKind::Partial
        } else {
            self.awaiting_continuation = true;
            ChunkKind::Complete
        };

        Some(Chunk {
            kind,
            text: raw.to_owned(),
        })
    }

    /// Forget any message in progress (new transport session)
    pub fn reset(&mut self) {
        self.awaiting_continuation = false;
    }

    fn is_terminator(&self, raw: &str) -> bool {
        let mut chars = raw.chars();
        chars.next() == Some(self.sentinel) && chars.next().is_none()
    }
}
