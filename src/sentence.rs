//! Incremental sentence-boundary scanning for streamed replies.
//!
//! Generated replies arrive as incremental chunks. Speaking should start as
//! soon as a sentence completes, not when the stream closes, so the scanner
//! tracks a cursor over the appended text instead of re-splitting the whole
//! accumulated reply on every chunk.

/// Scans streamed reply text for completed sentences.
///
/// One scanner per reply: the dedup cursor (the last emitted sentence) is
/// scoped to a single streamed reply and discarded with the scanner. A
/// completed sentence equal to the previous one is skipped, which suppresses
/// re-speaking when a still-growing transcript repeats its trailing
/// fragment.
#[derive(Debug, Default)]
pub struct SentenceScanner {
    /// Unconsumed text: always begins at the current sentence start.
    buf: String,
    /// Last emitted sentence for this reply.
    previous: Option<String>,
}

/// Sentence terminators recognized by the scanner.
fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

impl SentenceScanner {
    /// Create a scanner for a new reply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the completed sentences it finishes.
    ///
    /// Each returned sentence is trimmed and stripped of its terminator.
    /// Empty segments (e.g. from `"?!"`) and duplicates of the previously
    /// emitted sentence are dropped.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        let scan_from = self.buf.len();
        self.buf.push_str(chunk);

        // Terminator positions in the appended region only; earlier text
        // was already scanned.
        let boundaries: Vec<usize> = self.buf[scan_from..]
            .char_indices()
            .filter(|&(_, c)| is_terminator(c))
            .map(|(i, _)| scan_from + i)
            .collect();

        let mut completed = Vec::new();
        let mut start = 0;
        for pos in boundaries {
            let candidate = self.buf[start..pos].trim();
            start = pos + 1; // terminators are single-byte ASCII
            if candidate.is_empty() {
                continue;
            }
            if self.previous.as_deref() == Some(candidate) {
                continue;
            }
            let candidate = candidate.to_owned();
            self.previous = Some(candidate.clone());
            completed.push(candidate);
        }

        // Drop consumed sentences so the buffer only holds the open tail.
        if start > 0 {
            self.buf.drain(..start);
        }
        completed
    }

    /// Text after the last completed sentence, trimmed. Never spoken; the
    /// conversation loop discards it when the reply stream closes.
    pub fn tail(&self) -> &str {
        self.buf.trim()
    }
}
