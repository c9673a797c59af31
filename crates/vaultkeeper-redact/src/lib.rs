#![forbid(unsafe_code)]

//! `vaultkeeper-redact` — a streaming byte transformer that replaces every
//! occurrence of a secret value with a fixed replacement marker, correctly
//! handling occurrences that straddle chunk boundaries.
//!
//! The technique is the standard "retain the last `len(secret) - 1` bytes"
//! buffering idiom for streaming substring search: a match can only begin
//! at a position where the full pattern still fits within bytes seen so
//! far, so everything before that cutoff is safe to emit immediately.

/// Holds the tail buffer across `feed` calls for one redaction session.
pub struct Redactor {
    secret: Vec<u8>,
    replacement: Vec<u8>,
    tail: Vec<u8>,
}

impl Redactor {
    pub fn new(secret: impl Into<Vec<u8>>, replacement: impl Into<Vec<u8>>) -> Self {
        Redactor {
            secret: secret.into(),
            replacement: replacement.into(),
            tail: Vec::new(),
        }
    }

    pub fn with_default_replacement(secret: impl Into<Vec<u8>>) -> Self {
        Self::new(secret, b"[REDACTED]".to_vec())
    }

    /// Processes one chunk, returning the bytes that are now safe to emit.
    /// Up to `len(secret) - 1` bytes are retained internally in case they
    /// are the start of an occurrence completed by a later chunk.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<u8> {
        if self.secret.is_empty() {
            return chunk.to_vec();
        }
        self.tail.extend_from_slice(chunk);

        let secret_len = self.secret.len();
        let mut output = Vec::with_capacity(self.tail.len());
        let mut i = 0;
        while i + secret_len <= self.tail.len() {
            if self.tail[i..i + secret_len] == self.secret[..] {
                output.extend_from_slice(&self.replacement);
                i += secret_len;
            } else {
                output.push(self.tail[i]);
                i += 1;
            }
        }
        self.tail.drain(..i);
        output
    }

    /// Flushes the remaining tail at end of stream. Consumes the redactor.
    pub fn finish(mut self) -> Vec<u8> {
        std::mem::take(&mut self.tail)
    }
}

/// Redacts a complete, already-available byte slice in one call.
pub fn redact_all(secret: &[u8], replacement: &[u8], input: &[u8]) -> Vec<u8> {
    let mut redactor = Redactor::new(secret.to_vec(), replacement.to_vec());
    let mut out = redactor.feed(input);
    out.extend(redactor.finish());
    out
}
