//! Payload fragmentation into chunk envelopes
//!
//! A logical payload is sliced into fixed-size fragments and each fragment is
//! wrapped in a [`ChunkEnvelope`] that carries the session id, its index and the
//! total count. The receiver reassembles a session by concatenating `data` in
//! ascending `chunkIndex` order.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Session Identifier
// ----------------------------------------------------------------------------

/// Random lowercase identifier shared by every envelope of one transfer.
///
/// Not cryptographically unique; collisions between short-lived sessions are
/// accepted as negligible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Draw `len` uniform letters from `a..=z`
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Self {
        let id = (0..len)
            .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ----------------------------------------------------------------------------
// Fragmentation
// ----------------------------------------------------------------------------

/// Slice `payload` into fragments of at most `fragment_size` characters.
///
/// Slicing is naive (no word boundaries) but never splits a UTF-8 code point.
/// An empty payload yields a single empty fragment.
pub fn split_fragments(payload: &str, fragment_size: usize) -> Vec<&str> {
    let fragment_size = fragment_size.max(1);
    if payload.is_empty() {
        return vec![payload];
    }

    let mut fragments = Vec::with_capacity(payload.len() / fragment_size + 1);
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in payload.char_indices() {
        if count == fragment_size {
            fragments.push(&payload[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }
    fragments.push(&payload[start..]);

    fragments
}

// ----------------------------------------------------------------------------
// Chunk Envelope
// ----------------------------------------------------------------------------

/// One unit on the wire: session metadata plus a slice of the payload.
///
/// Serialized as compact JSON with exactly the fields `sessionId`,
/// `chunkIndex`, `totalChunks` and `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkEnvelope {
    pub session_id: SessionId,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub data: String,
}

impl ChunkEnvelope {
    /// Encode as UTF-8 JSON bytes ready for a characteristic write
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decode an envelope as the peripheral would
    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn is_last(&self) -> bool {
        self.chunk_index + 1 == self.total_chunks
    }
}

// ----------------------------------------------------------------------------
// Chunk Plan
// ----------------------------------------------------------------------------

/// The ordered envelopes of a single transfer
#[derive(Debug, Clone)]
pub struct ChunkPlan<'a> {
    session_id: SessionId,
    fragments: Vec<&'a str>,
}

impl<'a> ChunkPlan<'a> {
    /// Plan a transfer of `payload` under a freshly generated session id
    pub fn new<R: Rng + ?Sized>(
        payload: &'a str,
        fragment_size: usize,
        session_id_len: usize,
        rng: &mut R,
    ) -> Self {
        Self::with_session(
            SessionId::generate(rng, session_id_len),
            payload,
            fragment_size,
        )
    }

    /// Plan a transfer under an existing session id
    pub fn with_session(session_id: SessionId, payload: &'a str, fragment_size: usize) -> Self {
        Self {
            session_id,
            fragments: split_fragments(payload, fragment_size),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Number of envelopes, always at least one
    pub fn total(&self) -> usize {
        self.fragments.len()
    }

    /// Envelope for fragment `index`, if in range
    pub fn envelope(&self, index: usize) -> Option<ChunkEnvelope> {
        self.fragments.get(index).map(|data| ChunkEnvelope {
            session_id: self.session_id.clone(),
            chunk_index: index,
            total_chunks: self.total(),
            data: (*data).to_string(),
        })
    }

    /// All envelopes in ascending index order
    pub fn envelopes(&self) -> impl Iterator<Item = ChunkEnvelope> + '_ {
        (0..self.total()).filter_map(move |index| self.envelope(index))
    }

    /// Progress percentage once fragment `index` has been written
    pub fn progress_after(&self, index: usize) -> u8 {
        let percent = (index + 1) * 100 / self.total();
        percent.min(100) as u8
    }
}
