//! Naming artifacts and packaging them for the chat.
//!
//! Artifacts are assembled as an explicit list in construction order and
//! only sorted, by filename, when the grouped send is built. Two runs over
//! the same input therefore always produce the same batch order.

use crate::model::{ArtifactRole, OutboundBatch, OutputArtifact, ReplyTo};
use rand::Rng;

/// Length of the random filename suffix.
pub const SUFFIX_LEN: usize = 26;

const SUFFIX_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Label used when a sticker has no emoji attached.
const FALLBACK_LABEL: &str = "sticker";

/// The shared stem of one sticker's artifacts: `{emoji}_{suffix}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStem(String);

impl FileStem {
    /// Build a stem with a fresh random suffix.
    pub fn generate(emoji: &str) -> Self {
        let mut rng = rand::rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[rng.random_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect();
        Self::with_suffix(emoji, &suffix)
    }

    pub fn with_suffix(emoji: &str, suffix: &str) -> Self {
        let label = emoji.trim();
        let label = if label.is_empty() { FALLBACK_LABEL } else { label };
        Self(format!("{label}_{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn filename(&self, role: ArtifactRole) -> String {
        match role {
            ArtifactRole::Archival => format!("{}.png", self.0),
            ArtifactRole::FullPhoto => format!("{}.jpg", self.0),
            ArtifactRole::ScaledPhoto => format!("{}_small.jpg", self.0),
        }
    }
}

/// Package photo artifacts into one grouped send, sorted by filename.
///
/// Returns `None` when there is nothing to send.
pub fn compose_batch(reply: ReplyTo, mut photos: Vec<OutputArtifact>) -> Option<OutboundBatch> {
    if photos.is_empty() {
        return None;
    }
    photos.sort_by(|a, b| a.filename.cmp(&b.filename));
    Some(OutboundBatch {
        reply,
        items: photos,
    })
}
