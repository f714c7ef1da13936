// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier and hashing utilities.
use blake3::Hasher;

/// Canonical 256-bit hash used throughout the engine for addressing blocks,
/// edges, patches, and continuity targets.
pub type Hash = [u8; 32];

/// Strongly typed identifier for a block in an authored patch.
///
/// `BlockId` is an opaque 32-byte identifier (`Hash`). Authored blocks use
/// stable, label-derived ids via [`make_block_id`] (`blake3("block:" || label)`)
/// so that re-serializing a patch reproduces the same ids. Tooling must not
/// assume that every `BlockId` is reversible back into a display name.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockId(pub Hash);

impl BlockId {
    /// Returns the canonical byte representation of this id.
    #[must_use]
    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }
}

/// Identifier for a directed edge within an authored patch.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeId(pub Hash);

impl EdgeId {
    /// Returns the canonical byte representation of this id.
    #[must_use]
    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }
}

/// Stable identity for a continuity target.
///
/// Derived from the owning block's role label and the output port name so a
/// recompile of a conceptually unchanged graph produces the same key, letting
/// gauge/slew state survive topology edits. See [`make_target_id`].
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StableTargetId(pub Hash);

impl StableTargetId {
    /// Returns the canonical byte representation of this id.
    #[must_use]
    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }
}

/// Produces a stable, domain‑separated block identifier (prefix `b"block:"`) using BLAKE3.
pub fn make_block_id(label: &str) -> BlockId {
    let mut hasher = Hasher::new();
    hasher.update(b"block:");
    hasher.update(label.as_bytes());
    BlockId(hasher.finalize().into())
}

/// Produces a stable, domain‑separated edge identifier (prefix `b"edge:"`) using BLAKE3.
pub fn make_edge_id(label: &str) -> EdgeId {
    let mut hasher = Hasher::new();
    hasher.update(b"edge:");
    hasher.update(label.as_bytes());
    EdgeId(hasher.finalize().into())
}

/// Produces a stable continuity target identifier (prefix `b"target:"`) using BLAKE3.
///
/// `role` is the block's role label (its display name in the authored patch);
/// `port` is the output port name. The separator byte keeps `("ab", "c")` and
/// `("a", "bc")` distinct.
pub fn make_target_id(role: &str, port: &str) -> StableTargetId {
    let mut hasher = Hasher::new();
    hasher.update(b"target:");
    hasher.update(role.as_bytes());
    hasher.update(b":");
    hasher.update(port.as_bytes());
    StableTargetId(hasher.finalize().into())
}

/// Renders the first eight bytes of a hash as hex for human-facing messages.
#[must_use]
pub fn short_hash(h: &Hash) -> String {
    hex::encode(&h[0..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_separation_prevents_cross_type_collisions() {
        let lbl = "foo";
        let b = make_block_id(lbl).0;
        let e = make_edge_id(lbl).0;
        assert_ne!(b, e);
    }

    #[test]
    fn target_id_separator_prevents_boundary_collisions() {
        assert_ne!(make_target_id("ab", "c"), make_target_id("a", "bc"));
    }
}
