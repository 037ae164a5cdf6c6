//! Order-independent fingerprints of puzzle states.
//!
//! Stacks are interchangeable, so a state is identified by its stacks sorted
//! into a fixed order and flattened into bytes. Empty slots encode as 0, which
//! sorts below every color.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::puzzle::PuzzleState;

/// Canonical identity of a puzzle state. Cloning shares the buffer.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalKey(Arc<[u8]>);

impl CanonicalKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CanonicalKey(")?;
        for &byte in self.0.iter() {
            let c = if byte == 0 { '.' } else { byte as char };
            write!(f, "{}", c)?;
        }
        write!(f, ")")
    }
}

/// Compute the canonical key of a state.
pub fn canonicalize(state: &PuzzleState) -> CanonicalKey {
    let mut rows: Vec<SmallVec<[u8; 8]>> = state
        .stacks()
        .iter()
        .map(|stack| {
            stack
                .slots()
                .iter()
                .map(|slot| slot.map_or(0, |color| color.byte()))
                .collect()
        })
        .collect();
    rows.sort_unstable();

    let bytes: Vec<u8> = rows.into_iter().flatten().collect();
    CanonicalKey(bytes.into())
}
