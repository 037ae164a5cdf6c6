//! Reconstruct solutions by following predecessor links.

use serde::{Deserialize, Serialize};

use crate::canonical::CanonicalKey;
use crate::error::{Result, SolverError};
use crate::moves::{apply, Move};
use crate::puzzle::PuzzleState;
use crate::registry::VisitedRegistry;

/// Ordered moves from the start configuration to a solved one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub moves: Vec<Move>,
}

impl Solution {
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// User-facing `(source, dest)` stack pairs.
    pub fn steps(&self) -> Vec<(usize, usize)> {
        self.moves.iter().map(|mv| (mv.source, mv.dest)).collect()
    }

    /// Re-apply the moves from `root`, returning every state along the way
    /// (root first, solved state last).
    pub fn replay(&self, root: &PuzzleState) -> Result<Vec<PuzzleState>> {
        let mut states = Vec::with_capacity(self.moves.len() + 1);
        states.push(root.clone());
        for mv in &self.moves {
            let next = apply(states.last().unwrap_or(root), mv)?;
            states.push(next);
        }
        Ok(states)
    }
}

pub struct SolutionReporter<'a> {
    registry: &'a VisitedRegistry,
}

impl<'a> SolutionReporter<'a> {
    pub fn new(registry: &'a VisitedRegistry) -> Self {
        Self { registry }
    }

    pub fn report(&self, solved: &CanonicalKey) -> Result<Solution> {
        let lookup = |key: &CanonicalKey| {
            self.registry
                .node(key)
                .ok_or_else(|| SolverError::internal(format!("{:?} missing from registry", key)))
        };

        let start = lookup(solved)?;
        let limit = start.path_length as usize;
        let mut moves = Vec::with_capacity(limit);
        let mut key = solved.clone();
        let mut node = start;

        while node.predecessor != key {
            let mv = node.via.ok_or_else(|| {
                SolverError::internal(format!("non-root {:?} has no producing move", key))
            })?;
            moves.push(mv);
            if moves.len() > limit {
                return Err(SolverError::internal(format!(
                    "predecessor chain from {:?} exceeds its path length {}",
                    solved, limit
                )));
            }
            key = node.predecessor;
            node = lookup(&key)?;
        }

        moves.reverse();
        Ok(Solution { moves })
    }
}
