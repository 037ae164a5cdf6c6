//! Shared registry of every admitted state.
//!
//! The registry is the only mutable structure shared between workers. Each
//! admission runs under the shard lock of its key, so two workers racing on
//! the same state can never both be told to expand it.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::canonical::CanonicalKey;
use crate::error::{Result, SolverError};
use crate::moves::Move;

/// Outcome of submitting a candidate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitResult {
    /// First time this key is seen; the caller must enqueue it.
    Accepted,
    /// Already known with an equal or shorter path; discard.
    Rejected,
    /// Known, but the new path is strictly shorter; entry overwritten.
    ///
    /// The caller re-enqueues its own concrete state, whose stack order may
    /// differ from the state first admitted under this key. Children already
    /// admitted from the first state recorded `via` moves against that order
    /// and would no longer replay. Level-synchronous dispatch admits every
    /// key at its minimum depth first, so this never happens there; the
    /// scheduler treats any improvement as an internal error.
    Improved,
}

/// Best known way to reach a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchNode {
    pub path_length: u32,
    /// Equal to the node's own key for the root
    pub predecessor: CanonicalKey,
    /// Move that leads from the predecessor here; `None` for the root
    pub via: Option<Move>,
}

#[derive(Debug, Default)]
pub struct VisitedRegistry {
    nodes: DashMap<CanonicalKey, SearchNode>,
    accepted: AtomicU64,
    improved: AtomicU64,
}

impl VisitedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the root state. The registry must be empty.
    pub fn seed(&self, root: CanonicalKey) -> Result<()> {
        if !self.nodes.is_empty() {
            return Err(SolverError::internal(
                "registry seeded twice or after admissions",
            ));
        }
        let node = SearchNode {
            path_length: 0,
            predecessor: root.clone(),
            via: None,
        };
        self.nodes.insert(root, node);
        self.accepted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn admit(
        &self,
        key: CanonicalKey,
        path_length: u32,
        predecessor: CanonicalKey,
        via: Move,
    ) -> AdmitResult {
        match self.nodes.entry(key) {
            Entry::Vacant(vacant) => {
                vacant.insert(SearchNode {
                    path_length,
                    predecessor,
                    via: Some(via),
                });
                self.accepted.fetch_add(1, Ordering::Relaxed);
                AdmitResult::Accepted
            }
            Entry::Occupied(mut occupied) => {
                if occupied.get().path_length <= path_length {
                    return AdmitResult::Rejected;
                }
                let node = occupied.get_mut();
                node.path_length = path_length;
                node.predecessor = predecessor;
                node.via = Some(via);
                self.improved.fetch_add(1, Ordering::Relaxed);
                AdmitResult::Improved
            }
        }
    }

    pub fn node(&self, key: &CanonicalKey) -> Option<SearchNode> {
        self.nodes.get(key).map(|entry| entry.value().clone())
    }

    /// Verify that every key was handed out as `Accepted` exactly once and
    /// that no entry was ever improved.
    pub fn check_admissions(&self) -> Result<()> {
        let accepted = self.accepted_count();
        let stored = self.nodes.len() as u64;
        if accepted != stored {
            return Err(SolverError::internal(format!(
                "{} states accepted but {} stored",
                accepted, stored
            )));
        }
        let improved = self.improved_count();
        if improved != 0 {
            return Err(SolverError::internal(format!(
                "{} states improved after their level was dispatched",
                improved
            )));
        }
        Ok(())
    }

    /// Copy of every entry, in no particular order.
    pub fn snapshot(&self) -> Vec<(CanonicalKey, SearchNode)> {
        self.nodes
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of distinct states admitted so far
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Total `Accepted` results handed out, the root included.
    pub fn accepted_count(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn improved_count(&self) -> u64 {
        self.improved.load(Ordering::Relaxed)
    }
}
