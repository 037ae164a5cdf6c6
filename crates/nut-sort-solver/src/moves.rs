//! Move generation rules.
//!
//! A move relocates the whole top run of one stack onto another stack. The
//! rules below are the only legality policy in the crate; moves that can
//! never be productive are rejected here so the search never sees them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SolverError};
use crate::puzzle::{Color, PuzzleState, Stack};

/// A fully resolved relocation of `count` units of `color`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    pub source: usize,
    pub dest: usize,
    pub count: usize,
    pub color: Color,
    /// Index of the lowest moved unit in the source stack
    pub source_top_index: usize,
    /// Index of the first empty slot in the destination stack
    pub dest_top_index: usize,
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({} x {})",
            self.source, self.dest, self.count, self.color
        )
    }
}

/// Check whether the top run of `source` may move onto `dest`.
pub fn check_move(state: &PuzzleState, source: usize, dest: usize) -> Option<Move> {
    if source == dest {
        return None;
    }
    let from = state.stack(source)?;
    let to = state.stack(dest)?;
    let run = from.top_run()?;

    // Rule 1: a finished stack moved onto an empty one just swaps places
    if to.is_empty() && from.is_full_run() {
        return None;
    }

    // Rule 2: colors must match unless the destination is empty
    if !to.is_empty() && to.top_color() != Some(run.color) {
        return None;
    }

    // Rule 3: the whole run must fit
    let room = to.top_empty_count();
    if room < run.length {
        return None;
    }

    Some(Move {
        source,
        dest,
        count: run.length,
        color: run.color,
        source_top_index: run.start_index,
        dest_top_index: to.capacity() - room,
    })
}

/// Lazily enumerate every legal move out of `state`.
pub fn legal_moves(state: &PuzzleState) -> impl Iterator<Item = Move> + '_ {
    let n = state.stacks().len();
    (0..n).flat_map(move |source| {
        (0..n).filter_map(move |dest| check_move(state, source, dest))
    })
}

/// Apply a move, producing the successor state. The parent is untouched.
///
/// The move is re-validated against the state; a mismatch means the move
/// did not come from [`legal_moves`] for this state.
pub fn apply(state: &PuzzleState, mv: &Move) -> Result<PuzzleState> {
    let (Some(from), Some(to)) = (state.stack(mv.source), state.stack(mv.dest)) else {
        return Err(SolverError::internal(format!(
            "move {} references a missing stack",
            mv
        )));
    };
    if mv.source == mv.dest || mv.count == 0 {
        return Err(SolverError::internal(format!("degenerate move {}", mv)));
    }
    verify_source(from, mv)?;
    verify_dest(to, mv)?;

    let mut stacks = state.stacks().to_vec();
    for slot in &mut stacks[mv.source].slots_mut()[mv.source_top_index..][..mv.count] {
        *slot = None;
    }
    for slot in &mut stacks[mv.dest].slots_mut()[mv.dest_top_index..][..mv.count] {
        *slot = Some(mv.color);
    }
    Ok(state.successor(stacks))
}

fn verify_source(from: &Stack, mv: &Move) -> Result<()> {
    match from.top_run() {
        Some(run)
            if run.color == mv.color
                && run.length >= mv.count
                && from.len() == mv.source_top_index + mv.count =>
        {
            Ok(())
        }
        _ => Err(SolverError::internal(format!(
            "source stack {} does not hold a run of {} x {} at slot {}",
            mv.source, mv.count, mv.color, mv.source_top_index
        ))),
    }
}

fn verify_dest(to: &Stack, mv: &Move) -> Result<()> {
    let room = to.top_empty_count() as isize - mv.count as isize;
    if room < 0 {
        return Err(SolverError::internal(format!(
            "destination stack {} would have negative capacity {}",
            mv.dest, room
        )));
    }
    if to.len() != mv.dest_top_index {
        return Err(SolverError::internal(format!(
            "destination stack {} top is at {}, move expects {}",
            mv.dest,
            to.len(),
            mv.dest_top_index
        )));
    }
    if !to.is_empty() && to.top_color() != Some(mv.color) {
        return Err(SolverError::internal(format!(
            "destination stack {} top color does not match {}",
            mv.dest, mv.color
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(rows: &[&str]) -> PuzzleState {
        PuzzleState::from_rows(rows).unwrap()
    }

    #[test]
    fn test_full_stack_to_empty_rejected() {
        let s = state(&["AAAA", "...."]);
        assert!(check_move(&s, 0, 1).is_none());
        assert_eq!(legal_moves(&s).count(), 0);
    }

    #[test]
    fn test_color_mismatch_rejected() {
        let s = state(&["AAB.", "BBA."]);
        assert!(check_move(&s, 0, 1).is_none());
        assert!(check_move(&s, 1, 0).is_none());
    }

    #[test]
    fn test_insufficient_room_rejected() {
        let s = state(&["ABBB", "BB.."]);
        // Run of three B cannot fit in two slots
        assert!(check_move(&s, 0, 1).is_none());
        // Run of two B onto a matching stack with a single empty slot
        let s = state(&["ABBB", "CBB.", "ABB."]);
        assert!(check_move(&s, 1, 2).is_none());
    }

    #[test]
    fn test_room_larger_than_run_allowed() {
        let s = state(&["AABB", "B...", "...."]);
        let mv = check_move(&s, 0, 1).unwrap();
        assert_eq!(mv.count, 2);
        assert_eq!(mv.source_top_index, 2);
        assert_eq!(mv.dest_top_index, 1);
    }

    #[test]
    fn test_partial_run_to_empty_allowed() {
        let s = state(&["AABB", "...."]);
        let moves: Vec<Move> = legal_moves(&s).collect();
        assert_eq!(moves.len(), 1);
        assert_eq!((moves[0].source, moves[0].dest, moves[0].count), (0, 1, 2));
    }

    #[test]
    fn test_apply_moves_whole_run() {
        let s = state(&["AABB", "BBAA", "....", "...."]);
        let mv = check_move(&s, 0, 2).unwrap();
        let next = apply(&s, &mv).unwrap();

        assert_eq!(next.path_length(), 1);
        assert_eq!(next.stacks()[0].to_string(), "[A A . .]");
        assert_eq!(next.stacks()[2].to_string(), "[B B . .]");
        // Parent untouched
        assert_eq!(s.stacks()[0].to_string(), "[A A B B]");
    }

    #[test]
    fn test_moves_conserve_units() {
        let s = state(&["ABCA", "CBA.", "BC..", "...."]);
        let before = s.color_counts();
        for mv in legal_moves(&s) {
            let next = apply(&s, &mv).unwrap();
            assert_eq!(next.color_counts(), before, "move {} changed unit counts", mv);
        }
    }

    #[test]
    fn test_apply_rejects_stale_move() {
        let s = state(&["AABB", "BBA.", "...."]);
        let mv = check_move(&s, 0, 2).unwrap();
        let next = apply(&s, &mv).unwrap();
        // Source no longer holds the B run
        assert!(matches!(apply(&next, &mv), Err(SolverError::Internal(_))));
    }

    #[test]
    fn test_apply_rejects_overflow() {
        let s = state(&["ABBB", "B...", "BB.."]);
        let mv = Move {
            source: 0,
            dest: 2,
            count: 3,
            color: Color::from_char('B').unwrap(),
            source_top_index: 1,
            dest_top_index: 2,
        };
        assert!(matches!(apply(&s, &mv), Err(SolverError::Internal(_))));
    }
}
