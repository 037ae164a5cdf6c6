//! Puzzle representation: colors, stacks and immutable puzzle states.
//!
//! A puzzle definition deserializes directly from the JSON input format
//! (or is built from raw text by the loader) and is validated into a root
//! [`PuzzleState`] before any search work starts.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::InputError;

/// Marker for an empty slot in textual input and output.
pub const EMPTY_MARKER: char = '.';

/// A unit color, identified by a single printable ASCII character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "char", try_from = "char")]
pub struct Color(u8);

impl Color {
    pub fn from_char(c: char) -> Result<Self, InputError> {
        if c.is_ascii_graphic() && c != EMPTY_MARKER {
            Ok(Color(c as u8))
        } else {
            Err(InputError::InvalidColor(c))
        }
    }

    pub fn as_char(self) -> char {
        self.0 as char
    }

    /// Byte used for this color inside canonical keys. Never zero.
    pub(crate) fn byte(self) -> u8 {
        self.0
    }
}

impl From<Color> for char {
    fn from(color: Color) -> char {
        color.as_char()
    }
}

impl TryFrom<char> for Color {
    type Error = InputError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        Color::from_char(c)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// The contiguous block of identical color at the top of a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopRun {
    pub length: usize,
    pub color: Color,
    /// Index of the lowest unit of the run
    pub start_index: usize,
}

/// A fixed-capacity stack, bottom to top. Occupied slots never have a gap
/// beneath them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Stack {
    slots: SmallVec<[Option<Color>; 8]>,
}

impl Stack {
    pub fn empty(capacity: usize) -> Self {
        Self {
            slots: SmallVec::from_elem(None, capacity),
        }
    }

    /// Build a stack from slots that are already known to be gap-free.
    pub(crate) fn from_slots(slots: SmallVec<[Option<Color>; 8]>) -> Self {
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Option<Color>] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Option<Color>] {
        &mut self.slots
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().take_while(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.first().map_or(true, |slot| slot.is_none())
    }

    /// Number of contiguous empty slots counted down from the top.
    pub fn top_empty_count(&self) -> usize {
        self.capacity() - self.len()
    }

    pub fn top_color(&self) -> Option<Color> {
        self.len().checked_sub(1).and_then(|top| self.slots[top])
    }

    pub fn top_run(&self) -> Option<TopRun> {
        let len = self.len();
        let color = self.top_color()?;
        let length = self.slots[..len]
            .iter()
            .rev()
            .take_while(|slot| **slot == Some(color))
            .count();
        Some(TopRun {
            length,
            color,
            start_index: len - length,
        })
    }

    /// A run that fills every slot of the stack.
    pub fn is_full_run(&self) -> bool {
        self.top_run()
            .map_or(false, |run| run.length == self.capacity())
    }

    /// True when all occupied slots share one color (an empty stack counts).
    pub fn is_monochromatic(&self) -> bool {
        self.top_run().map_or(true, |run| run.start_index == 0)
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match slot {
                Some(color) => write!(f, "{}", color)?,
                None => write!(f, "{}", EMPTY_MARKER)?,
            }
        }
        write!(f, "]")
    }
}

/// Immutable snapshot of every stack plus the number of moves taken from the
/// root. Stack indices never change between states of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleState {
    stacks: Vec<Stack>,
    capacity: usize,
    path_length: u32,
}

impl PuzzleState {
    /// Create a root state (path length 0).
    pub(crate) fn root(stacks: Vec<Stack>, capacity: usize) -> Self {
        Self {
            stacks,
            capacity,
            path_length: 0,
        }
    }

    pub(crate) fn successor(&self, stacks: Vec<Stack>) -> Self {
        Self {
            stacks,
            capacity: self.capacity,
            path_length: self.path_length + 1,
        }
    }

    /// Parse one row per stack, bottom to top, `.` marking empty slots.
    /// Every row must be exactly as wide as the first one.
    pub fn from_rows(rows: &[&str]) -> Result<Self, InputError> {
        let capacity = rows.first().map_or(0, |row| row.chars().count());
        for (stack, row) in rows.iter().enumerate() {
            let width = row.chars().count();
            if width != capacity {
                return Err(InputError::RowWidth {
                    stack,
                    width,
                    capacity,
                });
            }
        }
        PuzzleDefinition {
            capacity,
            empty_stacks: 0,
            units: rows.concat(),
            stack_count: Some(rows.len()),
        }
        .build()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn stack(&self, index: usize) -> Option<&Stack> {
        self.stacks.get(index)
    }

    pub fn path_length(&self) -> u32 {
        self.path_length
    }

    /// No stack mixes colors and every color sits in exactly one stack.
    pub fn is_solved(&self) -> bool {
        let mut gathered = BTreeSet::new();
        self.stacks.iter().all(|stack| match stack.top_run() {
            None => true,
            Some(run) => run.start_index == 0 && gathered.insert(run.color),
        })
    }

    /// Total units per color across all stacks.
    pub fn color_counts(&self) -> BTreeMap<Color, usize> {
        let mut counts = BTreeMap::new();
        for color in self.stacks.iter().flat_map(|s| s.slots().iter().flatten()) {
            *counts.entry(*color).or_insert(0) += 1;
        }
        counts
    }
}

impl fmt::Display for PuzzleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, stack) in self.stacks.iter().enumerate() {
            writeln!(f, "{:>3}: {}", index, stack)?;
        }
        Ok(())
    }
}

/// Puzzle definition as supplied by the input loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleDefinition {
    pub capacity: usize,
    /// Empty buffer stacks appended after the listed ones
    #[serde(default)]
    pub empty_stacks: usize,
    /// Color identifiers in groups of `capacity`, each group bottom to top.
    /// Whitespace is ignored.
    pub units: String,
    /// Expected total number of stacks, including buffers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_count: Option<usize>,
}

impl PuzzleDefinition {
    /// Validate the definition and build the root state.
    pub fn build(&self) -> Result<PuzzleState, InputError> {
        if self.capacity == 0 {
            return Err(InputError::ZeroCapacity);
        }

        let units: Vec<char> = self.units.chars().filter(|c| !c.is_whitespace()).collect();
        if units.len() % self.capacity != 0 {
            return Err(InputError::NotMultipleOfCapacity {
                units: units.len(),
                capacity: self.capacity,
            });
        }

        let mut stacks = units
            .chunks(self.capacity)
            .enumerate()
            .map(|(index, group)| parse_stack(index, group))
            .collect::<Result<Vec<_>, _>>()?;
        stacks.extend((0..self.empty_stacks).map(|_| Stack::empty(self.capacity)));

        if stacks.is_empty() {
            return Err(InputError::NoStacks);
        }
        if let Some(expected) = self.stack_count {
            if expected != stacks.len() {
                return Err(InputError::StackCountMismatch {
                    expected,
                    found: stacks.len(),
                });
            }
        }

        Ok(PuzzleState::root(stacks, self.capacity))
    }
}

fn parse_stack(index: usize, group: &[char]) -> Result<Stack, InputError> {
    let mut slots = SmallVec::with_capacity(group.len());
    let mut seen_empty = false;
    for (slot, &c) in group.iter().enumerate() {
        if c == EMPTY_MARKER {
            seen_empty = true;
            slots.push(None);
            continue;
        }
        if seen_empty {
            return Err(InputError::Gap { stack: index, slot });
        }
        slots.push(Some(Color::from_char(c)?));
    }
    Ok(Stack::from_slots(slots))
}
